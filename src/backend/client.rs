//! Streaming HTTP client.
//!
//! Thin wrapper over [`reqwest::Client`]. Requests carry no timeout of
//! their own; a subscription ends when the backend ends it or when the
//! relay drops the response after cancellation.

// ============================================================================
// Imports
// ============================================================================

use reqwest::{Client, Response};
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Backend
// ============================================================================

/// HTTP client used to open subscriptions.
///
/// Cloning is cheap; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct Backend {
    client: Client,
}

impl Backend {
    /// Creates a backend client with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be initialised.
    pub fn new() -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self { client })
    }

    /// Wraps an existing [`reqwest::Client`].
    #[inline]
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Issues a streaming GET and returns once response headers arrive.
    ///
    /// The body is not read. Dropping the returned [`Response`] aborts the
    /// request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendConnect`] if no response is received.
    pub async fn open(&self, url: &Url, body: Option<&str>) -> Result<Response> {
        let mut request = self.client.get(url.clone());
        if let Some(body) = body {
            request = request.body(body.to_owned());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::backend_connect(url.as_str(), e.to_string()))?;

        debug!(%url, status = response.status().as_u16(), "Backend responded");
        Ok(response)
    }

    /// Reads the whole body of a response as text.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendStream`] if the body cannot be read.
    pub async fn drain(response: Response) -> Result<String> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::backend_stream(format!("reading response body: {e}")))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

// ============================================================================
// Tests
// ============================================================================
