//! Client commands.
//!
//! Every inbound text message carries exactly one command. Decoding is
//! two-phase: the `cmd` discriminator is read first, then the
//! command-specific payload is decoded into a closed set of variants.
//!
//! # Commands
//!
//! | `cmd` | Fields | Effect |
//! |-------|--------|--------|
//! | `connect` | `id`, `url`, `body?` | Opens a subscription |
//! | `close` | `id` | Cancels a subscription |

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::backend::Resolver;
use crate::error::{Error, Result};
use crate::identifiers::SubscriptionId;

// ============================================================================
// Wire Payloads
// ============================================================================

/// Discriminator-only view of an inbound message.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    cmd: Option<String>,
}

/// Raw `connect` payload before validation.
#[derive(Debug, Deserialize)]
struct ConnectParams {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    body: Option<Value>,
}

/// Raw `close` payload before validation.
#[derive(Debug, Deserialize)]
struct CloseParams {
    #[serde(default)]
    id: Option<i64>,
}

// ============================================================================
// Command
// ============================================================================

/// A decoded and validated client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open a streaming subscription.
    Connect(ConnectCommand),
    /// Cancel a streaming subscription.
    Close(CloseCommand),
}

impl Command {
    /// Decodes one inbound text message.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the message is not a JSON object, `cmd` is
    ///   missing or empty, or `cmd` names an unknown command
    /// - [`Error::Validation`] if required command fields are missing
    pub fn decode(raw: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(raw)
            .map_err(|e| Error::protocol(format!("decoding command name: {e}")))?;

        let name = envelope.cmd.unwrap_or_default();
        match name.as_str() {
            "" => Err(Error::protocol("missing cmd")),
            "connect" => ConnectCommand::decode(raw).map(Self::Connect),
            "close" => CloseCommand::decode(raw).map(Self::Close),
            other => Err(Error::protocol(format!("unknown command: {other}"))),
        }
    }

    /// Returns the wire name of this command.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::Close(_) => "close",
        }
    }

    /// Returns the subscription id this command targets.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        match self {
            Self::Connect(cmd) => cmd.id,
            Self::Close(cmd) => cmd.id,
        }
    }
}

// ============================================================================
// ConnectCommand
// ============================================================================

/// `{"cmd":"connect","id":<nonzero>,"url":<path>,"body":<optional>}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectCommand {
    /// Client-assigned subscription id.
    pub id: SubscriptionId,
    /// Logical backend path, resolved through a [`Resolver`].
    pub url: String,
    /// Optional request body forwarded to the backend.
    pub body: Option<String>,
}

impl ConnectCommand {
    fn decode(raw: &str) -> Result<Self> {
        let params: ConnectParams = serde_json::from_str(raw)
            .map_err(|e| Error::protocol(format!("decoding connect command: {e}")))?;

        let id = params.id.and_then(SubscriptionId::new);
        let url = params.url.filter(|url| !url.is_empty());
        let (Some(id), Some(url)) = (id, url) else {
            return Err(Error::validation(
                "connect command requires the parameters url and id",
            ));
        };

        let body = match params.body {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text),
            Some(other) => Some(other.to_string()),
        };

        Ok(Self { id, url, body })
    }

    /// Resolves the logical path to an absolute backend URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the resolver does not know the path.
    pub fn resolve(&self, resolver: &dyn Resolver) -> Result<Url> {
        resolver
            .resolve(&self.url)
            .ok_or_else(|| Error::validation("unknown url"))
    }
}

// ============================================================================
// CloseCommand
// ============================================================================

/// `{"cmd":"close","id":<nonzero>}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseCommand {
    /// Subscription to cancel.
    pub id: SubscriptionId,
}

impl CloseCommand {
    fn decode(raw: &str) -> Result<Self> {
        let params: CloseParams = serde_json::from_str(raw)
            .map_err(|e| Error::protocol(format!("decoding close command: {e}")))?;

        params
            .id
            .and_then(SubscriptionId::new)
            .map(|id| Self { id })
            .ok_or_else(|| Error::validation("close command requires the parameter id"))
    }
}

// ============================================================================
// Tests
// ============================================================================
