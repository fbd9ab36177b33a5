//! Error types for the relay.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use wsmux::{Result, Error};
//!
//! fn example(registry: &SubscriptionRegistry, id: SubscriptionId) -> Result<()> {
//!     registry.cancel(id)?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants | Session outcome |
//! |----------|----------|-----------------|
//! | Protocol | [`Error::Protocol`] | `error` event, Session continues |
//! | Validation | [`Error::Validation`], [`Error::DuplicateId`], [`Error::UnknownId`] | `error` event, command aborted |
//! | Backend | [`Error::BackendConnect`], [`Error::BackendStream`] | `error` / `close` event |
//! | Queue | [`Error::QueueClosed`] | send rejected, producer exits |
//! | Transport | [`Error::ConnectionClosed`], [`Error::WebSocket`], [`Error::Io`] | Session teardown |
//! | External | [`Error::Json`], [`Error::Http`], [`Error::Config`] | depends on caller |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::SubscriptionId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// The `Display` output of a variant is what the client receives as the
/// `reason` of an `error` event.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when relay configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Malformed command envelope or unsupported frame.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Validation Errors
    // ========================================================================
    /// Command fields are missing or invalid.
    #[error("Validation error: {message}")]
    Validation {
        /// Description of the invalid field.
        message: String,
    },

    /// A live subscription already uses this id.
    #[error("Duplicate subscription id: {id}")]
    DuplicateId {
        /// The id that is already registered.
        id: SubscriptionId,
    },

    /// No live subscription uses this id.
    #[error("Unknown subscription id: {id}")]
    UnknownId {
        /// The id that was not found.
        id: SubscriptionId,
    },

    // ========================================================================
    // Backend Errors
    // ========================================================================
    /// Backend request failed before any response arrived.
    #[error("Backend connection to {url} failed: {message}")]
    BackendConnect {
        /// Resolved backend URL.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// Backend body failed mid-stream.
    #[error("Backend stream failed: {message}")]
    BackendStream {
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Queue / Transport Errors
    // ========================================================================
    /// The outbound event queue has been closed.
    #[error("Event queue closed")]
    QueueClosed,

    /// Client connection closed.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a validation error.
    #[inline]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a duplicate id error.
    #[inline]
    pub fn duplicate_id(id: SubscriptionId) -> Self {
        Self::DuplicateId { id }
    }

    /// Creates an unknown id error.
    #[inline]
    pub fn unknown_id(id: SubscriptionId) -> Self {
        Self::UnknownId { id }
    }

    /// Creates a backend connect error.
    #[inline]
    pub fn backend_connect(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendConnect {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a backend stream error.
    #[inline]
    pub fn backend_stream(message: impl Into<String>) -> Self {
        Self::BackendStream {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error must tear down the whole Session.
    ///
    /// Only transport-level failures are fatal. Everything else is
    /// reported to the client as an event.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed | Self::WebSocket(_) | Self::Io(_)
        )
    }

    /// Returns `true` if this is a validation error.
    #[inline]
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::DuplicateId { .. } | Self::UnknownId { .. }
        )
    }

    /// Returns `true` if this is a backend error.
    #[inline]
    #[must_use]
    pub fn is_backend_error(&self) -> bool {
        matches!(
            self,
            Self::BackendConnect { .. } | Self::BackendStream { .. } | Self::Http(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
