//! Relay events.
//!
//! Events are sent from the relay to the client, one JSON object per
//! WebSocket text message.
//!
//! # Event Types
//!
//! | `event` | Fields | Scope |
//! |---------|--------|-------|
//! | `connected` | `id` | subscription |
//! | `data` | `id`, `data` (raw JSON) | subscription |
//! | `close` | `id`, `code`, `reason` (string or null) | subscription |
//! | `error` | `reason` | session |

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::value::RawValue;
use tracing::warn;

use crate::error::Result;
use crate::identifiers::SubscriptionId;

// ============================================================================
// Constants
// ============================================================================

/// Close reason sent when a backend stream fails mid-flight.
pub const BACKEND_LOST_REASON: &str = "connection to backend lost";

// ============================================================================
// Event
// ============================================================================

/// An event from the relay to the client.
///
/// # Format
///
/// ```json
/// {"event":"connected","id":2}
/// {"event":"data","id":2,"data":{"some":"record"}}
/// {"event":"close","id":2,"code":200,"reason":null}
/// {"event":"error","reason":"Protocol error: missing cmd"}
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum Event {
    /// Backend answered 200; data events follow.
    Connected {
        /// Subscription id.
        id: SubscriptionId,
    },

    /// One backend record.
    Data {
        /// Subscription id.
        id: SubscriptionId,
        /// The record, embedded verbatim.
        data: Box<RawValue>,
    },

    /// Terminal event of a subscription.
    Close {
        /// Subscription id.
        id: SubscriptionId,
        /// Backend HTTP status.
        code: u16,
        /// `null` on a clean end, otherwise a description.
        reason: Option<String>,
    },

    /// Session-scoped failure report.
    Error {
        /// Description of the failure.
        reason: String,
    },
}

impl Event {
    /// Creates a `connected` event.
    #[inline]
    #[must_use]
    pub fn connected(id: SubscriptionId) -> Self {
        Self::Connected { id }
    }

    /// Creates a `data` event from one backend line.
    ///
    /// A line that is valid JSON is embedded raw. Anything else is embedded
    /// as a JSON string so the outbound message stays well-formed.
    #[must_use]
    pub fn data(id: SubscriptionId, line: &[u8]) -> Self {
        let text = String::from_utf8_lossy(line).into_owned();
        let data = match RawValue::from_string(text) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(%id, error = %e, "Backend line is not JSON, relaying as string");
                Self::string_payload(line)
            }
        };
        Self::Data { id, data }
    }

    /// Creates a `close` event.
    #[inline]
    #[must_use]
    pub fn close(id: SubscriptionId, code: u16, reason: Option<String>) -> Self {
        Self::Close { id, code, reason }
    }

    /// Creates an `error` event.
    #[inline]
    #[must_use]
    pub fn error(reason: impl Into<String>) -> Self {
        Self::Error {
            reason: reason.into(),
        }
    }

    /// Returns the subscription id, or `None` for session events.
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<SubscriptionId> {
        match self {
            Self::Connected { id } | Self::Data { id, .. } | Self::Close { id, .. } => Some(*id),
            Self::Error { .. } => None,
        }
    }

    /// Returns `true` if this event ends a subscription.
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Close { .. })
    }

    /// Serializes the event to its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn string_payload(line: &[u8]) -> Box<RawValue> {
        let quoted = serde_json::to_string(&String::from_utf8_lossy(line))
            .unwrap_or_else(|_| String::from("\"\""));
        RawValue::from_string(quoted).unwrap_or_else(|_| Self::null_payload())
    }

    fn null_payload() -> Box<RawValue> {
        RawValue::NULL.to_owned()
    }
}

// ============================================================================
// Tests
// ============================================================================
