//! Type-safe identifiers.
//!
//! Newtype wrappers prevent mixing a client-assigned subscription id with
//! other integers, and give every Session a unique id for log correlation.
//!
//! | Type | Origin | Format |
//! |------|--------|--------|
//! | [`SubscriptionId`] | client (`id` field) | non-zero `i64` |
//! | [`SessionId`] | relay | UUID v4 |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroI64;

use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// SubscriptionId
// ============================================================================

/// Client-assigned subscription id.
///
/// Zero is reserved, so the inner value is a [`NonZeroI64`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SubscriptionId(NonZeroI64);

impl SubscriptionId {
    /// Creates an id, returning `None` for zero.
    #[inline]
    #[must_use]
    pub fn new(raw: i64) -> Option<Self> {
        NonZeroI64::new(raw).map(Self)
    }

    /// Returns the raw integer value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0.get()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// SessionId
// ============================================================================

/// Unique id of one client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a new random session id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_id_rejects_zero() {
        assert!(SubscriptionId::new(0).is_none());
        assert_eq!(SubscriptionId::new(-3).map(SubscriptionId::get), Some(-3));
    }

    #[test]
    fn test_subscription_id_serializes_as_number() {
        let id = SubscriptionId::new(42).expect("non-zero");
        assert_eq!(serde_json::to_string(&id).expect("serialize"), "42");
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_session_ids_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }
}
