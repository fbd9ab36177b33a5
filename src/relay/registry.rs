//! Subscription registry.
//!
//! Maps each live [`SubscriptionId`] of a Session to the cancellation
//! token of its backend request. All operations take one short lock and
//! never block on anything else; cancelling a token only requests
//! cancellation, it does not wait for the subscription task.
//!
//! Every registration gets a generation number. A finishing stream reader
//! unregisters with its generation, so it can never remove a newer
//! subscription that reused the same id after an explicit close.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::SubscriptionId;

// ============================================================================
// Types
// ============================================================================

/// Generation number handed out by [`SubscriptionRegistry::register`].
pub type Generation = u64;

/// One live subscription.
#[derive(Debug)]
struct Entry {
    generation: Generation,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct Inner {
    entries: FxHashMap<SubscriptionId, Entry>,
    next_generation: Generation,
}

// ============================================================================
// SubscriptionRegistry
// ============================================================================

/// Id → cancellation map for one Session.
///
/// # Thread Safety
///
/// `SubscriptionRegistry` is `Send + Sync`; share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    inner: Mutex<Inner>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `cancel` under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateId`] if `id` is already live. The existing
    /// registration is left untouched.
    pub fn register(&self, id: SubscriptionId, cancel: CancellationToken) -> Result<Generation> {
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(&id) {
            return Err(Error::duplicate_id(id));
        }

        let generation = inner.next_generation;
        inner.next_generation += 1;
        inner.entries.insert(id, Entry { generation, cancel });

        debug!(%id, generation, "Subscription registered");
        Ok(generation)
    }

    /// Cancels and removes the subscription registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownId`] if `id` is not live.
    pub fn cancel(&self, id: SubscriptionId) -> Result<()> {
        let entry = self
            .inner
            .lock()
            .entries
            .remove(&id)
            .ok_or_else(|| Error::unknown_id(id))?;

        entry.cancel.cancel();
        debug!(%id, generation = entry.generation, "Subscription cancelled");
        Ok(())
    }

    /// Removes `id` without cancelling it, if `generation` still owns it.
    ///
    /// Returns `true` if an entry was removed.
    pub fn unregister(&self, id: SubscriptionId, generation: Generation) -> bool {
        let mut inner = self.inner.lock();
        match inner.entries.get(&id) {
            Some(entry) if entry.generation == generation => {
                inner.entries.remove(&id);
                debug!(%id, generation, "Subscription unregistered");
                true
            }
            _ => false,
        }
    }

    /// Cancels every live subscription and clears the map.
    ///
    /// Idempotent. Returns the number of subscriptions cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<_> = self.inner.lock().entries.drain().collect();
        let count = drained.len();

        for (_, entry) in drained {
            entry.cancel.cancel();
        }

        if count > 0 {
            debug!(count, "Cancelled all subscriptions");
        }
        count
    }

    /// Returns `true` if `id` is live.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.inner.lock().entries.contains_key(&id)
    }

    /// Returns the number of live subscriptions.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns `true` if no subscription is live.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Tests
// ============================================================================
