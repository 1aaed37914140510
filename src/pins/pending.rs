//! The per-actor map of outstanding confirmations.
//!
//! An actor has at most one pending confirmation at any instant. Starting a new one cancels the
//! old one first, and every exit path of the owning flow releases its entry through a guard.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tracing::info;

use crate::{
    base::error::CancelReason,
    monitor::{Monitor, MonitorHandle, MonitorId},
};

/// Outstanding confirmations, keyed by actor id.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
pub struct PendingRequests<O> {
    inner: Arc<Mutex<HashMap<String, MonitorHandle<O>>>>,
}

impl<O> Clone for PendingRequests<O> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<O> Default for PendingRequests<O> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<O> PendingRequests<O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the monitor built by `create` the actor's only pending confirmation.
    ///
    /// Any older confirmation is cancelled with [`CancelReason::SupersededByNewerRequest`] before
    /// `create` runs, so the old monitor is gone from the registry before the new one is added.
    pub fn supersede(&self, actor_id: &str, create: impl FnOnce() -> Monitor<O>) -> (Monitor<O>, PendingGuard<O>) {
        let mut pending = self.lock();

        if let Some(older) = pending.remove(actor_id) {
            info!("Superseding pending confirmation {} of {}", older.id(), actor_id);
            older.cancel(CancelReason::SupersededByNewerRequest);
        }

        let monitor = create();
        pending.insert(actor_id.to_string(), monitor.handle());

        let guard = PendingGuard {
            pending: self.clone(),
            actor_id: actor_id.to_string(),
            id: monitor.id(),
        };

        (monitor, guard)
    }

    /// Cancel and forget the actor's pending confirmation, if any.
    pub fn abort(&self, actor_id: &str, reason: CancelReason) -> bool {
        let Some(handle) = self.lock().remove(actor_id) else {
            return false;
        };

        info!("Aborting pending confirmation {} of {}: {}", handle.id(), actor_id, reason);
        handle.cancel(reason)
    }

    /// Forget the actor's entry, but only if it still refers to monitor `id`.
    pub fn release(&self, actor_id: &str, id: MonitorId) -> bool {
        let mut pending = self.lock();

        if pending.get(actor_id).is_some_and(|handle| handle.id() == id) {
            pending.remove(actor_id);
            return true;
        }

        false
    }

    /// The monitor currently pending for the actor.
    pub fn get(&self, actor_id: &str) -> Option<MonitorId> {
        self.lock().get(actor_id).map(MonitorHandle::id)
    }

    /// Number of actors with a pending confirmation.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nobody has a pending confirmation.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, MonitorHandle<O>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases an actor's pending entry when the owning flow ends.
pub struct PendingGuard<O> {
    pending: PendingRequests<O>,
    actor_id: String,
    id: MonitorId,
}

impl<O> Drop for PendingGuard<O> {
    fn drop(&mut self) {
        self.pending.release(&self.actor_id, self.id);
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        base::{
            error::MonitorError,
            types::ScopeKey,
        },
        monitor::{MonitorFilter, MonitorScope, Registry},
    };

    fn create(registry: &Registry, message_id: &str) -> Monitor<bool> {
        Monitor::create(
            registry,
            MonitorScope::new(ScopeKey::new("T1", "C1", message_id)).by_author("U1"),
            MonitorFilter::emoji([("recycle", true), ("x", false)]),
            Some(Duration::from_secs(5)),
        )
    }

    #[tokio::test]
    async fn newer_request_cancels_the_older_one() {
        let registry = Registry::new();
        let pending = PendingRequests::new();

        let (first, first_guard) = pending.supersede("U1", || create(&registry, "1.0"));
        let first_id = first.id();

        let (second, _second_guard) = pending.supersede("U1", || {
            // The older monitor must already be gone when the newer one is registered.
            assert!(!registry.contains(first_id));
            create(&registry, "2.0")
        });

        assert_eq!(pending.len(), 1);
        assert_eq!(pending.get("U1"), Some(second.id()));
        assert_eq!(first.wait().await.unwrap_err(), MonitorError::Cancelled(CancelReason::SupersededByNewerRequest));

        // The stale flow ending must not evict the newer entry.
        drop(first_guard);
        assert_eq!(pending.get("U1"), Some(second.id()));
    }

    #[tokio::test]
    async fn guard_releases_on_exit() {
        let registry = Registry::new();
        let pending = PendingRequests::new();

        {
            let (_monitor, _guard) = pending.supersede("U1", || create(&registry, "1.0"));
            assert_eq!(pending.len(), 1);
        }

        assert!(pending.is_empty());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn abort_cancels_with_reason() {
        let registry = Registry::new();
        let pending = PendingRequests::new();

        let (monitor, _guard) = pending.supersede("U1", || create(&registry, "1.0"));

        assert!(!pending.abort("U2", CancelReason::AbortedByExplicitUnpin));
        assert!(pending.abort("U1", CancelReason::AbortedByExplicitUnpin));
        assert!(!pending.abort("U1", CancelReason::AbortedByExplicitUnpin));

        assert!(pending.is_empty());
        assert_eq!(monitor.wait().await.unwrap_err(), MonitorError::Cancelled(CancelReason::AbortedByExplicitUnpin));
    }

    #[tokio::test]
    async fn actors_are_independent() {
        let registry = Registry::new();
        let pending = PendingRequests::new();

        let (_a, _a_guard) = pending.supersede("U1", || create(&registry, "1.0"));
        let (_b, _b_guard) = pending.supersede("U2", || create(&registry, "2.0"));

        assert_eq!(pending.len(), 2);
        assert_eq!(registry.len(), 2);
    }
}
