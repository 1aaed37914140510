//! Process-wide table of live monitors and event fan-out.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use tracing::{debug, trace};

use crate::base::types::{RawEvent, ScopeKey};

use super::{Listener, Offer};

// Types.

/// Identifies a registered monitor.
pub type MonitorId = u64;

type ScopedListeners = HashMap<MonitorId, Arc<dyn Listener>>;

// Structs.

/// Table of live monitors, keyed by scope.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    next_id: AtomicU64,
    monitors: Mutex<HashMap<ScopeKey, ScopedListeners>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener under `key`.
    pub(crate) fn register(&self, key: ScopeKey, listener: Arc<dyn Listener>) -> MonitorId {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        self.lock().entry(key).or_default().insert(id, listener);

        id
    }

    /// Remove a listener; returns `false` if it was not registered (anymore).
    pub fn deregister(&self, key: &ScopeKey, id: MonitorId) -> bool {
        let mut monitors = self.lock();

        let Some(scoped) = monitors.get_mut(key) else {
            return false;
        };

        let removed = scoped.remove(&id).is_some();

        if scoped.is_empty() {
            monitors.remove(key);
        }

        removed
    }

    /// Offer `event` to every monitor in its scope.
    ///
    /// Each monitor whose filter accepts the event resolves and is removed; returns how many did.
    /// Filters run under the registry lock, so they must not call back into the registry.
    pub fn dispatch(&self, event: &RawEvent) -> usize {
        let key = event.scope_key();
        let mut monitors = self.lock();

        let Some(scoped) = monitors.get_mut(&key) else {
            trace!("No monitors for {:?}", key);
            return 0;
        };

        let mut resolved = 0;

        scoped.retain(|id, listener| match listener.offer(event) {
            Offer::Ignored => true,
            Offer::Resolved => {
                debug!("Monitor {} resolved", id);
                resolved += 1;
                false
            }
            Offer::Dead => false,
        });

        if scoped.is_empty() {
            monitors.remove(&key);
        }

        resolved
    }

    /// Number of live monitors.
    pub fn len(&self) -> usize {
        self.lock().values().map(HashMap::len).sum()
    }

    /// Whether no monitors are registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether the monitor with `id` is still registered.
    pub fn contains(&self, id: MonitorId) -> bool {
        self.lock().values().any(|scoped| scoped.contains_key(&id))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ScopeKey, ScopedListeners>> {
        self.inner.monitors.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        base::types::{ReactionAction, ReactionEvent},
        monitor::{Monitor, MonitorFilter, MonitorScope},
    };

    fn react(message_id: &str, user_id: &str) -> RawEvent {
        RawEvent::Reaction(ReactionEvent {
            guild_id: "T1".into(),
            channel_id: "C1".into(),
            message_id: message_id.into(),
            user_id: user_id.into(),
            emoji: "x".into(),
            action: ReactionAction::Add,
        })
    }

    fn watch(registry: &Registry, message_id: &str) -> Monitor<()> {
        Monitor::create(
            registry,
            MonitorScope::new(ScopeKey::new("T1", "C1", message_id)),
            MonitorFilter::emoji([("x", ())]),
            Some(Duration::from_secs(5)),
        )
    }

    #[tokio::test]
    async fn dispatch_only_reaches_the_event_scope() {
        let registry = Registry::new();
        let a = watch(&registry, "1.0");
        let b = watch(&registry, "2.0");

        assert_eq!(registry.dispatch(&react("1.0", "U1")), 1);
        assert!(!registry.contains(a.id()));
        assert!(registry.contains(b.id()));
        assert_eq!(registry.len(), 1);

        assert!(a.wait().await.is_ok());
    }

    #[test]
    fn empty_scopes_are_removed() {
        let registry = Registry::new();
        let monitor = watch(&registry, "1.0");
        let id = monitor.id();

        assert!(registry.deregister(&ScopeKey::new("T1", "C1", "1.0"), id));
        assert!(!registry.deregister(&ScopeKey::new("T1", "C1", "1.0"), id));
        assert!(registry.is_empty());

        drop(monitor);
        assert!(registry.is_empty());
    }

    #[test]
    fn dispatch_to_an_empty_registry_is_a_no_op() {
        let registry = Registry::new();

        assert_eq!(registry.dispatch(&react("1.0", "U1")), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_dispatch_and_teardown_keep_the_table_consistent() {
        let registry = Registry::new();
        let mut tasks = Vec::new();

        for i in 0..64 {
            let registry = registry.clone();

            tasks.push(tokio::spawn(async move {
                let message_id = format!("{}.0", i % 8);
                let monitor = watch(&registry, &message_id);

                if i % 2 == 0 {
                    // Torn down without waiting.
                    drop(monitor);
                } else {
                    registry.dispatch(&react(&message_id, "U1"));
                    let _ = monitor.wait().await;
                }
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }

        assert!(registry.is_empty());
    }
}
