//! Single-use, awaitable event filters.
//!
//! A [`Monitor`] is registered in a [`Registry`] when it is created, and resolves with the first
//! event its filter accepts. It can also fail with a timeout, or be cancelled from another flow
//! through a [`MonitorHandle`]. Whatever settles the monitor first wins; everything after is a no-op.
//!
//! Dropping the monitor deregisters it, so a flow that bails out early (via `?`, a panic, or an
//! aborted task) never leaves a listener behind.

pub mod registry;

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::sync::oneshot;
use tracing::debug;

use crate::base::{
    error::{CancelReason, MonitorError},
    types::{RawEvent, ScopeKey},
};

pub use registry::{MonitorId, Registry};

// Types.

/// A pure predicate over raw events.
pub type Predicate = Box<dyn Fn(&RawEvent) -> bool + Send + Sync>;

/// What a monitor settles with.
pub type Resolution<O> = Result<(RawEvent, O), MonitorError>;

/// The events a monitor is interested in: a scope plus an optional author filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorScope {
    /// The `(guild, channel, message)` triple.
    pub key: ScopeKey,
    /// Only accept events caused by this user, if set.
    pub author_id: Option<String>,
}

impl MonitorScope {
    pub fn new(key: ScopeKey) -> Self {
        Self { key, author_id: None }
    }

    /// Only accept events caused by `author_id`.
    pub fn by_author(mut self, author_id: impl Into<String>) -> Self {
        self.author_id = Some(author_id.into());
        self
    }

    /// Whether `event` falls in this scope.
    pub fn accepts(&self, event: &RawEvent) -> bool {
        let author_ok = match &self.author_id {
            Some(author_id) => event.actor_id() == author_id,
            None => true,
        };

        author_ok && event.scope_key() == self.key
    }
}

/// Decides whether an event resolves a monitor, and with which outcome.
///
/// Added reactions whose emoji is in the outcome map resolve with the mapped outcome. Other events
/// resolve with the fallback outcome, if one is set. The optional predicate narrows both.
pub struct MonitorFilter<O> {
    predicate: Option<Predicate>,
    outcomes: HashMap<String, O>,
    fallback: Option<O>,
}

impl<O: Clone> MonitorFilter<O> {
    /// Accept added reactions with one of the given emoji.
    pub fn emoji<I, S>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = (S, O)>,
        S: Into<String>,
    {
        Self {
            predicate: None,
            outcomes: outcomes.into_iter().map(|(emoji, outcome)| (emoji.into(), outcome)).collect(),
            fallback: None,
        }
    }

    /// Accept any event matching `predicate`, resolving with `outcome`.
    pub fn when(predicate: impl Fn(&RawEvent) -> bool + Send + Sync + 'static, outcome: O) -> Self {
        Self {
            predicate: Some(Box::new(predicate)),
            outcomes: HashMap::new(),
            fallback: Some(outcome),
        }
    }

    /// Additionally require `predicate` to hold.
    pub fn and(mut self, predicate: impl Fn(&RawEvent) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => Box::new(move |event| existing(event) && predicate(event)),
            None => Box::new(predicate),
        });
        self
    }

    /// The outcome `event` resolves to, if any.
    pub fn evaluate(&self, event: &RawEvent) -> Option<O> {
        if let Some(predicate) = &self.predicate
            && !predicate(event)
        {
            return None;
        }

        if let Some(outcome) = event.added_emoji().and_then(|emoji| self.outcomes.get(emoji)) {
            return Some(outcome.clone());
        }

        self.fallback.clone()
    }
}

/// The single result slot of a monitor.
///
/// The sender is taken by whoever settles the monitor first.
struct Slot<O> {
    tx: Mutex<Option<oneshot::Sender<Resolution<O>>>>,
}

impl<O> Slot<O> {
    fn new(tx: oneshot::Sender<Resolution<O>>) -> Self {
        Self { tx: Mutex::new(Some(tx)) }
    }

    /// Settle the slot; returns `false` if it was already settled.
    fn settle(&self, resolution: Resolution<O>) -> bool {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();

        match tx {
            Some(tx) => {
                // The receiver may already be gone; the slot is settled either way.
                let _ = tx.send(resolution);
                true
            }
            None => false,
        }
    }

    fn close(&self) {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    fn is_settled(&self) -> bool {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }
}

/// What happened when an event was offered to a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Offer {
    /// The event did not match; keep the listener.
    Ignored,
    /// The event settled the listener; remove it.
    Resolved,
    /// The listener was already settled; remove it.
    Dead,
}

/// The type-erased, registry-facing side of a monitor.
pub(crate) trait Listener: Send + Sync {
    fn offer(&self, event: &RawEvent) -> Offer;
}

struct MonitorEntry<O> {
    scope: MonitorScope,
    filter: MonitorFilter<O>,
    slot: Arc<Slot<O>>,
}

impl<O> Listener for MonitorEntry<O>
where
    O: Clone + Send + Sync + 'static,
{
    fn offer(&self, event: &RawEvent) -> Offer {
        if self.slot.is_settled() {
            return Offer::Dead;
        }

        if !self.scope.accepts(event) {
            return Offer::Ignored;
        }

        match self.filter.evaluate(event) {
            Some(outcome) => {
                if self.slot.settle(Ok((event.clone(), outcome))) {
                    Offer::Resolved
                } else {
                    Offer::Dead
                }
            }
            None => Offer::Ignored,
        }
    }
}

// Structs.

/// A single-use awaiter for one matching event.
pub struct Monitor<O> {
    id: MonitorId,
    key: ScopeKey,
    timeout: Option<Duration>,
    rx: oneshot::Receiver<Resolution<O>>,
    slot: Arc<Slot<O>>,
    registry: Registry,
}

impl<O> Monitor<O>
where
    O: Clone + Send + Sync + 'static,
{
    /// Create a monitor and register it in `registry`.
    ///
    /// The monitor sees every event dispatched from now on; nothing earlier is buffered. A `timeout`
    /// of `None` waits forever.
    pub fn create(registry: &Registry, scope: MonitorScope, filter: MonitorFilter<O>, timeout: Option<Duration>) -> Self {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(Slot::new(tx));
        let key = scope.key.clone();

        let entry = Arc::new(MonitorEntry {
            scope,
            filter,
            slot: slot.clone(),
        });
        let id = registry.register(key.clone(), entry);

        debug!("Registered monitor {} on {:?}", id, key);

        Self {
            id,
            key,
            timeout,
            rx,
            slot,
            registry: registry.clone(),
        }
    }
}

impl<O> Monitor<O> {
    /// The registry id of this monitor.
    pub fn id(&self) -> MonitorId {
        self.id
    }

    /// A handle other flows can use to cancel this monitor.
    pub fn handle(&self) -> MonitorHandle<O> {
        MonitorHandle {
            id: self.id,
            key: self.key.clone(),
            slot: self.slot.clone(),
            registry: self.registry.clone(),
        }
    }

    /// Wait for the first matching event.
    ///
    /// Fails with [`MonitorError::Timeout`] once the timeout elapses (counted from this call), or
    /// with [`MonitorError::Cancelled`] when another flow cancels the monitor. The monitor is
    /// deregistered when this returns.
    pub async fn wait(mut self) -> Resolution<O> {
        let received = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, &mut self.rx).await {
                Ok(received) => received,
                Err(_) => {
                    // If something else settled the slot in the meantime, its value is already in the channel.
                    self.slot.settle(Err(MonitorError::Timeout));
                    (&mut self.rx).await
                }
            },
            None => (&mut self.rx).await,
        };

        match received {
            Ok(resolution) => resolution,
            Err(_) => Err(MonitorError::Closed),
        }
    }
}

impl<O> Drop for Monitor<O> {
    fn drop(&mut self) {
        self.slot.close();
        self.registry.deregister(&self.key, self.id);
    }
}

/// A cloneable reference to a monitor, used to cancel it from another flow.
pub struct MonitorHandle<O> {
    id: MonitorId,
    key: ScopeKey,
    slot: Arc<Slot<O>>,
    registry: Registry,
}

impl<O> Clone for MonitorHandle<O> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            key: self.key.clone(),
            slot: self.slot.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<O> std::fmt::Debug for MonitorHandle<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorHandle").field("id", &self.id).field("key", &self.key).finish()
    }
}

impl<O> MonitorHandle<O> {
    /// The registry id of the monitor.
    pub fn id(&self) -> MonitorId {
        self.id
    }

    /// Whether the monitor has already resolved, failed, or been dropped.
    pub fn is_settled(&self) -> bool {
        self.slot.is_settled()
    }

    /// Wake the waiting flow with [`MonitorError::Cancelled`].
    ///
    /// Returns `false` (and does nothing) if the monitor was already settled.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        let cancelled = self.slot.settle(Err(MonitorError::Cancelled(reason)));
        self.registry.deregister(&self.key, self.id);

        if cancelled {
            debug!("Cancelled monitor {}: {}", self.id, reason);
        }

        cancelled
    }
}

// Tests.
