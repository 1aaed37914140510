//! Pin and unpin flows, with interactive conflict resolution.
//!
//! When a channel is out of pin space, the actor is asked (through a temporary prompt with two
//! reaction choices) whether the oldest pin should make room. An actor only ever has one such
//! prompt open: a newer pin request supersedes the older prompt, and an explicit unpin aborts it.

pub mod pending;

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{
    base::{
        config::Config,
        error::{CancelReason, MonitorError, TransportError},
        messages,
        types::{RawEvent, Res, ScopeKey},
    },
    monitor::{Monitor, MonitorFilter, MonitorScope, Registry},
    service::{access::AccessGate, chat::ChatClient},
};

pub use pending::{PendingGuard, PendingRequests};

/// Privilege required for both pin commands.
pub const PIN_PRIVILEGE: &str = "pin";

// Types.

/// The actor's answer to the capacity prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionChoice {
    RemoveOldest,
    Cancel,
}

/// A pin or unpin command invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinRequest {
    pub guild_id: String,
    pub channel_id: String,
    pub actor_id: String,
    /// The target message.
    pub message_id: String,
}

impl PinRequest {
    pub fn new(guild_id: impl Into<String>, channel_id: impl Into<String>, actor_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            channel_id: channel_id.into(),
            actor_id: actor_id.into(),
            message_id: message_id.into(),
        }
    }
}

/// How a pin request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinOutcome {
    /// The actor may not pin here.
    Denied,
    /// The platform refused (forbidden) or the message is gone.
    Unavailable,
    /// The message is pinned; `notice` is the platform's "pinned" message, if it showed up in time.
    Pinned { notice: Option<String> },
    /// The actor declined to remove the oldest pin.
    Cancelled,
    /// The actor did not answer the capacity prompt in time.
    TimedOut,
    /// The actor started another pin request that also needed a prompt.
    Superseded,
    /// The actor unpinned something while the prompt was open.
    AbortedByUnpin,
    /// Space was freed repeatedly, but the channel kept running out.
    RetryLimitReached,
}

/// How an unpin request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnpinOutcome {
    Denied,
    Unavailable,
    /// The message is unpinned; `aborted_pending` tells whether an open prompt was aborted.
    Unpinned { aborted_pending: bool },
}

/// How a single capacity prompt ended.
#[derive(Debug)]
enum Confirmation {
    Chosen(EvictionChoice),
    TimedOut,
    Cancelled(CancelReason),
    Unavailable,
}

/// Tunables for the pin flows.
#[derive(Debug, Clone)]
pub struct PinSettings {
    pub confirm_timeout: Duration,
    pub pin_notice_timeout: Duration,
    pub max_eviction_attempts: u32,
    pub remove_oldest_emoji: String,
    pub cancel_emoji: String,
}

impl Default for PinSettings {
    fn default() -> Self {
        Self {
            confirm_timeout: Duration::from_secs(60),
            pin_notice_timeout: Duration::from_secs(60),
            max_eviction_attempts: 3,
            remove_oldest_emoji: "recycle".to_string(),
            cancel_emoji: "x".to_string(),
        }
    }
}

impl From<&Config> for PinSettings {
    fn from(config: &Config) -> Self {
        Self {
            confirm_timeout: config.confirm_timeout(),
            pin_notice_timeout: config.pin_notice_timeout(),
            max_eviction_attempts: config.max_eviction_attempts,
            remove_oldest_emoji: config.remove_oldest_emoji.clone(),
            cancel_emoji: config.cancel_emoji.clone(),
        }
    }
}

// Structs.

/// Runs pin and unpin flows and arbitrates between them.
///
/// It is designed to be trivially cloneable; every clone shares the same monitor registry
/// and pending-confirmation map.
#[derive(Clone)]
pub struct PinCoordinator {
    chat: ChatClient,
    registry: Registry,
    access: AccessGate,
    pending: PendingRequests<EvictionChoice>,
    settings: Arc<PinSettings>,
}

impl PinCoordinator {
    pub fn new(chat: ChatClient, registry: Registry, access: AccessGate, settings: PinSettings) -> Self {
        Self {
            chat,
            registry,
            access,
            pending: PendingRequests::new(),
            settings: Arc::new(settings),
        }
    }

    pub fn chat(&self) -> &ChatClient {
        &self.chat
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn pending(&self) -> &PendingRequests<EvictionChoice> {
        &self.pending
    }

    pub fn settings(&self) -> &PinSettings {
        &self.settings
    }

    /// Pin a message, asking the actor to make room if the channel is out of pin space.
    ///
    /// Only unclassified platform failures are returned as errors.
    #[instrument(skip_all, fields(actor = %request.actor_id, channel = %request.channel_id, message = %request.message_id))]
    pub async fn pin(&self, request: &PinRequest) -> Res<PinOutcome> {
        if !self.permitted(request) {
            return Ok(PinOutcome::Denied);
        }

        // Watch for the platform notice before pinning, so a fast notice is not missed.
        let notice = self.watch_pin_notice(request);

        match self.pin_with_eviction(request).await? {
            PinOutcome::Pinned { .. } => {
                let notice = match notice.wait().await {
                    Ok((event, ())) => Some(event.message_id().to_string()),
                    Err(err) => {
                        debug!("No pin notice: {}", err);
                        None
                    }
                };

                info!("Pinned message.");
                Ok(PinOutcome::Pinned { notice })
            }
            outcome => {
                info!("Pin ended without pinning: {:?}", outcome);
                Ok(outcome)
            }
        }
    }

    /// Unpin a message; aborts the actor's open capacity prompt, if any.
    #[instrument(skip_all, fields(actor = %request.actor_id, channel = %request.channel_id, message = %request.message_id))]
    pub async fn unpin(&self, request: &PinRequest) -> Res<UnpinOutcome> {
        if !self.permitted(request) {
            return Ok(UnpinOutcome::Denied);
        }

        match self.chat.unpin_message(&request.channel_id, &request.message_id).await {
            Ok(()) => {}
            Err(err) if err.is_silent() => {
                info!("Unpin unavailable: {}", err);
                return Ok(UnpinOutcome::Unavailable);
            }
            Err(err) => return Err(err.into()),
        }

        let aborted_pending = self.pending.abort(&request.actor_id, CancelReason::AbortedByExplicitUnpin);

        info!("Unpinned message.");
        Ok(UnpinOutcome::Unpinned { aborted_pending })
    }

    fn permitted(&self, request: &PinRequest) -> bool {
        if !self.access.may_pin_in(&request.guild_id, &request.channel_id) {
            warn!("Denied pin commands in channel {}", request.channel_id);
            return false;
        }

        if !self.access.holds_privilege(&request.actor_id, PIN_PRIVILEGE) {
            warn!("Denied pin commands to {}", request.actor_id);
            return false;
        }

        true
    }

    fn watch_pin_notice(&self, request: &PinRequest) -> Monitor<()> {
        let scope = MonitorScope::new(ScopeKey::new(&request.guild_id, &request.channel_id, &request.message_id));
        let filter = MonitorFilter::when(|event| matches!(event, RawEvent::PinNotice(_)), ());

        Monitor::create(&self.registry, scope, filter, Some(self.settings.pin_notice_timeout))
    }

    async fn pin_with_eviction(&self, request: &PinRequest) -> Res<PinOutcome> {
        let mut attempts = 0;

        loop {
            match self.chat.pin_message(&request.channel_id, &request.message_id).await {
                Ok(()) => return Ok(PinOutcome::Pinned { notice: None }),
                Err(TransportError::CapacityExceeded) => {}
                Err(err) if err.is_silent() => {
                    info!("Pin unavailable: {}", err);
                    return Ok(PinOutcome::Unavailable);
                }
                Err(err) => return Err(err.into()),
            }

            if attempts >= self.settings.max_eviction_attempts {
                warn!("Still out of pin space after {} attempts", attempts);
                return Ok(PinOutcome::RetryLimitReached);
            }
            attempts += 1;

            let Some(oldest) = self.oldest_pin(&request.channel_id).await? else {
                return Ok(PinOutcome::Unavailable);
            };

            match self.confirm_eviction(request).await? {
                Confirmation::Chosen(EvictionChoice::RemoveOldest) => self.remove_pin(&request.channel_id, &oldest).await?,
                Confirmation::Chosen(EvictionChoice::Cancel) => return Ok(PinOutcome::Cancelled),
                Confirmation::TimedOut => return Ok(PinOutcome::TimedOut),
                Confirmation::Cancelled(CancelReason::SupersededByNewerRequest) => return Ok(PinOutcome::Superseded),
                Confirmation::Cancelled(CancelReason::AbortedByExplicitUnpin) => return Ok(PinOutcome::AbortedByUnpin),
                Confirmation::Unavailable => return Ok(PinOutcome::Unavailable),
            }
        }
    }

    async fn oldest_pin(&self, channel_id: &str) -> Res<Option<String>> {
        match self.chat.list_pins(channel_id).await {
            Ok(pins) => match pins.last() {
                Some(oldest) => Ok(Some(oldest.clone())),
                None => Err(anyhow::anyhow!("Channel {} is out of pin space, but lists no pins.", channel_id)),
            },
            Err(err) if err.is_silent() => {
                info!("Could not list pins: {}", err);
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn remove_pin(&self, channel_id: &str, message_id: &str) -> Res<()> {
        match self.chat.unpin_message(channel_id, message_id).await {
            Ok(()) => info!("Removed oldest pin {}", message_id),
            // Someone else already made room; retrying the pin is still right.
            Err(err) if err.is_silent() => debug!("Oldest pin {} already gone: {}", message_id, err),
            Err(err) => return Err(err.into()),
        }

        Ok(())
    }

    /// Post the temporary capacity prompt, wait for a choice, and delete the prompt again.
    async fn confirm_eviction(&self, request: &PinRequest) -> Res<Confirmation> {
        let text = messages::capacity_prompt(&self.settings.remove_oldest_emoji);

        let prompt_id = match self.chat.send_message(&request.channel_id, &text).await {
            Ok(prompt_id) => prompt_id,
            Err(err) if err.is_silent() => {
                info!("Could not post the capacity prompt: {}", err);
                return Ok(Confirmation::Unavailable);
            }
            Err(err) => return Err(err.into()),
        };

        let result = self.await_choice(request, &prompt_id).await;

        if let Err(err) = self.chat.delete_message(&request.channel_id, &prompt_id).await {
            warn!("Failed to delete the capacity prompt: {}", err);
        }

        result
    }

    async fn await_choice(&self, request: &PinRequest, prompt_id: &str) -> Res<Confirmation> {
        let settings = &self.settings;
        let bot_id = self.chat.bot_user_id().to_string();

        let scope = MonitorScope::new(ScopeKey::new(&request.guild_id, &request.channel_id, prompt_id)).by_author(&request.actor_id);
        // The bot seeds both choices on the prompt itself; those reactions never count as an answer.
        let filter = MonitorFilter::emoji([
            (settings.remove_oldest_emoji.clone(), EvictionChoice::RemoveOldest),
            (settings.cancel_emoji.clone(), EvictionChoice::Cancel),
        ])
        .and(move |event| event.actor_id() != bot_id);

        let (monitor, _pending) = self
            .pending
            .supersede(&request.actor_id, || Monitor::create(&self.registry, scope, filter, Some(settings.confirm_timeout)));

        // Offer the choices once the monitor is live.
        for emoji in [&settings.remove_oldest_emoji, &settings.cancel_emoji] {
            match self.chat.react_to_message(&request.channel_id, prompt_id, emoji).await {
                Ok(()) => {}
                Err(err) if err.is_silent() => debug!("Could not offer :{}: on the prompt: {}", emoji, err),
                Err(err) => return Err(err.into()),
            }
        }

        match monitor.wait().await {
            Ok((_, choice)) => {
                debug!("Actor chose {:?}", choice);
                Ok(Confirmation::Chosen(choice))
            }
            Err(MonitorError::Timeout) => Ok(Confirmation::TimedOut),
            Err(MonitorError::Cancelled(reason)) => Ok(Confirmation::Cancelled(reason)),
            Err(err @ MonitorError::Closed) => Err(err.into()),
        }
    }
}
