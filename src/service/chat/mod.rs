pub mod slack;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::{base::error::TransportError, base::types::Void, pins::PinCoordinator};

// Types.

/// Result of a remote call to the chat platform.
pub type TransportResult<T> = Result<T, TransportError>;

// Traits.

/// Generic "chat" trait that clients must implement.
///
/// This trait defines the outbound actions the pin flows need from a chat platform.
/// Every remote call reports a classified [`TransportError`], so callers can tell
/// "forbidden" and "not found" apart from "no more room for pins".
#[async_trait]
pub trait GenericChatClient: Send + Sync + 'static {
    /// Get the bot user ID.
    ///
    /// Reactions by this user never answer a capacity prompt.
    fn bot_user_id(&self) -> &str;

    /// Start the chat client listener.
    ///
    /// This sets up event listeners for the chat platform, feeds raw events into the
    /// coordinator's monitor registry, and routes pin commands to the coordinator.
    async fn start(&self, pins: PinCoordinator) -> Void;

    /// Send a message to a channel, returning the new message's ID.
    async fn send_message(&self, channel_id: &str, text: &str) -> TransportResult<String>;

    /// React to a message with an emoji.
    async fn react_to_message(&self, channel_id: &str, message_id: &str, emoji: &str) -> TransportResult<()>;

    /// Delete a message.
    async fn delete_message(&self, channel_id: &str, message_id: &str) -> TransportResult<()>;

    /// Pin a message to its channel.
    ///
    /// Fails with [`TransportError::CapacityExceeded`] when the channel has no more room.
    async fn pin_message(&self, channel_id: &str, message_id: &str) -> TransportResult<()>;

    /// Unpin a message from its channel.
    async fn unpin_message(&self, channel_id: &str, message_id: &str) -> TransportResult<()>;

    /// List the IDs of the pinned messages in a channel, newest first.
    async fn list_pins(&self, channel_id: &str) -> TransportResult<Vec<String>>;
}

// Structs.

/// Chat client for the application.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<dyn GenericChatClient>,
}

impl Deref for ChatClient {
    type Target = dyn GenericChatClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl ChatClient {
    pub fn new(inner: Arc<dyn GenericChatClient>) -> Self {
        Self { inner }
    }
}
