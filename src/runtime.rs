//! Runtime services and shared state for the pin-bot.

use tracing::instrument;

use crate::{
    base::{config::Config, types::{Res, Void}},
    monitor::Registry,
    pins::{PinCoordinator, PinSettings},
    service::{access::AccessGate, chat::ChatClient},
};

/// Runtime service context that can be shared across the application.
///
/// This struct holds the chat client, the monitor registry, the access gate, the pin
/// coordinator, and configuration. It is designed to be trivially cloneable, allowing it to be
/// passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The chat client instance.
    pub chat: ChatClient,
    /// The live monitors.
    pub registry: Registry,
    /// The privilege and location gate.
    pub access: AccessGate,
    /// The pin flows.
    pub pins: PinCoordinator,
}

impl Runtime {
    /// Create a new runtime instance.
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> Res<Self> {
        // Initialize the slack client.
        let chat = ChatClient::slack(&config).await?;

        Ok(Self::with_chat(config, chat))
    }

    /// Create a runtime around an existing chat client.
    pub fn with_chat(config: Config, chat: ChatClient) -> Self {
        let registry = Registry::new();
        let access = AccessGate::from_config(&config);
        let pins = PinCoordinator::new(chat.clone(), registry.clone(), access.clone(), PinSettings::from(&config));

        Self {
            config,
            chat,
            registry,
            access,
            pins,
        }
    }

    pub async fn start(&self) -> Void {
        self.chat.start(self.pins.clone()).await
    }
}
