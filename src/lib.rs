//! Library root for `pin-bot`.
//!
//! Pin-bot manages a chat channel's pins on behalf of its users:
//! - Pins and unpins messages on command
//! - When the channel is out of pin space, asks the user (via reactions on a temporary prompt)
//!   whether the oldest pin should make room
//! - Keeps at most one such prompt open per user, letting newer requests and explicit unpins
//!   take precedence
//!
//! At its core is a small event-correlation layer: single-use [`monitor::Monitor`]s that wait for
//! one specific future event, fed by a process-wide [`monitor::Registry`].

#[deny(missing_docs)]
pub mod base;
pub mod interaction;
pub mod monitor;
pub mod pins;
pub mod prelude;
pub mod runtime;
pub mod service;

use base::{config::Config, types::Void};
use rustls::crypto;
use tracing::info;

/// Public async entry for the binary crate.
///
/// Sets up necessary services and starts the pin-bot runtime:
/// - Initializes the crypto provider
/// - Creates the runtime context with the chat client and pin coordinator
/// - Starts the main event loop for processing commands and events
pub async fn start(config: Config) -> Void {
    info!("Starting pin-bot ...");

    // Start the crypto provider.
    crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("A crypto provider was already installed."))?;

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config).await?;

    // Start the runtime.
    runtime.start().await?;

    Ok(())
}
