//! This module handles `unpin` command invocations.

use tokio::task::JoinHandle;
use tracing::{Instrument, error, instrument};

use crate::{
    base::{messages, types::Void},
    pins::{PinCoordinator, PinRequest, UnpinOutcome},
};

/// Handles an unpin command.
#[instrument(skip_all)]
pub fn handle_unpin_command(request: PinRequest, pins: PinCoordinator) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            // Process the command.
            let result = handle_unpin_command_internal(&request, &pins).await;

            // Log any errors.
            if let Err(err) = &result {
                error!("Error while handling: {}", err);
            }
        }
        .in_current_span(),
    )
}

#[instrument(skip_all)]
async fn handle_unpin_command_internal(request: &PinRequest, pins: &PinCoordinator) -> Void {
    if let UnpinOutcome::Unpinned { .. } = pins.unpin(request).await? {
        pins.chat().send_message(&request.channel_id, messages::ACKNOWLEDGEMENT).await?;
    }

    Ok(())
}
