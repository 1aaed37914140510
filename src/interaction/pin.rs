//! This module handles `pin` command invocations.

use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, instrument};

use crate::{
    base::{messages, types::Void},
    pins::{PinCoordinator, PinOutcome, PinRequest},
};

/// Handles a pin command.
///
/// Each invocation runs as its own task, so a flow waiting on the actor never blocks others.
#[instrument(skip_all)]
pub fn handle_pin_command(request: PinRequest, pins: PinCoordinator) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            // Process the command.
            let result = handle_pin_command_internal(&request, &pins).await;

            // Log any errors.
            if let Err(err) = &result {
                error!("Error while handling: {}", err);
            }
        }
        .in_current_span(),
    )
}

#[instrument(skip_all)]
async fn handle_pin_command_internal(request: &PinRequest, pins: &PinCoordinator) -> Void {
    let outcome = pins.pin(request).await?;

    if let PinOutcome::Pinned { notice: Some(notice) } = &outcome {
        info!("Pin notice {} posted", notice);
    }

    if let Some(reply) = pin_reply(&outcome) {
        pins.chat().send_message(&request.channel_id, reply).await?;
    }

    Ok(())
}

/// The reply posted for a pin outcome, if any.
pub fn pin_reply(outcome: &PinOutcome) -> Option<&'static str> {
    match outcome {
        PinOutcome::Pinned { notice: None } => Some(messages::ACKNOWLEDGEMENT),
        PinOutcome::Cancelled => Some(messages::CANCELLED),
        PinOutcome::RetryLimitReached => Some(messages::NO_ROOM),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_replaces_the_acknowledgement() {
        assert_eq!(pin_reply(&PinOutcome::Pinned { notice: None }), Some(messages::ACKNOWLEDGEMENT));
        assert_eq!(pin_reply(&PinOutcome::Pinned { notice: Some("1.0".into()) }), None);
    }

    #[test]
    fn only_an_explicit_cancel_is_announced() {
        assert_eq!(pin_reply(&PinOutcome::Cancelled), Some(messages::CANCELLED));
        assert_eq!(pin_reply(&PinOutcome::TimedOut), None);
        assert_eq!(pin_reply(&PinOutcome::Superseded), None);
        assert_eq!(pin_reply(&PinOutcome::AbortedByUnpin), None);
        assert_eq!(pin_reply(&PinOutcome::Denied), None);
    }
}
