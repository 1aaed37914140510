//! This module routes inbound raw events to the live monitors.

use tracing::{debug, instrument};

use crate::{base::types::RawEvent, monitor::Registry};

/// Handles a raw event from the chat transport.
///
/// Dispatch is synchronous: every monitor registered right now sees the event before the next
/// one is processed.
#[instrument(skip_all)]
pub fn handle_raw_event(event: &RawEvent, registry: &Registry) -> usize {
    let resolved = registry.dispatch(event);

    if resolved > 0 {
        debug!("Event resolved {} monitor(s)", resolved);
    }

    resolved
}
