//! Commonly used items, for `use pin_bot::prelude::*`.

pub use crate::base::{
    config::Config,
    error::{CancelReason, MonitorError, TransportError},
    types::{Err, RawEvent, Res, ScopeKey, Void},
};
pub use crate::monitor::{Monitor, MonitorFilter, MonitorHandle, MonitorScope, Registry};
pub use crate::pins::{PinCoordinator, PinOutcome, PinRequest, UnpinOutcome};
pub use anyhow::anyhow;
pub use tracing::{debug, error, info, instrument, warn};
