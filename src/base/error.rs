//! Classified errors for the transport and the event monitor.
//!
//! Everything else in the crate uses `anyhow` via [`crate::base::types::Res`];
//! these enums exist where callers need to branch on the failure kind.

use thiserror::Error;

/// Failures of a remote call to the chat platform.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The bot is not allowed to perform the action.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The target message or channel does not exist (anymore).
    #[error("Not found: {0}")]
    NotFound(String),

    /// The channel has no more room for pins.
    #[error("Pin capacity exceeded")]
    CapacityExceeded,

    /// Any other platform failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TransportError {
    /// Whether this failure should end a flow silently.
    pub fn is_silent(&self) -> bool {
        matches!(self, TransportError::Forbidden(_) | TransportError::NotFound(_))
    }
}

/// Why a pending monitor was cancelled by another flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The same actor started a newer confirmation.
    SupersededByNewerRequest,
    /// The same actor explicitly unpinned a message.
    AbortedByExplicitUnpin,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::SupersededByNewerRequest => write!(f, "superseded by a newer request"),
            CancelReason::AbortedByExplicitUnpin => write!(f, "aborted by an explicit unpin"),
        }
    }
}

/// Failures of [`crate::monitor::Monitor::wait`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// The monitor's deadline elapsed before a matching event arrived.
    #[error("Timed out waiting for a matching event")]
    Timeout,

    /// Another flow cancelled the monitor.
    #[error("Cancelled: {0}")]
    Cancelled(CancelReason),

    /// The monitor was settled without a result (e.g. it was closed while waiting).
    #[error("Monitor closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_forbidden_and_not_found_are_silent() {
        assert!(TransportError::Forbidden("not_pinnable".into()).is_silent());
        assert!(TransportError::NotFound("no_pin".into()).is_silent());
        assert!(!TransportError::CapacityExceeded.is_silent());
        assert!(!TransportError::Other(anyhow::anyhow!("ratelimited")).is_silent());
    }

    #[test]
    fn other_errors_keep_their_message() {
        let err: anyhow::Error = TransportError::Other(anyhow::anyhow!("ratelimited")).into();

        assert_eq!(err.to_string(), "ratelimited");
    }
}
