//! Error types for the replay scheduler.
//!
//! `ReplayError` is returned when a run cannot be started at all.
//! `ConsumerError` describes why a consumer stopped a run that was already
//! going; it travels inside `RunOutcome::Failed` rather than as an `Err`.

use uuid::Uuid;

/// Errors returned by `ReplayScheduler::start_*`.
#[derive(Debug)]
pub enum ReplayError {
    /// Bounded pacing was requested with a zero target duration.
    InvalidDuration,
    /// A run is active and the start policy is `Reject`.
    AlreadyRunning { run_id: Uuid },
    /// `Replace` was requested from inside the run it would replace.
    ReentrantStart { run_id: Uuid },
    /// The worker thread could not be spawned.
    Spawn(std::io::Error),
}

impl std::fmt::Display for ReplayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplayError::InvalidDuration => {
                write!(f, "Target total duration must be greater than zero")
            }
            ReplayError::AlreadyRunning { run_id } => {
                write!(f, "Replay {} is still running", run_id)
            }
            ReplayError::ReentrantStart { run_id } => {
                write!(f, "Replay {} cannot be replaced from its own worker thread", run_id)
            }
            ReplayError::Spawn(e) => write!(f, "Failed to spawn replay thread: {}", e),
        }
    }
}

impl std::error::Error for ReplayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReplayError::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure reported by (or on behalf of) a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerError {
    /// Consumer refused the item.
    Rejected(String),
    /// Receiving side of a channel hand-off was dropped.
    Disconnected,
    /// Consumer panicked; the payload message is kept when it is a string.
    Panicked(String),
}

impl std::fmt::Display for ConsumerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsumerError::Rejected(msg) => write!(f, "Consumer rejected item: {}", msg),
            ConsumerError::Disconnected => write!(f, "Consumer disconnected"),
            ConsumerError::Panicked(msg) => write!(f, "Consumer panicked: {}", msg),
        }
    }
}

impl std::error::Error for ConsumerError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_spawn_error_has_source() {
        let err = ReplayError::Spawn(std::io::Error::other("no threads left"));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("no threads left"));
        assert!(ReplayError::InvalidDuration.source().is_none());
    }

    #[test]
    fn test_consumer_error_display() {
        let err = ConsumerError::Rejected("bad coordinate".into());
        assert_eq!(err.to_string(), "Consumer rejected item: bad coordinate");
    }
}
