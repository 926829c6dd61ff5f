//! Error types for jooki-client.

use jooki_state::DeviceState;

/// Convenience type alias for Results using ClientError.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur while commanding a device.
///
/// `PredicateTimeout` and `SessionClosed` both carry the last state the wait
/// observed, so callers can inspect partial progress or retry.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The transport connection failed or was refused
    #[error("connection error: {0}")]
    Connection(String),

    /// The transport never acknowledged a subscribe or publish
    #[error("timed out waiting for {action} ack on {topic}")]
    AckTimeout {
        /// "subscribe" or "publish"
        action: &'static str,
        /// The topic involved
        topic: String,
    },

    /// The completion predicate did not hold before the deadline
    #[error("timed out waiting for device state")]
    PredicateTimeout {
        /// Last state observed before the deadline
        last: Box<DeviceState>,
    },

    /// The session was torn down while a wait was outstanding
    #[error("session closed while waiting for device state")]
    SessionClosed {
        /// Best known state at teardown
        last: Box<DeviceState>,
    },

    /// An operation was attempted on a closed session
    #[error("session is closed")]
    NotConnected,

    /// An expected new entity never showed up in the device state
    #[error("{what} never appeared in device state")]
    NotFound {
        /// What was being waited for
        what: &'static str,
    },

    /// A command payload could not be encoded
    #[error("failed to encode command payload: {0}")]
    Encode(#[source] serde_json::Error),

    /// Reading the upload source failed
    #[error("failed to read upload source: {0}")]
    Io(#[from] std::io::Error),

    /// The device rejected an upload
    #[error("upload failed: {0}")]
    Upload(String),

    /// The HTTP request carrying an upload failed
    #[error("upload request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl ClientError {
    /// The last observed state, for the variants that carry one.
    pub fn last_state(&self) -> Option<&DeviceState> {
        match self {
            ClientError::PredicateTimeout { last } | ClientError::SessionClosed { last } => {
                Some(last)
            }
            _ => None,
        }
    }

    /// Whether this is the "wait ended without success" family a caller can
    /// sensibly retry: timeout, teardown, or a missing expected entity.
    pub fn is_wait_failure(&self) -> bool {
        matches!(
            self,
            ClientError::PredicateTimeout { .. }
                | ClientError::SessionClosed { .. }
                | ClientError::NotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_state_only_on_wait_variants() {
        let err = ClientError::PredicateTimeout {
            last: Box::new(DeviceState::default()),
        };
        assert!(err.last_state().is_some());
        assert!(err.is_wait_failure());

        let err = ClientError::NotConnected;
        assert!(err.last_state().is_none());
        assert!(!err.is_wait_failure());
    }

    #[test]
    fn test_display_messages() {
        let err = ClientError::AckTimeout {
            action: "publish",
            topic: "/j/web/input/DO_PLAY".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "timed out waiting for publish ack on /j/web/input/DO_PLAY"
        );

        let err = ClientError::NotFound {
            what: "newly created playlist",
        };
        assert!(err.to_string().contains("newly created playlist"));
    }
}
