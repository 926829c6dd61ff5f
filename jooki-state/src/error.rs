//! Error types for jooki-state.

/// Convenience type alias for Results using StateError.
pub type Result<T> = std::result::Result<T, StateError>;

/// Errors that can occur while decoding or merging device state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// A state notification payload could not be decoded
    #[error("failed to decode state payload: {0}")]
    Decode(#[from] serde_json::Error),
}
