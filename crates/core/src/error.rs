use crate::player_state::PlayerState;

/// Domain validation error shared by parsing helpers and configuration.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Failure reported by a [`KeyValueStore`](crate::store::KeyValueStore)
/// implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The shared store could not be reached or rejected the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be encoded or decoded.
    #[error("Codec error: {0}")]
    Codec(String),
}

/// Error taxonomy of the coordination layer.
///
/// "Lock not held" is never an error: acquisition failures are plain
/// `false`/`None` returns. Only conditions a caller must act on surface here.
#[derive(Debug, thiserror::Error)]
pub enum CoordError {
    /// A lock stayed held by another owner for every attempt of a bounded
    /// retry. Safe to retry later or to abandon.
    #[error("Lock contended: {key}")]
    Contention { key: String },

    /// The player state machine rejected a move. Indicates a caller
    /// ordering bug; never retried automatically.
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: PlayerState, to: PlayerState },

    /// The shared store is unreachable. Operations fail closed.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A stored record did not match its expected shape.
    #[error("Codec error: {0}")]
    Codec(String),
}

impl CoordError {
    /// Whether backing off and retrying the same call can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoordError::Contention { .. } | CoordError::StoreUnavailable(_)
        )
    }
}

impl From<StoreError> for CoordError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => CoordError::StoreUnavailable(msg),
            StoreError::Codec(msg) => CoordError::Codec(msg),
        }
    }
}

/// Convenience alias for coordination operations.
pub type CoordResult<T> = Result<T, CoordError>;

/// Convenience alias for raw store operations.
pub type StoreResult<T> = Result<T, StoreError>;
