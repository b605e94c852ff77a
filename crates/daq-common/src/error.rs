use thiserror::Error;

/// Acquisition error types covering configuration, board access, and
/// serial transport failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DaqError {
    /// Configuration or initialization error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Board/peripheral access error.
    #[error("board error: {0}")]
    Board(String),

    /// Serial transport write error.
    #[error("serial write error: {0}")]
    Serial(String),

    /// Invalid state transition attempted.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Source state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

/// Convenience type alias for acquisition operations.
pub type DaqResult<T> = Result<T, DaqError>;
