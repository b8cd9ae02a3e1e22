//! Scanner error types.

use phoneprobe_core::PhoneProbeError;
use thiserror::Error;

/// Errors surfaced by scans and scanner construction.
///
/// Per-endpoint fetch failures never appear here; they are folded into the
/// scan record.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The phone number could not be normalized
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An endpoint template was rejected when building the set
    #[error("invalid endpoint template '{pattern}': {reason}")]
    InvalidEndpoint {
        /// Offending URL pattern (empty when the set itself is empty)
        pattern: String,
        /// What is wrong with it
        reason: String,
    },

    /// An HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Transport(String),

    /// A history, stats or forget query failed
    #[error("storage error: {0}")]
    Storage(#[from] phoneprobe_db::DatabaseError),

    /// Any other core error
    #[error(transparent)]
    Core(PhoneProbeError),
}

impl From<PhoneProbeError> for ScanError {
    fn from(err: PhoneProbeError) -> Self {
        match err {
            PhoneProbeError::InvalidInput(msg) => Self::InvalidInput(msg),
            other => Self::Core(other),
        }
    }
}

/// Result type alias for scanner operations.
pub type Result<T> = std::result::Result<T, ScanError>;
