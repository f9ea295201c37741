//! Error types for the state cell.

use thiserror::Error;

/// Boxed cause carried by a failed mutation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Mutator failed: {0}")]
    Mutator(#[source] BoxError),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Version not found: {0}")]
    NotFound(String),

    #[error("Level out of range: {0} (must be non-negative)")]
    OutOfRange(i64),

    #[error("No async runtime available to drive the mutation")]
    NoRuntime,
}

impl StoreError {
    /// True for failures caused by a malformed argument rather than by
    /// running a mutation.
    pub fn is_argument_error(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidArgument(_) | StoreError::OutOfRange(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Cause recorded when a mutator panics instead of returning.
#[derive(Debug, Error)]
#[error("mutator panicked: {message}")]
pub struct MutatorPanic {
    pub message: String,
}

impl MutatorPanic {
    pub(crate) fn from_payload(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }
}

// JSON only enters through configuration parsing.
impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::InvalidArgument(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
