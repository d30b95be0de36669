//! Permission error types
//!
//! Every fallible operation of the state machine and the request coordinator
//! reports one of these.

use thiserror::Error;

use super::store::StoreError;

/// Errors that can occur while reading or changing the P2P permission state
#[derive(Debug, Error)]
pub enum PermissionError {
    /// The persisted state is not a value this crate ever writes
    #[error("Persisted permission state is corrupt: {0:?}")]
    CorruptState(String),

    /// The preference store could not be read
    #[error("Failed to read permission state: {0}")]
    PersistenceReadFailed(#[source] StoreError),

    /// A state write was lost; callers must not assume the new state took effect
    #[error("Failed to persist permission state: {0}")]
    PersistenceWriteFailed(#[source] StoreError),
}

impl PermissionError {
    /// Check if this error means the store holds data it should never contain
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::CorruptState(_))
    }
}

/// Result alias for permission operations
pub type PermissionResult<T> = Result<T, PermissionError>;
