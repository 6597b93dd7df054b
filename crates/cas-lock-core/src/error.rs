//! Error types for distributed lock operations.

use thiserror::Error;

/// Boxed error from the backing store's driver.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors reported by a store adapter.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The caller-supplied condition evaluated to false.
    ///
    /// This is a distinguished outcome, not a transport failure: the write or
    /// delete was atomically rejected because the current item did not satisfy
    /// the predicate.
    #[error("conditional check failed")]
    ConditionFailed(#[source] BoxError),

    /// Any other backend failure (network, throttling, authorization).
    #[error("backend error: {0}")]
    Backend(#[source] BoxError),
}

/// Result type for store adapter operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during lock operations.
#[derive(Error, Debug)]
pub enum LockError {
    /// The conditional write exhausted its retries; the lock is held.
    #[error("failed to acquire lock '{id}'")]
    FailedToAcquireLock {
        /// The contended lock id.
        id: String,
        /// The backend's conditional-failure error from the final attempt.
        #[source]
        source: BoxError,
    },

    /// Release found the record absent or owned by another guid.
    #[error("failed to release lock '{id}': not the current holder")]
    FailedToReleaseLock {
        /// The lock id.
        id: String,
        /// The backend's conditional-failure error.
        #[source]
        source: BoxError,
    },

    /// Non-conditional failure from the store, passed through unchanged.
    #[error("backend error: {0}")]
    Backend(#[source] BoxError),

    /// The supplied configuration failed validation.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;

impl LockError {
    /// Wraps a non-conditional store error.
    ///
    /// Condition failures have per-operation meanings (contention on acquire,
    /// lost ownership on release) and must be mapped at the call site; this
    /// helper is for paths where a condition failure cannot occur, such as
    /// reads.
    pub fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::ConditionFailed(source) | StoreError::Backend(source) => {
                LockError::Backend(source)
            }
        }
    }
}
