use thiserror::Error;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The persistence quota is exhausted. Non-fatal: the caller decides
    /// whether to retry, prompt, or drop the write.
    #[error("storage quota exhausted: {used} of {quota} bytes in use, {requested} requested")]
    StorageFull {
        used: u64,
        quota: u64,
        requested: u64,
    },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The active write payload could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Persisted state is unreadable. Loads degrade to empty instead of
    /// surfacing this; it is reserved for diagnostics.
    #[error("corrupt persisted state at {entry}: {reason}")]
    CorruptState { entry: String, reason: String },
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
