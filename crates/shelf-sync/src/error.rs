use thiserror::Error;

/// Errors from synchronization operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The bridge failed to reach its peer.
    #[error("bridge error: {0}")]
    Bridge(String),

    /// Reading or writing local state failed.
    #[error("store error: {0}")]
    Store(#[from] shelf_store::StoreError),
}

/// Result alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
