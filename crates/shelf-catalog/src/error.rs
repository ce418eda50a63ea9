use thiserror::Error;

/// Errors from catalog operations.
///
/// Per-item failures inside a batch never surface here — they aggregate
/// into the batch's report. These are whole-operation failures.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The import table's header row lacks required columns. The whole
    /// import is aborted before any row is applied.
    #[error("import header is missing required columns: {}", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    /// The import table contains no rows at all.
    #[error("import table is empty")]
    EmptyImport,

    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] shelf_store::StoreError),

    /// Image work failed outside a per-item context.
    #[error(transparent)]
    Media(#[from] shelf_media::MediaError),
}

/// Result alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;
