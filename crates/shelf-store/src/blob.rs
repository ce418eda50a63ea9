use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use shelf_types::CatalogKey;

use crate::error::StoreResult;

/// An encoded image payload keyed by the same composite identity as a
/// product record.
///
/// A blob may exist without a product record (pre-staged image) and a
/// record may exist without a blob (placeholder image); the catalog
/// service joins the two sides on read and never requires both.
#[derive(Clone, PartialEq)]
pub struct ImageBlob {
    pub code: String,
    pub supplier: String,
    /// Opaque format tag of the encoded payload, e.g. `"jpeg"`.
    pub format: String,
    pub bytes: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

impl ImageBlob {
    /// Create a blob stamped now.
    pub fn new(key: &CatalogKey, format: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            code: key.code().to_string(),
            supplier: key.supplier().to_string(),
            format: format.into(),
            bytes,
            timestamp: Utc::now(),
        }
    }

    /// The composite identity of this blob.
    pub fn key(&self) -> CatalogKey {
        CatalogKey::new(self.code.clone(), self.supplier.clone())
    }
}

impl fmt::Debug for ImageBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBlob")
            .field("key", &self.key())
            .field("format", &self.format)
            .field("bytes", &self.bytes.len())
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// Async key-value store for image payloads.
///
/// All implementations must satisfy these invariants:
/// - `put` is an upsert: at most one blob per key.
/// - The connection is established lazily and re-established transparently;
///   callers never observe "not connected", only quota or I/O failures.
/// - Schema creation (collection + secondary indexes by code, supplier,
///   and recency) is idempotent and never destroys existing data.
/// - Query misses resolve as absent (`None` / empty), never as errors.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a blob, replacing any previous payload at its key.
    async fn put(&self, blob: ImageBlob) -> StoreResult<()>;

    /// Retrieve the blob at a key. Returns `Ok(None)` if absent.
    async fn get(&self, key: &CatalogKey) -> StoreResult<Option<ImageBlob>>;

    /// Check whether a blob exists at a key.
    async fn exists(&self, key: &CatalogKey) -> StoreResult<bool>;

    /// Delete the blob at a key. Returns `true` if one existed.
    async fn delete(&self, key: &CatalogKey) -> StoreResult<bool>;

    /// Delete every stored blob.
    async fn delete_all(&self) -> StoreResult<()>;

    /// All stored blobs, newest first.
    async fn list(&self) -> StoreResult<Vec<ImageBlob>>;

    /// Blobs whose product code matches, newest first.
    async fn find_by_code(&self, code: &str) -> StoreResult<Vec<ImageBlob>>;

    /// Blobs whose supplier matches, newest first.
    async fn find_by_supplier(&self, supplier: &str) -> StoreResult<Vec<ImageBlob>>;

    /// Number of stored blobs. Doubles as the liveness probe.
    async fn count(&self) -> StoreResult<usize>;
}
