//! Persistence layer for the Shelf catalog core.
//!
//! Two stores live here, mirroring the host's two persistence primitives:
//!
//! - [`RecordStore`] — JSON-document collections (products, orders, small
//!   auxiliaries) persisted as one serialized mapping per collection on a
//!   [`KvBackend`]. Loads degrade to empty on corrupt state; saves replace
//!   the whole document.
//! - [`BlobStore`] — async key-value store for image payloads keyed by
//!   [`shelf_types::CatalogKey`], with upsert semantics and secondary
//!   lookups by code, supplier, and recency.
//!
//! # Design Rules
//!
//! 1. A parse failure on load is recoverable: the caller sees an empty
//!    collection, never an error.
//! 2. Collection saves are atomic at whole-document granularity.
//! 3. Blob connections are established lazily and re-established
//!    transparently; callers never observe "not connected".
//! 4. Quota exhaustion ([`StoreError::StorageFull`]) is distinct from
//!    generic I/O failure and is non-fatal to the process.

pub mod blob;
pub mod blob_dir;
pub mod blob_memory;
pub mod error;
pub mod kv;
pub mod kv_file;
pub mod records;

pub use blob::{BlobStore, ImageBlob};
pub use blob_dir::DirBlobStore;
pub use blob_memory::MemoryBlobStore;
pub use error::{StoreError, StoreResult};
pub use kv::{KvBackend, MemoryKv};
pub use kv_file::FileKv;
pub use records::{Collection, RecordStore};
