//! Catalog orchestration for the Shelf core.
//!
//! [`CatalogService`] is the single writer path over the two local stores:
//! it compresses and stages images, imports product tables, runs batch
//! edits and deletes over an ephemeral selection, joins blobs with product
//! records for display, and owns the order lifecycle. The `reports` module
//! aggregates the daily/supplier views that the export layer renders.
//!
//! Batch operations have partial-failure semantics throughout: one bad
//! item never aborts its siblings, and every batch returns a report of
//! what succeeded and what did not.

pub mod error;
pub mod import;
pub mod orders;
pub mod reports;
pub mod service;

pub use error::{CatalogError, CatalogResult};
pub use import::{columns, ImportReport};
pub use reports::{
    CatalogRow, DailyOrderRow, LabelRow, ReorderLine, StatsView, SupplierReorder,
    SupplierStatsReport, SupplierStatsRow, UNKNOWN_SUPPLIER,
};
pub use service::{
    CatalogEntry, CatalogService, DeleteFailure, DeleteReport, MatchReport, UploadFailure,
    UploadFile, UploadReport, UploadStage, UNCLASSIFIED,
};
