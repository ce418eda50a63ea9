//! Foundation types for the Shelf catalog core.
//!
//! This crate provides the identity and record types used throughout the
//! Shelf system. Every other Shelf crate depends on `shelf-types`.
//!
//! # Key Types
//!
//! - [`CatalogKey`] — Composite product identity (code × supplier)
//! - [`ProductRecord`] — One catalog entry per (code, supplier) pair
//! - [`ProductPatch`] — Partial update applied across a selection
//! - [`OrderRecord`] — A placed order line, keyed by [`OrderId`]
//! - [`OrderClock`] — Monotonic issuer of timestamp-token order ids

pub mod error;
pub mod key;
pub mod order;
pub mod product;

pub use error::TypeError;
pub use key::CatalogKey;
pub use order::{OrderClock, OrderDraft, OrderId, OrderRecord};
pub use product::{ProductPatch, ProductRecord};
