//! Size-targeted image compression for Shelf uploads.
//!
//! Every uploaded image is re-encoded toward a byte budget chosen from the
//! source size ([`TargetPolicy`]). The [`Compressor`] binary-searches the
//! encoder quality, keeping the best candidate seen, so a bounded number of
//! encode passes lands within tolerance of the budget.
//!
//! The pixel work is behind the [`ImageCodec`] trait; [`JpegCodec`] is the
//! production implementation, and tests drive the search with synthetic
//! codecs whose size curves are known exactly.

pub mod codec;
pub mod compress;
pub mod error;

pub use codec::{placeholder_jpeg, ImageCodec, JpegCodec, PLACEHOLDER_EDGE};
pub use compress::{fit_dimensions, Compressed, Compressor, TargetPolicy, MAX_DIMENSION};
pub use error::{MediaError, MediaResult};
