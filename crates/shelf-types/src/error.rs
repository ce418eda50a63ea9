use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid key spec {0:?}: expected CODE:SUPPLIER")]
    InvalidKeySpec(String),

    #[error("quantity must be a positive integer, got {0:?}")]
    InvalidQuantity(String),
}
