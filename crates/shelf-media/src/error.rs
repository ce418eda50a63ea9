use thiserror::Error;

/// Errors from image decode/encode work.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The input bytes are not a decodable image.
    #[error("image decode failed: {0}")]
    Decode(String),

    /// Re-encoding failed (should not happen for decodable inputs).
    #[error("image encode failed: {0}")]
    Encode(String),
}

/// Result alias for media operations.
pub type MediaResult<T> = Result<T, MediaError>;
