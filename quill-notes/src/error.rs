//! Error types for protected content.

use quill_crypto::CryptoError;
use quill_session::SessionError;
use thiserror::Error;

/// Result type for content operations.
pub type ContentResult<T> = Result<T, ContentError>;

/// Errors that can occur when reading or writing protected content.
#[derive(Debug, Error)]
pub enum ContentError {
    /// The session is locked; content is unavailable, not damaged.
    #[error("protected session is locked; content unavailable")]
    Locked,

    /// Authentication failed despite an available key: the ciphertext was
    /// corrupted or tampered with. Distinct from [`ContentError::Locked`] so
    /// callers never conflate "locked earlier" with "data damaged".
    #[error("protected content failed authentication (corrupted or tampered)")]
    Corrupt,

    /// Rejected before any mutation occurred.
    #[error("invalid state transition: {0}")]
    InvalidTransition(&'static str),

    #[error("content store error: {0}")]
    Store(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Session(#[from] SessionError),
}
