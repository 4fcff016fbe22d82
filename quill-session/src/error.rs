//! Error types for the protected-session layer.

use quill_crypto::CryptoError;
use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur in protected-session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session key is available; protected content cannot be read.
    #[error("protected session is locked")]
    Locked,

    #[error("incorrect password")]
    IncorrectPassword,

    #[error("protection has not been set up")]
    NotInitialized,

    #[error("protection is already set up")]
    AlreadyInitialized,

    #[error("password too short (min 4 characters)")]
    PasswordTooShort,

    #[error("a password change is already in progress")]
    RekeyInProgress,

    #[error("protection record storage error: {0}")]
    Persistence(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The key-derivation task was cancelled or panicked. Aborts the single
    /// request, never the process.
    #[error("key derivation task failed: {0}")]
    Internal(String),
}
