//! Encryption layer for Quill.
//!
//! Provides protected-content encryption using:
//! - Argon2id for key derivation from the user's password
//! - ChaCha20-Poly1305 for authenticated encryption
//! - Secure key management with zeroization
//!
//! # Architecture
//!
//! Two values are derived from the password, with distinct domain-separation
//! tags:
//!
//! 1. **Content key**: encrypts/decrypts protected note content. Never
//!    stored - it's derived each time the user unlocks and held only in
//!    volatile memory by the session layer.
//!
//! 2. **Verifier**: a secondary derivation persisted at protection setup,
//!    used to check that a newly entered password is correct before the
//!    content key is trusted. A leaked verifier cannot be replayed as the
//!    content key.

mod cipher;
mod error;
mod key;

pub use cipher::{
    decrypt, decrypt_string, encrypt, encrypt_string, EncryptedData, NONCE_SIZE, TAG_SIZE,
};
pub use error::{CryptoError, CryptoResult};
pub use key::{
    derive_content_key, derive_verifier, generate_random_key, DerivedKey, KdfParams, Salt,
    VerifierHash, KEY_SIZE, SALT_SIZE,
};
