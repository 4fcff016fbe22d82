//! Key derivation and key material types.
//!
//! The content key and the password verifier are both Argon2id outputs over
//! the same per-installation salt, separated by a domain tag appended to the
//! salt input. Knowing the persisted verifier therefore reveals nothing about
//! the content key.

use crate::error::{CryptoError, CryptoResult};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Symmetric key length in bytes (ChaCha20-Poly1305).
pub const KEY_SIZE: usize = 32;

/// Per-installation salt length in bytes.
pub const SALT_SIZE: usize = 16;

const CONTENT_KEY_DOMAIN: &[u8] = b"quill content key v1";
const VERIFIER_DOMAIN: &[u8] = b"quill password verifier v1";

/// Per-installation KDF salt, generated once at protection setup and
/// persisted alongside the verifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    /// Generates a fresh random salt from the OS RNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}

/// Argon2id cost parameters, persisted with the salt so unlock always uses
/// the parameters the verifier was created with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub m_cost: u32,
    /// Number of iterations.
    pub t_cost: u32,
    /// Degree of parallelism.
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        // ~hundreds of milliseconds on desktop hardware
        Self {
            m_cost: 64 * 1024,
            t_cost: 3,
            p_cost: 1,
        }
    }
}

impl KdfParams {
    /// Minimal-cost parameters for tests. Not suitable for real passwords.
    pub fn fast_insecure() -> Self {
        Self {
            m_cost: 32,
            t_cost: 1,
            p_cost: 1,
        }
    }

    fn to_argon2(&self) -> CryptoResult<Params> {
        Params::new(self.m_cost, self.t_cost, self.p_cost, Some(KEY_SIZE))
            .map_err(|e| CryptoError::Kdf(e.to_string()))
    }
}

/// A derived symmetric key. Exists only in volatile memory and is zeroized
/// on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_SIZE]);

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey(..)")
    }
}

/// Persisted secondary derivation of the password. Comparison is
/// constant-time.
#[derive(Clone, Serialize, Deserialize)]
pub struct VerifierHash([u8; KEY_SIZE]);

impl VerifierHash {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl PartialEq for VerifierHash {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for VerifierHash {}

impl fmt::Debug for VerifierHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VerifierHash(..)")
    }
}

/// Derives the content key from a password. Deliberately slow; dispatch to a
/// blocking-capable executor, never run inline on an event-processing thread.
pub fn derive_content_key(
    password: &str,
    salt: &Salt,
    params: &KdfParams,
) -> CryptoResult<DerivedKey> {
    let mut out = [0u8; KEY_SIZE];
    derive_into(password, salt, params, CONTENT_KEY_DOMAIN, &mut out)?;
    Ok(DerivedKey(out))
}

/// Derives the password verifier. Same cost profile as the content key but a
/// different domain tag, so the two outputs are unrelated.
pub fn derive_verifier(
    password: &str,
    salt: &Salt,
    params: &KdfParams,
) -> CryptoResult<VerifierHash> {
    let mut out = [0u8; KEY_SIZE];
    derive_into(password, salt, params, VERIFIER_DOMAIN, &mut out)?;
    Ok(VerifierHash(out))
}

fn derive_into(
    password: &str,
    salt: &Salt,
    params: &KdfParams,
    domain: &[u8],
    out: &mut [u8; KEY_SIZE],
) -> CryptoResult<()> {
    if password.is_empty() {
        return Err(CryptoError::EmptyPassword);
    }

    let mut salted = Vec::with_capacity(SALT_SIZE + domain.len());
    salted.extend_from_slice(salt.as_bytes());
    salted.extend_from_slice(domain);

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_argon2()?);
    argon2
        .hash_password_into(password.as_bytes(), &salted, out)
        .map_err(|e| CryptoError::Kdf(e.to_string()))
}

/// Generates a random key (for tests and key wrapping).
pub fn generate_random_key() -> DerivedKey {
    let mut bytes = [0u8; KEY_SIZE];
    OsRng.fill_bytes(&mut bytes);
    DerivedKey(bytes)
}
