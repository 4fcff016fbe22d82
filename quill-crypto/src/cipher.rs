//! Authenticated content encryption.
//!
//! ChaCha20-Poly1305 with a fresh random nonce per encryption, stored
//! alongside the ciphertext. A wrong key or a tampered ciphertext fails
//! authentication deterministically instead of producing garbage plaintext.

use crate::error::{CryptoError, CryptoResult};
use crate::key::DerivedKey;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// ChaCha20-Poly1305 nonce length in bytes.
pub const NONCE_SIZE: usize = 12;

/// Poly1305 authentication tag length in bytes.
pub const TAG_SIZE: usize = 16;

/// Ciphertext plus the nonce it was produced with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
}

/// Encrypts `plaintext` under `key` with a fresh random nonce.
pub fn encrypt(key: &DerivedKey, plaintext: &[u8]) -> CryptoResult<EncryptedData> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| CryptoError::Encryption("AEAD seal failed".to_string()))?;

    Ok(EncryptedData {
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Decrypts `data` under `key`. Fails if the key is wrong or the ciphertext
/// (or nonce) was tampered with.
pub fn decrypt(key: &DerivedKey, data: &EncryptedData) -> CryptoResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    cipher
        .decrypt(Nonce::from_slice(&data.nonce), data.ciphertext.as_ref())
        .map_err(|_| {
            CryptoError::Decryption("wrong key or tampered ciphertext".to_string())
        })
}

/// Encrypts a UTF-8 string.
pub fn encrypt_string(key: &DerivedKey, plaintext: &str) -> CryptoResult<EncryptedData> {
    encrypt(key, plaintext.as_bytes())
}

/// Decrypts to a UTF-8 string.
pub fn decrypt_string(key: &DerivedKey, data: &EncryptedData) -> CryptoResult<String> {
    let bytes = decrypt(key, data)?;
    String::from_utf8(bytes)
        .map_err(|_| CryptoError::Decryption("decrypted content is not valid UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::generate_random_key;
    use proptest::prelude::*;

    #[test]
    fn round_trip() {
        let key = generate_random_key();
        let encrypted = encrypt(&key, b"hello world").unwrap();
        assert_eq!(decrypt(&key, &encrypted).unwrap(), b"hello world");
    }

    #[test]
    fn round_trip_empty_plaintext() {
        let key = generate_random_key();
        let encrypted = encrypt(&key, b"").unwrap();
        assert_eq!(decrypt(&key, &encrypted).unwrap(), b"");
    }

    #[test]
    fn wrong_key_fails() {
        let encrypted = encrypt(&generate_random_key(), b"secret").unwrap();
        let result = decrypt(&generate_random_key(), &encrypted);
        assert!(matches!(result, Err(CryptoError::Decryption(_))));
    }

    #[test]
    fn nonces_are_unique_per_encryption() {
        let key = generate_random_key();
        let a = encrypt(&key, b"same plaintext").unwrap();
        let b = encrypt(&key, b"same plaintext").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn ciphertext_carries_tag_overhead() {
        let key = generate_random_key();
        let encrypted = encrypt(&key, b"1234").unwrap();
        assert_eq!(encrypted.ciphertext.len(), 4 + TAG_SIZE);
    }

    #[test]
    fn string_round_trip() {
        let key = generate_random_key();
        let encrypted = encrypt_string(&key, "protected note ✓").unwrap();
        assert_eq!(decrypt_string(&key, &encrypted).unwrap(), "protected note ✓");
    }

    #[test]
    fn non_utf8_plaintext_surfaces_as_decryption_error() {
        let key = generate_random_key();
        let encrypted = encrypt(&key, &[0xff, 0xfe, 0xfd]).unwrap();
        assert!(matches!(
            decrypt_string(&key, &encrypted),
            Err(CryptoError::Decryption(_))
        ));
    }

    proptest! {
        #[test]
        fn round_trip_any_plaintext(plaintext in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let key = generate_random_key();
            let encrypted = encrypt(&key, &plaintext).unwrap();
            prop_assert_eq!(decrypt(&key, &encrypted).unwrap(), plaintext);
        }

        #[test]
        fn flipping_any_ciphertext_bit_fails_authentication(
            plaintext in proptest::collection::vec(any::<u8>(), 1..512),
            index in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let key = generate_random_key();
            let mut encrypted = encrypt(&key, &plaintext).unwrap();
            let i = index.index(encrypted.ciphertext.len());
            encrypted.ciphertext[i] ^= 1 << bit;
            prop_assert!(decrypt(&key, &encrypted).is_err());
        }

        #[test]
        fn flipping_any_nonce_bit_fails_authentication(
            plaintext in proptest::collection::vec(any::<u8>(), 1..512),
            index in 0usize..NONCE_SIZE,
            bit in 0u8..8,
        ) {
            let key = generate_random_key();
            let mut encrypted = encrypt(&key, &plaintext).unwrap();
            encrypted.nonce[index] ^= 1 << bit;
            prop_assert!(decrypt(&key, &encrypted).is_err());
        }
    }
}
