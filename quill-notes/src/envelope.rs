//! Persisted ciphertext framing for protected content.

use crate::error::ContentResult;
use quill_crypto::EncryptedData;
use serde::{Deserialize, Serialize};

/// What actually lands in a protected record's `content` field: the
/// ciphertext plus the key generation it was encrypted under. The generation
/// lets an interrupted password change resume idempotently.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedEnvelope {
    pub key_id: u32,
    pub data: EncryptedData,
}

impl ProtectedEnvelope {
    pub fn to_bytes(&self) -> ContentResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> ContentResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_crypto::{encrypt, generate_random_key};

    #[test]
    fn round_trip() {
        let key = generate_random_key();
        let envelope = ProtectedEnvelope {
            key_id: 3,
            data: encrypt(&key, b"payload").unwrap(),
        };

        let bytes = envelope.to_bytes().unwrap();
        let parsed = ProtectedEnvelope::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, envelope);
    }

    #[test]
    fn garbage_bytes_fail_to_parse() {
        assert!(ProtectedEnvelope::from_bytes(b"not an envelope").is_err());
    }
}
