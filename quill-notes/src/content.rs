//! The protected-content entity and its state machine.
//!
//! A loaded entity is in one of three effective states:
//!
//! - `Unprotected` - plaintext is authoritative, never encrypted.
//! - `ProtectedAvailable` - decrypted at load, plaintext authoritative,
//!   re-encrypted with a fresh nonce on every save.
//! - `ProtectedLocked` - the session was unavailable (or the ciphertext
//!   failed authentication) at load; the original ciphertext is retained and
//!   written back verbatim on save. Saving a protected note while locked is
//!   deliberately allowed so metadata-only edits never corrupt or lose the
//!   content.

use crate::envelope::ProtectedEnvelope;
use crate::error::{ContentError, ContentResult};
use crate::record::ContentRecord;
use chrono::{DateTime, Utc};
use quill_crypto::{decrypt, encrypt, DerivedKey};
use quill_session::SessionKeyStore;
use tracing::warn;

enum Body {
    /// Plaintext is authoritative (unprotected, or protected and decrypted).
    Plain(Vec<u8>),
    /// Ciphertext is authoritative; `raw` is preserved byte-for-byte for
    /// locked saves. `corrupt` marks an authentication failure observed with
    /// an available key, as opposed to a merely locked session.
    Sealed { raw: Vec<u8>, corrupt: bool },
}

/// A piece of note content that may be protected.
pub struct NoteContent {
    content_id: String,
    note_id: String,
    is_protected: bool,
    body: Body,
    date_created: DateTime<Utc>,
    date_modified: DateTime<Utc>,
}

impl NoteContent {
    /// Creates new, not-yet-protected content.
    pub fn new_unprotected(
        content_id: impl Into<String>,
        note_id: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        let now = Utc::now();
        Self {
            content_id: content_id.into(),
            note_id: note_id.into(),
            is_protected: false,
            body: Body::Plain(content),
            date_created: now,
            date_modified: now,
        }
    }

    /// Constructs an entity from a storage record, deciding up front whether
    /// plaintext or ciphertext is authoritative. Never fails: an undecryptable
    /// protected record degrades to a locked (or corrupt) entity instead.
    pub fn from_record(record: ContentRecord, session: &SessionKeyStore) -> Self {
        let body = if !record.is_protected {
            Body::Plain(record.content)
        } else {
            match session.get() {
                Ok(session_key) => match open_sealed(&record.content, &session_key.key) {
                    Ok(plaintext) => Body::Plain(plaintext),
                    Err(_) => {
                        warn!(
                            content_id = %record.content_id,
                            "protected content failed authentication"
                        );
                        Body::Sealed {
                            raw: record.content,
                            corrupt: true,
                        }
                    }
                },
                Err(_) => Body::Sealed {
                    raw: record.content,
                    corrupt: false,
                },
            }
        };

        Self {
            content_id: record.content_id,
            note_id: record.note_id,
            is_protected: record.is_protected,
            body,
            date_created: record.date_created,
            date_modified: record.date_modified,
        }
    }

    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    pub fn note_id(&self) -> &str {
        &self.note_id
    }

    pub fn is_protected(&self) -> bool {
        self.is_protected
    }

    /// True iff plaintext is the authoritative representation.
    pub fn is_content_available(&self) -> bool {
        matches!(self.body, Body::Plain(_))
    }

    pub fn date_created(&self) -> DateTime<Utc> {
        self.date_created
    }

    pub fn date_modified(&self) -> DateTime<Utc> {
        self.date_modified
    }

    /// The plaintext, or a typed error explaining why it is unreadable.
    pub fn content(&self) -> ContentResult<&[u8]> {
        match &self.body {
            Body::Plain(bytes) => Ok(bytes),
            Body::Sealed { corrupt: true, .. } => Err(ContentError::Corrupt),
            Body::Sealed { .. } => Err(ContentError::Locked),
        }
    }

    /// Replaces the plaintext. Fails while the content is not readable.
    pub fn set_content(&mut self, content: Vec<u8>) -> ContentResult<()> {
        match &mut self.body {
            Body::Plain(bytes) => {
                *bytes = content;
                Ok(())
            }
            Body::Sealed { corrupt: true, .. } => Err(ContentError::Corrupt),
            Body::Sealed { .. } => Err(ContentError::Locked),
        }
    }

    /// Marks the content protected. Requires an available session so the
    /// next save can encrypt; rejected otherwise, before any mutation.
    pub fn protect(&mut self, session: &SessionKeyStore) -> ContentResult<()> {
        if self.is_protected {
            return Ok(());
        }
        if !session.is_available() {
            return Err(ContentError::InvalidTransition(
                "cannot protect content while the session is locked",
            ));
        }
        self.is_protected = true;
        Ok(())
    }

    /// Clears the protected flag. Content that cannot currently be read
    /// cannot be unprotected.
    pub fn unprotect(&mut self, session: &SessionKeyStore) -> ContentResult<()> {
        if !self.is_protected {
            return Ok(());
        }
        match &self.body {
            Body::Plain(_) => {
                if !session.is_available() {
                    return Err(ContentError::InvalidTransition(
                        "cannot unprotect content while the session is locked",
                    ));
                }
                self.is_protected = false;
                Ok(())
            }
            Body::Sealed { corrupt: true, .. } => Err(ContentError::InvalidTransition(
                "cannot unprotect content that failed authentication",
            )),
            Body::Sealed { .. } => Err(ContentError::InvalidTransition(
                "cannot unprotect content loaded while the session was locked",
            )),
        }
    }

    /// Produces the storage record. The serialization boundary: retained
    /// plaintext and the corrupt marker are in-memory-only and never leave
    /// this method.
    ///
    /// Protected + available re-encrypts with the current key and a fresh
    /// nonce; protected + sealed writes the original ciphertext back
    /// verbatim.
    pub fn to_record(&self, session: &SessionKeyStore) -> ContentResult<ContentRecord> {
        let content = match (&self.body, self.is_protected) {
            (Body::Plain(bytes), false) => bytes.clone(),
            (Body::Plain(bytes), true) => {
                let session_key = session.get().map_err(|_| ContentError::Locked)?;
                let data = encrypt(&session_key.key, bytes)?;
                ProtectedEnvelope {
                    key_id: session_key.key_id,
                    data,
                }
                .to_bytes()?
            }
            (Body::Sealed { raw, .. }, _) => raw.clone(),
        };

        Ok(ContentRecord {
            content_id: self.content_id.clone(),
            note_id: self.note_id.clone(),
            is_protected: self.is_protected,
            content,
            date_created: self.date_created,
            date_modified: Utc::now(),
        })
    }

    pub(crate) fn mark_saved(&mut self, date_modified: DateTime<Utc>) {
        self.date_modified = date_modified;
    }
}

fn open_sealed(raw: &[u8], key: &DerivedKey) -> ContentResult<Vec<u8>> {
    let envelope = ProtectedEnvelope::from_bytes(raw)?;
    Ok(decrypt(key, &envelope.data)?)
}
