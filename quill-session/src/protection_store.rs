//! Persistence boundary for the protection record.
//!
//! A small record `{salt, verifier_hash, kdf_params, key_id}` is written once
//! at protection setup and replaced only on password change. The pending
//! rekey marker exists only while a password change is in flight; it carries
//! the old content key wrapped under the new one so an interrupted
//! re-encryption can resume with just the new password.

use crate::error::{SessionError, SessionResult};
use quill_crypto::{EncryptedData, KdfParams, Salt, VerifierHash};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Persisted protection setup. Immutable until the password is changed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProtectionRecord {
    pub salt: Salt,
    pub verifier_hash: VerifierHash,
    pub kdf_params: KdfParams,
    /// Key generation; bumped on every password change. Content envelopes
    /// record the generation they were encrypted under.
    pub key_id: u32,
    /// Unix timestamp when this record was created.
    pub created_at: i64,
}

/// Marker persisted while a password change is re-encrypting content.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingRekey {
    /// The record to commit once all content is rotated.
    pub record: ProtectionRecord,
    /// The generation being rotated away from.
    pub old_key_id: u32,
    /// The old content key, encrypted with the new one.
    pub old_key_wrapped: EncryptedData,
}

/// Storage for the protection record and the pending rekey marker.
pub trait ProtectionStore: Send + Sync {
    fn load(&self) -> SessionResult<Option<ProtectionRecord>>;
    fn store(&self, record: &ProtectionRecord) -> SessionResult<()>;
    fn load_pending(&self) -> SessionResult<Option<PendingRekey>>;
    fn store_pending(&self, pending: &PendingRekey) -> SessionResult<()>;
    fn clear_pending(&self) -> SessionResult<()>;
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryProtectionStore {
    state: Mutex<(Option<ProtectionRecord>, Option<PendingRekey>)>,
}

impl ProtectionStore for MemoryProtectionStore {
    fn load(&self) -> SessionResult<Option<ProtectionRecord>> {
        Ok(self.state.lock().unwrap().0.clone())
    }

    fn store(&self, record: &ProtectionRecord) -> SessionResult<()> {
        self.state.lock().unwrap().0 = Some(record.clone());
        Ok(())
    }

    fn load_pending(&self) -> SessionResult<Option<PendingRekey>> {
        Ok(self.state.lock().unwrap().1.clone())
    }

    fn store_pending(&self, pending: &PendingRekey) -> SessionResult<()> {
        self.state.lock().unwrap().1 = Some(pending.clone());
        Ok(())
    }

    fn clear_pending(&self) -> SessionResult<()> {
        self.state.lock().unwrap().1 = None;
        Ok(())
    }
}

#[derive(Default, Serialize, Deserialize)]
struct FileState {
    record: Option<ProtectionRecord>,
    pending: Option<PendingRekey>,
}

/// JSON-file-backed store. Writes go through a temp file and rename so a
/// crash never leaves a half-written record.
pub struct FileProtectionStore {
    path: PathBuf,
}

impl FileProtectionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_state(&self) -> SessionResult<FileState> {
        if !self.path.exists() {
            return Ok(FileState::default());
        }
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| SessionError::Persistence(e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| SessionError::Persistence(e.to_string()))
    }

    fn write_state(&self, state: &FileState) -> SessionResult<()> {
        let raw = serde_json::to_vec_pretty(state)
            .map_err(|e| SessionError::Persistence(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, raw).map_err(|e| SessionError::Persistence(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| SessionError::Persistence(e.to_string()))
    }
}

impl ProtectionStore for FileProtectionStore {
    fn load(&self) -> SessionResult<Option<ProtectionRecord>> {
        Ok(self.read_state()?.record)
    }

    fn store(&self, record: &ProtectionRecord) -> SessionResult<()> {
        let mut state = self.read_state()?;
        state.record = Some(record.clone());
        self.write_state(&state)
    }

    fn load_pending(&self) -> SessionResult<Option<PendingRekey>> {
        Ok(self.read_state()?.pending)
    }

    fn store_pending(&self, pending: &PendingRekey) -> SessionResult<()> {
        let mut state = self.read_state()?;
        state.pending = Some(pending.clone());
        self.write_state(&state)
    }

    fn clear_pending(&self) -> SessionResult<()> {
        let mut state = self.read_state()?;
        if state.pending.take().is_some() {
            self.write_state(&state)?;
        }
        Ok(())
    }
}
