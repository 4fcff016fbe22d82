//! Unlock/lock orchestration at the UI boundary.
//!
//! The manager owns the path from password to installed key: load the
//! protection record, derive the verifier off the async executor, compare in
//! constant time, then install the content key. It also drives the
//! protection-record side of a password change; walking and re-encrypting
//! the content itself belongs to the content layer.

use crate::error::{SessionError, SessionResult};
use crate::key_store::{SessionKey, SessionKeyStore};
use crate::protection_store::{PendingRekey, ProtectionRecord, ProtectionStore};
use quill_crypto::{
    decrypt, derive_content_key, derive_verifier, encrypt, DerivedKey, KdfParams, Salt,
    VerifierHash,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Minimum password length, enforced at setup and password change.
pub const MIN_PASSWORD_LEN: usize = 4;

/// Materials for an in-flight password change. Handed to the content layer's
/// batch re-encryption job; the keys live only as long as the ticket.
pub struct RekeyTicket {
    old_key: DerivedKey,
    new_key: DerivedKey,
    old_key_id: u32,
    pending: PendingRekey,
}

impl RekeyTicket {
    pub fn old_key(&self) -> &DerivedKey {
        &self.old_key
    }

    pub fn new_key(&self) -> &DerivedKey {
        &self.new_key
    }

    pub fn old_key_id(&self) -> u32 {
        self.old_key_id
    }

    pub fn new_key_id(&self) -> u32 {
        self.pending.record.key_id
    }
}

/// Orchestrates the protected-session lifecycle.
pub struct ProtectedSessionManager {
    store: Arc<SessionKeyStore>,
    records: Arc<dyn ProtectionStore>,
    kdf_params: KdfParams,
}

impl ProtectedSessionManager {
    pub fn new(store: Arc<SessionKeyStore>, records: Arc<dyn ProtectionStore>) -> Self {
        Self {
            store,
            records,
            kdf_params: KdfParams::default(),
        }
    }

    /// Overrides the KDF cost used for new protection records.
    pub fn with_kdf_params(mut self, kdf_params: KdfParams) -> Self {
        self.kdf_params = kdf_params;
        self
    }

    pub fn key_store(&self) -> &Arc<SessionKeyStore> {
        &self.store
    }

    /// Whether a protection record exists.
    pub fn is_set_up(&self) -> SessionResult<bool> {
        Ok(self.records.load()?.is_some())
    }

    /// First-time protection setup: generates a salt, persists the record and
    /// unlocks the fresh session.
    pub async fn setup(&self, password: &str) -> SessionResult<()> {
        check_password_length(password)?;
        if self.records.load()?.is_some() {
            return Err(SessionError::AlreadyInitialized);
        }

        let salt = Salt::random();
        let (key, verifier_hash) =
            derive_pair(password.to_string(), salt.clone(), self.kdf_params.clone()).await?;

        let record = ProtectionRecord {
            salt,
            verifier_hash,
            kdf_params: self.kdf_params.clone(),
            key_id: 1,
            created_at: chrono::Utc::now().timestamp(),
        };
        self.records.store(&record)?;
        self.store.install(SessionKey {
            key,
            key_id: record.key_id,
        });

        info!("protection set up");
        Ok(())
    }

    /// Unlocks the protected session. Safe to call repeatedly; a correct
    /// password during an unlocked session is a re-unlock, a wrong one fails
    /// without touching the installed key.
    pub async fn unlock(&self, password: &str) -> SessionResult<()> {
        let record = self.records.load()?.ok_or(SessionError::NotInitialized)?;

        let (key, verifier_hash) = derive_pair(
            password.to_string(),
            record.salt.clone(),
            record.kdf_params.clone(),
        )
        .await?;

        if verifier_hash != record.verifier_hash {
            warn!("unlock rejected: incorrect password");
            return Err(SessionError::IncorrectPassword);
        }

        self.store.install(SessionKey {
            key,
            key_id: record.key_id,
        });
        Ok(())
    }

    /// Locks the session, dropping the key.
    pub fn lock(&self) {
        self.store.clear();
    }

    /// Starts a password change: verifies the old password, derives the new
    /// materials and persists the pending marker. Content is untouched until
    /// the caller runs the re-encryption job and commits.
    pub async fn begin_rekey(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> SessionResult<RekeyTicket> {
        check_password_length(new_password)?;
        let record = self.records.load()?.ok_or(SessionError::NotInitialized)?;
        if self.records.load_pending()?.is_some() {
            return Err(SessionError::RekeyInProgress);
        }

        let (old_key, old_verifier) = derive_pair(
            old_password.to_string(),
            record.salt.clone(),
            record.kdf_params.clone(),
        )
        .await?;
        if old_verifier != record.verifier_hash {
            warn!("password change rejected: incorrect old password");
            return Err(SessionError::IncorrectPassword);
        }

        let new_salt = Salt::random();
        let (new_key, new_verifier) = derive_pair(
            new_password.to_string(),
            new_salt.clone(),
            self.kdf_params.clone(),
        )
        .await?;

        let pending = PendingRekey {
            record: ProtectionRecord {
                salt: new_salt,
                verifier_hash: new_verifier,
                kdf_params: self.kdf_params.clone(),
                key_id: record.key_id + 1,
                created_at: chrono::Utc::now().timestamp(),
            },
            old_key_id: record.key_id,
            old_key_wrapped: encrypt(&new_key, old_key.as_bytes())?,
        };
        self.records.store_pending(&pending)?;

        info!(
            old_key_id = record.key_id,
            new_key_id = pending.record.key_id,
            "password change started"
        );
        Ok(RekeyTicket {
            old_key,
            new_key,
            old_key_id: record.key_id,
            pending,
        })
    }

    /// Resumes an interrupted password change using only the new password.
    /// Returns `None` when no rekey is pending.
    pub async fn resume_rekey(&self, new_password: &str) -> SessionResult<Option<RekeyTicket>> {
        let Some(pending) = self.records.load_pending()? else {
            return Ok(None);
        };

        let (new_key, new_verifier) = derive_pair(
            new_password.to_string(),
            pending.record.salt.clone(),
            pending.record.kdf_params.clone(),
        )
        .await?;
        if new_verifier != pending.record.verifier_hash {
            warn!("rekey resume rejected: incorrect password");
            return Err(SessionError::IncorrectPassword);
        }

        let old_key_bytes = decrypt(&new_key, &pending.old_key_wrapped)?;
        let old_key = DerivedKey::from_slice(&old_key_bytes)?;

        info!(new_key_id = pending.record.key_id, "resuming password change");
        Ok(Some(RekeyTicket {
            old_key,
            new_key,
            old_key_id: pending.old_key_id,
            pending,
        }))
    }

    /// Commits a finished rekey: replaces the protection record, drops the
    /// marker and keeps the session unlocked under the new key.
    pub fn commit_rekey(&self, ticket: RekeyTicket) -> SessionResult<()> {
        self.records.store(&ticket.pending.record)?;
        self.records.clear_pending()?;
        self.store.install(SessionKey {
            key: ticket.new_key.clone(),
            key_id: ticket.pending.record.key_id,
        });

        info!(key_id = ticket.pending.record.key_id, "password change committed");
        Ok(())
    }
}

fn check_password_length(password: &str) -> SessionResult<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(SessionError::PasswordTooShort);
    }
    Ok(())
}

/// Runs both derivations on a blocking-capable thread; the KDF is
/// intentionally slow and must not stall unrelated request handling.
async fn derive_pair(
    password: String,
    salt: Salt,
    params: KdfParams,
) -> SessionResult<(DerivedKey, VerifierHash)> {
    tokio::task::spawn_blocking(move || -> SessionResult<(DerivedKey, VerifierHash)> {
        let verifier = derive_verifier(&password, &salt, &params)?;
        let key = derive_content_key(&password, &salt, &params)?;
        Ok((key, verifier))
    })
    .await
    .map_err(|e| SessionError::Internal(e.to_string()))?
}
