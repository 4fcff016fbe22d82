//! Batch re-encryption of protected content on password change.
//!
//! Envelopes carry the key generation they were encrypted under, and the
//! pending marker wraps the old key under the new one, so the job is
//! resumable with only the new password: already-rotated envelopes are
//! skipped, everything else is decrypted with the old key and re-encrypted
//! with the new one. Not transactional across records; idempotent resume
//! substitutes for atomicity.

use crate::envelope::ProtectedEnvelope;
use crate::error::ContentResult;
use crate::record::ContentStore;
use quill_crypto::{decrypt, encrypt};
use quill_session::{ProtectedSessionManager, RekeyTicket};
use tracing::{info, warn};

/// Counts reported by a re-encryption run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RekeyOutcome {
    /// Envelopes rotated to the new key.
    pub rotated: usize,
    /// Envelopes already at the new generation (resumed run).
    pub skipped: usize,
    /// Envelopes left untouched because they could not be read.
    pub failed: usize,
}

/// Changes the protection password, re-encrypting all protected content.
/// The session ends up unlocked under the new key.
pub async fn change_password(
    manager: &ProtectedSessionManager,
    store: &dyn ContentStore,
    old_password: &str,
    new_password: &str,
) -> ContentResult<RekeyOutcome> {
    let ticket = manager.begin_rekey(old_password, new_password).await?;
    let outcome = rotate_envelopes(store, &ticket)?;
    manager.commit_rekey(ticket)?;
    Ok(outcome)
}

/// Resumes an interrupted password change. Returns `None` when nothing is
/// pending.
pub async fn resume_change_password(
    manager: &ProtectedSessionManager,
    store: &dyn ContentStore,
    new_password: &str,
) -> ContentResult<Option<RekeyOutcome>> {
    match manager.resume_rekey(new_password).await? {
        Some(ticket) => {
            let outcome = rotate_envelopes(store, &ticket)?;
            manager.commit_rekey(ticket)?;
            Ok(Some(outcome))
        }
        None => Ok(None),
    }
}

fn rotate_envelopes(store: &dyn ContentStore, ticket: &RekeyTicket) -> ContentResult<RekeyOutcome> {
    let mut outcome = RekeyOutcome::default();

    for mut record in store.list_protected()? {
        let envelope = match ProtectedEnvelope::from_bytes(&record.content) {
            Ok(envelope) => envelope,
            Err(_) => {
                warn!(content_id = %record.content_id, "unparseable envelope, left untouched");
                outcome.failed += 1;
                continue;
            }
        };

        if envelope.key_id == ticket.new_key_id() {
            outcome.skipped += 1;
            continue;
        }
        if envelope.key_id != ticket.old_key_id() {
            warn!(
                content_id = %record.content_id,
                key_id = envelope.key_id,
                "envelope from unknown key generation, left untouched"
            );
            outcome.failed += 1;
            continue;
        }

        let plaintext = match decrypt(ticket.old_key(), &envelope.data) {
            Ok(plaintext) => plaintext,
            Err(_) => {
                warn!(
                    content_id = %record.content_id,
                    "envelope failed authentication, left untouched"
                );
                outcome.failed += 1;
                continue;
            }
        };

        let data = encrypt(ticket.new_key(), &plaintext)?;
        record.content = ProtectedEnvelope {
            key_id: ticket.new_key_id(),
            data,
        }
        .to_bytes()?;
        store.put(&record)?;
        outcome.rotated += 1;
    }

    info!(
        rotated = outcome.rotated,
        skipped = outcome.skipped,
        failed = outcome.failed,
        "protected content re-encryption pass finished"
    );
    Ok(outcome)
}
