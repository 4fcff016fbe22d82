//! Protected-session key lifecycle for Quill.
//!
//! A user password unlocks a "protected session": the content key derived
//! from the password is held in volatile memory by [`SessionKeyStore`] until
//! it is locked explicitly, idles out, or exceeds its max age. While the
//! session is locked, protected content remains readable only as ciphertext;
//! metadata operations keep working.
//!
//! [`ProtectedSessionManager`] is the UI-facing surface: setup, unlock,
//! lock, and the protection-record half of a password change. Key derivation
//! runs on `spawn_blocking` because Argon2id at real parameters takes
//! hundreds of milliseconds.

mod error;
mod key_store;
mod manager;
mod protection_store;

pub use error::{SessionError, SessionResult};
pub use key_store::{
    LockReason, SessionEvent, SessionKey, SessionKeyStore, SessionTimeouts,
};
pub use manager::{ProtectedSessionManager, RekeyTicket, MIN_PASSWORD_LEN};
pub use protection_store::{
    FileProtectionStore, MemoryProtectionStore, PendingRekey, ProtectionRecord, ProtectionStore,
};
