//! Process-wide holder of the derived session key.
//!
//! The store owns the only copy of the content key. Everything that wants to
//! decrypt goes through `get()`, which is also where expiry is enforced:
//! exceeding the idle window (or the optional absolute max age) drops the key
//! and broadcasts a lock event so UI widgets can hide protected content.
//!
//! The store is an explicit instance rather than an ambient singleton so
//! tests can create isolated stores per case.

use crate::error::{SessionError, SessionResult};
use quill_crypto::DerivedKey;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Why the session key was dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockReason {
    /// The user (or a collaborator) requested a lock.
    Explicit,
    /// No access within the configured idle window.
    IdleTimeout,
    /// The key exceeded its absolute maximum age.
    MaxAgeExceeded,
}

/// Lifecycle notifications for UI subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A key was installed (fresh unlock or re-unlock).
    Unlocked,
    /// The key was dropped; protected content is no longer readable.
    Locked { reason: LockReason },
}

/// Expiry policy for an installed session key.
#[derive(Clone, Debug)]
pub struct SessionTimeouts {
    /// Idle window; every successful `get()` refreshes it.
    pub idle: Duration,
    /// Optional absolute cap measured from install time.
    pub max_age: Option<Duration>,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            idle: Duration::from_secs(600),
            max_age: None,
        }
    }
}

/// The content key currently in force, tagged with the protection-record
/// generation it belongs to. Content envelopes record the same generation so
/// an interrupted password change can be resumed.
#[derive(Clone)]
pub struct SessionKey {
    pub key: DerivedKey,
    pub key_id: u32,
}

struct ActiveSession {
    key: SessionKey,
    installed_at: Instant,
    last_access: Instant,
}

/// Holds at most one session key; `install`/`clear` are atomic with respect
/// to concurrent `get`/`is_available` calls.
pub struct SessionKeyStore {
    session: Mutex<Option<ActiveSession>>,
    timeouts: SessionTimeouts,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionKeyStore {
    pub fn new(timeouts: SessionTimeouts) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            session: Mutex::new(None),
            timeouts,
            events,
        }
    }

    /// Subscribe to lock/unlock notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Installs a key, replacing any previous one. A second install during an
    /// unlocked session is an explicit re-unlock, never a merge of two keys.
    pub fn install(&self, key: SessionKey) {
        let now = Instant::now();
        let mut guard = self.session.lock().unwrap();
        let reinstall = guard.is_some();
        *guard = Some(ActiveSession {
            key,
            installed_at: now,
            last_access: now,
        });
        drop(guard);

        if reinstall {
            debug!("protected session re-unlocked, previous key replaced");
        } else {
            info!("protected session unlocked");
        }
        let _ = self.events.send(SessionEvent::Unlocked);
    }

    /// True iff a key is installed and not expired.
    pub fn is_available(&self) -> bool {
        let mut guard = self.session.lock().unwrap();
        if let Some(reason) = Self::expire_in_place(&self.timeouts, &mut guard) {
            drop(guard);
            self.notify_expired(reason);
            return false;
        }
        guard.is_some()
    }

    /// Returns the current key or a typed locked error. Refreshes the idle
    /// window on success. This is the single synchronization point gating
    /// all decrypt attempts.
    pub fn get(&self) -> SessionResult<SessionKey> {
        let mut guard = self.session.lock().unwrap();
        if let Some(reason) = Self::expire_in_place(&self.timeouts, &mut guard) {
            drop(guard);
            self.notify_expired(reason);
            return Err(SessionError::Locked);
        }
        match guard.as_mut() {
            Some(active) => {
                active.last_access = Instant::now();
                Ok(active.key.clone())
            }
            None => Err(SessionError::Locked),
        }
    }

    /// Drops the key and notifies subscribers. No-op when already locked.
    pub fn clear(&self) {
        self.clear_with_reason(LockReason::Explicit);
    }

    fn clear_with_reason(&self, reason: LockReason) {
        let mut guard = self.session.lock().unwrap();
        let had_key = guard.take().is_some();
        drop(guard);

        if had_key {
            info!(?reason, "protected session locked");
            let _ = self.events.send(SessionEvent::Locked { reason });
        }
    }

    /// Advisory expiry check, for periodic sweeps. Expiry is enforced on
    /// access regardless; this only makes the lock broadcast arrive closer
    /// to the deadline.
    pub fn sweep(&self) {
        let mut guard = self.session.lock().unwrap();
        if let Some(reason) = Self::expire_in_place(&self.timeouts, &mut guard) {
            drop(guard);
            self.notify_expired(reason);
        }
    }

    /// Spawns a background task sweeping the store at `period`. Abort the
    /// returned handle to stop it.
    pub fn spawn_sweeper(store: Arc<SessionKeyStore>, period: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                store.sweep();
            }
        })
    }

    /// Drops the key in place when expired; returns the reason if it did.
    fn expire_in_place(
        timeouts: &SessionTimeouts,
        guard: &mut Option<ActiveSession>,
    ) -> Option<LockReason> {
        let active = guard.as_ref()?;
        let now = Instant::now();

        let reason = if timeouts
            .max_age
            .is_some_and(|max| now.duration_since(active.installed_at) >= max)
        {
            Some(LockReason::MaxAgeExceeded)
        } else if now.duration_since(active.last_access) >= timeouts.idle {
            Some(LockReason::IdleTimeout)
        } else {
            None
        };

        if reason.is_some() {
            // DerivedKey zeroizes on drop
            *guard = None;
        }
        reason
    }

    fn notify_expired(&self, reason: LockReason) {
        info!(?reason, "protected session expired");
        let _ = self.events.send(SessionEvent::Locked { reason });
    }
}

impl Default for SessionKeyStore {
    fn default() -> Self {
        Self::new(SessionTimeouts::default())
    }
}
