use quill_crypto::KdfParams;
use quill_session::{
    FileProtectionStore, LockReason, MemoryProtectionStore, ProtectedSessionManager,
    ProtectionStore, SessionError, SessionEvent, SessionKeyStore, SessionTimeouts,
};
use std::sync::Arc;
use std::time::Duration;

fn test_manager() -> ProtectedSessionManager {
    ProtectedSessionManager::new(
        Arc::new(SessionKeyStore::default()),
        Arc::new(MemoryProtectionStore::default()),
    )
    .with_kdf_params(KdfParams::fast_insecure())
}

// ── Setup ────────────────────────────────────────────────────────

#[tokio::test]
async fn setup_installs_key() {
    let manager = test_manager();
    assert!(!manager.is_set_up().unwrap());

    manager.setup("secret-password").await.unwrap();

    assert!(manager.is_set_up().unwrap());
    assert!(manager.key_store().is_available());
}

#[tokio::test]
async fn setup_twice_fails() {
    let manager = test_manager();
    manager.setup("secret-password").await.unwrap();

    assert!(matches!(
        manager.setup("another-password").await,
        Err(SessionError::AlreadyInitialized)
    ));
}

#[tokio::test]
async fn short_password_rejected() {
    let manager = test_manager();
    assert!(matches!(
        manager.setup("abc").await,
        Err(SessionError::PasswordTooShort)
    ));
    assert!(!manager.is_set_up().unwrap());
}

// ── Unlock / lock ────────────────────────────────────────────────

#[tokio::test]
async fn unlock_with_correct_password() {
    let manager = test_manager();
    manager.setup("secret-password").await.unwrap();
    manager.lock();
    assert!(!manager.key_store().is_available());

    manager.unlock("secret-password").await.unwrap();
    assert!(manager.key_store().is_available());
}

#[tokio::test]
async fn unlock_with_wrong_password_never_installs_key() {
    let manager = test_manager();
    manager.setup("secret-password").await.unwrap();
    manager.lock();

    let result = manager.unlock("wrong-password").await;
    assert!(matches!(result, Err(SessionError::IncorrectPassword)));
    assert!(!manager.key_store().is_available());
}

#[tokio::test]
async fn unlock_before_setup_fails() {
    let manager = test_manager();
    assert!(matches!(
        manager.unlock("secret-password").await,
        Err(SessionError::NotInitialized)
    ));
}

#[tokio::test]
async fn repeated_unlock_is_idempotent() {
    let manager = test_manager();
    manager.setup("secret-password").await.unwrap();

    manager.unlock("secret-password").await.unwrap();
    manager.unlock("secret-password").await.unwrap();
    assert!(manager.key_store().is_available());

    // a wrong password during an unlocked session fails but keeps the key
    assert!(matches!(
        manager.unlock("wrong-password").await,
        Err(SessionError::IncorrectPassword)
    ));
    assert!(manager.key_store().is_available());
}

#[tokio::test]
async fn concurrent_unlocks_leave_one_key_installed() {
    let manager = Arc::new(test_manager());
    manager.setup("secret-password").await.unwrap();
    manager.lock();

    let a = {
        let m = manager.clone();
        tokio::spawn(async move { m.unlock("secret-password").await })
    };
    let b = {
        let m = manager.clone();
        tokio::spawn(async move { m.unlock("secret-password").await })
    };

    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    assert!(manager.key_store().is_available());
    let key = manager.key_store().get().unwrap();
    assert_eq!(key.key_id, 1);
}

// ── Expiry ───────────────────────────────────────────────────────

#[tokio::test]
async fn idle_timeout_locks_session() {
    let store = Arc::new(SessionKeyStore::new(SessionTimeouts {
        idle: Duration::from_millis(40),
        max_age: None,
    }));
    let manager = ProtectedSessionManager::new(store.clone(), Arc::new(MemoryProtectionStore::default()))
        .with_kdf_params(KdfParams::fast_insecure());

    manager.setup("secret-password").await.unwrap();
    assert!(store.is_available());

    tokio::time::sleep(Duration::from_millis(70)).await;
    assert!(!store.is_available());
    assert!(matches!(store.get(), Err(SessionError::Locked)));
}

#[tokio::test]
async fn lock_event_reaches_subscribers() {
    let manager = test_manager();
    let mut events = manager.key_store().subscribe();

    manager.setup("secret-password").await.unwrap();
    manager.lock();

    assert_eq!(events.recv().await.unwrap(), SessionEvent::Unlocked);
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::Locked {
            reason: LockReason::Explicit
        }
    );
}

// ── Protection record persistence ────────────────────────────────

#[tokio::test]
async fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("protection.json");

    {
        let manager = ProtectedSessionManager::new(
            Arc::new(SessionKeyStore::default()),
            Arc::new(FileProtectionStore::new(&path)),
        )
        .with_kdf_params(KdfParams::fast_insecure());
        manager.setup("secret-password").await.unwrap();
    }

    // fresh store and manager over the same file
    let manager = ProtectedSessionManager::new(
        Arc::new(SessionKeyStore::default()),
        Arc::new(FileProtectionStore::new(&path)),
    );
    assert!(manager.is_set_up().unwrap());
    manager.unlock("secret-password").await.unwrap();
    assert!(manager.key_store().is_available());

    assert!(matches!(
        manager.unlock("wrong-password").await,
        Err(SessionError::IncorrectPassword)
    ));
}

#[tokio::test]
async fn file_store_round_trips_record_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("protection.json");
    let store = FileProtectionStore::new(&path);

    assert!(store.load().unwrap().is_none());
    assert!(store.load_pending().unwrap().is_none());

    let manager = ProtectedSessionManager::new(
        Arc::new(SessionKeyStore::default()),
        Arc::new(FileProtectionStore::new(&path)),
    )
    .with_kdf_params(KdfParams::fast_insecure());
    manager.setup("secret-password").await.unwrap();

    let record = store.load().unwrap().unwrap();
    assert_eq!(record.key_id, 1);
    assert_eq!(record.kdf_params, KdfParams::fast_insecure());
}
