//! Identifier store scenarios over both backends.

use std::sync::Arc;

use locket_core::{EncryptionOptions, KdfParams, LocketError};
use locket_crypto::EncryptionSession;
use locket_store::{
    JsonFileStore, KeyValueStore, MemoryStore, SecureIdentifierStore, SecureMemoStore,
    DEFAULT_IDENTIFIER_KEY,
};
use secrecy::SecretString;
use tempfile::TempDir;

fn session(passphrase: &str) -> Arc<EncryptionSession> {
    let session = EncryptionSession::new();
    session
        .initialize(
            EncryptionOptions::aes_gcm(SecretString::from(passphrase)).with_params(KdfParams {
                iterations: 1000,
                ..Default::default()
            }),
        )
        .expect("initialize session");
    Arc::new(session)
}

#[test]
fn add_has_remove_reset() {
    let store = SecureIdentifierStore::new(MemoryStore::new(), session("scenario passphrase"));

    for id in ["s1", "s2", "s3"] {
        store.add_id(id).unwrap();
    }
    assert!(store.has_id("s2").unwrap());
    assert!(!store.has_id("s4").unwrap());

    store.remove_id("s2").unwrap();
    assert!(!store.has_id("s2").unwrap());
    assert_eq!(store.list_ids().unwrap(), vec!["s1", "s3"]);

    store.reset().unwrap();
    for id in ["s1", "s2", "s3"] {
        assert!(!store.has_id(id).unwrap());
    }
}

#[test]
fn backend_never_sees_plaintext_ids() {
    let store = SecureIdentifierStore::new(MemoryStore::new(), session("plaintext passphrase"));
    store.add_id("very-recognizable-id").unwrap();
    let stored = store.backend().get(DEFAULT_IDENTIFIER_KEY).unwrap().unwrap();
    assert!(!stored.contains("very-recognizable-id"));
    assert!(!stored.contains('['));
}

#[test]
fn corrupted_value_is_reported_not_emptied() {
    let backend = Arc::new(MemoryStore::new());
    let store = SecureIdentifierStore::new(Arc::clone(&backend), session("corrupt passphrase"));
    store.add_id("s1").unwrap();

    let envelope = backend.get(DEFAULT_IDENTIFIER_KEY).unwrap().unwrap();
    let mut bytes = envelope.into_bytes();
    let last = bytes.len() - 3;
    bytes[last] = if bytes[last] == b'A' { b'B' } else { b'A' };
    backend
        .set(DEFAULT_IDENTIFIER_KEY, &String::from_utf8(bytes).unwrap())
        .unwrap();

    assert!(matches!(
        store.has_id("s1"),
        Err(LocketError::StorageCorrupted(_))
    ));
    assert!(matches!(
        store.add_id("s2"),
        Err(LocketError::StorageCorrupted(_))
    ));
    assert!(matches!(
        store.reset(),
        Err(LocketError::StorageCorrupted(_))
    ));
    assert!(store.add_id("s2").unwrap_err().is_unlock_failure());
}

#[test]
fn wrong_passphrase_reads_as_corruption() {
    let backend = Arc::new(MemoryStore::new());
    SecureIdentifierStore::new(Arc::clone(&backend), session("owner passphrase"))
        .add_id("s1")
        .unwrap();

    let intruder = SecureIdentifierStore::new(backend, session("intruder passphrase"));
    assert!(matches!(
        intruder.has_id("s1"),
        Err(LocketError::StorageCorrupted(_))
    ));
}

#[test]
fn uninitialized_session_passes_through() {
    let store = SecureIdentifierStore::new(MemoryStore::new(), Arc::new(EncryptionSession::new()));
    assert!(matches!(
        store.add_id("s1"),
        Err(LocketError::NotInitialized)
    ));
    assert!(matches!(
        store.has_id("s1"),
        Err(LocketError::NotInitialized)
    ));
}

#[test]
fn json_store_survives_restart_with_same_passphrase() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("store.json");

    {
        let ids = SecureIdentifierStore::new(
            JsonFileStore::open(&path).unwrap(),
            session("restart passphrase"),
        );
        ids.add_id("s1").unwrap();
        ids.add_id("s2").unwrap();
    }

    // New process: fresh session salt, same passphrase.
    let ids = SecureIdentifierStore::new(
        JsonFileStore::open(&path).unwrap(),
        session("restart passphrase"),
    );
    assert_eq!(ids.list_ids().unwrap(), vec!["s1", "s2"]);
    ids.remove_id("s1").unwrap();

    let again = SecureIdentifierStore::new(
        JsonFileStore::open(&path).unwrap(),
        session("restart passphrase"),
    );
    assert_eq!(again.list_ids().unwrap(), vec!["s2"]);
}

#[test]
fn ids_and_memos_share_one_backend() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("store.json");
    let backend = Arc::new(JsonFileStore::open(&path).unwrap());
    let session = session("shared passphrase");

    let ids = SecureIdentifierStore::new(Arc::clone(&backend), Arc::clone(&session));
    let memos = SecureMemoStore::new(Arc::clone(&backend), Arc::clone(&session));
    ids.add_id("m1").unwrap();
    memos.put_memo("m1", "first memo").unwrap();

    let reopened = Arc::new(JsonFileStore::open(&path).unwrap());
    let memos = SecureMemoStore::new(Arc::clone(&reopened), Arc::clone(&session));
    let ids = SecureIdentifierStore::new(reopened, session);
    assert!(ids.has_id("m1").unwrap());
    assert_eq!(memos.get_memo("m1").unwrap().as_deref(), Some("first memo"));
}

#[test]
fn concurrent_adds_are_not_lost() {
    let store = Arc::new(SecureIdentifierStore::new(
        MemoryStore::new(),
        session("concurrent passphrase"),
    ));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..5 {
                    store.add_id(&format!("t{t}-{i}")).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let ids = store.list_ids().unwrap();
    assert_eq!(ids.len(), 40);
    for t in 0..8 {
        for i in 0..5 {
            assert!(ids.contains(&format!("t{t}-{i}")));
        }
    }
}
