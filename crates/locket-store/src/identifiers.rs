//! Encrypted list of session identifiers under a single storage key.
//!
//! The list is stored as one envelope over its JSON encoding. Every mutation
//! runs a full read, decrypt, decode, mutate, encode, encrypt, overwrite cycle
//! while holding the store's mutex.

use std::sync::{Arc, Mutex, PoisonError};

use locket_core::{LocketError, LocketResult};
use locket_crypto::EncryptionSession;

use crate::backend::KeyValueStore;
use crate::corrupted_on_decrypt;

pub const DEFAULT_IDENTIFIER_KEY: &str = "locket.session-ids";

pub struct SecureIdentifierStore<S: KeyValueStore> {
    backend: S,
    session: Arc<EncryptionSession>,
    storage_key: String,
    lock: Mutex<()>,
}

impl<S: KeyValueStore> SecureIdentifierStore<S> {
    pub fn new(backend: S, session: Arc<EncryptionSession>) -> Self {
        Self::with_storage_key(backend, session, DEFAULT_IDENTIFIER_KEY)
    }

    pub fn with_storage_key(
        backend: S,
        session: Arc<EncryptionSession>,
        storage_key: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            session,
            storage_key: storage_key.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// Append `id` unless it is already present.
    pub fn add_id(&self, id: &str) -> LocketResult<()> {
        self.modify(|ids| {
            if ids.iter().any(|existing| existing == id) {
                false
            } else {
                ids.push(id.to_string());
                true
            }
        })
    }

    pub fn has_id(&self, id: &str) -> LocketResult<bool> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.iter().any(|existing| existing == id))
    }

    /// Remove every occurrence of `id`.
    pub fn remove_id(&self, id: &str) -> LocketResult<()> {
        self.modify(|ids| {
            let before = ids.len();
            ids.retain(|existing| existing != id);
            ids.len() != before
        })
    }

    /// Clear the list. The stored value must still decrypt; use
    /// [`purge`](Self::purge) to recover from `StorageCorrupted`.
    pub fn reset(&self) -> LocketResult<()> {
        self.modify(|ids| {
            ids.clear();
            true
        })
    }

    /// Overwrite the stored value with an empty list without reading it.
    pub fn purge(&self) -> LocketResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.store(&[])?;
        tracing::info!(key = %self.storage_key, "identifier list purged");
        Ok(())
    }

    pub fn list_ids(&self) -> LocketResult<Vec<String>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.load()
    }

    fn modify(&self, mutate: impl FnOnce(&mut Vec<String>) -> bool) -> LocketResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ids = self.load()?;
        // Rewrite unconditionally so every mutation refreshes the IV.
        let changed = mutate(&mut ids);
        self.store(&ids)?;
        tracing::debug!(key = %self.storage_key, count = ids.len(), changed, "identifier list updated");
        Ok(())
    }

    /// Caller holds `self.lock`.
    fn load(&self) -> LocketResult<Vec<String>> {
        let Some(envelope) = self.backend.get(&self.storage_key)? else {
            self.store(&[])?;
            tracing::debug!(key = %self.storage_key, "initialized empty identifier list");
            return Ok(Vec::new());
        };

        let json = self
            .session
            .decrypt_data(&envelope)
            .map_err(|e| corrupted_on_decrypt(&self.storage_key, e))?;

        serde_json::from_str(&json).map_err(|e| {
            tracing::warn!(key = %self.storage_key, error = %e, "stored identifier list is not a JSON string array");
            LocketError::StorageCorrupted(format!("{}: {e}", self.storage_key))
        })
    }

    /// Caller holds `self.lock`.
    fn store(&self, ids: &[String]) -> LocketResult<()> {
        let json = serde_json::to_string(ids)
            .map_err(|e| LocketError::Storage(format!("encoding identifier list: {e}")))?;
        let envelope = self.session.encrypt_data(&json)?;
        self.backend.set(&self.storage_key, &envelope)
    }
}

impl<S: KeyValueStore> std::fmt::Debug for SecureIdentifierStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureIdentifierStore")
            .field("storage_key", &self.storage_key)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
