//! Encrypted memo contents, one envelope per memo id.

use std::sync::Arc;

use locket_core::LocketResult;
use locket_crypto::EncryptionSession;

use crate::backend::KeyValueStore;
use crate::corrupted_on_decrypt;

pub const DEFAULT_MEMO_PREFIX: &str = "locket.memo";

pub struct SecureMemoStore<S: KeyValueStore> {
    backend: S,
    session: Arc<EncryptionSession>,
    prefix: String,
}

impl<S: KeyValueStore> SecureMemoStore<S> {
    pub fn new(backend: S, session: Arc<EncryptionSession>) -> Self {
        Self::with_prefix(backend, session, DEFAULT_MEMO_PREFIX)
    }

    pub fn with_prefix(
        backend: S,
        session: Arc<EncryptionSession>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            session,
            prefix: prefix.into(),
        }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// Backend key for a memo id: `"{prefix}:{id}"`.
    pub fn storage_key(&self, id: &str) -> String {
        format!("{}:{id}", self.prefix)
    }

    pub fn put_memo(&self, id: &str, content: &str) -> LocketResult<()> {
        let envelope = self.session.encrypt_data(content)?;
        self.backend.set(&self.storage_key(id), &envelope)?;
        tracing::debug!(memo = id, "memo stored");
        Ok(())
    }

    /// `Ok(None)` when no memo is stored under `id`.
    pub fn get_memo(&self, id: &str) -> LocketResult<Option<String>> {
        let key = self.storage_key(id);
        let Some(envelope) = self.backend.get(&key)? else {
            return Ok(None);
        };
        self.session
            .decrypt_data(&envelope)
            .map(Some)
            .map_err(|e| corrupted_on_decrypt(&key, e))
    }

    pub fn delete_memo(&self, id: &str) -> LocketResult<()> {
        self.backend.remove(&self.storage_key(id))?;
        tracing::debug!(memo = id, "memo deleted");
        Ok(())
    }
}

impl<S: KeyValueStore> std::fmt::Debug for SecureMemoStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureMemoStore")
            .field("prefix", &self.prefix)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
