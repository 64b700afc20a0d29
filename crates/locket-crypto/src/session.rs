//! Encryption session: holds the single active strategy.
//!
//! A session is an explicit object shared through `Arc`, not a global.
//! Initialization is serialized, and readers grab a clone of the active
//! strategy so an in-flight call always completes under one consistent key
//! even if the session is re-initialized concurrently.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use locket_core::{EncryptionAlgorithm, EncryptionOptions, LocketError, LocketResult};

use crate::strategy::{build_strategy, build_strategy_async, EncryptionStrategy};

#[derive(Default)]
pub struct EncryptionSession {
    active: RwLock<Option<Arc<dyn EncryptionStrategy>>>,
    init: Mutex<()>,
}

impl EncryptionSession {
    /// An uninitialized session; every encrypt/decrypt fails with
    /// `NotInitialized` until [`initialize`](Self::initialize) succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a key from `options` and make it the active strategy.
    ///
    /// Replaces (and drops) any previously active key. On error the previous
    /// strategy stays active.
    pub fn initialize(&self, options: EncryptionOptions) -> LocketResult<()> {
        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        let strategy = build_strategy(options)?;
        self.install(strategy);
        Ok(())
    }

    /// Async variant of [`initialize`](Self::initialize); PBKDF2 runs on the
    /// blocking pool and the strategy only becomes visible once fully derived.
    pub async fn initialize_async(&self, options: EncryptionOptions) -> LocketResult<()> {
        let strategy = build_strategy_async(options).await?;
        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        self.install(strategy);
        Ok(())
    }

    fn install(&self, strategy: Arc<dyn EncryptionStrategy>) {
        let algorithm = strategy.algorithm();
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        let replaced = active.replace(strategy).is_some();
        tracing::info!(%algorithm, replaced, "encryption session initialized");
    }

    pub fn is_initialized(&self) -> bool {
        self.read_active().is_some()
    }

    pub fn algorithm(&self) -> Option<EncryptionAlgorithm> {
        self.read_active().map(|s| s.algorithm())
    }

    /// Drop the active key, returning the session to the uninitialized state.
    pub fn lock(&self) {
        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        if active.take().is_some() {
            tracing::info!("encryption session locked");
        }
    }

    pub fn encrypt_data(&self, plaintext: &str) -> LocketResult<String> {
        self.strategy()?.encrypt(plaintext)
    }

    pub fn decrypt_data(&self, envelope: &str) -> LocketResult<String> {
        self.strategy()?.decrypt(envelope)
    }

    fn read_active(&self) -> Option<Arc<dyn EncryptionStrategy>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn strategy(&self) -> LocketResult<Arc<dyn EncryptionStrategy>> {
        self.read_active().ok_or_else(|| {
            tracing::error!("encryption used before initialize; this is a caller bug");
            LocketError::NotInitialized
        })
    }
}

impl std::fmt::Debug for EncryptionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionSession")
            .field("algorithm", &self.algorithm())
            .finish()
    }
}
