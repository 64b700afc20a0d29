//! Encryption strategies behind a session
//!
//! Only AES-GCM exists today. Strategies are chosen by the closed
//! [`EncryptionAlgorithm`] enum, so a new algorithm is a new match arm in
//! [`build_strategy`] rather than a new string tag.

use std::sync::{Arc, Mutex, PoisonError};

use aes_gcm::{
    aead::{consts::U12, Aead, KeyInit},
    aes::Aes192,
    Aes128Gcm, Aes256Gcm, AesGcm,
};
use locket_core::{
    EncryptionAlgorithm, EncryptionOptions, KdfParams, LocketError, LocketResult,
};
use rand::{rngs::OsRng, RngCore};
use secrecy::SecretString;

use crate::envelope::{EnvelopeCodec, EnvelopeParts};
use crate::kdf::{derive_key, derive_key_with_salt, DerivedKey};
use crate::IV_SIZE;

type Aes192Gcm = AesGcm<Aes192, U12>;

/// A symmetric scheme that turns UTF-8 text into a self-describing envelope
/// string and back.
pub trait EncryptionStrategy: Send + Sync {
    fn algorithm(&self) -> EncryptionAlgorithm;
    fn encrypt(&self, plaintext: &str) -> LocketResult<String>;
    fn decrypt(&self, envelope: &str) -> LocketResult<String>;
}

/// Build the strategy selected by `options.algorithm`, deriving its key.
pub fn build_strategy(options: EncryptionOptions) -> LocketResult<Arc<dyn EncryptionStrategy>> {
    match options.algorithm {
        EncryptionAlgorithm::AesGcm => Ok(Arc::new(AesGcmStrategy::derive(options)?)),
    }
}

/// Like [`build_strategy`], but runs key derivation on tokio's blocking pool.
pub async fn build_strategy_async(
    options: EncryptionOptions,
) -> LocketResult<Arc<dyn EncryptionStrategy>> {
    tokio::task::spawn_blocking(move || build_strategy(options))
        .await
        .map_err(|e| anyhow::anyhow!("key derivation task failed: {e}"))?
}

/// AES-GCM over a PBKDF2-derived key (128, 192 or 256 bits).
///
/// Has no public constructor besides [`AesGcmStrategy::derive`]; an instance
/// always holds a fully derived key.
pub struct AesGcmStrategy {
    passphrase: SecretString,
    params: KdfParams,
    key: DerivedKey,
    salt: Vec<u8>,
    codec: EnvelopeCodec,
    /// Last key re-derived for an envelope written under another salt
    rederived: Mutex<Option<(Vec<u8>, DerivedKey)>>,
}

impl AesGcmStrategy {
    /// Derive a fresh key from `options` and return a ready strategy.
    pub fn derive(options: EncryptionOptions) -> LocketResult<Self> {
        if options.algorithm != EncryptionAlgorithm::AesGcm {
            return Err(LocketError::InvalidParameters(format!(
                "AesGcmStrategy cannot serve {}",
                options.algorithm
            )));
        }
        let material = derive_key(&options.derive)?;
        let params = options.derive.params;

        Ok(Self {
            passphrase: options.derive.passphrase,
            params,
            key: material.key,
            salt: material.salt,
            codec: EnvelopeCodec::new(params.salt_length, options.insert_positions)?,
            rederived: Mutex::new(None),
        })
    }

    /// Salt the session key was derived from (embedded in every envelope).
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn codec(&self) -> &EnvelopeCodec {
        &self.codec
    }

    /// Resolve the key for an envelope's salt, re-deriving if it is not ours.
    fn key_for_salt(&self, salt: &[u8]) -> LocketResult<DerivedKey> {
        if salt == self.salt.as_slice() {
            return Ok(self.key.clone());
        }

        let mut cached = self
            .rederived
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some((cached_salt, key)) = cached.as_ref() {
            if cached_salt.as_slice() == salt {
                return Ok(key.clone());
            }
        }

        tracing::debug!("envelope salt differs from session salt, re-deriving key");
        let key = derive_key_with_salt(&self.passphrase, salt, &self.params)?;
        *cached = Some((salt.to_vec(), key.clone()));
        Ok(key)
    }
}

impl EncryptionStrategy for AesGcmStrategy {
    fn algorithm(&self) -> EncryptionAlgorithm {
        EncryptionAlgorithm::AesGcm
    }

    fn encrypt(&self, plaintext: &str) -> LocketResult<String> {
        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);

        let ciphertext_and_tag = seal(&self.key, &iv, plaintext.as_bytes())?;

        self.codec.encode(&EnvelopeParts {
            salt: self.salt.clone(),
            iv,
            ciphertext_and_tag,
        })
    }

    fn decrypt(&self, envelope: &str) -> LocketResult<String> {
        let parts = self.codec.decode(envelope)?;
        let key = self.key_for_salt(&parts.salt)?;
        let plaintext = open(&key, &parts.iv, &parts.ciphertext_and_tag)?;

        String::from_utf8(plaintext).map_err(|e| LocketError::DecodeError(e.to_string()))
    }
}

impl std::fmt::Debug for AesGcmStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmStrategy")
            .field("params", &self.params)
            .field("key", &self.key)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

/// AES-GCM encrypt with the cipher width matching the key; returns ct || tag.
fn seal(key: &DerivedKey, iv: &[u8; IV_SIZE], plaintext: &[u8]) -> LocketResult<Vec<u8>> {
    match key.bits() {
        128 => seal_with::<Aes128Gcm>(key.as_bytes(), iv, plaintext),
        192 => seal_with::<Aes192Gcm>(key.as_bytes(), iv, plaintext),
        256 => seal_with::<Aes256Gcm>(key.as_bytes(), iv, plaintext),
        bits => Err(LocketError::InvalidParameters(format!(
            "unsupported AES key size: {bits} bits"
        ))),
    }
}

/// AES-GCM decrypt; any tag mismatch is `AuthenticationFailed`.
fn open(key: &DerivedKey, iv: &[u8; IV_SIZE], ciphertext_and_tag: &[u8]) -> LocketResult<Vec<u8>> {
    match key.bits() {
        128 => open_with::<Aes128Gcm>(key.as_bytes(), iv, ciphertext_and_tag),
        192 => open_with::<Aes192Gcm>(key.as_bytes(), iv, ciphertext_and_tag),
        256 => open_with::<Aes256Gcm>(key.as_bytes(), iv, ciphertext_and_tag),
        bits => Err(LocketError::InvalidParameters(format!(
            "unsupported AES key size: {bits} bits"
        ))),
    }
}

fn seal_with<C>(key: &[u8], iv: &[u8; IV_SIZE], plaintext: &[u8]) -> LocketResult<Vec<u8>>
where
    C: KeyInit + Aead<NonceSize = U12>,
{
    let cipher = C::new_from_slice(key)
        .map_err(|e| LocketError::InvalidParameters(format!("AES key: {e}")))?;
    cipher
        .encrypt(iv.into(), plaintext)
        .map_err(|e| LocketError::Encryption(format!("AES-GCM encryption failed: {e}")))
}

fn open_with<C>(key: &[u8], iv: &[u8; IV_SIZE], ciphertext_and_tag: &[u8]) -> LocketResult<Vec<u8>>
where
    C: KeyInit + Aead<NonceSize = U12>,
{
    let cipher = C::new_from_slice(key)
        .map_err(|e| LocketError::InvalidParameters(format!("AES key: {e}")))?;
    cipher
        .decrypt(iv.into(), ciphertext_and_tag)
        .map_err(|_| LocketError::AuthenticationFailed)
}
