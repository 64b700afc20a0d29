//! Key derivation: PBKDF2-HMAC passphrase → session key

use locket_core::types::validate_passphrase;
use locket_core::{DeriveKeyOptions, HashAlgorithm, KdfParams, LocketResult};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

/// A symmetric key derived from a passphrase (16, 24 or 32 bytes).
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct DerivedKey {
    bytes: Vec<u8>,
}

impl DerivedKey {
    pub(crate) fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Key length in bits
    pub fn bits(&self) -> usize {
        self.bytes.len() * 8
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bits", &self.bits())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A derived key together with the fresh salt it was derived from.
#[derive(Debug)]
pub struct DerivedKeyMaterial {
    pub key: DerivedKey,
    pub salt: Vec<u8>,
}

/// Derive a key from `options`, drawing a fresh random salt from the OS CSPRNG.
///
/// The salt is returned alongside the key so it can be embedded in every
/// envelope written with that key. Never reuse it for an unrelated derivation.
pub fn derive_key(options: &DeriveKeyOptions) -> LocketResult<DerivedKeyMaterial> {
    options.validate()?;

    let mut salt = vec![0u8; options.params.salt_length];
    OsRng.fill_bytes(&mut salt);

    let key = pbkdf2_into(&options.passphrase, &salt, &options.params);
    tracing::debug!(
        hash = %options.params.hash,
        iterations = options.params.iterations,
        key_bits = options.params.key_length,
        "derived session key"
    );

    Ok(DerivedKeyMaterial { key, salt })
}

/// Deterministically derive a key for a known salt.
///
/// Used at decrypt time to re-open envelopes that carry a salt other than
/// the current session's.
pub fn derive_key_with_salt(
    passphrase: &SecretString,
    salt: &[u8],
    params: &KdfParams,
) -> LocketResult<DerivedKey> {
    validate_passphrase(passphrase)?;
    params.validate()?;
    if salt.len() != params.salt_length {
        return Err(locket_core::LocketError::InvalidParameters(format!(
            "salt must be {} bytes, got {}",
            params.salt_length,
            salt.len()
        )));
    }
    Ok(pbkdf2_into(passphrase, salt, params))
}

fn pbkdf2_into(passphrase: &SecretString, salt: &[u8], params: &KdfParams) -> DerivedKey {
    let password = passphrase.expose_secret().as_bytes();
    let mut key = vec![0u8; params.key_bytes()];
    match params.hash {
        HashAlgorithm::Sha1 => {
            pbkdf2::pbkdf2_hmac::<sha1::Sha1>(password, salt, params.iterations, &mut key)
        }
        HashAlgorithm::Sha256 => {
            pbkdf2::pbkdf2_hmac::<sha2::Sha256>(password, salt, params.iterations, &mut key)
        }
        HashAlgorithm::Sha384 => {
            pbkdf2::pbkdf2_hmac::<sha2::Sha384>(password, salt, params.iterations, &mut key)
        }
        HashAlgorithm::Sha512 => {
            pbkdf2::pbkdf2_hmac::<sha2::Sha512>(password, salt, params.iterations, &mut key)
        }
    }
    DerivedKey::from_bytes(key)
}
