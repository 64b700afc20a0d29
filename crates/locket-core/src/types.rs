use std::fmt;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{LocketError, LocketResult};

/// Minimum passphrase length, counted in characters
pub const MIN_PASSPHRASE_CHARS: usize = 8;
pub const MIN_SALT_LENGTH: usize = 8;
pub const MAX_SALT_LENGTH: usize = 64;
/// Recommended PBKDF2 floor; anything lower is rejected
pub const MIN_ITERATIONS: u32 = 1000;
pub const SUPPORTED_KEY_LENGTHS: [u32; 3] = [128, 192, 256];

pub const DEFAULT_SALT_LENGTH: usize = 16;
pub const DEFAULT_ITERATIONS: u32 = 200_000;
pub const DEFAULT_KEY_LENGTH: u32 = 256;

/// HMAC digest used by PBKDF2
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[serde(rename = "SHA-1")]
    Sha1,
    #[serde(rename = "SHA-256")]
    Sha256,
    #[serde(rename = "SHA-384")]
    Sha384,
    #[default]
    #[serde(rename = "SHA-512")]
    Sha512,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha256 => "SHA-256",
            HashAlgorithm::Sha384 => "SHA-384",
            HashAlgorithm::Sha512 => "SHA-512",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = LocketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SHA-1" | "SHA1" => Ok(HashAlgorithm::Sha1),
            "SHA-256" | "SHA256" => Ok(HashAlgorithm::Sha256),
            "SHA-384" | "SHA384" => Ok(HashAlgorithm::Sha384),
            "SHA-512" | "SHA512" => Ok(HashAlgorithm::Sha512),
            other => Err(LocketError::InvalidParameters(format!(
                "unsupported hash algorithm: {other}"
            ))),
        }
    }
}

/// Symmetric algorithm behind an encryption session.
///
/// Closed on purpose: adding a case forces every `match` over it to handle
/// the new algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncryptionAlgorithm {
    #[default]
    #[serde(rename = "AES-GCM")]
    AesGcm,
}

impl fmt::Display for EncryptionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptionAlgorithm::AesGcm => f.write_str("AES-GCM"),
        }
    }
}

/// Character offsets at which the salt and IV segments are spliced into an
/// envelope. Serialized as a two-element array `[salt, iv]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[usize; 2]", into = "[usize; 2]")]
pub struct InsertPositions {
    pub salt: usize,
    pub iv: usize,
}

impl InsertPositions {
    pub const fn new(salt: usize, iv: usize) -> Self {
        Self { salt, iv }
    }
}

impl Default for InsertPositions {
    fn default() -> Self {
        Self::new(5, 10)
    }
}

impl From<[usize; 2]> for InsertPositions {
    fn from(value: [usize; 2]) -> Self {
        Self::new(value[0], value[1])
    }
}

impl From<InsertPositions> for [usize; 2] {
    fn from(value: InsertPositions) -> Self {
        [value.salt, value.iv]
    }
}

/// Non-secret PBKDF2 parameters.
///
/// Kept by a strategy after the key is derived so that envelopes carrying a
/// different salt can be re-derived with the same settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Salt length in bytes (default: 16)
    pub salt_length: usize,
    /// PBKDF2 iteration count (default: 200000)
    pub iterations: u32,
    /// HMAC digest (default: SHA-512)
    pub hash: HashAlgorithm,
    /// Key length in bits: 128, 192 or 256 (default: 256)
    pub key_length: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            salt_length: DEFAULT_SALT_LENGTH,
            iterations: DEFAULT_ITERATIONS,
            hash: HashAlgorithm::default(),
            key_length: DEFAULT_KEY_LENGTH,
        }
    }
}

impl KdfParams {
    pub fn validate(&self) -> LocketResult<()> {
        if !(MIN_SALT_LENGTH..=MAX_SALT_LENGTH).contains(&self.salt_length) {
            return Err(LocketError::InvalidParameters(format!(
                "salt_length must be between {MIN_SALT_LENGTH} and {MAX_SALT_LENGTH} bytes, got {}",
                self.salt_length
            )));
        }
        if self.iterations < MIN_ITERATIONS {
            return Err(LocketError::InvalidParameters(format!(
                "iterations must be at least {MIN_ITERATIONS}, got {}",
                self.iterations
            )));
        }
        if !SUPPORTED_KEY_LENGTHS.contains(&self.key_length) {
            return Err(LocketError::InvalidParameters(format!(
                "key_length must be one of {SUPPORTED_KEY_LENGTHS:?} bits, got {}",
                self.key_length
            )));
        }
        Ok(())
    }

    /// Key length in bytes
    pub fn key_bytes(&self) -> usize {
        (self.key_length / 8) as usize
    }
}

/// Passphrase plus PBKDF2 parameters.
#[derive(Debug)]
pub struct DeriveKeyOptions {
    pub passphrase: SecretString,
    pub params: KdfParams,
}

impl DeriveKeyOptions {
    /// Options with default parameters for the given passphrase.
    pub fn new(passphrase: SecretString) -> Self {
        Self {
            passphrase,
            params: KdfParams::default(),
        }
    }

    pub fn with_params(passphrase: SecretString, params: KdfParams) -> Self {
        Self { passphrase, params }
    }

    pub fn validate(&self) -> LocketResult<()> {
        validate_passphrase(&self.passphrase)?;
        self.params.validate()
    }
}

pub fn validate_passphrase(passphrase: &SecretString) -> LocketResult<()> {
    let chars = passphrase.expose_secret().chars().count();
    if chars < MIN_PASSPHRASE_CHARS {
        return Err(LocketError::InvalidParameters(format!(
            "passphrase must be at least {MIN_PASSPHRASE_CHARS} characters, got {chars}"
        )));
    }
    Ok(())
}

/// Everything needed to initialize an encryption session.
#[derive(Debug)]
pub struct EncryptionOptions {
    pub algorithm: EncryptionAlgorithm,
    pub derive: DeriveKeyOptions,
    pub insert_positions: InsertPositions,
}

impl EncryptionOptions {
    /// AES-GCM with default KDF parameters and splice positions.
    pub fn aes_gcm(passphrase: SecretString) -> Self {
        Self {
            algorithm: EncryptionAlgorithm::AesGcm,
            derive: DeriveKeyOptions::new(passphrase),
            insert_positions: InsertPositions::default(),
        }
    }

    pub fn with_params(mut self, params: KdfParams) -> Self {
        self.derive.params = params;
        self
    }

    pub fn with_insert_positions(mut self, positions: InsertPositions) -> Self {
        self.insert_positions = positions;
        self
    }
}
