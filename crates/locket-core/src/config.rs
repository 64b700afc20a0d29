use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LocketError, LocketResult};
use crate::types::{
    DeriveKeyOptions, EncryptionAlgorithm, EncryptionOptions, HashAlgorithm, InsertPositions,
    KdfParams, DEFAULT_ITERATIONS, DEFAULT_KEY_LENGTH, DEFAULT_SALT_LENGTH,
};

/// Top-level configuration (loaded from locket.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocketConfig {
    pub crypto: CryptoConfig,
    pub store: StoreConfig,
    pub log: LogConfig,
}

/// Key derivation and envelope settings.
///
/// Every reader of a store must use the same values as its writer; only the
/// passphrase is allowed to vary between sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Encryption algorithm (default: AES-GCM)
    pub algorithm: EncryptionAlgorithm,
    /// PBKDF2 HMAC digest (default: SHA-512)
    pub hash: HashAlgorithm,
    /// PBKDF2 iterations (default: 200000)
    pub iterations: u32,
    /// Salt length in bytes (default: 16)
    pub salt_length: usize,
    /// Key length in bits (default: 256)
    pub key_length: u32,
    /// Envelope splice positions `[salt, iv]` (default: [5, 10])
    pub insert_positions: InsertPositions,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            algorithm: EncryptionAlgorithm::AesGcm,
            hash: HashAlgorithm::Sha512,
            iterations: DEFAULT_ITERATIONS,
            salt_length: DEFAULT_SALT_LENGTH,
            key_length: DEFAULT_KEY_LENGTH,
            insert_positions: InsertPositions::default(),
        }
    }
}

impl CryptoConfig {
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            salt_length: self.salt_length,
            iterations: self.iterations,
            hash: self.hash,
            key_length: self.key_length,
        }
    }

    /// Build session options for `passphrase` from this config.
    pub fn encryption_options(&self, passphrase: SecretString) -> EncryptionOptions {
        EncryptionOptions {
            algorithm: self.algorithm,
            derive: DeriveKeyOptions::with_params(passphrase, self.kdf_params()),
            insert_positions: self.insert_positions,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON key-value file holding the encrypted envelopes
    pub path: PathBuf,
    /// Storage key of the encrypted identifier set
    pub identifier_key: String,
    /// Storage key prefix for encrypted memos
    pub memo_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("~/.local/share/locket/store.json"),
            identifier_key: "locket.session-ids".into(),
            memo_prefix: "locket.memo".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl LocketConfig {
    /// Load config from `path`, falling back to defaults if the file is absent.
    pub fn load(path: &Path) -> LocketResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
            .map_err(|e| LocketError::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn parse(toml_str: &str) -> LocketResult<Self> {
        toml::from_str(toml_str).map_err(|e| LocketError::Config(e.to_string()))
    }
}

/// Expand `~` in path to the user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_default();
        PathBuf::from(format!("{home}/{rest}"))
    } else {
        path.to_path_buf()
    }
}
