use thiserror::Error;

pub type LocketResult<T> = Result<T, LocketError>;

#[derive(Debug, Error)]
pub enum LocketError {
    /// Bad derivation or codec parameters; the caller can correct its input.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// AES-GCM tag did not verify (tampering, wrong key, or corrupted envelope).
    #[error("authentication failed: envelope was tampered with or the key is wrong")]
    AuthenticationFailed,

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Decryption succeeded but the plaintext is not valid UTF-8.
    #[error("decoded plaintext is not valid UTF-8: {0}")]
    DecodeError(String),

    #[error("encryption session is not initialized")]
    NotInitialized,

    #[error("secure storage is corrupted: {0}")]
    StorageCorrupted(String),

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LocketError {
    /// Failures a user should only ever see as "cannot unlock local data".
    pub fn is_unlock_failure(&self) -> bool {
        matches!(
            self,
            LocketError::AuthenticationFailed
                | LocketError::MalformedEnvelope(_)
                | LocketError::StorageCorrupted(_)
        )
    }
}
