//! locket-store: encrypted local persistence over a key-value backend
//!
//! Every value written through this crate is an envelope produced by a
//! shared `EncryptionSession`; plaintext never reaches the backend.
//!
//! Backends:
//!   - **Memory**: process-local `HashMap`, for tests and ephemeral use.
//!   - **JSON file**: one JSON object on disk, rewritten atomically (temp + rename).

pub mod backend;
pub mod identifiers;
pub mod memo;

pub use backend::{JsonFileStore, KeyValueStore, MemoryStore};
pub use identifiers::{SecureIdentifierStore, DEFAULT_IDENTIFIER_KEY};
pub use memo::{SecureMemoStore, DEFAULT_MEMO_PREFIX};

use locket_core::LocketError;

/// Map a decryption failure on stored data to `StorageCorrupted`.
///
/// `NotInitialized` and infrastructure errors pass through unchanged: they say
/// nothing about the stored bytes.
pub(crate) fn corrupted_on_decrypt(storage_key: &str, err: LocketError) -> LocketError {
    match err {
        LocketError::AuthenticationFailed
        | LocketError::MalformedEnvelope(_)
        | LocketError::DecodeError(_) => {
            tracing::warn!(key = storage_key, error = %err, "stored envelope failed to decrypt");
            LocketError::StorageCorrupted(format!("{storage_key}: {err}"))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decrypt_failures_become_corruption() {
        for err in [
            LocketError::AuthenticationFailed,
            LocketError::MalformedEnvelope("too short".into()),
            LocketError::DecodeError("invalid utf-8 sequence".into()),
        ] {
            match corrupted_on_decrypt("locket.session-ids", err) {
                LocketError::StorageCorrupted(msg) => {
                    assert!(msg.starts_with("locket.session-ids: "), "{msg}")
                }
                other => panic!("expected StorageCorrupted, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_other_errors_pass_through() {
        assert!(matches!(
            corrupted_on_decrypt("k", LocketError::NotInitialized),
            LocketError::NotInitialized
        ));
        assert!(matches!(
            corrupted_on_decrypt("k", LocketError::Storage("disk full".into())),
            LocketError::Storage(msg) if msg == "disk full"
        ));
        assert!(matches!(
            corrupted_on_decrypt("k", LocketError::InvalidParameters("salt".into())),
            LocketError::InvalidParameters(_)
        ));
    }
}
