//! locket-crypto: client-side encryption of small local secrets
//!
//! Pipeline: passphrase → PBKDF2 → AES-GCM → spliced base64 envelope
//!
//! ```text
//! Session key (128/192/256-bit, PBKDF2-HMAC from passphrase + random salt)
//!   └── AES-GCM (key=session key, nonce=random 96-bit, AAD=empty)
//!         └── envelope = base64(ct || tag) with base64(salt) and base64(iv)
//!             spliced in at fixed character positions
//! ```
//!
//! The salt travels inside every envelope, so any envelope can be opened
//! again with nothing but the passphrase.

pub mod envelope;
pub mod kdf;
pub mod session;
pub mod strategy;

pub use envelope::{EnvelopeCodec, EnvelopeParts};
pub use kdf::{derive_key, derive_key_with_salt, DerivedKey, DerivedKeyMaterial};
pub use session::EncryptionSession;
pub use strategy::{build_strategy, build_strategy_async, AesGcmStrategy, EncryptionStrategy};

/// Size of an AES-GCM nonce (96-bit)
pub const IV_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Length of the base64 IV segment in an envelope
pub const IV_B64_LEN: usize = 16;
