pub mod config;
pub mod error;
pub mod types;

pub use error::{LocketError, LocketResult};
pub use types::{
    DeriveKeyOptions, EncryptionAlgorithm, EncryptionOptions, HashAlgorithm, InsertPositions,
    KdfParams,
};
