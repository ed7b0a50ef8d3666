//! Client-side file encryption.
//!
//! Files are sealed with AES-256-GCM under a key derived from the user's
//! password with PBKDF2-HMAC-SHA256. In convergent mode the salt is derived
//! from the file name, so the same password and name always yield the same
//! key. That makes identical uploads recognisable to the server, and it also
//! means two different files sharing a name share a key.

mod engine;

pub use engine::{
    ALGORITHM_AES_256_CBC, ALGORITHM_AES_256_GCM, DEFAULT_ITERATIONS, EncryptOptions,
    EncryptedFile, EncryptionEngine, IV_LEN, KDF_PBKDF2, KEY_LEN, SALT_LEN, TAG_LEN,
    convergent_salt,
};

/// Errors produced by the encryption engine.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("unsupported key derivation: {0}")]
    UnsupportedKeyDerivation(String),

    #[error("iteration count must be greater than zero")]
    InvalidIterations,

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("invalid encryption metadata: {0}")]
    InvalidMetadata(String),

    #[error("crypto task failed: {0}")]
    Task(String),
}
