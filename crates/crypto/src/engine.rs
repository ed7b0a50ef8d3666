use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use tracing::debug;

use clouddisk_protocol::EncryptionMetadata;
use clouddisk_transfer::{checksum_bytes, compare_hashes};

use crate::CryptoError;

pub const ALGORITHM_AES_256_GCM: &str = "AES-256-GCM";
/// Recognised on the wire but never produced or accepted here.
pub const ALGORITHM_AES_256_CBC: &str = "AES-256-CBC";
pub const KDF_PBKDF2: &str = "PBKDF2";
pub const DEFAULT_ITERATIONS: u32 = 100_000;

pub const SALT_LEN: usize = 16;
pub const IV_LEN: usize = 12;
pub const KEY_LEN: usize = 32;
pub const TAG_LEN: usize = 16;

/// Encryption parameters chosen by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptOptions {
    pub algorithm: String,
    pub key_derivation: String,
    pub iterations: u32,
    /// Derive the salt from the file name instead of drawing it at random.
    pub convergent: bool,
}

impl Default for EncryptOptions {
    fn default() -> Self {
        Self {
            algorithm: ALGORITHM_AES_256_GCM.into(),
            key_derivation: KDF_PBKDF2.into(),
            iterations: DEFAULT_ITERATIONS,
            convergent: false,
        }
    }
}

impl EncryptOptions {
    /// Default options in convergent mode.
    pub fn convergent() -> Self {
        Self {
            convergent: true,
            ..Self::default()
        }
    }
}

/// Ciphertext together with the metadata needed to decrypt it.
#[derive(Debug, Clone)]
pub struct EncryptedFile {
    /// AES-GCM output, authentication tag appended.
    pub ciphertext: Vec<u8>,
    pub metadata: EncryptionMetadata,
}

/// Deterministic salt for convergent mode: the first 16 bytes of
/// SHA-256(file name).
pub fn convergent_salt(file_name: &str) -> [u8; SALT_LEN] {
    let digest = Sha256::digest(file_name.as_bytes());
    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&digest[..SALT_LEN]);
    salt
}

fn check_algorithm(algorithm: &str, key_derivation: &str, iterations: u32) -> Result<(), CryptoError> {
    if !algorithm.eq_ignore_ascii_case(ALGORITHM_AES_256_GCM) {
        return Err(CryptoError::UnsupportedAlgorithm(algorithm.to_string()));
    }
    if !key_derivation.eq_ignore_ascii_case(KDF_PBKDF2) {
        return Err(CryptoError::UnsupportedKeyDerivation(key_derivation.to_string()));
    }
    if iterations == 0 {
        return Err(CryptoError::InvalidIterations);
    }
    Ok(())
}

fn derive_key(password: &str, salt: &[u8], iterations: u32) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    key
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(value)
        .map_err(|e| CryptoError::InvalidMetadata(format!("{name}: {e}")))
}

/// Stateless AES-256-GCM / PBKDF2 engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncryptionEngine;

impl EncryptionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Encrypts `plaintext` and returns the ciphertext with its metadata.
    ///
    /// The IV is always random, even in convergent mode.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        file_name: &str,
        password: &str,
        options: &EncryptOptions,
    ) -> Result<EncryptedFile, CryptoError> {
        check_algorithm(&options.algorithm, &options.key_derivation, options.iterations)?;

        let salt = if options.convergent {
            convergent_salt(file_name)
        } else {
            let mut salt = [0u8; SALT_LEN];
            OsRng.fill_bytes(&mut salt);
            salt
        };
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let key = derive_key(password, &salt, options.iterations);
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&iv), plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        debug!(
            file = file_name,
            convergent = options.convergent,
            original_size = plaintext.len(),
            encrypted_size = ciphertext.len(),
            "encrypted file"
        );

        let metadata = EncryptionMetadata {
            file_name: file_name.to_string(),
            algorithm: ALGORITHM_AES_256_GCM.into(),
            key_derivation: KDF_PBKDF2.into(),
            salt: STANDARD.encode(salt),
            iv: STANDARD.encode(iv),
            iterations: options.iterations,
            convergent: options.convergent,
            original_size: plaintext.len() as u64,
            encrypted_size: ciphertext.len() as u64,
            original_hash: checksum_bytes(plaintext),
        };

        Ok(EncryptedFile {
            ciphertext,
            metadata,
        })
    }

    /// Decrypts `ciphertext` produced by [`encrypt`](Self::encrypt).
    ///
    /// Fails if the tag does not verify or the plaintext does not match
    /// `original_hash`.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        password: &str,
        metadata: &EncryptionMetadata,
    ) -> Result<Vec<u8>, CryptoError> {
        check_algorithm(&metadata.algorithm, &metadata.key_derivation, metadata.iterations)?;

        let salt = decode_field("salt", &metadata.salt)?;
        let iv = decode_field("iv", &metadata.iv)?;
        if iv.len() != IV_LEN {
            return Err(CryptoError::InvalidMetadata(format!(
                "iv must be {IV_LEN} bytes, got {}",
                iv.len()
            )));
        }
        if ciphertext.len() < TAG_LEN {
            return Err(CryptoError::DecryptionFailed("ciphertext shorter than tag".into()));
        }

        let key = derive_key(password, &salt, metadata.iterations);
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&iv), ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed("authentication failed".into()))?;

        if !metadata.original_hash.is_empty()
            && !compare_hashes(&checksum_bytes(&plaintext), &metadata.original_hash)
        {
            return Err(CryptoError::DecryptionFailed("plaintext hash mismatch".into()));
        }
        Ok(plaintext)
    }

    /// Runs [`encrypt`](Self::encrypt) on the blocking pool.
    pub async fn encrypt_async(
        &self,
        plaintext: Vec<u8>,
        file_name: String,
        password: String,
        options: EncryptOptions,
    ) -> Result<EncryptedFile, CryptoError> {
        let engine = *self;
        tokio::task::spawn_blocking(move || {
            engine.encrypt(&plaintext, &file_name, &password, &options)
        })
        .await
        .map_err(|e| CryptoError::Task(format!("task join error: {e}")))?
    }

    /// Runs [`decrypt`](Self::decrypt) on the blocking pool.
    pub async fn decrypt_async(
        &self,
        ciphertext: Vec<u8>,
        password: String,
        metadata: EncryptionMetadata,
    ) -> Result<Vec<u8>, CryptoError> {
        let engine = *self;
        tokio::task::spawn_blocking(move || engine.decrypt(&ciphertext, &password, &metadata))
            .await
            .map_err(|e| CryptoError::Task(format!("task join error: {e}")))?
    }
}
