//! Store file encryption using AES-256-GCM.
//!
//! Every persisted store file is one encrypted blob: a random 96-bit
//! nonce followed by ciphertext plus the GCM tag. Any bit flip in the
//! file fails authentication and surfaces as
//! [`CryptoError::DecryptionFailed`]; there is no partial decrypt.

use std::path::{Path, PathBuf};

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rand::RngCore;

/// Nonce size for AES-256-GCM (96 bits).
const NONCE_SIZE: usize = 12;

/// Key size for AES-256 (256 bits).
pub const KEY_SIZE: usize = 32;

/// Errors from the encryption service.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Key material is not 32 bytes or not hex/base64.
    #[error("Invalid key material: {message}")]
    InvalidKey {
        /// Description of the problem.
        message: String,
    },

    /// Encryption failed.
    #[error("Encryption failed: {message}")]
    EncryptionFailed {
        /// Description of the failure.
        message: String,
    },

    /// The ciphertext did not authenticate. Wrong key, truncation, or
    /// corruption; the causes are indistinguishable by design.
    #[error("Decryption failed: ciphertext did not authenticate")]
    DecryptionFailed,

    /// File I/O failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl CryptoError {
    fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Where the encryption key comes from.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Key material supplied directly by the embedding host.
    Provided([u8; KEY_SIZE]),
    /// Key file path. Loaded if present (hex or base64 contents),
    /// otherwise a fresh key is generated and written there with 0600
    /// permissions.
    File(PathBuf),
}

/// AES-256-GCM encryption service for store files.
#[derive(Clone)]
pub struct EncryptionService {
    key: [u8; KEY_SIZE],
}

impl std::fmt::Debug for EncryptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never print key material
        f.debug_struct("EncryptionService").finish_non_exhaustive()
    }
}

impl EncryptionService {
    /// Initializes the service from a key source.
    ///
    /// # Errors
    ///
    /// Returns an error if the key file exists but holds invalid
    /// material, or if a generated key cannot be persisted.
    pub fn initialize(source: KeySource) -> Result<Self, CryptoError> {
        let key = match source {
            KeySource::Provided(key) => key,
            KeySource::File(path) => Self::load_or_generate_key(&path)?,
        };
        Ok(Self { key })
    }

    /// Generates a random 256-bit key.
    #[must_use]
    pub fn generate_key() -> [u8; KEY_SIZE] {
        let mut key = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut key);
        key
    }

    /// Parses key material from hex or base64.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKey` if the string is neither a
    /// 64-char hex key nor base64 decoding to 32 bytes.
    pub fn parse_key(key_str: &str) -> Result<[u8; KEY_SIZE], CryptoError> {
        let key_str = key_str.trim();

        if let Ok(bytes) = hex::decode(key_str) {
            if let Ok(key) = <[u8; KEY_SIZE]>::try_from(bytes.as_slice()) {
                return Ok(key);
            }
        }
        if let Ok(bytes) = BASE64.decode(key_str) {
            if let Ok(key) = <[u8; KEY_SIZE]>::try_from(bytes.as_slice()) {
                return Ok(key);
            }
        }
        Err(CryptoError::invalid_key(
            "expected 32 bytes as hex or base64",
        ))
    }

    fn load_or_generate_key(path: &Path) -> Result<[u8; KEY_SIZE], CryptoError> {
        if path.exists() {
            let contents =
                std::fs::read_to_string(path).map_err(|e| CryptoError::io(path, e))?;
            return Self::parse_key(&contents);
        }

        let key = Self::generate_key();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CryptoError::io(parent, e))?;
        }
        std::fs::write(path, hex::encode(key)).map_err(|e| CryptoError::io(path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| CryptoError::io(path, e))?;
        }

        tracing::info!(path = %path.display(), "generated new store encryption key");
        Ok(key)
    }

    /// Encrypts a plaintext blob.
    ///
    /// Output layout: `nonce(12) || ciphertext+tag`. A fresh random
    /// nonce is drawn per call.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::EncryptionFailed` if the cipher fails.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| CryptoError::EncryptionFailed {
                message: e.to_string(),
            })?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext =
            cipher
                .encrypt(nonce, plaintext)
                .map_err(|e| CryptoError::EncryptionFailed {
                    message: e.to_string(),
                })?;

        let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Decrypts a blob produced by [`Self::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::DecryptionFailed` if the blob is too short
    /// or does not authenticate.
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if blob.len() < NONCE_SIZE {
            return Err(CryptoError::DecryptionFailed);
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_SIZE);

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|_| CryptoError::DecryptionFailed)?;
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)
    }

    /// Encrypts `plaintext` and writes it to `path` atomically.
    ///
    /// The blob goes to a sibling temp file first and is renamed into
    /// place, so readers see either the old file or the new one, never a
    /// partial write.
    ///
    /// # Errors
    ///
    /// Returns an error on cipher or I/O failure.
    pub fn encrypt_to_file(&self, path: &Path, plaintext: &[u8]) -> Result<(), CryptoError> {
        let blob = self.encrypt(plaintext)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CryptoError::io(parent, e))?;
        }

        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &blob).map_err(|e| CryptoError::io(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| CryptoError::io(path, e))?;
        Ok(())
    }

    /// Reads and decrypts the blob at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read (including not
    /// existing) or `CryptoError::DecryptionFailed` on corruption.
    pub fn decrypt_from_file(&self, path: &Path) -> Result<Vec<u8>, CryptoError> {
        let blob = std::fs::read(path).map_err(|e| CryptoError::io(path, e))?;
        self.decrypt(&blob)
    }
}
