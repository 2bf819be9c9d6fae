//! Encryption keys and secret-to-key derivation.

use crate::error::{CoreError, CoreResult};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;

/// Application salt for Argon2id.
///
/// Fixed so that `derive` is a pure function of the secret.
const KDF_SALT: &[u8] = b"runedb.key-derivation.v1";

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl KdfParams {
    /// Creates parameters from explicit costs.
    #[must_use]
    pub const fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
        }
    }
}

impl Default for KdfParams {
    /// The Argon2 crate's recommended defaults (19 MiB, 2 passes, 1 lane).
    fn default() -> Self {
        Self::new(
            Params::DEFAULT_M_COST,
            Params::DEFAULT_T_COST,
            Params::DEFAULT_P_COST,
        )
    }
}

/// Encryption key for AES-256-GCM.
///
/// The key is automatically zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Generates a new random encryption key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes slice is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CoreError::invalid_key_size(bytes.len(), KEY_SIZE));
        }

        let mut key_bytes = [0u8; KEY_SIZE];
        key_bytes.copy_from_slice(bytes);
        Ok(Self { bytes: key_bytes })
    }

    /// Derives a key from a user secret with Argon2id.
    ///
    /// Deterministic: the same secret and parameters always produce the same
    /// key.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidSecret`] for an empty secret and
    /// [`CoreError::KeyDerivationFailed`] for unusable parameters.
    pub fn derive(secret: &str, params: &KdfParams) -> CoreResult<Self> {
        if secret.is_empty() {
            return Err(CoreError::invalid_secret("secret must not be empty"));
        }

        let argon_params = Params::new(
            params.memory_kib,
            params.iterations,
            params.parallelism,
            Some(KEY_SIZE),
        )
        .map_err(|e| CoreError::key_derivation_failed(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

        let mut bytes = [0u8; KEY_SIZE];
        argon2
            .hash_password_into(secret.as_bytes(), KDF_SALT, &mut bytes)
            .map_err(|e| CoreError::key_derivation_failed(e.to_string()))?;
        Ok(Self { bytes })
    }

    /// Parses a key rendered by [`to_hex`](Self::to_hex).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidSecret`] unless the input is exactly 64
    /// hex digits.
    pub fn from_hex(hex: &str) -> CoreResult<Self> {
        let hex = hex.trim();
        if hex.len() != KEY_SIZE * 2 || !hex.is_ascii() {
            return Err(CoreError::invalid_secret(format!(
                "key must be {} hex digits",
                KEY_SIZE * 2
            )));
        }

        let mut bytes = [0u8; KEY_SIZE];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| CoreError::invalid_secret("key contains non-hex characters"))?;
        }
        Ok(Self { bytes })
    }

    /// Renders the key as 64 lowercase hex digits.
    #[must_use]
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(KEY_SIZE * 2);
        for byte in &self.bytes {
            let _ = write!(out, "{byte:02x}");
        }
        out
    }

    /// Returns the key as a byte slice.
    ///
    /// # Security
    ///
    /// Be careful with this method - don't log or serialize the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// One-way fingerprint used to compare keys without keeping a copy.
    #[must_use]
    pub(crate) fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"runedb.key-fingerprint.v1");
        hasher.update(self.bytes);
        hasher.finalize().into()
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
