//! AES-256-GCM sealing.

use super::key::EncryptionKey;
use crate::error::{CoreError, CoreResult};
use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

/// Size of the GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Manages encryption and decryption operations.
///
/// Output format: `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
pub struct CryptoManager {
    cipher: Aes256Gcm,
}

impl CryptoManager {
    /// Creates a new crypto manager with the given key.
    #[must_use]
    pub fn new(key: &EncryptionKey) -> Self {
        // EncryptionKey is always exactly 32 bytes, the AES-256 key size.
        let key_array = GenericArray::from_slice(key.as_bytes());
        Self {
            cipher: Aes256Gcm::new(key_array),
        }
    }

    /// Encrypts data with associated data (AEAD).
    ///
    /// The associated data is authenticated but not encrypted.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EncryptionFailed`] if the cipher rejects the input.
    pub fn encrypt_with_aad(&self, plaintext: &[u8], aad: &[u8]) -> CoreResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let payload = Payload {
            msg: plaintext,
            aad,
        };

        let ciphertext = self
            .cipher
            .encrypt(nonce, payload)
            .map_err(|_| CoreError::encryption_failed("encryption error"))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend(ciphertext);

        Ok(result)
    }

    /// Decrypts data that was encrypted with [`encrypt_with_aad`](Self::encrypt_with_aad).
    ///
    /// The same AAD must be provided as was used during encryption.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DecryptionFailed`] for a wrong key, wrong AAD, or
    /// tampered or truncated input.
    pub fn decrypt_with_aad(&self, ciphertext: &[u8], aad: &[u8]) -> CoreResult<Vec<u8>> {
        if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CoreError::decryption_failed("ciphertext too short"));
        }

        let nonce = Nonce::from_slice(&ciphertext[..NONCE_SIZE]);
        let payload = Payload {
            msg: &ciphertext[NONCE_SIZE..],
            aad,
        };

        self.cipher
            .decrypt(nonce, payload)
            .map_err(|_| CoreError::decryption_failed("authentication tag mismatch"))
    }
}

impl std::fmt::Debug for CryptoManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoManager")
            .field("cipher", &"Aes256Gcm")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let manager = CryptoManager::new(&EncryptionKey::generate());

        let sealed = manager.encrypt_with_aad(b"notes", b"RDBX").unwrap();
        assert_eq!(sealed.len(), NONCE_SIZE + 5 + TAG_SIZE);
        assert_ne!(&sealed[NONCE_SIZE..NONCE_SIZE + 5], b"notes");

        assert_eq!(manager.decrypt_with_aad(&sealed, b"RDBX").unwrap(), b"notes");
    }

    #[test]
    fn fresh_nonce_per_call() {
        let manager = CryptoManager::new(&EncryptionKey::generate());

        let first = manager.encrypt_with_aad(b"same data", b"").unwrap();
        let second = manager.encrypt_with_aad(b"same data", b"").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = CryptoManager::new(&EncryptionKey::generate())
            .encrypt_with_aad(b"secret", b"aad")
            .unwrap();

        let other = CryptoManager::new(&EncryptionKey::generate());
        assert!(matches!(
            other.decrypt_with_aad(&sealed, b"aad"),
            Err(CoreError::DecryptionFailed { .. })
        ));
    }

    #[test]
    fn wrong_aad_fails() {
        let manager = CryptoManager::new(&EncryptionKey::generate());
        let sealed = manager.encrypt_with_aad(b"secret", b"correct").unwrap();

        assert!(manager.decrypt_with_aad(&sealed, b"wrong").is_err());
    }

    #[test]
    fn tampered_or_short_input_fails() {
        let manager = CryptoManager::new(&EncryptionKey::generate());
        let mut sealed = manager.encrypt_with_aad(b"data", b"").unwrap();

        let last = sealed.len() - 1;
        sealed[last] ^= 0xFF;
        assert!(manager.decrypt_with_aad(&sealed, b"").is_err());

        assert!(manager.decrypt_with_aad(&[0u8; 10], b"").is_err());
    }

    #[test]
    fn empty_plaintext() {
        let manager = CryptoManager::new(&EncryptionKey::generate());
        let sealed = manager.encrypt_with_aad(b"", b"").unwrap();
        assert!(manager.decrypt_with_aad(&sealed, b"").unwrap().is_empty());
    }
}
