//! Encryption at rest.
//!
//! Snapshots are sealed with AES-256-GCM. Keys are either generated at random
//! or derived from a user secret with Argon2id, using a fixed application salt
//! so that the same secret always yields the same key.
//!
//! ## Security Model
//!
//! - AES-256-GCM authenticated encryption, fresh random nonce per snapshot
//! - Associated data binds the snapshot header to the ciphertext
//! - Keys are zeroized on drop and never printed by `Debug`
//!
//! ## Usage
//!
//! ```rust
//! use runedb_core::crypto::{CryptoManager, EncryptionKey, KdfParams};
//!
//! let key = EncryptionKey::derive("correct horse", &KdfParams::new(64, 1, 1))?;
//! let manager = CryptoManager::new(&key);
//!
//! let sealed = manager.encrypt_with_aad(b"secret data", b"header")?;
//! assert_eq!(manager.decrypt_with_aad(&sealed, b"header")?, b"secret data");
//! # Ok::<(), runedb_core::CoreError>(())
//! ```

mod cipher;
mod key;

pub use cipher::{CryptoManager, NONCE_SIZE, TAG_SIZE};
pub use key::{EncryptionKey, KdfParams, KEY_SIZE};
