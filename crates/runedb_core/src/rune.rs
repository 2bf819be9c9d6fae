//! Entry point: opens databases by name and shares live instances.

use crate::config::Config;
use crate::crypto::EncryptionKey;
use crate::database::{CloseGate, Database, DatabaseInner, OpenOptions};
use crate::error::{CoreError, CoreResult};
use parking_lot::Mutex;
use runedb_codec::Value;
use runedb_storage::{StorageError, StoreProvider};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Opens databases by name through an injected [`StoreProvider`].
///
/// Opening a name that is already open returns a handle to the same live
/// instance, so every caller observes the same state. Opening a name whose
/// previous instance is still closing waits until that instance has flushed
/// and released its store.
///
/// # Example
///
/// ```rust
/// use runedb_core::Rune;
/// use runedb_storage::MemoryProvider;
///
/// let rune = Rune::new(MemoryProvider::new());
/// let db = rune.db("notes", None, None)?;
/// db.collection("items")?.insert(runedb_core::Value::empty_map())?;
///
/// let again = rune.db("notes", None, None)?;
/// assert_eq!(again.collection("items")?.len()?, 1);
/// # Ok::<(), runedb_core::CoreError>(())
/// ```
pub struct Rune {
    provider: Arc<dyn StoreProvider>,
    config: Config,
    open: Mutex<HashMap<String, Slot>>,
}

/// Registry entry for a name opened through a [`Rune`].
struct Slot {
    inner: Weak<DatabaseInner>,
    gate: Arc<CloseGate>,
}

impl Slot {
    fn is_settled(&self) -> bool {
        self.inner.strong_count() == 0 && self.gate.is_released()
    }
}

impl Rune {
    /// Creates an entry point with the default configuration.
    pub fn new(provider: impl StoreProvider + 'static) -> Self {
        Self::with_config(provider, Config::default())
    }

    /// Creates an entry point with a custom configuration.
    pub fn with_config(provider: impl StoreProvider + 'static, config: Config) -> Self {
        Self {
            provider: Arc::new(provider),
            config,
            open: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the configuration used for every database.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Opens database `name`, creating it if absent.
    ///
    /// `data` seeds a database that does not exist yet. `encryption_key` is a
    /// key rendered by [`gen_key`](Self::gen_key); with it every snapshot is
    /// sealed.
    ///
    /// # Errors
    ///
    /// - `InvalidSecret` if `encryption_key` is not 64 hex digits
    /// - `DecryptionFailed` if the database is sealed with another key, or
    ///   is already open with another key
    /// - `DatabaseLocked` if another process holds the store
    pub fn db(
        &self,
        name: &str,
        data: Option<Value>,
        encryption_key: Option<&str>,
    ) -> CoreResult<Database> {
        let options = OpenOptions {
            seed: data,
            key: encryption_key.map(EncryptionKey::from_hex).transpose()?,
        };
        self.open(name, options)
    }

    /// Opens database `name` with explicit options.
    ///
    /// # Errors
    ///
    /// See [`db`](Self::db).
    pub fn open(&self, name: &str, options: OpenOptions) -> CoreResult<Database> {
        let mut open = self.open.lock();

        if let Some(slot) = open.get(name) {
            if let Some(inner) = slot.inner.upgrade().filter(|inner| inner.is_open()) {
                if !inner.key_matches(options.key.as_ref()) {
                    return Err(CoreError::decryption_failed(format!(
                        "{name} is already open with a different key"
                    )));
                }
                debug!(name, "reusing open database");
                return Ok(Database::from_inner(inner));
            }
            if !slot.gate.is_released() {
                debug!(name, "waiting for previous instance to close");
                slot.gate.wait();
            }
        }

        let store = self.provider.open(name).map_err(|e| match e {
            StorageError::Locked { .. } => CoreError::DatabaseLocked {
                name: name.to_string(),
            },
            other => CoreError::Storage(other),
        })?;
        let gate = Arc::new(CloseGate::default());
        let db = Database::open_gated(name, store, self.config.clone(), options, Arc::clone(&gate))?;

        open.retain(|_, slot| !slot.is_settled());
        open.insert(
            name.to_string(),
            Slot {
                inner: db.downgrade(),
                gate,
            },
        );
        Ok(db)
    }

    /// Derives a key from `secret`, rendered as 64 hex digits.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSecret` for an empty secret.
    pub fn gen_key(&self, secret: &str) -> CoreResult<String> {
        Ok(EncryptionKey::derive(secret, &self.config.kdf)?.to_hex())
    }

    /// Names of the databases currently open through this entry point.
    #[must_use]
    pub fn open_names(&self) -> Vec<String> {
        let open = self.open.lock();
        let mut names: Vec<String> = open
            .iter()
            .filter(|(_, slot)| slot.inner.upgrade().is_some_and(|inner| inner.is_open()))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for Rune {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rune")
            .field("config", &self.config)
            .field("open", &self.open_names())
            .finish_non_exhaustive()
    }
}
