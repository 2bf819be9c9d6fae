//! Database facade, mutation pipeline and flush policy.

use crate::collection::Collection;
use crate::config::Config;
use crate::crypto::EncryptionKey;
use crate::document::{
    check_item, Document, COLLECTION_KIND, MAP_KIND, MAX_ROOT_DEPTH, STACK_KEY,
};
use crate::error::{CoreError, CoreResult};
use crate::flush::Flusher;
use crate::kv::KeyValueMap;
use crate::reference::{Location, ReferenceResolver};
use crate::snapshot::{Codec, Snapshot};
use parking_lot::{Condvar, Mutex, RwLock};
use runedb_codec::Value;
use runedb_storage::{InMemoryStore, SnapshotStore};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Everything a reader can see: the root document and the reference index.
#[derive(Debug, Clone, Default)]
pub(crate) struct RootState {
    pub doc: Document,
    pub refs: ReferenceResolver,
}

/// Per-open options that are not part of [`Config`].
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Root document for a database that does not exist yet.
    pub seed: Option<Value>,
    /// Key sealing every snapshot.
    pub key: Option<EncryptionKey>,
}

impl OpenOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a fresh database with `data`.
    #[must_use]
    pub fn seed(mut self, data: impl Into<Value>) -> Self {
        self.seed = Some(data.into());
        self
    }

    /// Encrypts the database with `key`.
    #[must_use]
    pub fn key(mut self, key: EncryptionKey) -> Self {
        self.key = Some(key);
        self
    }
}

/// State owned by the single writer.
struct Writer {
    /// `None` once closed, which releases the store's lock.
    store: Option<Box<dyn SnapshotStore>>,
    codec: Codec,
    key_fingerprint: Option<[u8; 32]>,
}

/// Set once an instance has let go of its store.
///
/// Shared with the [`Rune`](crate::Rune) registry, which waits on it before
/// opening the same name again.
#[derive(Debug, Default)]
pub(crate) struct CloseGate {
    released: Mutex<bool>,
    cond: Condvar,
}

impl CloseGate {
    fn release(&self) {
        *self.released.lock() = true;
        self.cond.notify_all();
    }

    pub fn is_released(&self) -> bool {
        *self.released.lock()
    }

    /// Blocks until the store has been released.
    pub fn wait(&self) {
        let mut released = self.released.lock();
        while !*released {
            self.cond.wait(&mut released);
        }
    }
}

pub(crate) struct DatabaseInner {
    name: String,
    config: Config,
    current: RwLock<Arc<RootState>>,
    writer: Mutex<Writer>,
    dirty: AtomicBool,
    version: AtomicU64,
    closed: AtomicBool,
    flusher: Mutex<Option<Flusher>>,
    gate: Arc<CloseGate>,
}

impl DatabaseInner {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoreError::DatabaseClosed)
        }
    }

    /// The current state; never blocks on writers.
    pub fn snapshot(&self) -> CoreResult<Arc<RootState>> {
        self.ensure_open()?;
        Ok(Arc::clone(&self.current.read()))
    }

    /// Runs `f` on a private copy of the state and publishes the copy when
    /// `f` reports a change.
    ///
    /// `f` runs under the writer lock and must not mutate this database.
    /// Errors from `f` discard the copy. Without a flush interval the new
    /// state is flushed before returning; if that flush fails the state stays
    /// published and dirty, and the error is returned.
    pub fn commit<T>(
        &self,
        f: impl FnOnce(&mut RootState) -> CoreResult<(T, bool)>,
    ) -> CoreResult<T> {
        self.ensure_open()?;
        let mut writer = self.writer.lock();
        self.ensure_open()?;

        let mut next = RootState::clone(&self.current.read());
        let (out, changed) = f(&mut next)?;
        if changed {
            let next = Arc::new(next);
            *self.current.write() = Arc::clone(&next);
            self.dirty.store(true, Ordering::SeqCst);
            if self.config.flush_interval.is_none() {
                self.flush_locked(&mut writer, &next)?;
            }
        }
        Ok(out)
    }

    /// [`commit`](Self::commit) for operations that always change state.
    pub fn mutate<T>(&self, f: impl FnOnce(&mut RootState) -> CoreResult<T>) -> CoreResult<T> {
        self.commit(|state| f(state).map(|out| (out, true)))
    }

    /// Writes the current state if it has unflushed changes.
    pub fn flush_if_dirty(&self) -> CoreResult<bool> {
        self.ensure_open()?;
        let mut writer = self.writer.lock();
        self.ensure_open()?;

        if !self.dirty.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let state = Arc::clone(&self.current.read());
        self.flush_locked(&mut writer, &state)?;
        Ok(true)
    }

    fn flush_locked(&self, writer: &mut Writer, state: &RootState) -> CoreResult<u64> {
        let store = writer.store.as_mut().ok_or(CoreError::DatabaseClosed)?;
        let version = self.version.load(Ordering::SeqCst) + 1;
        let snapshot = Snapshot {
            version,
            data: state.doc.to_map(),
            refs: if state.refs.is_empty() {
                Value::Null
            } else {
                state.refs.to_value()
            },
        };
        let bytes = writer.codec.encode(snapshot)?;
        store.replace(&bytes)?;

        self.version.store(version, Ordering::SeqCst);
        self.dirty.store(false, Ordering::SeqCst);
        debug!(
            name = %self.name,
            version,
            bytes = bytes.len(),
            encrypted = writer.codec.is_encrypted(),
            "flushed snapshot"
        );
        Ok(version)
    }

    pub fn key_matches(&self, key: Option<&EncryptionKey>) -> bool {
        self.writer.lock().key_fingerprint == key.map(EncryptionKey::fingerprint)
    }

    fn close(&self) -> CoreResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let flusher = self.flusher.lock().take();
        if let Some(flusher) = flusher {
            flusher.stop();
        }

        let mut writer = self.writer.lock();
        let result = if self.dirty.load(Ordering::SeqCst) {
            let state = Arc::clone(&self.current.read());
            self.flush_locked(&mut writer, &state).map(|_| ())
        } else {
            Ok(())
        };
        writer.store = None;
        drop(writer);
        self.gate.release();

        info!(
            name = %self.name,
            version = self.version.load(Ordering::SeqCst),
            "closed database"
        );
        result
    }
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(name = %self.name, error = %e, "final flush failed while dropping database");
        }
    }
}

/// Handle to an open database.
///
/// Handles are cheap to clone and share one instance; the instance is closed,
/// with a final flush, when [`close`](Self::close) is called or the last
/// handle (including collection and map handles) is dropped.
///
/// # Example
///
/// ```rust
/// use runedb_core::{Database, Value};
///
/// let db = Database::open_in_memory()?;
/// let notes = db.collection("notes")?;
/// notes.insert(Value::map(vec![("text", Value::from("buy milk"))]))?;
/// assert_eq!(notes.len()?, 1);
/// db.close()?;
/// # Ok::<(), runedb_core::CoreError>(())
/// ```
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    /// Opens a database over an injected store.
    ///
    /// Loads the persisted snapshot if there is one; otherwise starts from
    /// `options.seed` or an empty root document.
    ///
    /// # Errors
    ///
    /// - `DatabaseNotFound` / `DatabaseExists` per the config flags
    /// - `DecryptionFailed` if the snapshot is sealed and the key is absent
    ///   or wrong
    /// - `CorruptStore` if the snapshot cannot be parsed
    /// - `InvalidDocument` if the seed is not a map
    pub fn open_with_store(
        name: &str,
        store: Box<dyn SnapshotStore>,
        config: Config,
        options: OpenOptions,
    ) -> CoreResult<Self> {
        Self::open_gated(name, store, config, options, Arc::default())
    }

    /// Like [`open_with_store`](Self::open_with_store); `gate` is released
    /// once the instance lets go of `store`.
    pub(crate) fn open_gated(
        name: &str,
        store: Box<dyn SnapshotStore>,
        config: Config,
        options: OpenOptions,
        gate: Arc<CloseGate>,
    ) -> CoreResult<Self> {
        let bytes = store.load()?;
        let exists = bytes.is_some();
        if !exists && !config.create_if_missing {
            return Err(CoreError::DatabaseNotFound {
                name: name.to_string(),
            });
        }
        if exists && config.error_if_exists {
            return Err(CoreError::DatabaseExists {
                name: name.to_string(),
            });
        }

        let codec = Codec::new(options.key.as_ref(), config.pretty_json);
        let snapshot = codec.decode(bytes.as_deref())?;
        let needs_sealing =
            codec.is_encrypted() && bytes.as_deref().is_some_and(|b| !Codec::is_sealed(b));

        let (state, seeded) = if exists {
            if options.seed.is_some() {
                debug!(name, "database exists; ignoring seed data");
            }
            let doc = Document::from_map(snapshot.data);
            let mut refs = ReferenceResolver::from_value(&snapshot.refs)?;
            let dropped = refs.revalidate_all(&doc);
            if dropped > 0 {
                debug!(
                    name,
                    dropped,
                    tombstones = refs.tombstones(),
                    "dropped stale references"
                );
            }
            (RootState { doc, refs }, false)
        } else {
            match options.seed {
                Some(seed) => (
                    RootState {
                        doc: Document::from_map(validate_root(seed)?),
                        refs: ReferenceResolver::default(),
                    },
                    true,
                ),
                None => (RootState::default(), false),
            }
        };

        info!(
            name,
            store = %store.describe(),
            version = snapshot.version,
            encrypted = codec.is_encrypted(),
            seeded,
            "opened database"
        );

        let interval = config.flush_interval;
        let inner = Arc::new(DatabaseInner {
            name: name.to_string(),
            config,
            current: RwLock::new(Arc::new(state)),
            writer: Mutex::new(Writer {
                store: Some(store),
                codec,
                key_fingerprint: options.key.as_ref().map(EncryptionKey::fingerprint),
            }),
            dirty: AtomicBool::new(seeded || needs_sealing),
            version: AtomicU64::new(snapshot.version),
            closed: AtomicBool::new(false),
            flusher: Mutex::new(None),
            gate,
        });

        match interval {
            Some(interval) => {
                let flusher = Flusher::spawn(Arc::downgrade(&inner), name, interval)?;
                *inner.flusher.lock() = Some(flusher);
            }
            None => {
                inner.flush_if_dirty()?;
            }
        }

        Ok(Self { inner })
    }

    /// Opens an empty database backed by memory only.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature matches the other openers.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_with_store(
            "memory",
            Box::new(InMemoryStore::new()),
            Config::default(),
            OpenOptions::default(),
        )
    }

    pub(crate) fn downgrade(&self) -> Weak<DatabaseInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn from_inner(inner: Arc<DatabaseInner>) -> Self {
        Self { inner }
    }

    /// Name the database was opened under.
    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Returns database configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Returns a handle to collection `name`.
    ///
    /// The collection is created by its first write.
    ///
    /// # Errors
    ///
    /// Returns `KindMismatch` if `name` holds something other than a
    /// collection.
    pub fn collection(&self, name: &str) -> CoreResult<Collection> {
        self.inner.snapshot()?.doc.check_kind(name, COLLECTION_KIND)?;
        Ok(Collection::new(Arc::clone(&self.inner), name))
    }

    /// Returns a handle to key-value map `name`.
    ///
    /// The map is created by its first write.
    ///
    /// # Errors
    ///
    /// Returns `KindMismatch` if `name` holds something other than a map.
    pub fn map(&self, name: &str) -> CoreResult<KeyValueMap> {
        self.inner.snapshot()?.doc.check_kind(name, MAP_KIND)?;
        Ok(KeyValueMap::new(Arc::clone(&self.inner), name))
    }

    /// Replaces the whole root document.
    ///
    /// References that no longer resolve are dropped.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDocument` if `data` is not a map or holds a
    /// non-finite float.
    pub fn set_data(&self, data: impl Into<Value>) -> CoreResult<()> {
        let root = validate_root(data.into())?;
        self.inner.mutate(|state| {
            state.doc = Document::from_map(root);
            state.refs.revalidate_all(&state.doc);
            Ok(())
        })
    }

    /// Returns a deep copy of the whole root document.
    pub fn get_data(&self) -> CoreResult<Value> {
        Ok(Value::Map(self.inner.snapshot()?.doc.to_map()))
    }

    /// Derives an encryption key from `secret` with this database's KDF
    /// parameters, rendered as hex.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSecret` for an empty secret.
    pub fn gen_key(&self, secret: &str) -> CoreResult<String> {
        Ok(EncryptionKey::derive(secret, &self.inner.config.kdf)?.to_hex())
    }

    /// Pushes `value` onto the default stack; returns the new depth.
    pub fn push(&self, value: impl Into<Value>) -> CoreResult<usize> {
        let value = value.into();
        check_item(&value, 0)?;
        self.inner.mutate(|state| {
            let stack = state.doc.sequence_mut(STACK_KEY)?;
            stack.push(value);
            Ok(stack.len())
        })
    }

    /// Pops the most recently pushed value off the default stack.
    pub fn pop(&self) -> CoreResult<Option<Value>> {
        self.inner.commit(|state| {
            if state.doc.sequence(STACK_KEY)?.is_empty() {
                return Ok((None, false));
            }
            let popped = state.doc.sequence_mut(STACK_KEY)?.pop();
            Ok((popped, true))
        })
    }

    /// Computes the reference id of a stored value and indexes its location.
    ///
    /// `props` names the fields the reference covers (comma or whitespace
    /// separated); without it the whole value is covered. Returns `None` if a
    /// named field is missing or no stored value matches.
    pub fn make_ref(&self, value: &Value, props: Option<&str>) -> CoreResult<Option<String>> {
        self.inner.commit(|state| {
            let RootState { doc, refs } = state;
            refs.make_ref(doc, value, props)
        })
    }

    /// Returns the live value behind `ref_id`, or `None` once it was removed
    /// or changed.
    pub fn find_ref(&self, ref_id: &str) -> CoreResult<Option<Value>> {
        let state = self.inner.snapshot()?;
        Ok(state.refs.resolve(&state.doc, ref_id).cloned())
    }

    /// Where `ref_id` points, if it still resolves.
    pub fn ref_location(&self, ref_id: &str) -> CoreResult<Option<Location>> {
        let state = self.inner.snapshot()?;
        Ok(state
            .refs
            .resolve(&state.doc, ref_id)
            .and_then(|_| state.refs.location(ref_id).cloned()))
    }

    /// Number of indexed references.
    pub fn ref_count(&self) -> CoreResult<usize> {
        Ok(self.inner.snapshot()?.refs.len())
    }

    /// Writes unflushed changes now; returns the committed version.
    pub fn flush(&self) -> CoreResult<u64> {
        self.inner.flush_if_dirty()?;
        Ok(self.version())
    }

    /// Performs the final flush and releases the store.
    ///
    /// Every handle of this instance rejects further calls with
    /// `DatabaseClosed`. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the error of the final flush; the store is released anyway.
    pub fn close(&self) -> CoreResult<()> {
        self.inner.close()
    }

    /// Checks if the database is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    /// Returns true if there are changes not yet flushed.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    /// Number of committed flushes over the lifetime of the store.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::SeqCst)
    }

    /// Returns true if snapshots are sealed.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.inner.writer.lock().codec.is_encrypted()
    }

    /// Switches to `new_key` (or to plaintext for `None`) and rewrites the
    /// store immediately.
    ///
    /// # Errors
    ///
    /// If the rewrite fails the previous key stays in effect.
    pub fn rekey(&self, new_key: Option<EncryptionKey>) -> CoreResult<()> {
        let inner = &self.inner;
        inner.ensure_open()?;
        let mut writer = inner.writer.lock();
        inner.ensure_open()?;

        let codec = Codec::new(new_key.as_ref(), inner.config.pretty_json);
        let fingerprint = new_key.as_ref().map(EncryptionKey::fingerprint);
        let previous_codec = std::mem::replace(&mut writer.codec, codec);
        let previous_fingerprint = std::mem::replace(&mut writer.key_fingerprint, fingerprint);

        let state = Arc::clone(&inner.current.read());
        match inner.flush_locked(&mut writer, &state) {
            Ok(version) => {
                info!(name = %inner.name, version, encrypted = new_key.is_some(), "rekeyed database");
                Ok(())
            }
            Err(e) => {
                writer.codec = previous_codec;
                writer.key_fingerprint = previous_fingerprint;
                Err(e)
            }
        }
    }

    /// Names of the collections in the root document.
    pub fn collection_names(&self) -> CoreResult<Vec<String>> {
        Ok(self.inner.snapshot()?.doc.names_of_kind(COLLECTION_KIND))
    }

    /// Names of the key-value maps in the root document.
    pub fn map_names(&self) -> CoreResult<Vec<String>> {
        Ok(self.inner.snapshot()?.doc.names_of_kind(MAP_KIND))
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name())
            .field("is_open", &self.is_open())
            .field("version", &self.version())
            .field("dirty", &self.is_dirty())
            .finish_non_exhaustive()
    }
}

fn validate_root(data: Value) -> CoreResult<runedb_codec::Map> {
    let Value::Map(root) = data else {
        return Err(CoreError::invalid_document(format!(
            "root document must be a map, got {}",
            data.kind()
        )));
    };
    for value in root.values() {
        value
            .validate_nested(MAX_ROOT_DEPTH - 1)
            .map_err(|e| CoreError::invalid_document(e.to_string()))?;
    }
    Ok(root)
}
