//! Database configuration.

use crate::crypto::KdfParams;
use std::time::Duration;

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the database if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to error if the database already exists.
    pub error_if_exists: bool,

    /// Interval of the background flusher.
    ///
    /// `None` flushes synchronously after every mutation.
    pub flush_interval: Option<Duration>,

    /// Whether plaintext snapshots are pretty-printed.
    pub pretty_json: bool,

    /// Parameters of the secret-to-key derivation.
    pub kdf: KdfParams,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            flush_interval: None,
            pretty_json: true,
            kdf: KdfParams::default(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to error if database exists.
    #[must_use]
    pub const fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Flushes from a background thread every `interval` instead of after
    /// each mutation.
    #[must_use]
    pub const fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = Some(interval);
        self
    }

    /// Flushes synchronously after each mutation.
    #[must_use]
    pub const fn flush_on_write(mut self) -> Self {
        self.flush_interval = None;
        self
    }

    /// Sets whether plaintext snapshots are pretty-printed.
    #[must_use]
    pub const fn pretty_json(mut self, value: bool) -> Self {
        self.pretty_json = value;
        self
    }

    /// Sets the key derivation parameters.
    #[must_use]
    pub const fn kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }
}
