//! CLI command implementations.

pub mod export;
pub mod import;
pub mod inspect;
pub mod keys;

use runedb_core::{Config, Database, Rune};
use runedb_storage::DirectoryProvider;
use std::path::PathBuf;

/// The database a command operates on.
pub struct Target {
    /// Directory holding the database files.
    pub dir: PathBuf,
    /// Database name.
    pub name: Option<String>,
    /// Hex-encoded encryption key.
    pub key: Option<String>,
}

impl Target {
    /// Returns the database name or an error naming the missing flag.
    pub fn name(&self) -> Result<&str, Box<dyn std::error::Error>> {
        self.name
            .as_deref()
            .ok_or_else(|| "database name required (--name)".into())
    }

    /// Snapshot file path for the target.
    pub fn path(&self) -> Result<PathBuf, Box<dyn std::error::Error>> {
        Ok(DirectoryProvider::new(&self.dir).path_for(self.name()?)?)
    }

    /// Opens the target database.
    ///
    /// With `create` false a missing database is an error instead of being
    /// created empty.
    pub fn open(&self, create: bool) -> Result<Database, Box<dyn std::error::Error>> {
        let config = Config::default().create_if_missing(create);
        let rune = Rune::with_config(DirectoryProvider::new(&self.dir), config);
        Ok(rune.db(self.name()?, None, self.key.as_deref())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runedb_core::{CoreError, Value};
    use tempfile::tempdir;

    pub(crate) fn target(dir: &std::path::Path, key: Option<String>) -> Target {
        Target {
            dir: dir.to_path_buf(),
            name: Some("notes".to_string()),
            key,
        }
    }

    #[test]
    fn missing_name_is_reported() {
        let temp = tempdir().unwrap();
        let target = Target {
            dir: temp.path().to_path_buf(),
            name: None,
            key: None,
        };
        assert!(target.open(true).is_err());
    }

    #[test]
    fn open_without_create_requires_file() {
        let temp = tempdir().unwrap();
        let target = target(temp.path(), None);
        let err = target.open(false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CoreError>(),
            Some(CoreError::DatabaseNotFound { .. })
        ));

        let db = target.open(true).unwrap();
        db.push(Value::from(1)).unwrap();
        db.close().unwrap();
        assert!(target.path().unwrap().exists());
        assert!(target.open(false).is_ok());
    }
}
