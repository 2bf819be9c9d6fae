//! Key derivation and re-encryption commands.

use super::Target;
use runedb_core::crypto::EncryptionKey;
use runedb_core::{Config, Database};
use tracing::info;

/// Prints the key derived from `secret`.
pub fn genkey(secret: &str) -> Result<(), Box<dyn std::error::Error>> {
    let key = EncryptionKey::derive(secret, &Config::default().kdf)?;
    println!("{}", key.to_hex());
    Ok(())
}

/// Opens the target with its current key and rewrites it under `new_key`,
/// or as plaintext when `new_key` is `None`.
pub fn rekey(target: &Target, new_key: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let db = target.open(false)?;
    rekey_database(&db, new_key)?;
    db.close()?;

    info!(
        name = target.name()?,
        encrypted = new_key.is_some(),
        "rewrote database"
    );
    Ok(())
}

/// Switches an open database to `new_key`.
pub fn rekey_database(db: &Database, new_key: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let key = new_key.map(EncryptionKey::from_hex).transpose()?;
    db.rekey(key)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::target;
    use runedb_core::{CoreError, Value, MAGIC};
    use tempfile::tempdir;

    #[test]
    fn encrypt_then_decrypt() {
        let temp = tempdir().unwrap();
        let plain = target(temp.path(), None);
        let db = plain.open(true).unwrap();
        db.map("settings").unwrap().set("pin", "1234").unwrap();
        db.close().unwrap();

        let key = EncryptionKey::generate().to_hex();
        rekey(&plain, Some(&key)).unwrap();
        let bytes = std::fs::read(plain.path().unwrap()).unwrap();
        assert!(bytes.starts_with(MAGIC));

        let err = plain.open(false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CoreError>(),
            Some(CoreError::DecryptionFailed { .. })
        ));

        let sealed = target(temp.path(), Some(key));
        rekey(&sealed, None).unwrap();
        let db = plain.open(false).unwrap();
        assert_eq!(
            db.map("settings").unwrap().get("pin").unwrap(),
            Some(Value::from("1234"))
        );
    }

    #[test]
    fn malformed_new_key_rejected() {
        let temp = tempdir().unwrap();
        let db = target(temp.path(), None).open(true).unwrap();
        assert!(rekey_database(&db, Some("zz")).is_err());
        assert!(!db.is_encrypted());
    }
}
