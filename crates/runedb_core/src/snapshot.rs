//! Snapshot serialization: JSON in the clear, or a sealed CBOR envelope.
//!
//! ## Encrypted layout
//!
//! ```text
//! +-------------+-------------+------------+--------------------+----------+
//! | magic (4)   | format (1)  | nonce (12) | ciphertext (var)   | tag (16) |
//! | "RDBX"      | 0x01        |            | canonical CBOR     |          |
//! +-------------+-------------+------------+--------------------+----------+
//! ```
//!
//! The magic and format byte are authenticated as associated data.

use crate::crypto::{CryptoManager, EncryptionKey};
use crate::error::{CoreError, CoreResult};
use runedb_codec::{from_cbor, from_json, to_canonical_cbor, to_json, Map, Value};
use tracing::debug;

/// Current snapshot format.
pub const FORMAT_VERSION: u8 = 1;

/// Leading bytes of an encrypted snapshot.
pub const MAGIC: &[u8; 4] = b"RDBX";

const HEADER: [u8; 5] = [MAGIC[0], MAGIC[1], MAGIC[2], MAGIC[3], FORMAT_VERSION];

/// The persisted unit: root document, flush counter and reference index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Number of committed flushes, including the one that wrote this.
    pub version: u64,
    /// The root document.
    pub data: Map,
    /// The persisted reference index (`Null` when empty).
    pub refs: Value,
}

impl Snapshot {
    fn into_value(self) -> CoreResult<Value> {
        let version = i64::try_from(self.version)
            .map_err(|_| CoreError::invalid_document("version counter overflow"))?;
        Ok(Value::map(vec![
            ("format", Value::from(i64::from(FORMAT_VERSION))),
            ("version", Value::from(version)),
            ("data", Value::Map(self.data)),
            ("refs", self.refs),
        ]))
    }

    fn from_value(value: Value) -> CoreResult<Self> {
        let Value::Map(mut fields) = value else {
            return Err(CoreError::corrupt_store("snapshot is not a map"));
        };

        let is_snapshot = matches!(fields.get("format"), Some(Value::Integer(_)))
            && matches!(fields.get("data"), Some(Value::Map(_)));
        if !is_snapshot {
            // A hand-written JSON file holding just the root document.
            debug!("loading bare root document");
            return Ok(Self {
                version: 0,
                data: fields,
                refs: Value::Null,
            });
        }

        let format = fields.get("format").and_then(Value::as_integer).unwrap_or(0);
        if format != i64::from(FORMAT_VERSION) {
            return Err(CoreError::corrupt_store(format!(
                "unsupported snapshot format {format}"
            )));
        }
        let version = match fields.get("version") {
            None => 0,
            Some(Value::Integer(v)) => u64::try_from(*v)
                .map_err(|_| CoreError::corrupt_store("negative snapshot version"))?,
            Some(other) => {
                return Err(CoreError::corrupt_store(format!(
                    "snapshot version is a {}",
                    other.kind()
                )))
            }
        };
        let data = match fields.remove("data") {
            Some(Value::Map(data)) => data,
            _ => Map::new(),
        };
        let refs = fields.remove("refs").unwrap_or(Value::Null);

        Ok(Self {
            version,
            data,
            refs,
        })
    }
}

/// Turns snapshots into bytes and back.
#[derive(Debug)]
pub struct Codec {
    cipher: Option<CryptoManager>,
    pretty_json: bool,
}

impl Codec {
    /// Creates a codec; with a key every encoded snapshot is sealed.
    #[must_use]
    pub fn new(key: Option<&EncryptionKey>, pretty_json: bool) -> Self {
        Self {
            cipher: key.map(CryptoManager::new),
            pretty_json,
        }
    }

    /// Returns true if this codec seals its output.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// Returns true if `bytes` start like an encrypted snapshot.
    #[must_use]
    pub fn is_sealed(bytes: &[u8]) -> bool {
        bytes.starts_with(MAGIC)
    }

    /// Serializes a snapshot.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::Codec`] if the document holds a non-finite
    /// float, or [`CoreError::EncryptionFailed`] if sealing fails.
    pub fn encode(&self, snapshot: Snapshot) -> CoreResult<Vec<u8>> {
        let value = snapshot.into_value()?;
        match &self.cipher {
            None => Ok(to_json(&value, self.pretty_json)?),
            Some(cipher) => {
                let plaintext = to_canonical_cbor(&value)?;
                let sealed = cipher.encrypt_with_aad(&plaintext, &HEADER)?;

                let mut out = Vec::with_capacity(HEADER.len() + sealed.len());
                out.extend_from_slice(&HEADER);
                out.extend(sealed);
                Ok(out)
            }
        }
    }

    /// Parses stored bytes; absent or empty bytes give an empty snapshot.
    ///
    /// Plaintext is accepted even when the codec holds a key.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::DecryptionFailed`] if the bytes are sealed and
    /// the codec has no key or the wrong one, and with
    /// [`CoreError::CorruptStore`] if they cannot be parsed.
    pub fn decode(&self, bytes: Option<&[u8]>) -> CoreResult<Snapshot> {
        let bytes = match bytes {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => return Ok(Snapshot::default()),
        };

        let value = if Self::is_sealed(bytes) {
            let Some(cipher) = &self.cipher else {
                return Err(CoreError::decryption_failed(
                    "database is encrypted but no key was supplied",
                ));
            };
            if bytes.len() < HEADER.len() || bytes[MAGIC.len()] != FORMAT_VERSION {
                return Err(CoreError::corrupt_store("unsupported envelope format"));
            }
            let plaintext = cipher.decrypt_with_aad(&bytes[HEADER.len()..], &HEADER)?;
            from_cbor(&plaintext).map_err(|e| CoreError::corrupt_store(e.to_string()))?
        } else {
            if self.is_encrypted() {
                debug!("plaintext snapshot will be sealed on next flush");
            }
            from_json(bytes).map_err(|e| CoreError::corrupt_store(e.to_string()))?
        };

        Snapshot::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        let mut data = Map::new();
        data.insert(
            "notes".into(),
            Value::Array(vec![Value::map(vec![
                ("id", Value::from("n1")),
                ("text", Value::from("buy milk")),
                ("weight", Value::Float(0.5)),
            ])]),
        );
        Snapshot {
            version: 7,
            data,
            refs: Value::Null,
        }
    }

    #[test]
    fn empty_input_is_empty_snapshot() {
        let codec = Codec::new(None, true);
        assert_eq!(codec.decode(None).unwrap(), Snapshot::default());
        assert_eq!(codec.decode(Some(b"")).unwrap(), Snapshot::default());
    }

    #[test]
    fn plaintext_is_json() {
        let codec = Codec::new(None, false);
        let bytes = codec.encode(sample()).unwrap();

        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.contains("\"buy milk\""));
        assert!(!Codec::is_sealed(&bytes));
        assert_eq!(codec.decode(Some(&bytes)).unwrap(), sample());
    }

    #[test]
    fn sealed_roundtrip() {
        let key = EncryptionKey::generate();
        let codec = Codec::new(Some(&key), true);
        let bytes = codec.encode(sample()).unwrap();

        assert!(Codec::is_sealed(&bytes));
        assert_eq!(bytes[4], FORMAT_VERSION);
        assert!(!bytes.windows(8).any(|w| w == b"buy milk"));
        assert_eq!(codec.decode(Some(&bytes)).unwrap(), sample());
    }

    #[test]
    fn sealed_without_key_fails() {
        let key = EncryptionKey::generate();
        let bytes = Codec::new(Some(&key), true).encode(sample()).unwrap();

        assert!(matches!(
            Codec::new(None, true).decode(Some(&bytes)),
            Err(CoreError::DecryptionFailed { .. })
        ));
    }

    #[test]
    fn wrong_key_or_tampering_fails() {
        let key = EncryptionKey::generate();
        let mut bytes = Codec::new(Some(&key), true).encode(sample()).unwrap();

        let other = Codec::new(Some(&EncryptionKey::generate()), true);
        assert!(matches!(
            other.decode(Some(&bytes)),
            Err(CoreError::DecryptionFailed { .. })
        ));

        let codec = Codec::new(Some(&key), true);
        let middle = bytes.len() / 2;
        bytes[middle] ^= 0x01;
        assert!(matches!(
            codec.decode(Some(&bytes)),
            Err(CoreError::DecryptionFailed { .. })
        ));
    }

    #[test]
    fn unknown_envelope_format_rejected() {
        let key = EncryptionKey::generate();
        let codec = Codec::new(Some(&key), true);
        let mut bytes = codec.encode(sample()).unwrap();

        bytes[4] = 2;
        assert!(matches!(
            codec.decode(Some(&bytes)),
            Err(CoreError::CorruptStore { .. })
        ));
    }

    #[test]
    fn keyed_codec_accepts_plaintext() {
        let bytes = Codec::new(None, true).encode(sample()).unwrap();
        let keyed = Codec::new(Some(&EncryptionKey::generate()), true);
        assert_eq!(keyed.decode(Some(&bytes)).unwrap(), sample());
    }

    #[test]
    fn garbage_is_corrupt() {
        let codec = Codec::new(None, true);
        assert!(matches!(
            codec.decode(Some(b"{not json")),
            Err(CoreError::CorruptStore { .. })
        ));
        assert!(matches!(
            codec.decode(Some(b"[1, 2]")),
            Err(CoreError::CorruptStore { .. })
        ));
        assert!(matches!(
            codec.decode(Some(br#"{"format": 9, "data": {}}"#)),
            Err(CoreError::CorruptStore { .. })
        ));
    }

    #[test]
    fn bare_root_document_loads() {
        let codec = Codec::new(None, true);
        let snapshot = codec
            .decode(Some(br#"{"settings": {"theme": "dark"}}"#))
            .unwrap();

        assert_eq!(snapshot.version, 0);
        assert_eq!(
            snapshot.data.get("settings"),
            Some(&Value::map(vec![("theme", Value::from("dark"))]))
        );
    }

    #[test]
    fn non_finite_float_not_encoded() {
        let mut snapshot = sample();
        snapshot.data.insert("bad".into(), Value::Float(f64::NAN));
        assert!(matches!(
            Codec::new(None, true).encode(snapshot),
            Err(CoreError::Codec(_))
        ));
    }
}
