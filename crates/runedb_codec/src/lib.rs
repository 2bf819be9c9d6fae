//! # RuneDB Codec
//!
//! Document model and encodings for RuneDB.
//!
//! This crate provides:
//! - [`Value`], the dynamic JSON-shaped tree every database is made of
//! - Deterministic canonical CBOR, used for the encrypted snapshot payload
//!   and as the stable input of reference digests
//! - JSON text, used for plaintext snapshots and import/export
//!
//! ## Canonical CBOR Rules
//!
//! - Maps are sorted by key (length-first, then bytewise on encoded keys)
//! - Map keys are always text
//! - Integers use shortest encoding
//! - Floats are 64-bit doubles, finite only, with `-0.0` folded into `0.0`
//! - No indefinite-length items, byte strings, or tags
//!
//! ## Usage
//!
//! ```
//! use runedb_codec::{to_canonical_cbor, from_cbor, Value};
//!
//! let value = Value::map(vec![("text", Value::from("a"))]);
//! let bytes = to_canonical_cbor(&value).unwrap();
//!
//! let decoded = from_cbor(&bytes).unwrap();
//! assert_eq!(value, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod json;
mod value;

pub use decoder::{from_cbor, CanonicalDecoder};
pub use encoder::{to_canonical_cbor, CanonicalEncoder};
pub use error::{CodecError, CodecResult};
pub use json::{from_json, to_json};
pub use value::{Map, Value, MAX_DEPTH};
