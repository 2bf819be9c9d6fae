//! Canonical CBOR encoder.
//!
//! Output follows the core deterministic encoding of RFC 8949 §4.2.1, which
//! makes it usable as input to digests and as the sealed snapshot payload:
//!
//! - arguments use the shortest head
//! - lengths are always definite
//! - map keys are ordered by their encoded bytes (shorter first)
//!
//! Floats are written as 64-bit doubles with `-0.0` folded into `0.0`, so
//! values that compare equal encode identically.

use crate::error::{CodecError, CodecResult};
use crate::value::{Map, Value};
use std::cmp::Ordering;

/// Major types used by [`Value`].
#[derive(Clone, Copy)]
#[repr(u8)]
enum Major {
    Unsigned = 0,
    Negative = 1,
    Text = 3,
    Array = 4,
    Map = 5,
}

const FALSE: u8 = 0xf4;
const TRUE: u8 = 0xf5;
const NULL: u8 = 0xf6;
const DOUBLE: u8 = 0xfb;

/// Encodes a value to canonical CBOR bytes.
///
/// # Errors
///
/// Returns `NonFiniteFloat` if the value contains a NaN or infinite float,
/// and `DepthLimitExceeded` if it nests deeper than the decoder accepts.
pub fn to_canonical_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    value.validate()?;
    let mut encoder = CanonicalEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.finish())
}

/// Streams values into a canonical CBOR buffer.
///
/// Several values may be encoded back to back; [`finish`](Self::finish)
/// returns the concatenation.
#[derive(Debug, Default)]
pub struct CanonicalEncoder {
    out: Vec<u8>,
}

impl CanonicalEncoder {
    /// Creates an empty encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value`.
    ///
    /// On error the buffer may hold a partial item.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => self.out.push(NULL),
            Value::Bool(b) => self.out.push(if *b { TRUE } else { FALSE }),
            Value::Integer(n) => self.integer(*n),
            Value::Float(f) => self.double(*f)?,
            Value::Text(s) => self.text(s),
            Value::Array(items) => {
                self.head(Major::Array, items.len() as u64);
                items.iter().try_for_each(|item| self.encode(item))?;
            }
            Value::Map(map) => self.map(map)?,
        }
        Ok(())
    }

    /// Bytes written so far.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.out
    }

    /// Consumes the encoder and returns its bytes.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.out
    }

    #[allow(clippy::cast_possible_truncation)]
    fn head(&mut self, major: Major, arg: u64) {
        let major = (major as u8) << 5;
        match arg {
            0..=23 => self.out.push(major | arg as u8),
            24..=0xff => self.out.extend_from_slice(&[major | 24, arg as u8]),
            0x100..=0xffff => {
                self.out.push(major | 25);
                self.out.extend_from_slice(&(arg as u16).to_be_bytes());
            }
            0x1_0000..=0xffff_ffff => {
                self.out.push(major | 26);
                self.out.extend_from_slice(&(arg as u32).to_be_bytes());
            }
            _ => {
                self.out.push(major | 27);
                self.out.extend_from_slice(&arg.to_be_bytes());
            }
        }
    }

    fn integer(&mut self, n: i64) {
        // Negative n is stored as -1 - n, which is !n in two's complement.
        match u64::try_from(n) {
            Ok(arg) => self.head(Major::Unsigned, arg),
            Err(_) => self.head(Major::Negative, (!n).unsigned_abs()),
        }
    }

    fn double(&mut self, f: f64) -> CodecResult<()> {
        if !f.is_finite() {
            return Err(CodecError::NonFiniteFloat);
        }
        let f = if f == 0.0 { 0.0 } else { f };
        self.out.push(DOUBLE);
        self.out.extend_from_slice(&f.to_bits().to_be_bytes());
        Ok(())
    }

    fn text(&mut self, s: &str) {
        self.head(Major::Text, s.len() as u64);
        self.out.extend_from_slice(s.as_bytes());
    }

    fn map(&mut self, map: &Map) -> CodecResult<()> {
        // Text heads grow with the length, so ordering by (length, bytes)
        // matches ordering by encoded key.
        let mut entries: Vec<(&String, &Value)> = map.iter().collect();
        entries.sort_by(|(a, _), (b, _)| key_order(a, b));

        self.head(Major::Map, entries.len() as u64);
        for (key, value) in entries {
            self.text(key);
            self.encode(value)?;
        }
        Ok(())
    }
}

pub(crate) fn key_order(a: &str, b: &str) -> Ordering {
    a.len()
        .cmp(&b.len())
        .then_with(|| a.as_bytes().cmp(b.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(value: &Value) -> String {
        to_canonical_cbor(value)
            .unwrap()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    // Vectors from RFC 8949 Appendix A.
    #[test]
    fn rfc_vectors() {
        assert_eq!(hex(&Value::Integer(0)), "00");
        assert_eq!(hex(&Value::Integer(23)), "17");
        assert_eq!(hex(&Value::Integer(24)), "1818");
        assert_eq!(hex(&Value::Integer(1000)), "1903e8");
        assert_eq!(hex(&Value::Integer(1_000_000)), "1a000f4240");
        assert_eq!(hex(&Value::Integer(1_000_000_000_000)), "1b000000e8d4a51000");
        assert_eq!(hex(&Value::Integer(-1)), "20");
        assert_eq!(hex(&Value::Integer(-1000)), "3903e7");
        assert_eq!(hex(&Value::Bool(false)), "f4");
        assert_eq!(hex(&Value::Null), "f6");
        assert_eq!(hex(&Value::from("IETF")), "6449455446");
        assert_eq!(hex(&Value::from("\u{00fc}")), "62c3bc");
    }

    #[test]
    fn integer_extremes() {
        assert_eq!(hex(&Value::Integer(i64::MAX)), "1b7fffffffffffffff");
        assert_eq!(hex(&Value::Integer(i64::MIN)), "3b7fffffffffffffff");
    }

    #[test]
    fn nested_containers() {
        let value = Value::Array(vec![
            Value::Integer(1),
            Value::Array(vec![Value::Integer(2), Value::Integer(3)]),
        ]);
        assert_eq!(hex(&value), "8201820203");
        assert_eq!(hex(&Value::empty_map()), "a0");
    }

    #[test]
    fn doubles() {
        assert_eq!(hex(&Value::Float(1.5)), "fb3ff8000000000000");
        assert_eq!(hex(&Value::Float(-0.0)), hex(&Value::Float(0.0)));
        assert_eq!(
            to_canonical_cbor(&Value::Float(f64::INFINITY)),
            Err(CodecError::NonFiniteFloat)
        );
    }

    #[test]
    fn shorter_keys_first() {
        let map = Value::map(vec![
            ("aa", Value::Integer(1)),
            ("b", Value::Integer(2)),
            ("a", Value::Integer(3)),
        ]);
        assert_eq!(hex(&map), "a361610361620262616101");
    }

    #[test]
    fn consecutive_items() {
        let mut encoder = CanonicalEncoder::new();
        encoder.encode(&Value::Integer(1)).unwrap();
        encoder.encode(&Value::Null).unwrap();
        assert_eq!(encoder.as_bytes(), &[0x01, 0xf6]);
        assert_eq!(encoder.finish(), vec![0x01, 0xf6]);
    }
}
