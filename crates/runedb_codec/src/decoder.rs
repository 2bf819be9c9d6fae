//! Canonical CBOR decoder.

use crate::encoder::key_order;
use crate::error::{CodecError, CodecResult};
use crate::value::{Map, Value, MAX_DEPTH};
use std::cmp::Ordering;

// Caps on what the decoder accepts from untrusted input.
const MAX_ELEMENTS: u64 = 16 * 1024 * 1024;
const MAX_TEXT_BYTES: u64 = 256 * 1024 * 1024;

const NOT_SHORTEST: &str = "non-canonical: argument not in shortest form";

/// Decodes exactly one value from `bytes`.
///
/// # Errors
///
/// Returns an error if the bytes are not canonical CBOR as RuneDB writes it
/// (byte strings, tags, non-text keys, indefinite lengths and short floats
/// are all rejected) or if bytes are left over.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = CanonicalDecoder::new(bytes);
    let value = decoder.decode()?;
    match decoder.remaining().len() {
        0 => Ok(value),
        remaining => Err(CodecError::TrailingBytes { remaining }),
    }
}

/// The initial byte of an item, split into its parts.
enum Head {
    Unsigned(u64),
    Negative(u64),
    Text(u64),
    Array(u64),
    Map(u64),
    Double(f64),
    Simple(u8),
}

/// Reads canonical CBOR items from a byte slice.
pub struct CanonicalDecoder<'a> {
    input: &'a [u8],
    depth: usize,
}

impl<'a> CanonicalDecoder<'a> {
    /// Creates a decoder over `input`.
    #[must_use]
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, depth: 0 }
    }

    /// Decodes the next item.
    pub fn decode(&mut self) -> CodecResult<Value> {
        match self.head()? {
            Head::Unsigned(n) => i64::try_from(n)
                .map(Value::Integer)
                .map_err(|_| CodecError::invalid_structure("integer exceeds i64")),
            // -1 - n == !n for every n that fits in i64
            Head::Negative(n) => i64::try_from(n)
                .map(|n| Value::Integer(!n))
                .map_err(|_| CodecError::invalid_structure("integer exceeds i64")),
            Head::Text(len) => self.text(len).map(Value::Text),
            Head::Array(len) => {
                let len = limit(len, MAX_ELEMENTS)?;
                self.descend(|d| {
                    let mut items = Vec::with_capacity(len.min(d.input.len()));
                    for _ in 0..len {
                        items.push(d.decode()?);
                    }
                    Ok(Value::Array(items))
                })
            }
            Head::Map(len) => {
                let len = limit(len, MAX_ELEMENTS)?;
                self.descend(|d| d.map(len))
            }
            Head::Double(f) if f.is_finite() => Ok(Value::Float(f)),
            Head::Double(_) => Err(CodecError::NonFiniteFloat),
            Head::Simple(20) => Ok(Value::Bool(false)),
            Head::Simple(21) => Ok(Value::Bool(true)),
            Head::Simple(22 | 23) => Ok(Value::Null),
            Head::Simple(n) => Err(CodecError::unsupported_type(format!("simple value {n}"))),
        }
    }

    /// Returns true once every byte has been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    /// Bytes not consumed yet.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        self.input
    }

    fn take(&mut self, n: usize) -> CodecResult<&'a [u8]> {
        if n > self.input.len() {
            return Err(CodecError::UnexpectedEof);
        }
        let (taken, rest) = self.input.split_at(n);
        self.input = rest;
        Ok(taken)
    }

    fn take_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn head(&mut self) -> CodecResult<Head> {
        let initial = self.take(1)?[0];
        let (major, info) = (initial >> 5, initial & 0x1f);

        if major == 7 {
            return match info {
                0..=23 => Ok(Head::Simple(info)),
                25 | 26 => Err(CodecError::invalid_structure(
                    "non-canonical: floats are written as doubles",
                )),
                27 => Ok(Head::Double(f64::from_bits(u64::from_be_bytes(
                    self.take_array()?,
                )))),
                31 => Err(CodecError::invalid_structure("unexpected break")),
                _ => Err(CodecError::unsupported_type(format!("simple value {info}"))),
            };
        }
        match major {
            2 => return Err(CodecError::unsupported_type("byte string")),
            6 => return Err(CodecError::unsupported_type("tagged value")),
            _ => {}
        }

        let arg = self.argument(info)?;
        Ok(match major {
            0 => Head::Unsigned(arg),
            1 => Head::Negative(arg),
            3 => Head::Text(arg),
            4 => Head::Array(arg),
            _ => Head::Map(arg),
        })
    }

    fn argument(&mut self, info: u8) -> CodecResult<u64> {
        let (arg, floor) = match info {
            0..=23 => return Ok(u64::from(info)),
            24 => (u64::from(self.take(1)?[0]), 24),
            25 => (u64::from(u16::from_be_bytes(self.take_array()?)), 0x100),
            26 => (u64::from(u32::from_be_bytes(self.take_array()?)), 0x1_0000),
            27 => (u64::from_be_bytes(self.take_array()?), 0x1_0000_0000),
            31 => return Err(CodecError::IndefiniteLengthForbidden),
            _ => return Err(CodecError::invalid_structure("reserved additional info")),
        };
        if arg < floor {
            return Err(CodecError::invalid_structure(NOT_SHORTEST));
        }
        Ok(arg)
    }

    fn text(&mut self, len: u64) -> CodecResult<String> {
        let bytes = self.take(limit(len, MAX_TEXT_BYTES)?)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| CodecError::InvalidUtf8)
    }

    fn map(&mut self, len: usize) -> CodecResult<Value> {
        let mut map = Map::new();
        let mut previous: Option<String> = None;

        for _ in 0..len {
            let Head::Text(key_len) = self.head()? else {
                return Err(CodecError::invalid_structure("map keys must be text"));
            };
            let key = self.text(key_len)?;
            if previous
                .as_deref()
                .is_some_and(|prev| key_order(prev, &key) != Ordering::Less)
            {
                return Err(CodecError::invalid_structure(
                    "non-canonical: map keys not in sorted order",
                ));
            }
            let value = self.decode()?;
            previous = Some(key.clone());
            map.insert(key, value);
        }

        Ok(Value::Map(map))
    }

    fn descend(&mut self, f: impl FnOnce(&mut Self) -> CodecResult<Value>) -> CodecResult<Value> {
        if self.depth == MAX_DEPTH {
            return Err(CodecError::DepthLimitExceeded {
                max_depth: MAX_DEPTH,
            });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }
}

fn limit(claimed: u64, max_allowed: u64) -> CodecResult<usize> {
    if claimed > max_allowed {
        return Err(CodecError::SizeLimitExceeded {
            claimed,
            max_allowed,
        });
    }
    usize::try_from(claimed).map_err(|_| CodecError::SizeLimitExceeded {
        claimed,
        max_allowed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::to_canonical_cbor;

    #[test]
    fn decode_scalars() {
        assert_eq!(from_cbor(&[0xf6]).unwrap(), Value::Null);
        assert_eq!(from_cbor(&[0xf5]).unwrap(), Value::Bool(true));
        assert_eq!(from_cbor(&[0x17]).unwrap(), Value::Integer(23));
        assert_eq!(from_cbor(&[0x38, 99]).unwrap(), Value::Integer(-100));
    }

    #[test]
    fn decode_double() {
        let mut bytes = vec![0xfb];
        bytes.extend_from_slice(&2.25f64.to_bits().to_be_bytes());
        assert_eq!(from_cbor(&bytes).unwrap(), Value::Float(2.25));
    }

    #[test]
    fn reject_non_shortest_integer() {
        // 5 encoded with a one-byte argument
        let result = from_cbor(&[0x18, 5]);
        assert!(matches!(result, Err(CodecError::InvalidStructure { .. })));
    }

    #[test]
    fn reject_unsorted_map_keys() {
        // {"b": 1, "a": 2}
        let bytes = [0xa2, 0x61, b'b', 0x01, 0x61, b'a', 0x02];
        assert!(matches!(
            from_cbor(&bytes),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn reject_non_text_keys() {
        // {1: 2}
        assert!(from_cbor(&[0xa1, 0x01, 0x02]).is_err());
    }

    #[test]
    fn reject_byte_strings() {
        assert!(matches!(
            from_cbor(&[0x41, 0x00]),
            Err(CodecError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn reject_indefinite_length() {
        assert_eq!(
            from_cbor(&[0x9f, 0xff]),
            Err(CodecError::IndefiniteLengthForbidden)
        );
    }

    #[test]
    fn reject_truncated_input() {
        assert_eq!(from_cbor(&[0x65, b'h', b'i']), Err(CodecError::UnexpectedEof));
        assert_eq!(from_cbor(&[]), Err(CodecError::UnexpectedEof));
    }

    #[test]
    fn reject_trailing_bytes() {
        assert_eq!(
            from_cbor(&[0x01, 0x02]),
            Err(CodecError::TrailingBytes { remaining: 1 })
        );
    }

    #[test]
    fn reject_huge_claimed_length() {
        // array claiming u32::MAX elements
        let bytes = [0x9a, 0xff, 0xff, 0xff, 0xff];
        assert!(matches!(
            from_cbor(&bytes),
            Err(CodecError::SizeLimitExceeded { .. })
        ));
    }

    #[test]
    fn reject_excessive_nesting() {
        let mut bytes = vec![0x81; MAX_DEPTH + 1];
        bytes.push(0x00);
        assert!(matches!(
            from_cbor(&bytes),
            Err(CodecError::DepthLimitExceeded { .. })
        ));
    }

    #[test]
    fn nesting_cap_matches_encoder() {
        let deepest = (0..MAX_DEPTH).fold(Value::Null, |inner, _| Value::Array(vec![inner]));
        let bytes = to_canonical_cbor(&deepest).unwrap();
        assert_eq!(from_cbor(&bytes).unwrap(), deepest);

        let too_deep = Value::Array(vec![deepest]);
        assert_eq!(
            to_canonical_cbor(&too_deep),
            Err(CodecError::DepthLimitExceeded {
                max_depth: MAX_DEPTH
            })
        );
    }

    #[test]
    fn decodes_encoder_output() {
        let value = Value::map(vec![
            ("name", Value::from("Alice")),
            ("score", Value::Float(-3.75)),
            ("tags", Value::from(vec!["x", "yy"])),
            ("nested", Value::map(vec![("n", Value::Integer(i64::MIN))])),
        ]);
        let bytes = to_canonical_cbor(&value).unwrap();
        assert_eq!(from_cbor(&bytes).unwrap(), value);
    }
}
