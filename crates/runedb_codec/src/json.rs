//! JSON text format.
//!
//! Plaintext snapshots are stored as JSON so they stay readable and
//! editable with ordinary tools.

use crate::error::{CodecError, CodecResult};
use crate::value::{Value, MAX_DEPTH};

/// Encode a value as JSON text.
///
/// # Errors
///
/// Returns an error if the value contains a NaN or infinite float, which
/// JSON cannot represent, or nests deeper than [`MAX_DEPTH`].
pub fn to_json(value: &Value, pretty: bool) -> CodecResult<Vec<u8>> {
    value.validate()?;
    let result = if pretty {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    };
    result.map_err(|e| CodecError::encoding_failed(e.to_string()))
}

/// Decode a value from JSON text.
///
/// # Errors
///
/// Returns [`CodecError::DecodingFailed`] if the bytes are not valid JSON and
/// [`CodecError::DepthLimitExceeded`] if containers nest deeper than
/// [`MAX_DEPTH`], the same cap the CBOR decoder applies.
pub fn from_json(bytes: &[u8]) -> CodecResult<Value> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))?;
    if value.depth() > MAX_DEPTH {
        return Err(CodecError::DepthLimitExceeded {
            max_depth: MAX_DEPTH,
        });
    }
    Ok(value)
}
