//! Compact big-endian encoding for numeric columns.
//!
//! Counters and 256-bit integers are stored as the minimal big-endian byte
//! string that represents them: no leading zero bytes, and zero is the empty
//! string. Decoding a string wider than the target type means the stored data
//! cannot represent the declared type and is reported as [`CodecError::Overflow`].

use alloy_primitives::U256;
use thiserror::Error;

/// Errors raised while decoding stored numbers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Stored value is wider than the type it decodes into.
    #[error("encoded value of {len} bytes overflows a {bits}-bit integer")]
    Overflow { bits: usize, len: usize },
}

/// Encode a `u64` as its minimal big-endian representation.
pub fn encode_u64(value: u64) -> Vec<u8> {
    trim_leading_zeros(&value.to_be_bytes()).to_vec()
}

/// Decode a minimal big-endian byte string into a `u64`.
pub fn decode_u64(bytes: &[u8]) -> Result<u64, CodecError> {
    if bytes.len() > 8 {
        return Err(CodecError::Overflow {
            bits: 64,
            len: bytes.len(),
        });
    }
    Ok(bytes
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte)))
}

/// Encode a `U256` as its minimal big-endian representation.
pub fn encode_u256(value: U256) -> Vec<u8> {
    let bytes: [u8; 32] = value.to_be_bytes();
    trim_leading_zeros(&bytes).to_vec()
}

/// Decode a minimal big-endian byte string into a `U256`.
pub fn decode_u256(bytes: &[u8]) -> Result<U256, CodecError> {
    U256::try_from_be_slice(bytes).ok_or(CodecError::Overflow {
        bits: 256,
        len: bytes.len(),
    })
}

/// Encode an optional `U256`; `None` stays `None` and is stored as SQL `NULL`.
pub fn encode_optional_u256(value: Option<U256>) -> Option<Vec<u8>> {
    value.map(encode_u256)
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|byte| *byte != 0)
        .unwrap_or(bytes.len());
    &bytes[start..]
}
