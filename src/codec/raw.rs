//! Raw and fixed-width value codecs.
//!
//! - [`RawCodec`] stores bytes as-is.
//! - [`Int64BeCodec`] stores an `i64` as exactly 8 big-endian bytes and
//!   rejects payloads of any other length.

use super::{CodecError, ValueCodec};

/// Codec that passes bytes through without transformation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl ValueCodec<Vec<u8>> for RawCodec {
    #[inline]
    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>, CodecError> {
        Ok(value.clone())
    }

    #[inline]
    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(bytes.to_vec())
    }
}

/// Size of an encoded [`Int64BeCodec`] value.
pub const INT64_BE_SIZE: usize = 8;

/// Fixed-width big-endian `i64` codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct Int64BeCodec;

impl ValueCodec<i64> for Int64BeCodec {
    fn encode(&self, value: &i64) -> Result<Vec<u8>, CodecError> {
        Ok(value.to_be_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<i64, CodecError> {
        let fixed: [u8; INT64_BE_SIZE] =
            bytes.try_into().map_err(|_| CodecError::InvalidLength {
                expected: INT64_BE_SIZE,
                actual: bytes.len(),
            })?;
        Ok(i64::from_be_bytes(fixed))
    }
}
