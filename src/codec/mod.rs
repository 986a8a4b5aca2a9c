//! Codec module - serialization of state values and keys.
//!
//! State items never touch bytes directly; they hold an injected codec:
//!
//! - [`ValueCodec`] - encodes a single value (used by `ValueState`)
//! - [`MapCodec`] - encodes keys and values separately (used by `MapState`)
//!
//! Provided implementations:
//!
//! - [`ScalarValueCodec`] / [`ScalarMapCodec`] - protobuf well-known wrapper
//!   encodings for the closed set of [`Scalar`] kinds
//! - [`MsgPackCodec`] - MessagePack via `rmp-serde` for any serde type
//! - [`RawCodec`] - pass-through for raw bytes
//! - [`Int64BeCodec`] - fixed-width 8-byte big-endian integers
//!
//! # Example
//!
//! ```
//! use rxn_handler::codec::{ScalarValueCodec, ValueCodec};
//!
//! let codec = ScalarValueCodec::<i64>::new();
//! let encoded = codec.encode(&42).unwrap();
//! let decoded = codec.decode(&encoded).unwrap();
//! assert_eq!(decoded, 42);
//! ```

mod msgpack;
mod raw;
pub mod scalar;

use thiserror::Error;

pub use msgpack::MsgPackCodec;
pub use raw::{Int64BeCodec, RawCodec};
pub use scalar::{IntWidth, Scalar, ScalarKind, ScalarMapCodec, ScalarValue, ScalarValueCodec};

/// Errors raised while encoding or decoding state values.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The Rust type is not part of the supported scalar set.
    #[error("unsupported type: {type_name}, allowed types: {allowed}")]
    UnsupportedType {
        type_name: &'static str,
        allowed: String,
    },

    /// The payload is not a valid encoding of the expected wrapper.
    #[error("failed to unmarshal {kind}: {source}")]
    Decode {
        kind: &'static str,
        #[source]
        source: prost::DecodeError,
    },

    /// The decoded wrapper does not match the requested Rust type.
    #[error("expected {expected:?} scalar, got {actual:?}")]
    KindMismatch {
        expected: ScalarKind,
        actual: ScalarKind,
    },

    /// A platform-width integer does not fit the configured wire width.
    #[error("{type_name} value {value} does not fit the configured wire width")]
    Overflow {
        type_name: &'static str,
        value: String,
    },

    /// A timestamp is outside the representable range.
    #[error("timestamp out of range")]
    InvalidTimestamp,

    /// A fixed-width payload has the wrong length.
    #[error("invalid payload length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),
}

/// Encodes and decodes the single value held by a value state.
pub trait ValueCodec<T>: Send + Sync + 'static {
    /// Encode a value to its stored representation.
    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Decode a stored representation back into a value.
    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// Encodes and decodes the rows of a map state.
pub trait MapCodec<K, V>: Send + Sync + 'static {
    fn encode_key(&self, key: &K) -> Result<Vec<u8>, CodecError>;
    fn decode_key(&self, bytes: &[u8]) -> Result<K, CodecError>;
    fn encode_value(&self, value: &V) -> Result<Vec<u8>, CodecError>;
    fn decode_value(&self, bytes: &[u8]) -> Result<V, CodecError>;
}
