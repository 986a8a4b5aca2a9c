//! Scalar codec using protobuf well-known wrapper types.
//!
//! Every supported Rust type maps to exactly one wrapper message:
//!
//! | Rust type        | Wire wrapper                               |
//! |------------------|--------------------------------------------|
//! | `i32`            | `google.protobuf.Int32Value`               |
//! | `i64`            | `google.protobuf.Int64Value`               |
//! | `isize`          | `Int32Value` or `Int64Value` per [`IntWidth`] |
//! | `u32`            | `google.protobuf.UInt32Value`              |
//! | `u64`            | `google.protobuf.UInt64Value`              |
//! | `usize`          | `UInt32Value` or `UInt64Value` per [`IntWidth`] |
//! | `f32`            | `google.protobuf.FloatValue`               |
//! | `f64`            | `google.protobuf.DoubleValue`              |
//! | `bool`           | `google.protobuf.BoolValue`                |
//! | `String`         | `google.protobuf.StringValue`              |
//! | `DateTime<Utc>`  | `google.protobuf.Timestamp`                |
//!
//! The width used for `isize`/`usize` is part of the wire contract, never the
//! host's pointer width, so both sides must be configured with the same
//! [`IntWidth`].

use std::any::{Any, TypeId};
use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use prost::Message;

use super::{CodecError, MapCodec, ValueCodec};
use crate::protocol::{from_timestamp, to_timestamp};

/// Type names accepted by the scalar codec.
pub const ALLOWED_TYPES: &[&str] = &[
    "isize",
    "i32",
    "i64",
    "usize",
    "u32",
    "u64",
    "f32",
    "f64",
    "String",
    "bool",
    "DateTime<Utc>",
];

/// Wire width for platform-width integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntWidth {
    /// Encode `isize`/`usize` as 32-bit wrappers.
    W32,
    /// Encode `isize`/`usize` as 64-bit wrappers.
    #[default]
    W64,
}

/// The wrapper message a scalar is encoded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Int32,
    Int64,
    UInt32,
    UInt64,
    Float,
    Double,
    Bool,
    String,
    Timestamp,
}

impl ScalarKind {
    /// Rust type name used in decode errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            ScalarKind::Int32 => "int32",
            ScalarKind::Int64 => "int64",
            ScalarKind::UInt32 => "uint32",
            ScalarKind::UInt64 => "uint64",
            ScalarKind::Float => "float32",
            ScalarKind::Double => "float64",
            ScalarKind::Bool => "bool",
            ScalarKind::String => "string",
            ScalarKind::Timestamp => "timestamp",
        }
    }
}

/// A decoded scalar in its wire kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Bool(bool),
    String(String),
    Timestamp(DateTime<Utc>),
}

impl ScalarValue {
    pub fn kind(&self) -> ScalarKind {
        match self {
            ScalarValue::Int32(_) => ScalarKind::Int32,
            ScalarValue::Int64(_) => ScalarKind::Int64,
            ScalarValue::UInt32(_) => ScalarKind::UInt32,
            ScalarValue::UInt64(_) => ScalarKind::UInt64,
            ScalarValue::Float(_) => ScalarKind::Float,
            ScalarValue::Double(_) => ScalarKind::Double,
            ScalarValue::Bool(_) => ScalarKind::Bool,
            ScalarValue::String(_) => ScalarKind::String,
            ScalarValue::Timestamp(_) => ScalarKind::Timestamp,
        }
    }

    /// Encode as the matching protobuf wrapper message.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            ScalarValue::Int32(v) => v.encode_to_vec(),
            ScalarValue::Int64(v) => v.encode_to_vec(),
            ScalarValue::UInt32(v) => v.encode_to_vec(),
            ScalarValue::UInt64(v) => v.encode_to_vec(),
            ScalarValue::Float(v) => v.encode_to_vec(),
            ScalarValue::Double(v) => v.encode_to_vec(),
            ScalarValue::Bool(v) => v.encode_to_vec(),
            ScalarValue::String(v) => v.encode_to_vec(),
            ScalarValue::Timestamp(v) => to_timestamp(v).encode_to_vec(),
        }
    }

    /// Decode a wrapper message of the given kind.
    pub fn decode(kind: ScalarKind, bytes: &[u8]) -> Result<Self, CodecError> {
        let err = |source| CodecError::Decode {
            kind: kind.type_name(),
            source,
        };
        let value = match kind {
            ScalarKind::Int32 => ScalarValue::Int32(i32::decode(bytes).map_err(err)?),
            ScalarKind::Int64 => ScalarValue::Int64(i64::decode(bytes).map_err(err)?),
            ScalarKind::UInt32 => ScalarValue::UInt32(u32::decode(bytes).map_err(err)?),
            ScalarKind::UInt64 => ScalarValue::UInt64(u64::decode(bytes).map_err(err)?),
            ScalarKind::Float => ScalarValue::Float(f32::decode(bytes).map_err(err)?),
            ScalarKind::Double => ScalarValue::Double(f64::decode(bytes).map_err(err)?),
            ScalarKind::Bool => ScalarValue::Bool(bool::decode(bytes).map_err(err)?),
            ScalarKind::String => ScalarValue::String(String::decode(bytes).map_err(err)?),
            ScalarKind::Timestamp => {
                let ts = prost_types::Timestamp::decode(bytes).map_err(err)?;
                ScalarValue::Timestamp(from_timestamp(&ts).ok_or(CodecError::InvalidTimestamp)?)
            }
        };
        Ok(value)
    }
}

/// A Rust type with a registered scalar wire representation.
pub trait Scalar: Sized + Send + 'static {
    /// Name reported in errors.
    const TYPE_NAME: &'static str;

    /// The wrapper kind used for this type at the given width.
    fn kind(width: IntWidth) -> ScalarKind;

    fn to_scalar(&self, width: IntWidth) -> Result<ScalarValue, CodecError>;

    fn from_scalar(value: ScalarValue, width: IntWidth) -> Result<Self, CodecError>;
}

fn mismatch(expected: ScalarKind, actual: &ScalarValue) -> CodecError {
    CodecError::KindMismatch {
        expected,
        actual: actual.kind(),
    }
}

macro_rules! fixed_scalar {
    ($ty:ty, $name:literal, $variant:ident) => {
        impl Scalar for $ty {
            const TYPE_NAME: &'static str = $name;

            fn kind(_width: IntWidth) -> ScalarKind {
                ScalarKind::$variant
            }

            fn to_scalar(&self, _width: IntWidth) -> Result<ScalarValue, CodecError> {
                Ok(ScalarValue::$variant(self.clone()))
            }

            fn from_scalar(value: ScalarValue, _width: IntWidth) -> Result<Self, CodecError> {
                match value {
                    ScalarValue::$variant(v) => Ok(v),
                    other => Err(mismatch(ScalarKind::$variant, &other)),
                }
            }
        }
    };
}

fixed_scalar!(i32, "i32", Int32);
fixed_scalar!(i64, "i64", Int64);
fixed_scalar!(u32, "u32", UInt32);
fixed_scalar!(u64, "u64", UInt64);
fixed_scalar!(f32, "f32", Float);
fixed_scalar!(f64, "f64", Double);
fixed_scalar!(bool, "bool", Bool);
fixed_scalar!(String, "String", String);
fixed_scalar!(DateTime<Utc>, "DateTime<Utc>", Timestamp);

fn overflow(type_name: &'static str, value: impl ToString) -> CodecError {
    CodecError::Overflow {
        type_name,
        value: value.to_string(),
    }
}

impl Scalar for isize {
    const TYPE_NAME: &'static str = "isize";

    fn kind(width: IntWidth) -> ScalarKind {
        match width {
            IntWidth::W32 => ScalarKind::Int32,
            IntWidth::W64 => ScalarKind::Int64,
        }
    }

    fn to_scalar(&self, width: IntWidth) -> Result<ScalarValue, CodecError> {
        match width {
            IntWidth::W32 => i32::try_from(*self)
                .map(ScalarValue::Int32)
                .map_err(|_| overflow(Self::TYPE_NAME, self)),
            IntWidth::W64 => i64::try_from(*self)
                .map(ScalarValue::Int64)
                .map_err(|_| overflow(Self::TYPE_NAME, self)),
        }
    }

    fn from_scalar(value: ScalarValue, width: IntWidth) -> Result<Self, CodecError> {
        match (width, value) {
            (IntWidth::W32, ScalarValue::Int32(v)) => {
                isize::try_from(v).map_err(|_| overflow(Self::TYPE_NAME, v))
            }
            (IntWidth::W64, ScalarValue::Int64(v)) => {
                isize::try_from(v).map_err(|_| overflow(Self::TYPE_NAME, v))
            }
            (width, other) => Err(mismatch(Self::kind(width), &other)),
        }
    }
}

impl Scalar for usize {
    const TYPE_NAME: &'static str = "usize";

    fn kind(width: IntWidth) -> ScalarKind {
        match width {
            IntWidth::W32 => ScalarKind::UInt32,
            IntWidth::W64 => ScalarKind::UInt64,
        }
    }

    fn to_scalar(&self, width: IntWidth) -> Result<ScalarValue, CodecError> {
        match width {
            IntWidth::W32 => u32::try_from(*self)
                .map(ScalarValue::UInt32)
                .map_err(|_| overflow(Self::TYPE_NAME, self)),
            IntWidth::W64 => u64::try_from(*self)
                .map(ScalarValue::UInt64)
                .map_err(|_| overflow(Self::TYPE_NAME, self)),
        }
    }

    fn from_scalar(value: ScalarValue, width: IntWidth) -> Result<Self, CodecError> {
        match (width, value) {
            (IntWidth::W32, ScalarValue::UInt32(v)) => {
                usize::try_from(v).map_err(|_| overflow(Self::TYPE_NAME, v))
            }
            (IntWidth::W64, ScalarValue::UInt64(v)) => {
                usize::try_from(v).map_err(|_| overflow(Self::TYPE_NAME, v))
            }
            (width, other) => Err(mismatch(Self::kind(width), &other)),
        }
    }
}

/// Encode a scalar at the given integer width.
pub fn encode<T: Scalar>(value: &T, width: IntWidth) -> Result<Vec<u8>, CodecError> {
    Ok(value.to_scalar(width)?.encode())
}

/// Decode a scalar that was encoded at the given integer width.
pub fn decode<T: Scalar>(bytes: &[u8], width: IntWidth) -> Result<T, CodecError> {
    let value = ScalarValue::decode(T::kind(width), bytes)?;
    T::from_scalar(value, width)
}

fn unsupported<T>() -> CodecError {
    CodecError::UnsupportedType {
        type_name: std::any::type_name::<T>(),
        allowed: ALLOWED_TYPES.join(", "),
    }
}

/// Encode a value whose type is only known at runtime.
///
/// Returns [`CodecError::UnsupportedType`] for anything outside
/// [`ALLOWED_TYPES`].
pub fn encode_any<T: Any>(value: &T, width: IntWidth) -> Result<Vec<u8>, CodecError> {
    let value = value as &dyn Any;
    macro_rules! try_encode {
        ($($ty:ty),*) => {
            $(
                if let Some(v) = value.downcast_ref::<$ty>() {
                    return encode(v, width);
                }
            )*
        };
    }
    try_encode!(isize, i32, i64, usize, u32, u64, f32, f64, String, bool, DateTime<Utc>);
    Err(unsupported::<T>())
}

/// Decode into a type that is only known at runtime.
pub fn decode_any<T: Any>(bytes: &[u8], width: IntWidth) -> Result<T, CodecError> {
    macro_rules! try_decode {
        ($($ty:ty),*) => {
            $(
                if TypeId::of::<T>() == TypeId::of::<$ty>() {
                    let value: Box<dyn Any> = Box::new(decode::<$ty>(bytes, width)?);
                    return value.downcast::<T>().map(|v| *v).map_err(|_| unsupported::<T>());
                }
            )*
        };
    }
    try_decode!(isize, i32, i64, usize, u32, u64, f32, f64, String, bool, DateTime<Utc>);
    Err(unsupported::<T>())
}

/// [`ValueCodec`] for any [`Scalar`] type.
pub struct ScalarValueCodec<T> {
    width: IntWidth,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ScalarValueCodec<T> {
    /// Codec using 64-bit wire integers for `isize`/`usize`.
    pub fn new() -> Self {
        Self::with_int_width(IntWidth::W64)
    }

    pub fn with_int_width(width: IntWidth) -> Self {
        Self {
            width,
            _marker: PhantomData,
        }
    }

    pub fn int_width(&self) -> IntWidth {
        self.width
    }
}

impl<T> Default for ScalarValueCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ScalarValueCodec<T> {
    fn clone(&self) -> Self {
        Self::with_int_width(self.width)
    }
}

impl<T> std::fmt::Debug for ScalarValueCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalarValueCodec")
            .field("type", &std::any::type_name::<T>())
            .field("width", &self.width)
            .finish()
    }
}

impl<T: Scalar> ValueCodec<T> for ScalarValueCodec<T> {
    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        encode(value, self.width)
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        decode(bytes, self.width)
    }
}

/// [`MapCodec`] whose keys and values are both [`Scalar`] types.
pub struct ScalarMapCodec<K, V> {
    width: IntWidth,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> ScalarMapCodec<K, V> {
    pub fn new() -> Self {
        Self::with_int_width(IntWidth::W64)
    }

    pub fn with_int_width(width: IntWidth) -> Self {
        Self {
            width,
            _marker: PhantomData,
        }
    }
}

impl<K, V> Default for ScalarMapCodec<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for ScalarMapCodec<K, V> {
    fn clone(&self) -> Self {
        Self::with_int_width(self.width)
    }
}

impl<K, V> std::fmt::Debug for ScalarMapCodec<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalarMapCodec")
            .field("key", &std::any::type_name::<K>())
            .field("value", &std::any::type_name::<V>())
            .field("width", &self.width)
            .finish()
    }
}

impl<K: Scalar, V: Scalar> MapCodec<K, V> for ScalarMapCodec<K, V> {
    fn encode_key(&self, key: &K) -> Result<Vec<u8>, CodecError> {
        encode(key, self.width)
    }

    fn decode_key(&self, bytes: &[u8]) -> Result<K, CodecError> {
        decode(bytes, self.width)
    }

    fn encode_value(&self, value: &V) -> Result<Vec<u8>, CodecError> {
        encode(value, self.width)
    }

    fn decode_value(&self, bytes: &[u8]) -> Result<V, CodecError> {
        decode(bytes, self.width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn round_trip<T: Scalar + PartialEq + std::fmt::Debug>(value: T, width: IntWidth) {
        let encoded = encode(&value, width).unwrap();
        let decoded: T = decode(&encoded, width).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_integer_boundaries() {
        round_trip(i32::MIN, IntWidth::W64);
        round_trip(i32::MAX, IntWidth::W64);
        round_trip(i64::MIN, IntWidth::W64);
        round_trip(i64::MAX, IntWidth::W64);
        round_trip(u32::MAX, IntWidth::W64);
        round_trip(u64::MAX, IntWidth::W64);
        round_trip(0u64, IntWidth::W64);
    }

    #[test]
    fn test_floats_bools_and_strings() {
        round_trip(3.5f32, IntWidth::W64);
        round_trip(-2.25f64, IntWidth::W64);
        round_trip(f64::MAX, IntWidth::W64);
        round_trip(false, IntWidth::W64);
        round_trip(true, IntWidth::W64);
        round_trip(String::new(), IntWidth::W64);
        round_trip("hello wörld".to_string(), IntWidth::W64);
    }

    #[test]
    fn test_timestamps() {
        round_trip(DateTime::<Utc>::UNIX_EPOCH, IntWidth::W64);
        let ts = Utc.with_ymd_and_hms(2024, 2, 29, 13, 45, 1).unwrap()
            + chrono::Duration::nanoseconds(123_456_789);
        round_trip(ts, IntWidth::W64);
        let before_epoch = Utc.with_ymd_and_hms(1969, 7, 20, 20, 17, 0).unwrap();
        round_trip(before_epoch, IntWidth::W64);
    }

    #[test]
    fn test_zero_values_encode_empty() {
        // proto3 wrappers omit default field values
        assert!(encode(&0i64, IntWidth::W64).unwrap().is_empty());
        assert!(encode(&false, IntWidth::W64).unwrap().is_empty());
        assert!(encode(&String::new(), IntWidth::W64).unwrap().is_empty());
        assert_eq!(decode::<i64>(&[], IntWidth::W64).unwrap(), 0);
    }

    #[test]
    fn test_platform_width_uses_wire_width() {
        round_trip(isize::MIN, IntWidth::W64);
        round_trip(usize::MAX, IntWidth::W64);
        round_trip(-7isize, IntWidth::W32);
        round_trip(7usize, IntWidth::W32);

        // A 32-bit encoding is an Int32Value on the wire.
        let narrow = encode(&-7isize, IntWidth::W32).unwrap();
        assert_eq!(narrow, encode(&-7i32, IntWidth::W64).unwrap());
        let wide = encode(&7usize, IntWidth::W64).unwrap();
        assert_eq!(wide, encode(&7u64, IntWidth::W64).unwrap());
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_platform_width_overflow() {
        let err = encode(&(i64::MAX as isize), IntWidth::W32).unwrap_err();
        assert!(matches!(err, CodecError::Overflow { type_name: "isize", .. }));
        let err = encode(&(u64::MAX as usize), IntWidth::W32).unwrap_err();
        assert!(matches!(err, CodecError::Overflow { type_name: "usize", .. }));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode::<i64>(&[0xFF, 0xFF], IntWidth::W64).unwrap_err();
        assert!(err.to_string().contains("failed to unmarshal int64"));
    }

    #[test]
    fn test_encode_any_supported_and_unsupported() {
        let encoded = encode_any(&"abc".to_string(), IntWidth::W64).unwrap();
        assert_eq!(decode::<String>(&encoded, IntWidth::W64).unwrap(), "abc");

        let err = encode_any(&vec![1u8, 2, 3], IntWidth::W64).unwrap_err();
        match err {
            CodecError::UnsupportedType { type_name, allowed } => {
                assert!(type_name.contains("Vec<u8>"));
                assert!(allowed.contains("DateTime<Utc>"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_decode_any() {
        let encoded = encode(&99u32, IntWidth::W64).unwrap();
        assert_eq!(decode_any::<u32>(&encoded, IntWidth::W64).unwrap(), 99);
        assert!(matches!(
            decode_any::<char>(&encoded, IntWidth::W64),
            Err(CodecError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_scalar_codecs() {
        let value_codec = ScalarValueCodec::<String>::new();
        let bytes = value_codec.encode(&"v".to_string()).unwrap();
        assert_eq!(value_codec.decode(&bytes).unwrap(), "v");

        let map_codec = ScalarMapCodec::<String, isize>::with_int_width(IntWidth::W32);
        let key = map_codec.encode_key(&"count".to_string()).unwrap();
        let value = map_codec.encode_value(&12).unwrap();
        assert_eq!(map_codec.decode_key(&key).unwrap(), "count");
        assert_eq!(map_codec.decode_value(&value).unwrap(), 12);
    }
}
