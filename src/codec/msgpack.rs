//! MsgPack value codec using `rmp-serde`.
//!
//! Always uses `to_vec_named`, so structs are stored as maps keyed by field
//! name rather than positional arrays. Stored state survives field reordering
//! and stays readable by non-Rust handlers.
//!
//! # Example
//!
//! ```
//! use rxn_handler::codec::{MsgPackCodec, ValueCodec};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Session {
//!     views: u32,
//!     last_page: String,
//! }
//!
//! let session = Session { views: 3, last_page: "/home".to_string() };
//! let encoded = MsgPackCodec.encode(&session).unwrap();
//! let decoded: Session = MsgPackCodec.decode(&encoded).unwrap();
//! assert_eq!(decoded, session);
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{CodecError, ValueCodec};

/// MessagePack codec for any serde-compatible value.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl<T> ValueCodec<T> for MsgPackCodec
where
    T: Serialize + DeserializeOwned,
{
    #[inline]
    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        // to_vec_named, not to_vec
        Ok(rmp_serde::to_vec_named(value)?)
    }

    #[inline]
    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
