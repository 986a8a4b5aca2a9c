//! Protocol module - wire messages, framing and time conversion.
//!
//! - Protobuf messages of the handler protocol ([`messages`]) and of the
//!   test-run pipe ([`commands`])
//! - 4-byte big-endian length-prefix framing for the pipe transport
//! - Frame buffer for accumulating partial reads
//! - `chrono` <-> protobuf timestamp conversion

pub mod commands;
mod frame_buffer;
pub mod messages;
mod time;
mod wire_format;

pub use frame_buffer::FrameBuffer;
pub use time::{from_optional_timestamp, from_timestamp, to_timestamp};
pub use wire_format::{
    build_frame, decode_length, encode_length, write_frame, DEFAULT_MAX_FRAME_SIZE,
    LENGTH_PREFIX_SIZE,
};
