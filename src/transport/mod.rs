//! Transport module - the two ways batches reach the handler.
//!
//! - [`PipeHandler`]: length-prefixed commands over a pair of byte streams
//! - [`Server`]: unary HTTP RPC

mod pipe;
mod rpc;

pub use pipe::PipeHandler;
pub use rpc::{
    router, Code, ErrorResponse, Server, KEY_EVENT_BATCH_PATH, PROCESS_EVENT_BATCH_PATH,
    PROTO_CONTENT_TYPE, TIMEOUT_HEADER,
};
