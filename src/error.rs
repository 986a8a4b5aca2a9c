//! Error types for rxn-handler.

use thiserror::Error;

use crate::codec::CodecError;

/// Main error type for all handler runtime operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during pipe/socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protobuf decode error for a wire message.
    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// Scalar, msgpack or fixed-width value codec failure.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Malformed or semantically invalid input from the caller.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A state spec could not hydrate its state item from the wire entries.
    #[error("failed to load state for {name}: {source}")]
    StateLoad {
        name: String,
        #[source]
        source: Box<Error>,
    },

    /// Framing violation on the pipe transport (truncated frame, oversize length).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Failure returned by a user callback.
    #[error("handler error: {0}")]
    Handler(String),

    /// The request was cancelled before the batch completed.
    #[error("request cancelled")]
    Cancelled,

    /// The caller's deadline passed before the batch completed.
    #[error("deadline exceeded after {0:?}")]
    DeadlineExceeded(std::time::Duration),

    /// Response assembly failed after callbacks already ran.
    #[error("internal error: {0}")]
    Internal(String),

    /// The companion test-run process exited unsuccessfully.
    #[error("{message}{}", format_stderr(.stderr))]
    Command { message: String, stderr: Vec<u8> },
}

impl Error {
    /// Build a [`Error::BadRequest`] from any displayable message.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest(message.into())
    }

    /// Wrap a user error raised inside a callback.
    pub fn handler(err: impl std::fmt::Display) -> Self {
        Error::Handler(err.to_string())
    }

    /// Whether this error should be reported to the caller as a client error.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Error::BadRequest(_))
    }
}

fn format_stderr(stderr: &[u8]) -> String {
    if stderr.is_empty() {
        return String::new();
    }
    format!("\n\nStderr:\n{}", String::from_utf8_lossy(stderr))
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
