//! Pipe wire format.
//!
//! Every message in either direction is a length prefix followed by exactly
//! that many payload bytes:
//! ```text
//! ┌──────────┬─────────────────────┐
//! │ Length   │ Payload             │
//! │ 4 bytes  │ Length bytes        │
//! │ uint32 BE│ encoded protobuf    │
//! └──────────┴─────────────────────┘
//! ```

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// Length prefix size in bytes (fixed, exactly 4).
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum payload size (1 GB).
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 1_073_741_824;

/// Encode a payload length as a big-endian prefix.
///
/// # Example
///
/// ```
/// use rxn_handler::protocol::encode_length;
///
/// assert_eq!(encode_length(258), [0, 0, 1, 2]);
/// ```
#[inline]
pub fn encode_length(len: u32) -> [u8; LENGTH_PREFIX_SIZE] {
    len.to_be_bytes()
}

/// Decode a big-endian length prefix.
///
/// Returns `None` if fewer than [`LENGTH_PREFIX_SIZE`] bytes are given.
#[inline]
pub fn decode_length(buf: &[u8]) -> Option<u32> {
    let prefix: [u8; LENGTH_PREFIX_SIZE] = buf.get(..LENGTH_PREFIX_SIZE)?.try_into().ok()?;
    Some(u32::from_be_bytes(prefix))
}

/// Build a complete frame (prefix + payload) into one buffer.
pub fn build_frame(payload: &[u8]) -> Result<Vec<u8>> {
    let len = payload_len(payload)?;
    let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    frame.extend_from_slice(&encode_length(len));
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Write one frame and flush the writer.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = payload_len(payload)?;
    writer.write_all(&encode_length(len)).await?;
    if !payload.is_empty() {
        writer.write_all(payload).await?;
    }
    writer.flush().await?;
    Ok(())
}

fn payload_len(payload: &[u8]) -> Result<u32> {
    u32::try_from(payload.len()).map_err(|_| {
        Error::Protocol(format!(
            "payload size {} does not fit a 4-byte length prefix",
            payload.len()
        ))
    })
}
