//! Frame-level codec for the greeter protocol.
//!
//! Format: `[u32 BE message id][u32 BE payload length][payload]`
//!
//! The codec ensures:
//! - Frames are length-prefixed for stream framing
//! - Maximum message size is enforced
//! - Partial reads return `Ok(None)` to support incremental assembly

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::constants::{HEADER_LEN, MAX_MESSAGE_LENGTH};
use crate::error::{Error, Result};

/// One complete protocol frame: header decoded, payload still raw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message id from the header.
    pub id: u32,
    /// Raw payload bytes (exactly the declared length).
    pub payload: Bytes,
}

/// Encode a frame from an id and an already-encoded payload.
pub fn encode_frame(id: u32, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u32(id);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}

/// Decode one frame from a buffer.
///
/// Returns:
/// - `Ok(Some(frame))` if a complete frame was decoded (buffer is advanced)
/// - `Ok(None)` if more data is needed (buffer unchanged)
/// - `Err` if the declared length is impossible
pub fn decode_frame(buf: &mut BytesMut) -> Result<Option<Frame>> {
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }

    // Peek the header without consuming.
    let id = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let length = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;

    if HEADER_LEN + length > MAX_MESSAGE_LENGTH {
        return Err(Error::Codec {
            message: format!(
                "frame length {} exceeds maximum {}",
                length,
                MAX_MESSAGE_LENGTH - HEADER_LEN
            ),
        });
    }

    if buf.len() < HEADER_LEN + length {
        return Ok(None);
    }

    buf.advance(HEADER_LEN);
    let payload = buf.split_to(length).freeze();

    Ok(Some(Frame { id, payload }))
}

// =============================================================================
// Incremental Assembly
// =============================================================================

/// Incremental frame assembler for a stream that delivers partial data.
///
/// Holds the accumulation buffer and exposes how many bytes are still
/// needed, replacing the recursive "reread once the length is known"
/// approach with an explicit state object. The caller feeds bytes as its
/// event loop reports the stream readable; the assembler never does I/O.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buf: BytesMut,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes required before the current frame could possibly complete.
    ///
    /// While the header is incomplete this is the distance to the header
    /// boundary; the payload requirement is only known after that.
    pub fn bytes_needed(&self) -> usize {
        if self.buf.len() < HEADER_LEN {
            return HEADER_LEN - self.buf.len();
        }
        let length = u32::from_be_bytes([self.buf[4], self.buf[5], self.buf[6], self.buf[7]])
            as usize;
        (HEADER_LEN + length).saturating_sub(self.buf.len())
    }

    /// Number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Feed bytes received from the stream.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Try to take one complete frame out of the buffer.
    ///
    /// `Ok(None)` means "insufficient data, try later" — not an error.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        decode_frame(&mut self.buf)
    }
}

// =============================================================================
// Tests
// =============================================================================
