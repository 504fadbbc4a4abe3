//! Wire-level field primitives.
//!
//! Payload fields are 4-byte big-endian integers and length-prefixed UTF-8
//! strings (4-byte big-endian byte length, raw bytes, no terminator).
//!
//! Reads fail closed: a truncated integer decodes as 0 and a truncated
//! string as "", with a warning logged. Decode shortfall is never allowed
//! to read past the bytes actually received, and it is the caller's job to
//! treat an incomplete *frame* as "try again later" (see [`crate::codec`]).

use bytes::{BufMut, Bytes, BytesMut};
use tracing::warn;

/// Size of an encoded integer field.
pub const INT_LEN: usize = 4;

/// Encoded size of a string field (length prefix plus bytes).
pub fn string_len(value: &str) -> usize {
    INT_LEN + value.len()
}

// =============================================================================
// Writer
// =============================================================================

/// Bounded payload writer.
///
/// Mirrors the daemon's encoder contract: fields that would exceed the
/// caller-supplied maximum are dropped rather than written out of bounds.
#[derive(Debug)]
pub struct WireWriter {
    buf: BytesMut,
    max: usize,
}

impl WireWriter {
    /// Create a writer that will never grow past `max` bytes.
    pub fn new(max: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(max.min(256)),
            max,
        }
    }

    /// Append a big-endian u32, unless it would exceed the bound.
    pub fn put_u32(&mut self, value: u32) {
        if self.buf.len() + INT_LEN > self.max {
            warn!(max = self.max, "dropping int field that exceeds message bound");
            return;
        }
        self.buf.put_u32(value);
    }

    /// Append a length-prefixed string, unless it would exceed the bound.
    pub fn put_string(&mut self, value: &str) {
        if self.buf.len() + string_len(value) > self.max {
            warn!(
                field_len = value.len(),
                max = self.max,
                "dropping string field that exceeds message bound"
            );
            return;
        }
        self.buf.put_u32(value.len() as u32);
        self.buf.put_slice(value.as_bytes());
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finish writing and take the encoded bytes.
    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Payload reader over received bytes.
///
/// Never reads past the end of the slice; shortfalls decode as zero/empty.
#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    /// Current read offset within the payload.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Read a big-endian u32, or 0 if fewer than four bytes remain.
    pub fn get_u32(&mut self) -> u32 {
        if self.remaining() < INT_LEN {
            warn!(
                need = INT_LEN,
                got = self.remaining(),
                "not enough data for int field"
            );
            return 0;
        }
        let b = &self.buf[self.offset..self.offset + INT_LEN];
        self.offset += INT_LEN;
        u32::from_be_bytes([b[0], b[1], b[2], b[3]])
    }

    /// Read a length-prefixed string, or "" if the payload is truncated.
    ///
    /// Invalid UTF-8 is replaced rather than rejected; the daemon only ever
    /// sends UTF-8, so replacement indicates a corrupt frame worth logging.
    pub fn get_string(&mut self) -> String {
        let length = self.get_u32() as usize;
        if self.remaining() < length {
            warn!(
                need = length,
                got = self.remaining(),
                "not enough data for string field"
            );
            return String::new();
        }
        let raw = &self.buf[self.offset..self.offset + length];
        self.offset += length;
        String::from_utf8_lossy(raw).into_owned()
    }
}

// =============================================================================
// Tests
// =============================================================================
