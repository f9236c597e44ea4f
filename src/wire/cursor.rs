// Bounds-checked byte cursor.
//
// Fixed-width big-endian reads over a fully materialized buffer. A failed
// read leaves the position untouched.

use super::error::{DecodeError, Result};

/// A 64-bit wire value kept as its two raw 32-bit halves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WireLong {
    pub high: u32,
    pub low: u32,
}

impl WireLong {
    pub fn from_i64(value: i64) -> Self {
        let bits = value as u64;
        Self {
            high: (bits >> 32) as u32,
            low: bits as u32,
        }
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        (u64::from(self.high) << 32) | u64::from(self.low)
    }

    #[inline]
    pub fn as_i64(self) -> i64 {
        self.as_u64() as i64
    }
}

/// Read cursor over an owned byte buffer.
#[derive(Debug, Clone)]
pub struct ByteCursor {
    buffer: Vec<u8>,
    position: usize,
}

impl ByteCursor {
    pub fn new(buffer: impl Into<Vec<u8>>) -> Self {
        Self {
            buffer: buffer.into(),
            position: 0,
        }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.position == self.buffer.len()
    }

    /// Move the cursor back to a previously observed position.
    pub(crate) fn restore(&mut self, position: usize) {
        debug_assert!(position <= self.buffer.len());
        self.position = position;
    }

    /// Borrow the next `n` bytes and advance past them.
    #[inline]
    fn take(&mut self, n: usize) -> Result<&[u8]> {
        if n > self.remaining() {
            return Err(DecodeError::OutOfBounds {
                position: self.position,
                needed: n,
                length: self.buffer.len(),
            });
        }
        let start = self.position;
        self.position += n;
        Ok(&self.buffer[start..start + n])
    }

    /// Look at the next byte without consuming it.
    #[inline]
    pub fn peek_raw_byte(&self) -> Option<u8> {
        self.buffer.get(self.position).copied()
    }

    #[inline]
    pub fn read_raw_byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    #[inline]
    pub fn read_raw_short(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    #[inline]
    pub fn read_raw_int(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Two consecutive raw ints, high half first.
    pub fn read_raw_long(&mut self) -> Result<WireLong> {
        let b = self.take(8)?;
        Ok(WireLong {
            high: u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
            low: u32::from_be_bytes([b[4], b[5], b[6], b[7]]),
        })
    }

    pub fn read_raw_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        Ok(self.take(n)?.to_vec())
    }
}
