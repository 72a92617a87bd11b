//! Position-tracked byte views used by the decoder and encoder.
//!
//! [`ByteCursor`] reads from a borrowed buffer and reports absolute offsets
//! (relative to the start of the module) in its errors, even when it is a
//! bounded sub-cursor over one section. [`ByteBuffer`] is the growable
//! write side, whose length is the bytes-written counter used for
//! length-prefix bookkeeping.

use crate::error::{DecodeError, EncodeError};
use crate::leb128;

/// Read-mode cursor over an immutable byte slice.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    /// Absolute offset of `bytes[0]` within the original module.
    base: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            base: 0,
        }
    }

    /// Number of bytes consumed from this cursor.
    pub fn bytes_read(&self) -> usize {
        self.pos
    }

    /// Absolute offset of the next unread byte.
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_byte(&mut self) -> Result<u8, DecodeError> {
        let byte = *self
            .bytes
            .get(self.pos)
            .ok_or(DecodeError::TruncatedInput {
                offset: self.offset(),
                needed: 1,
            })?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_n(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::TruncatedInput {
                offset: self.offset(),
                needed: n - self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Reads a fixed-size array, e.g. the raw bytes of an `f32.const`.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_n(N)?);
        Ok(out)
    }

    /// Consumes everything that is left.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let slice = &self.bytes[self.pos..];
        self.pos = self.bytes.len();
        slice
    }

    /// Splits off the next `len` bytes as an independent cursor, advancing
    /// this one past them.
    pub fn sub_cursor(&mut self, len: usize) -> Result<ByteCursor<'a>, DecodeError> {
        let base = self.offset();
        let bytes = self.read_n(len)?;
        Ok(ByteCursor {
            bytes,
            pos: 0,
            base,
        })
    }

    pub fn read_var_u32(&mut self) -> Result<u32, DecodeError> {
        leb128::read_u32(self)
    }

    pub fn read_var_i32(&mut self) -> Result<i32, DecodeError> {
        leb128::read_i32(self)
    }

    pub fn read_var_i64(&mut self) -> Result<i64, DecodeError> {
        leb128::read_i64(self)
    }

    /// Reads an unsigned-LEB128 length followed by that many bytes.
    pub fn read_bytes_vec(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.read_var_u32()? as usize;
        self.read_n(len)
    }

    /// Reads a length-prefixed UTF-8 name.
    pub fn read_name(&mut self) -> Result<String, DecodeError> {
        let offset = self.offset();
        let bytes = self.read_bytes_vec()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8 { offset })
    }
}

/// Write-mode growable buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteBuffer {
    bytes: Vec<u8>,
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes written so far.
    pub fn bytes_written(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn write_byte(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn write_var_u32(&mut self, value: u32) {
        leb128::write_u32(&mut self.bytes, value);
    }

    pub fn write_var_i32(&mut self, value: i32) {
        leb128::write_i32(&mut self.bytes, value);
    }

    pub fn write_var_i64(&mut self, value: i64) {
        leb128::write_i64(&mut self.bytes, value);
    }

    /// Writes `len` as unsigned LEB128, failing if it exceeds `u32`.
    pub fn write_len(&mut self, what: &'static str, len: usize) -> Result<(), EncodeError> {
        let len32 = u32::try_from(len).map_err(|_| EncodeError::LengthOverflow { what, len })?;
        self.write_var_u32(len32);
        Ok(())
    }

    /// Writes a byte vector with its length prefix.
    pub fn write_bytes_vec(&mut self, what: &'static str, bytes: &[u8]) -> Result<(), EncodeError> {
        self.write_len(what, bytes.len())?;
        self.write(bytes);
        Ok(())
    }

    pub fn write_name(&mut self, name: &str) -> Result<(), EncodeError> {
        self.write_bytes_vec("name", name.as_bytes())
    }

    /// Appends `scratch` prefixed by its byte length. This is the
    /// buffer-then-prefix step used for sections, bodies and subsections.
    pub fn write_sized(
        &mut self,
        what: &'static str,
        scratch: ByteBuffer,
    ) -> Result<(), EncodeError> {
        self.write_bytes_vec(what, &scratch.bytes)
    }
}
