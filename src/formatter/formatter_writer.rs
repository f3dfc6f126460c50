//! Primitive writer for the object state format

use crate::error::{EncodeError, EncodeResult};
use crate::formatter::formatter_tokens::Token;
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;

/// Writes tokens and primitives to an output sink
pub struct StateWriter<W: Write> {
    inner: W,
    written: usize,
}

impl<W: Write> StateWriter<W> {
    /// Wrap a sink
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Bytes written so far
    pub fn bytes_written(&self) -> usize {
        self.written
    }

    /// Unwrap the sink
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Write a single byte
    pub fn write_u8(&mut self, value: u8) -> EncodeResult<()> {
        self.inner.write_u8(value)?;
        self.written += 1;
        Ok(())
    }

    /// Write a token byte
    pub fn write_token(&mut self, token: Token) -> EncodeResult<()> {
        self.write_u8(token.as_byte())
    }

    /// Write a 16-bit integer
    pub fn write_i16(&mut self, value: i16) -> EncodeResult<()> {
        self.inner.write_i16::<LittleEndian>(value)?;
        self.written += 2;
        Ok(())
    }

    /// Write a 32-bit integer
    pub fn write_i32(&mut self, value: i32) -> EncodeResult<()> {
        self.inner.write_i32::<LittleEndian>(value)?;
        self.written += 4;
        Ok(())
    }

    /// Write a 64-bit integer
    pub fn write_i64(&mut self, value: i64) -> EncodeResult<()> {
        self.inner.write_i64::<LittleEndian>(value)?;
        self.written += 8;
        Ok(())
    }

    /// Write a 32-bit float
    pub fn write_f32(&mut self, value: f32) -> EncodeResult<()> {
        self.inner.write_f32::<LittleEndian>(value)?;
        self.written += 4;
        Ok(())
    }

    /// Write a 64-bit float
    pub fn write_f64(&mut self, value: f64) -> EncodeResult<()> {
        self.inner.write_f64::<LittleEndian>(value)?;
        self.written += 8;
        Ok(())
    }

    /// Write a 7-bit encoded integer
    ///
    /// Seven bits per byte, low group first, high bit set on every byte but
    /// the last. Negative values are written as their unsigned bit pattern
    /// and always take five bytes.
    pub fn write_7bit_i32(&mut self, value: i32) -> EncodeResult<()> {
        let mut remaining = value as u32;
        while remaining >= 0x80 {
            self.write_u8((remaining & 0x7F) as u8 | 0x80)?;
            remaining >>= 7;
        }
        self.write_u8(remaining as u8)
    }

    /// Write a length or count as a 7-bit encoded integer
    pub fn write_length(&mut self, length: usize) -> EncodeResult<()> {
        let length = i32::try_from(length).map_err(|_| EncodeError::LengthOverflow { length })?;
        self.write_7bit_i32(length)
    }

    /// Write raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) -> EncodeResult<()> {
        self.inner.write_all(bytes)?;
        self.written += bytes.len();
        Ok(())
    }

    /// Write a length-prefixed UTF-8 string
    pub fn write_string(&mut self, text: &str) -> EncodeResult<()> {
        self.write_length(text.len())?;
        self.write_bytes(text.as_bytes())
    }

    /// Write a character as its UTF-8 encoding
    ///
    /// The format carries a single UTF-16 code unit, so characters outside
    /// the basic multilingual plane are rejected.
    pub fn write_char(&mut self, ch: char) -> EncodeResult<()> {
        if u32::from(ch) > 0xFFFF {
            return Err(EncodeError::CharOutsideBmp(ch));
        }
        let mut buffer = [0u8; 3];
        self.write_bytes(ch.encode_utf8(&mut buffer).as_bytes())
    }

    /// Flush the sink
    pub fn flush(&mut self) -> EncodeResult<()> {
        self.inner.flush()?;
        Ok(())
    }
}
