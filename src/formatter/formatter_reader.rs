//! Primitive reader for the object state format
//!
//! Every length read from the stream is untrusted. Byte payloads are read
//! through [`Read::take`] so memory only grows with bytes that actually
//! arrive, never with what a length prefix claims.

use crate::error::{DecodeError, DecodeResult};
use crate::formatter::formatter_tokens::Token;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Read};

/// Reads tokens and primitives from an input source
pub struct StateReader<R: Read> {
    inner: R,
    position: usize,
}

impl<R: Read> StateReader<R> {
    /// Wrap a source
    pub fn new(inner: R) -> Self {
        Self { inner, position: 0 }
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.position
    }

    /// Read a single byte
    pub fn read_u8(&mut self) -> DecodeResult<u8> {
        let value = self.inner.read_u8()?;
        self.position += 1;
        Ok(value)
    }

    /// Read and decode a token byte
    pub fn read_token(&mut self) -> DecodeResult<Token> {
        Token::try_from(self.read_u8()?)
    }

    /// Read a 16-bit integer
    pub fn read_i16(&mut self) -> DecodeResult<i16> {
        let value = self.inner.read_i16::<LittleEndian>()?;
        self.position += 2;
        Ok(value)
    }

    /// Read a 32-bit integer
    pub fn read_i32(&mut self) -> DecodeResult<i32> {
        let value = self.inner.read_i32::<LittleEndian>()?;
        self.position += 4;
        Ok(value)
    }

    /// Read a 64-bit integer
    pub fn read_i64(&mut self) -> DecodeResult<i64> {
        let value = self.inner.read_i64::<LittleEndian>()?;
        self.position += 8;
        Ok(value)
    }

    /// Read a 32-bit float
    pub fn read_f32(&mut self) -> DecodeResult<f32> {
        let value = self.inner.read_f32::<LittleEndian>()?;
        self.position += 4;
        Ok(value)
    }

    /// Read a 64-bit float
    pub fn read_f64(&mut self) -> DecodeResult<f64> {
        let value = self.inner.read_f64::<LittleEndian>()?;
        self.position += 8;
        Ok(value)
    }

    /// Read a 7-bit encoded integer
    ///
    /// At most five bytes; the fifth may only carry the top four bits.
    pub fn read_7bit_i32(&mut self) -> DecodeResult<i32> {
        let mut result = 0u32;
        for shift in (0..28).step_by(7) {
            let byte = self.read_u8()?;
            result |= u32::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(result as i32);
            }
        }

        let byte = self.read_u8()?;
        if byte > 0x0F {
            return Err(DecodeError::Bad7BitInt);
        }
        result |= u32::from(byte) << 28;
        Ok(result as i32)
    }

    /// Read a non-negative 7-bit encoded length no larger than `limit`
    pub fn read_length(&mut self, limit: usize) -> DecodeResult<usize> {
        let raw = self.read_7bit_i32()?;
        let length = usize::try_from(raw).map_err(|_| DecodeError::InvalidLength(raw))?;
        if length > limit {
            return Err(DecodeError::LengthLimitExceeded { length, limit });
        }
        Ok(length)
    }

    /// Read exactly `length` bytes
    pub fn read_bytes(&mut self, length: usize) -> DecodeResult<Vec<u8>> {
        let mut bytes = Vec::new();
        let read = (&mut self.inner)
            .take(length as u64)
            .read_to_end(&mut bytes)?;
        self.position += read;
        if read != length {
            return Err(DecodeError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes, got {}", length, read),
            )));
        }
        Ok(bytes)
    }

    /// Read a length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> DecodeResult<String> {
        let length = self.read_length(i32::MAX as usize)?;
        let bytes = self.read_bytes(length)?;
        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
    }

    /// Read one UTF-8 encoded character of the basic multilingual plane
    pub fn read_char(&mut self) -> DecodeResult<char> {
        let lead = self.read_u8()?;
        let width = match lead {
            0x00..=0x7F => 1,
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            _ => return Err(DecodeError::InvalidUtf8),
        };
        let mut buffer = [lead, 0, 0];
        for slot in buffer.iter_mut().take(width).skip(1) {
            *slot = self.read_u8()?;
        }
        std::str::from_utf8(&buffer[..width])
            .ok()
            .and_then(|text| text.chars().next())
            .ok_or(DecodeError::InvalidUtf8)
    }

    /// Read `N` bytes into an array
    pub fn read_array<const N: usize>(&mut self) -> DecodeResult<[u8; N]> {
        let mut buffer = [0u8; N];
        self.inner.read_exact(&mut buffer)?;
        self.position += N;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(bytes: &[u8]) -> StateReader<&[u8]> {
        StateReader::new(bytes)
    }

    #[test]
    fn test_7bit_decoding() {
        assert_eq!(reader(&[0x00]).read_7bit_i32().unwrap(), 0);
        assert_eq!(reader(&[0xAC, 0x02]).read_7bit_i32().unwrap(), 300);
        assert_eq!(
            reader(&[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]).read_7bit_i32().unwrap(),
            -1
        );
        assert_eq!(
            reader(&[0xFF, 0xFF, 0xFF, 0xFF, 0x07]).read_7bit_i32().unwrap(),
            i32::MAX
        );
    }

    #[test]
    fn test_7bit_rejects_oversized() {
        assert!(matches!(
            reader(&[0xFF, 0xFF, 0xFF, 0xFF, 0x10]).read_7bit_i32(),
            Err(DecodeError::Bad7BitInt)
        ));
        assert!(matches!(
            reader(&[0x80, 0x80]).read_7bit_i32(),
            Err(DecodeError::Io(_))
        ));
    }

    #[test]
    fn test_length_checks() {
        assert!(matches!(
            reader(&[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]).read_length(100),
            Err(DecodeError::InvalidLength(-1))
        ));
        assert!(matches!(
            reader(&[0x65]).read_length(100),
            Err(DecodeError::LengthLimitExceeded { length: 101, limit: 100 })
        ));
        assert_eq!(reader(&[0x64]).read_length(100).unwrap(), 100);
    }

    #[test]
    fn test_string_reading() {
        let mut r = reader(&[6, b'h', 0xC3, 0xA9, b'l', b'l', b'o']);
        assert_eq!(r.read_string().unwrap(), "héllo");
        assert_eq!(r.position(), 7);

        assert!(matches!(
            reader(&[2, 0xC3, 0x28]).read_string(),
            Err(DecodeError::InvalidUtf8)
        ));
    }

    #[test]
    fn test_truncated_payload_does_not_preallocate() {
        // claims ~2GB, carries three bytes
        let mut r = reader(&[0xFF, 0xFF, 0xFF, 0xFF, 0x07, 1, 2, 3]);
        assert!(matches!(r.read_string(), Err(DecodeError::Io(_))));
    }

    #[test]
    fn test_char_reading() {
        assert_eq!(reader(&[0x41]).read_char().unwrap(), 'A');
        assert_eq!(reader(&[0xE2, 0x82, 0xAC]).read_char().unwrap(), '€');
        assert!(matches!(reader(&[0xFF]).read_char(), Err(DecodeError::InvalidUtf8)));
        // four-byte sequences need two UTF-16 code units
        assert!(matches!(
            reader(&[0xF0, 0x9F, 0x98, 0x80]).read_char(),
            Err(DecodeError::InvalidUtf8)
        ));
        assert!(matches!(
            reader(&[0xE2, 0x41, 0x41]).read_char(),
            Err(DecodeError::InvalidUtf8)
        ));
    }

    #[test]
    fn test_fixed_width() {
        let mut r = reader(&[0x02, 0x01, 0xFE, 0xFF, 0xFF, 0xFF]);
        assert_eq!(r.read_i16().unwrap(), 0x0102);
        assert_eq!(r.read_i32().unwrap(), -2);
        assert!(matches!(r.read_u8(), Err(DecodeError::Io(_))));
    }
}
