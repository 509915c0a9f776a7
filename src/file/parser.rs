//! Cursor-based parser for metadata structures.
//!
//! [`Parser`] wraps a byte slice with a position cursor and typed little-endian reads,
//! plus the ECMA-335 compressed integer encodings (II.23.2) used by signatures and
//! permission sets. All reads are bounds-checked and never panic on truncated input.

use crate::{
    file::io::{read_le_at, CilIO},
    Error::OutOfBounds,
    Result,
};

/// A cursor-based reader over a byte slice.
///
/// Maintains an internal position that advances with each read, with explicit
/// seeking for random access. Used for parsing headers, blob payloads, and the
/// compressed-integer encodings of the metadata format.
///
/// # Examples
///
/// ```rust
/// use cilmeta::Parser;
///
/// let data = [0x01, 0x02, 0x03, 0x04];
/// let mut parser = Parser::new(&data);
/// let value = parser.read_le::<u16>()?;
/// assert_eq!(value, 0x0201);
/// # Ok::<(), cilmeta::Error>(())
/// ```
pub struct Parser<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser over the given data.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the current cursor position.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Returns `true` if there are unread bytes left.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the current position to the specified index.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos >= self.data.len() {
            return Err(OutOfBounds);
        }

        self.position = pos;
        Ok(())
    }

    /// Move the position forward by one byte.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing would exceed the data length.
    pub fn advance(&mut self) -> Result<()> {
        self.advance_by(1)
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing by `step` would exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        let Some(new_position) = self.position.checked_add(step) else {
            return Err(OutOfBounds);
        };

        if new_position > self.data.len() {
            return Err(OutOfBounds);
        }

        self.position = new_position;
        Ok(())
    }

    /// Read a value of type `T` in little-endian byte order, advancing the cursor.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length.
    pub fn read_le<T: CilIO>(&mut self) -> Result<T> {
        read_le_at(self.data, &mut self.position)
    }

    /// Read a compressed unsigned integer as defined in ECMA-335 II.23.2.
    ///
    /// * `0xxxxxxx` - 1-byte encoding, 7 bits of value
    /// * `10xxxxxx x` - 2-byte encoding, 14 bits of value
    /// * `110xxxxx x y z` - 4-byte encoding, 29 bits of value
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length or
    /// [`crate::Error::Malformed`] for an invalid leading byte.
    pub fn read_compressed_uint(&mut self) -> Result<u32> {
        let first_byte = self.read_le::<u8>()?;

        if (first_byte & 0x80) == 0 {
            return Ok(u32::from(first_byte));
        }

        if (first_byte & 0xC0) == 0x80 {
            let second_byte = self.read_le::<u8>()?;
            let value = ((u32::from(first_byte) & 0x3F) << 8) | u32::from(second_byte);
            return Ok(value);
        }

        if (first_byte & 0xE0) == 0xC0 {
            let b1 = u32::from(self.read_le::<u8>()?);
            let b2 = u32::from(self.read_le::<u8>()?);
            let b3 = u32::from(self.read_le::<u8>()?);
            let value = ((u32::from(first_byte) & 0x1F) << 24) | (b1 << 16) | (b2 << 8) | b3;
            return Ok(value);
        }

        Err(malformed_error!("Invalid compressed uint - {}", first_byte))
    }

    /// Read a compressed signed integer as defined in ECMA-335 II.23.2.
    ///
    /// Uses the same variable-length encoding as unsigned integers with the sign
    /// rotated into the least significant bit.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length or
    /// [`crate::Error::Malformed`] for invalid encoding.
    #[allow(clippy::cast_possible_wrap)]
    pub fn read_compressed_int(&mut self) -> Result<i32> {
        let Some(first_byte) = self.data.get(self.position).copied() else {
            return Err(OutOfBounds);
        };

        let raw = self.read_compressed_uint()?;
        let value = (raw >> 1) as i32;
        if raw & 1 == 0 {
            return Ok(value);
        }

        // Negative values wrap within the bit budget of their encoding width
        if (first_byte & 0x80) == 0 {
            Ok(value - 0x40)
        } else if (first_byte & 0xC0) == 0x80 {
            Ok(value - 0x2000)
        } else {
            Ok(value - 0x1000_0000)
        }
    }

    /// Read a UTF-8 string prefixed with a compressed length.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the declared length exceeds the
    /// remaining data.
    pub fn read_prefixed_string_utf8(&mut self) -> Result<String> {
        let length = self.read_compressed_uint()? as usize;
        if length == 0 {
            return Ok(String::new());
        }

        let Some(end) = self.position.checked_add(length) else {
            return Err(OutOfBounds);
        };

        if end > self.data.len() {
            return Err(OutOfBounds);
        }

        let bytes = &self.data[self.position..end];
        self.position = end;

        Ok(String::from_utf8_lossy(bytes).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_le_sequence() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_le::<u16>().unwrap(), 0x0201);
        assert_eq!(parser.read_le::<u16>().unwrap(), 0x0403);
        assert!(parser.read_le::<u8>().is_err());
    }

    #[test]
    fn seek_and_advance() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut parser = Parser::new(&data);

        parser.seek(2).unwrap();
        assert_eq!(parser.pos(), 2);
        assert_eq!(parser.read_le::<u8>().unwrap(), 0x03);

        parser.advance().unwrap();
        assert!(!parser.has_more_data());
        assert!(parser.advance().is_err());
        assert!(parser.seek(4).is_err());
    }

    #[test]
    fn compressed_uint_one_byte() {
        let data = [0x03];
        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_compressed_uint().unwrap(), 3);
        assert_eq!(parser.pos(), 1);
    }

    #[test]
    fn compressed_uint_two_byte() {
        let data = [0x81, 0x02];
        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_compressed_uint().unwrap(), 0x102);
        assert_eq!(parser.pos(), 2);
    }

    #[test]
    fn compressed_uint_four_byte() {
        let data = [0xC0, 0x01, 0x01, 0x01];
        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_compressed_uint().unwrap(), 0x10101);
        assert_eq!(parser.pos(), 4);
    }

    #[test]
    fn compressed_uint_invalid() {
        let data = [0xFF];
        let mut parser = Parser::new(&data);
        assert!(parser.read_compressed_uint().is_err());
    }

    #[test]
    fn compressed_int_positive() {
        // 7 encoded as 7 << 1 = 0x0E
        let data = [0x0E];
        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_compressed_int().unwrap(), 7);
    }

    #[test]
    fn compressed_int_negative() {
        // -3 encoded as ((-3 & 0x3F) << 1 | 1) within the 1-byte budget = 0x7B
        let data = [0x7B];
        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_compressed_int().unwrap(), -3);
    }

    #[test]
    fn prefixed_string() {
        let data = [0x03, b'a', b'b', b'c', 0x00];
        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_prefixed_string_utf8().unwrap(), "abc");
        assert_eq!(parser.read_prefixed_string_utf8().unwrap(), "");
    }

    #[test]
    fn prefixed_string_truncated() {
        let data = [0x05, b'a', b'b'];
        let mut parser = Parser::new(&data);
        assert!(parser.read_prefixed_string_utf8().is_err());
    }
}
