//! Blob heap (`#Blob`) access and construction.
//!
//! The blob heap stores length-prefixed binary payloads (signatures, permission sets,
//! public keys) referenced by offset from metadata tables. [`Blob`] gives read access
//! to an existing heap; [`BlobBuilder`] accumulates payloads for a heap being written.
//!
//! Each entry starts with its length in the compressed encoding of ECMA-335 II.24.2.4:
//!
//! * `0bbbbbbb` - 1 byte, values up to 0x7F
//! * `10bbbbbb x` - 2 bytes, values up to 0x3FFF
//! * `110bbbbb x y z` - 4 bytes, values up to 0x1FFF_FFFF

use crate::{file::parser::Parser, Error::OutOfBounds, Result};

/// Read-only view of a blob heap.
///
/// Offset 0 always holds the mandatory leading null byte, which doubles as the empty
/// blob. Offsets come from metadata table columns and are not validated until accessed.
///
/// # Examples
///
/// ```rust
/// use cilmeta::metadata::streams::Blob;
///
/// let data = &[0u8, 0x03, 0x41, 0x42, 0x43];
/// let blob = Blob::from(data)?;
/// assert_eq!(blob.get(1)?, &[0x41, 0x42, 0x43]);
/// # Ok::<(), cilmeta::Error>(())
/// ```
pub struct Blob<'a> {
    data: &'a [u8],
}

impl<'a> Blob<'a> {
    /// Wrap raw heap bytes.
    ///
    /// # Errors
    /// Returns an error if the data is empty or does not start with the mandatory
    /// null byte.
    pub fn from(data: &'a [u8]) -> Result<Blob<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Invalid memory for #Blob heap"));
        }

        Ok(Blob { data })
    }

    /// Returns the payload bytes of the entry at `index`.
    ///
    /// Decodes the compressed length prefix and slices out exactly that many bytes.
    ///
    /// # Errors
    /// Returns an error if the index is out of bounds, the length prefix is invalid,
    /// or the declared payload overruns the heap.
    pub fn get(&self, index: usize) -> Result<&'a [u8]> {
        if index > self.data.len() {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(&self.data[index..]);
        let len = parser.read_compressed_uint()? as usize;
        let skip = parser.pos();

        let Some(data_start) = index.checked_add(skip) else {
            return Err(OutOfBounds);
        };

        let Some(data_end) = data_start.checked_add(len) else {
            return Err(OutOfBounds);
        };

        if data_start > self.data.len() || data_end > self.data.len() {
            return Err(OutOfBounds);
        }

        Ok(&self.data[data_start..data_end])
    }
}

/// Accumulates blob payloads for a heap under construction.
///
/// Payloads are appended in admission order after the mandatory leading null byte;
/// no deduplication is attempted. Offsets returned by [`BlobBuilder::admit`] are
/// valid heap indices for the finished data.
pub struct BlobBuilder {
    data: Vec<u8>,
}

impl BlobBuilder {
    /// Create an empty builder holding only the leading null byte.
    #[must_use]
    pub fn new() -> BlobBuilder {
        BlobBuilder { data: vec![0] }
    }

    /// Append a payload with its compressed length prefix and return its heap offset.
    ///
    /// # Errors
    /// Returns an error if the payload exceeds the 29-bit length limit of the
    /// compressed encoding.
    pub fn admit(&mut self, payload: &[u8]) -> Result<u32> {
        let offset = u32::try_from(self.data.len())
            .map_err(|_| malformed_error!("Blob heap exceeds u32 offset range"))?;

        let len = payload.len();
        if len <= 0x7F {
            self.data.push(len as u8);
        } else if len <= 0x3FFF {
            self.data.push(0x80 | (len >> 8) as u8);
            self.data.push((len & 0xFF) as u8);
        } else if len <= 0x1FFF_FFFF {
            self.data.push(0xC0 | (len >> 24) as u8);
            self.data.push(((len >> 16) & 0xFF) as u8);
            self.data.push(((len >> 8) & 0xFF) as u8);
            self.data.push((len & 0xFF) as u8);
        } else {
            return Err(malformed_error!(
                "Blob payload too large for compressed length encoding - {}",
                len
            ));
        }

        self.data.extend_from_slice(payload);
        Ok(offset)
    }

    /// Returns the heap bytes accumulated so far.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the builder, returning the finished heap bytes.
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

impl Default for BlobBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data = {
            let mut data = vec![0xCC; 66100];
            /* i - 0  - leading null, empty blob */ data[0]       = 0b_00000000_u8;

            /* i - 1  - len 10                   */ data[1]       = 0b_00001010_u8;
            /* i - 1  - len 10                   */ data[2..12]   .copy_from_slice(&[0x0A; 10]);

            /* i - 12 - len 5                    */ data[12]      = 0b_00000101_u8;
            /* i - 12 - len 5                    */ data[13..18]  .copy_from_slice(&[0xAB; 5]);

            /* i - 18 - invalid length prefix    */ data[18]      = 0b_11111111_u8;

            /* i - 19 - len 257                  */ data[19]      = 0b_10000001_u8;
            /* i - 19 - len 257                  */ data[20]      = 0b_00000001_u8;
            /* i - 19 - len 257                  */ data[21..278] .copy_from_slice(&[0xBA; 257]);

            /* i - 278 - len 65793               */ data[278]     = 0b_11000000_u8;
            /* i - 278 - len 65793               */ data[279]     = 0b_00000001_u8;
            /* i - 278 - len 65793               */ data[280]     = 0b_00000001_u8;
            /* i - 278 - len 65793               */ data[281]     = 0b_00000001_u8;
            /* i - 278 - len 65793               */ data[282..66075].copy_from_slice(&[0xBA; 65793]);

            data
        };

        let blob = Blob::from(&data).unwrap();

        assert_eq!(blob.get(0).unwrap().len(), 0);
        assert_eq!(blob.get(1).unwrap(), &[0x0A; 10]);
        assert_eq!(blob.get(12).unwrap(), &[0xAB; 5]);
        assert!(blob.get(18).is_err());
        assert_eq!(blob.get(19).unwrap(), &[0xBA; 257]);
        assert_eq!(blob.get(278).unwrap().len(), 65793);
    }

    #[test]
    fn invalid_heap_start() {
        assert!(Blob::from(&[]).is_err());
        assert!(Blob::from(&[0x01, 0x00]).is_err());
    }

    #[test]
    fn truncated_payload() {
        let data = [0x00, 0x05, 0x41, 0x42];
        let blob = Blob::from(&data).unwrap();
        assert!(blob.get(1).is_err());
    }

    #[test]
    fn builder_roundtrip() {
        let mut builder = BlobBuilder::new();

        let first = builder.admit(&[0x41, 0x42, 0x43]).unwrap();
        let second = builder.admit(&[0xAA; 200]).unwrap();
        let third = builder.admit(&[]).unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 5);

        let data = builder.into_data();
        let blob = Blob::from(&data).unwrap();
        assert_eq!(blob.get(first as usize).unwrap(), &[0x41, 0x42, 0x43]);
        assert_eq!(blob.get(second as usize).unwrap(), &[0xAA; 200]);
        assert_eq!(blob.get(third as usize).unwrap(), &[]);
    }

    #[test]
    fn builder_no_dedup() {
        let mut builder = BlobBuilder::new();

        let first = builder.admit(&[0x01, 0x02]).unwrap();
        let second = builder.admit(&[0x01, 0x02]).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn builder_wide_length_prefix() {
        let mut builder = BlobBuilder::new();
        let offset = builder.admit(&vec![0x11; 0x4000]).unwrap();

        let data = builder.into_data();
        // 0x4000 does not fit two bytes, so the prefix is the 4-byte form
        assert_eq!(data[offset as usize], 0xC0);

        let blob = Blob::from(&data).unwrap();
        assert_eq!(blob.get(offset as usize).unwrap().len(), 0x4000);
    }
}
