//! Stream directory entries of the metadata root.
//!
//! Each entry names one metadata stream and records where it lives relative to the
//! start of the metadata root. Entry length is variable because the name is a
//! null-terminated string padded to a 4-byte boundary (ECMA-335 II.24.2.2).

use crate::{file::io::read_le, Error::OutOfBounds, Result};

/// One entry of the stream directory: name, offset, and size of a metadata stream.
///
/// The offset is relative to the start of the metadata root, not the file.
pub struct StreamHeader {
    /// Offset of the stream, relative to the metadata root
    pub offset: u32,
    /// Size of the stream in bytes
    pub size: u32,
    /// Stream name, without the null terminator
    pub name: String,
}

impl StreamHeader {
    /// Parse a stream header from the start of `data`.
    ///
    /// Only the five well-known stream names (`#~`, `#Strings`, `#US`, `#Blob`,
    /// `#GUID`) are accepted.
    ///
    /// # Errors
    /// Returns an error if the data is too short or the name is not a known stream.
    pub fn from(data: &[u8]) -> Result<StreamHeader> {
        if data.len() < 9 {
            return Err(OutOfBounds);
        }

        let mut name = String::with_capacity(32);
        for counter in 0..std::cmp::min(32, data.len() - 8) {
            let name_char = read_le::<u8>(&data[8 + counter..])?;
            if name_char == 0 {
                break;
            }

            name.push(char::from(name_char));
        }

        if !["#Strings", "#US", "#Blob", "#GUID", "#~"]
            .iter()
            .any(|valid_name| name == *valid_name)
        {
            return Err(malformed_error!("Invalid stream header name - {}", name));
        }

        Ok(StreamHeader {
            offset: read_le::<u32>(data)?,
            size: read_le::<u32>(&data[4..])?,
            name,
        })
    }
}
