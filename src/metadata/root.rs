//! Metadata root header and stream directory.
//!
//! The metadata root is the entry point into the metadata of a .NET image: a signed
//! header carrying the runtime version string followed by the stream directory that
//! locates `#~`, `#Strings`, `#Blob` and the other heaps (ECMA-335 II.24.2.1).
//!
//! [`Root::read`] parses and validates the header from raw bytes; [`Root::empty`]
//! produces the degenerate root used when an image declares no usable metadata
//! directory.

use crate::{
    file::io::{read_le, read_le_at},
    metadata::streams::StreamHeader,
    Error::OutOfBounds,
    Result,
};

/// Magic signature of the metadata root ("BSJB")
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// The metadata root header: version info plus the stream directory.
///
/// # Examples
///
/// ```rust
/// use cilmeta::metadata::root::Root;
///
/// let root = Root::read(&[
///     0x42, 0x53, 0x4A, 0x42,
///     0x01, 0x00,
///     0x01, 0x00,
///     0x00, 0x00, 0x00, 0x00,
///     0x04, 0x00, 0x00, 0x00,
///     b'v', b'4', b'.', b'0',
///     0x00, 0x00,
///     0x01, 0x00,
///     0x01, 0x00, 0x00, 0x00, // stream directory entry
///     0x05, 0x00, 0x00, 0x00,
///     0x23, 0x7E, 0x00, 0x00,
/// ])?;
/// assert_eq!(root.version, "v4.0");
/// # Ok::<(), cilmeta::Error>(())
/// ```
pub struct Root {
    /// Magic signature, always [`CIL_HEADER_MAGIC`]
    pub signature: u32,
    /// Major version of the metadata format
    pub major_version: u16,
    /// Minor version of the metadata format
    pub minor_version: u16,
    /// Reserved, always 0
    pub reserved: u32,
    /// Number of bytes allocated to the version string
    pub length: u32,
    /// Runtime version string, without padding
    pub version: String,
    /// Reserved flags, always 0
    pub flags: u16,
    /// Number of streams in the directory
    pub stream_number: u16,
    /// The stream directory
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Returns the empty root: valid signature, no version string, no streams.
    ///
    /// Stands in for the metadata header of images whose metadata directory is
    /// absent or unreachable.
    #[must_use]
    pub fn empty() -> Root {
        Root {
            signature: CIL_HEADER_MAGIC,
            major_version: 0,
            minor_version: 0,
            reserved: 0,
            length: 0,
            version: String::new(),
            flags: 0,
            stream_number: 0,
            stream_headers: Vec::new(),
        }
    }

    /// Parses a metadata root from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read the header from
    ///
    /// # Errors
    /// Returns an error if the data is too short, the signature is wrong, or the
    /// stream directory is malformed.
    pub fn read(data: &[u8]) -> Result<Root> {
        if data.len() < 36 {
            return Err(OutOfBounds);
        }

        let signature = read_le::<u32>(data)?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "Metadata root signature does not match - {}",
                signature
            ));
        }

        let version_string_length = read_le_at::<u32>(data, &mut (12))?;
        match u32::checked_add(version_string_length, 16_u32) {
            Some(str_end) => {
                let data_len = u32::try_from(data.len())
                    .map_err(|_| malformed_error!("Data length too large"))?;
                if str_end > data_len {
                    return Err(OutOfBounds);
                }
            }
            None => {
                return Err(malformed_error!(
                    "Version string length causing integer overflow - {} + {}",
                    version_string_length,
                    16
                ))
            }
        }

        let mut version_string: String = String::with_capacity(version_string_length as usize);
        for counter in 0..version_string_length {
            let version_char = read_le_at::<u8>(data, &mut (16 + counter as usize))?;
            if version_char == 0 {
                break;
            }

            version_string.push(char::from(version_char));
        }

        let stream_count =
            read_le_at::<u16>(data, &mut (16 + version_string_length as usize + 2))?;
        if stream_count == 0 || stream_count > 5 || (stream_count * 9) as usize > data.len() {
            // 9 - minimum size of a valid StreamHeader; at most 5 well-known streams
            return Err(malformed_error!("Invalid stream count"));
        }

        let mut streams = Vec::with_capacity(stream_count as usize);
        let mut stream_offset = 16 + version_string_length as usize + 4;
        for _ in 0..stream_count {
            if stream_offset > data.len() {
                return Err(OutOfBounds);
            }

            let new_stream = StreamHeader::from(&data[stream_offset..])?;
            if new_stream.offset as usize > data.len()
                || new_stream.size as usize > data.len()
                || new_stream.name.len() > 32
            {
                return Err(OutOfBounds);
            }

            match u32::checked_add(new_stream.offset, new_stream.size) {
                Some(range) => {
                    if range as usize > data.len() {
                        return Err(OutOfBounds);
                    }
                }
                None => {
                    return Err(malformed_error!(
                        "Stream offset and size cause integer overflow - {} + {}",
                        new_stream.offset,
                        new_stream.size
                    ))
                }
            }

            let name_aligned = ((new_stream.name.len() + 1) + 3) & !3;
            stream_offset += 8 + name_aligned;

            streams.push(new_stream);
        }

        Ok(Root {
            signature,
            major_version: read_le::<u16>(&data[4..])?,
            minor_version: read_le::<u16>(&data[6..])?,
            reserved: read_le::<u32>(&data[8..])?,
            length: version_string_length,
            flags: read_le::<u16>(&data[16 + version_string_length as usize..])?,
            stream_number: u16::try_from(streams.len())
                .map_err(|_| malformed_error!("Too many streams"))?,
            stream_headers: streams,
            version: version_string,
        })
    }
}
