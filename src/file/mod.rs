//! Byte source and section-aware address translation.
//!
//! [`File`] couples a byte source (an in-memory buffer or a memory-mapped file) with
//! the section layout of the image it came from. The section layout drives
//! [`File::rva_to_offset`], the translation from relative virtual addresses to file
//! offsets that every lazily parsed directory substructure depends on.
//!
//! This module deliberately does not parse PE/COFF headers; the section layout is
//! supplied by the caller (or by whatever loaded the image).
//!
//! # Key Components
//!
//! - [`File`] - byte source plus section layout
//! - [`Section`] - one entry of the section layout
//! - [`crate::file::io`] - bounds-checked little-endian primitives
//! - [`crate::file::parser::Parser`] - cursor-based structure parsing

pub(crate) mod io;
pub(crate) mod memory;
pub(crate) mod parser;
pub(crate) mod physical;

use std::{path::Path, sync::Arc};

use crate::{file::memory::Memory, file::physical::Physical, Error::Empty, Result};

/// Data source abstraction for the underlying bytes.
pub(crate) trait Backend: Send + Sync {
    /// Access the bytes of this backend.
    fn data(&self) -> &[u8];
    /// Length of this backend in bytes.
    fn len(&self) -> usize;
}

/// One entry of an image's section layout.
///
/// Carries the virtual and raw placement of a section; only the fields needed for
/// address translation are kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    /// Address of the section when loaded, relative to the image base
    pub virtual_address: u32,
    /// Size of the section when loaded
    pub virtual_size: u32,
    /// File offset of the section's raw data
    pub pointer_to_raw_data: u32,
    /// Size of the section's raw data in the file
    pub size_of_raw_data: u32,
}

/// Cheap-copy reference to a [`File`].
pub type FileRc = Arc<File>;

/// A byte source together with the section layout needed to translate RVAs.
///
/// # Examples
///
/// ```rust
/// use cilmeta::{File, Section};
///
/// let sections = vec![Section {
///     virtual_address: 0x2000,
///     virtual_size: 0x1000,
///     pointer_to_raw_data: 0x200,
///     size_of_raw_data: 0x1000,
/// }];
/// let file = File::from_mem(vec![0u8; 0x1200], sections)?;
/// assert_eq!(file.rva_to_offset(0x2010)?, 0x210);
/// # Ok::<(), cilmeta::Error>(())
/// ```
pub struct File {
    data: Box<dyn Backend>,
    sections: Vec<Section>,
}

impl File {
    /// Load a file from disk, memory-mapping it for access.
    ///
    /// # Arguments
    /// * `path` - Path to the file on disk
    /// * `sections` - The image's section layout
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or mapped, or if it is empty.
    pub fn from_file(path: &Path, sections: Vec<Section>) -> Result<File> {
        let input = Physical::new(path)?;

        Self::load(input, sections)
    }

    /// Wrap a buffer already loaded into memory.
    ///
    /// # Arguments
    /// * `data` - The bytes of the image
    /// * `sections` - The image's section layout
    ///
    /// # Errors
    /// Returns an error if the buffer is empty.
    pub fn from_mem(data: Vec<u8>, sections: Vec<Section>) -> Result<File> {
        let input = Memory::new(data);

        Self::load(input, sections)
    }

    fn load<T: Backend + 'static>(data: T, sections: Vec<Section>) -> Result<File> {
        if data.len() == 0 {
            return Err(Empty);
        }

        Ok(File {
            data: Box::new(data),
            sections,
        })
    }

    /// Returns all bytes of the underlying source.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// Returns the length of the underlying source in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the underlying source is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    /// Returns the section layout this file was loaded with.
    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Returns a bounds-checked slice of the file data.
    ///
    /// # Arguments
    /// * `offset` - The offset to start the slice from
    /// * `len` - The length of the slice
    ///
    /// # Errors
    /// Returns an error if the requested range is out of bounds.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let data = self.data.data();
        let Some(end) = offset.checked_add(len) else {
            return Err(malformed_error!(
                "Requested range causes integer overflow - {} + {}",
                offset,
                len
            ));
        };

        if end > data.len() {
            return Err(crate::Error::OutOfBounds);
        }

        Ok(&data[offset..end])
    }

    /// Converts a relative virtual address to a file offset.
    ///
    /// Walks the section layout for the section containing `rva` and rebases it
    /// onto that section's raw data pointer.
    ///
    /// # Arguments
    /// * `rva` - The relative virtual address to convert
    ///
    /// # Errors
    /// Returns an error if the address falls outside every declared section.
    pub fn rva_to_offset(&self, rva: usize) -> Result<usize> {
        let rva_u32 = u32::try_from(rva)
            .map_err(|_| malformed_error!("RVA too large to fit in u32: {}", rva))?;

        for section in &self.sections {
            let Some(section_max) = section.virtual_address.checked_add(section.virtual_size)
            else {
                return Err(malformed_error!(
                    "Section malformed, causing integer overflow - {} + {}",
                    section.virtual_address,
                    section.virtual_size
                ));
            };

            if section.virtual_address <= rva_u32 && rva_u32 < section_max {
                return Ok((rva - section.virtual_address as usize)
                    + section.pointer_to_raw_data as usize);
            }
        }

        Err(malformed_error!(
            "RVA could not be converted to offset - {}",
            rva
        ))
    }
}
