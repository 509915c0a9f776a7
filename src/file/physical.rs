//! Memory-mapped file backend.

use std::{fs, path::Path};

use memmap2::Mmap;

use crate::{file::Backend, Error::Empty, Result};

/// A read-only, memory-mapped view of a file on disk.
///
/// The mapping lives as long as this struct; the underlying file handle is kept
/// open alongside it.
pub struct Physical {
    map: Mmap,
}

impl Physical {
    /// Map the file at `path` into memory.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or mapped, or if it is empty.
    pub fn new(path: &Path) -> Result<Physical> {
        let file = fs::File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(Empty);
        }

        // Safety contract of memmap2: the file must not be truncated while mapped.
        let map = unsafe { Mmap::map(&file)? };

        Ok(Physical { map })
    }
}

impl Backend for Physical {
    fn data(&self) -> &[u8] {
        &self.map
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}
