//! In-memory byte buffer backend.

use crate::file::Backend;

/// A byte buffer already resident in memory.
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    /// Wrap the given buffer.
    #[must_use]
    pub fn new(data: Vec<u8>) -> Memory {
        Memory { data }
    }
}

impl Backend for Memory {
    fn data(&self) -> &[u8] {
        &self.data
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}
