//! Generic metadata table infrastructure.
//!
//! Metadata tables are tightly packed arrays of fixed-size rows whose column widths
//! depend on the module's heap and table sizes. This module provides the machinery
//! shared by every concrete table:
//!
//! - [`RowReadable`] / [`RowWritable`] - per-table row codecs
//! - [`MetadataTable`] - typed access over a raw table, sequential and parallel
//! - [`CodedIndex`] / [`CodedIndexType`] - packed cross-table references
//! - [`TableId`], [`TableInfo`] / [`TableInfoRef`] - table identity and sizing

mod codedindex;
mod tableid;
mod tableinfo;

use crate::Result;
use rayon::iter::{plumbing, IndexedParallelIterator, ParallelIterator};
use std::{
    marker::PhantomData,
    sync::{Arc, Mutex},
};

pub use codedindex::{CodedIndex, CodedIndexType};
pub use tableid::TableId;
pub use tableinfo::{TableInfo, TableInfoRef, TableRowInfo};

/// Row decoding interface implemented by every concrete table row type.
///
/// Row sizes are not constant across modules: index columns are 2 or 4 bytes wide
/// depending on the sizes recorded in [`TableInfo`], so both methods take the
/// module's sizing.
pub trait RowReadable: Sized + Send {
    /// Size in bytes of one row of this table under the given module sizing.
    fn row_size(sizes: &TableInfoRef) -> u32;

    /// Parses one row from `data`, advancing `offset` past it.
    ///
    /// # Arguments
    /// * `data` - The table bytes
    /// * `offset` - Current read position, advanced by the row size
    /// * `rid` - The 1-based row identifier of this entry
    /// * `sizes` - Module sizing for variable-width columns
    ///
    /// # Errors
    /// Returns an error if the buffer is truncated or a column is malformed.
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self>;
}

/// Row encoding interface, the inverse of [`RowReadable`].
///
/// Implementations must emit columns in the same order and at the same widths the
/// reader consumes them, so that a decode of the written bytes reproduces the row.
pub trait RowWritable: Sized + Send {
    /// Size in bytes of one row of this table under the given module sizing.
    fn row_size(sizes: &TableInfoRef) -> u32;

    /// Serializes this row into `data`, advancing `offset` past it.
    ///
    /// # Arguments
    /// * `data` - The mutable buffer to write into
    /// * `offset` - Current write position, advanced by the row size
    /// * `rid` - The 1-based row identifier of this entry
    /// * `sizes` - Module sizing for variable-width columns
    ///
    /// # Errors
    /// Returns an error if the buffer lacks space or a value does not fit its
    /// column width.
    fn row_write(
        &self,
        data: &mut [u8],
        offset: &mut usize,
        rid: u32,
        sizes: &TableInfoRef,
    ) -> Result<()>;
}

/// Typed view over the raw bytes of one metadata table.
///
/// Rows are decoded on demand; nothing is materialized up front. Access is by
/// 1-based row index per the CLI convention, with sequential and rayon-parallel
/// iteration on top.
pub struct MetadataTable<'a, T> {
    /// The raw table bytes
    data: &'a [u8],
    /// Total number of rows in this table
    row_count: u32,
    /// Size in bytes of each row
    row_size: u32,
    /// Module sizing shared by all row decodes
    sizes: TableInfoRef,
    _phantom: Arc<PhantomData<T>>,
}

impl<'a, T: RowReadable> MetadataTable<'a, T> {
    /// Creates a table view over `data` holding `row_count` rows.
    ///
    /// # Errors
    /// Returns an error if the row size cannot be derived from the sizing.
    pub fn new(data: &'a [u8], row_count: u32, sizes: TableInfoRef) -> Result<Self> {
        Ok(MetadataTable {
            data,
            row_count,
            row_size: T::row_size(&sizes),
            sizes,
            _phantom: Arc::new(PhantomData),
        })
    }

    /// Total size of this table in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        u64::from(self.row_count) * u64::from(self.row_size)
    }

    /// Size of a single row in bytes.
    #[must_use]
    pub fn row_size(&self) -> u32 {
        self.row_size
    }

    /// Total number of rows in this table.
    #[must_use]
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Retrieves a row by its 1-based index.
    ///
    /// Returns `None` for index 0 (the null reference), out-of-range indices, and
    /// rows that fail to parse.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<T> {
        if index == 0 || self.row_count < index {
            return None;
        }

        T::row_read(
            self.data,
            &mut ((index as usize - 1) * self.row_size as usize),
            index,
            &self.sizes,
        )
        .ok()
    }

    /// Sequential iterator over all rows in table order.
    #[must_use]
    pub fn iter(&'a self) -> TableIterator<'a, T> {
        TableIterator {
            table: self,
            current_row: 0,
            current_offset: 0,
        }
    }

    /// Rayon-parallel iterator over all rows.
    #[must_use]
    pub fn par_iter(&'a self) -> TableParIterator<'a, T> {
        TableParIterator {
            table: self,
            range: 0..self.row_count,
        }
    }
}

impl<'a, T: RowReadable> IntoIterator for &'a MetadataTable<'a, T> {
    type Item = T;
    type IntoIter = TableIterator<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Sequential iterator over table rows; rows are decoded lazily as the iterator
/// advances and a parse failure terminates iteration.
pub struct TableIterator<'a, T> {
    table: &'a MetadataTable<'a, T>,
    current_row: u32,
    current_offset: usize,
}

impl<'a, T: RowReadable> Iterator for TableIterator<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_row >= self.table.row_count {
            return None;
        }

        match T::row_read(
            self.table.data,
            &mut self.current_offset,
            self.current_row + 1,
            &self.table.sizes,
        ) {
            Ok(row) => {
                self.current_row += 1;
                Some(row)
            }
            Err(_) => None,
        }
    }
}

/// Parallel iterator over table rows, integrating with the rayon work-stealing
/// machinery via an indexed producer.
pub struct TableParIterator<'a, T> {
    table: &'a MetadataTable<'a, T>,
    range: std::ops::Range<u32>,
}

impl<'a, T: RowReadable + Send + Sync + 'a> TableParIterator<'a, T> {
    /// Runs `op` over every row in parallel, stopping on the first error.
    ///
    /// # Panics
    /// Panics if the internal error mutex is poisoned.
    ///
    /// # Errors
    /// Returns the first error produced by `op`.
    pub fn try_for_each<F>(self, op: F) -> crate::Result<()>
    where
        F: Fn(T) -> crate::Result<()> + Send + Sync,
    {
        let error = Arc::new(Mutex::new(None));

        self.for_each(|item| {
            if error.lock().unwrap().is_some() {
                return;
            }

            if let Err(e) = op(item) {
                let mut guard = error.lock().unwrap();
                if guard.is_none() {
                    *guard = Some(e);
                }
            }
        });

        match Arc::into_inner(error).unwrap().into_inner().unwrap() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<'a, T: RowReadable + Send + Sync> ParallelIterator for TableParIterator<'a, T> {
    type Item = T;

    fn drive_unindexed<C>(self, consumer: C) -> C::Result
    where
        C: rayon::iter::plumbing::UnindexedConsumer<Self::Item>,
    {
        plumbing::bridge(self, consumer)
    }
}

impl<'a, T: RowReadable + Send + Sync> IndexedParallelIterator for TableParIterator<'a, T> {
    fn len(&self) -> usize {
        self.range.len()
    }

    fn drive<C>(self, consumer: C) -> C::Result
    where
        C: rayon::iter::plumbing::Consumer<Self::Item>,
    {
        plumbing::bridge(self, consumer)
    }

    fn with_producer<CB>(self, callback: CB) -> CB::Output
    where
        CB: rayon::iter::plumbing::ProducerCallback<Self::Item>,
    {
        callback.callback(TableProducer {
            table: self.table,
            range: self.range,
        })
    }
}

struct TableProducer<'a, T> {
    table: &'a MetadataTable<'a, T>,
    range: std::ops::Range<u32>,
}

impl<'a, T: RowReadable + Send + Sync> rayon::iter::plumbing::Producer for TableProducer<'a, T> {
    type Item = T;
    type IntoIter = TableProducerIterator<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        TableProducerIterator {
            table: self.table,
            range: self.range,
        }
    }

    fn split_at(self, index: usize) -> (Self, Self) {
        // Row positions fit in u32
        #[allow(clippy::cast_possible_truncation)]
        let mid = self.range.start + index as u32;
        let left = TableProducer {
            table: self.table,
            range: self.range.start..mid,
        };
        let right = TableProducer {
            table: self.table,
            range: mid..self.range.end,
        };
        (left, right)
    }
}

struct TableProducerIterator<'a, T> {
    table: &'a MetadataTable<'a, T>,
    range: std::ops::Range<u32>,
}

impl<'a, T: RowReadable + Send + Sync> Iterator for TableProducerIterator<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.range.start >= self.range.end {
            return None;
        }

        let row_index = self.range.start;
        self.range.start += 1;

        // +1 because row indices start at 1
        self.table.get(row_index + 1)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.range.len();
        (len, Some(len))
    }
}

impl<'a, T: RowReadable + Send + Sync> ExactSizeIterator for TableProducerIterator<'a, T> {}

impl<'a, T: RowReadable + Send + Sync> DoubleEndedIterator for TableProducerIterator<'a, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.range.start >= self.range.end {
            return None;
        }

        self.range.end -= 1;

        // +1 because row indices start at 1
        self.table.get(self.range.end + 1)
    }
}
