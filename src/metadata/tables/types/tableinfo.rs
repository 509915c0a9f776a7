use std::sync::Arc;
use strum::{EnumCount, IntoEnumIterator};

use crate::{
    file::io::{read_le, read_le_at},
    metadata::tables::types::{CodedIndex, CodedIndexType, TableId},
    Error::OutOfBounds,
    Result,
};

/// Size information for index fields referring into one table.
#[derive(Clone, Copy, Default, PartialEq, Debug)]
pub struct TableRowInfo {
    /// The count of rows in this table
    pub rows: u32,
    /// Number of bits required to represent any valid row index
    pub bits: u8,
    /// If the count is > `u16::MAX`, indexes into this table are 4 bytes instead of 2
    pub is_large: bool,
}

impl TableRowInfo {
    /// Creates size information for a table with `rows` rows.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(rows: u32) -> Self {
        let bits = if rows == 0 {
            1
        } else {
            let zeros = rows.leading_zeros();
            // 32 - zeros is always <= 32, fits in u8
            (32 - zeros) as u8
        };

        Self {
            rows,
            bits,
            is_large: rows > u32::from(u16::MAX),
        }
    }
}

/// Row counts and index field widths for all tables of one module.
///
/// The widths of heap indexes, plain table indexes, and coded indexes all depend on
/// the row counts of this particular module, so one `TableInfo` is shared by every
/// row decode and encode for that module.
#[derive(Clone, Default)]
pub struct TableInfo {
    rows: Vec<TableRowInfo>,
    coded_indexes: Vec<u8>,
    is_large_index_str: bool,
    is_large_index_guid: bool,
    is_large_index_blob: bool,
}

/// Cheap-copy reference to a [`TableInfo`] structure
pub type TableInfoRef = Arc<TableInfo>;

impl TableInfo {
    /// Build a `TableInfo` from the tables stream header.
    ///
    /// # Arguments
    /// * `data` - The tables stream, starting at its header
    /// * `valid_bitvec` - The valid bitvector naming the present tables
    ///
    /// # Errors
    /// Returns an error if the header is truncated or malformed.
    pub fn new(data: &[u8], valid_bitvec: u64) -> Result<Self> {
        let mut table_info =
            vec![TableRowInfo::default(); TableId::GenericParamConstraint as usize + 1];
        let mut next_row_offset = 24;

        for table_id in TableId::iter() {
            if data.len() < next_row_offset {
                return Err(OutOfBounds);
            }

            if (valid_bitvec & (1 << table_id as usize)) == 0 {
                continue;
            }

            let row_count = read_le_at::<u32>(data, &mut next_row_offset)?;
            if row_count == 0 {
                // Empty tables should be omitted from the valid bitvector
                continue;
            }

            table_info[table_id as usize] = TableRowInfo::new(row_count);
        }

        let heap_size_flags = read_le::<u8>(&data[6..])?;
        let mut table_info = TableInfo {
            rows: table_info,
            coded_indexes: vec![0; CodedIndexType::COUNT],
            is_large_index_str: heap_size_flags & 1 == 1,
            is_large_index_guid: heap_size_flags & 2 == 2,
            is_large_index_blob: heap_size_flags & 4 == 4,
        };

        table_info.calculate_coded_index_bits();

        Ok(table_info)
    }

    #[cfg(test)]
    /// Special constructor for unit-tests
    ///
    /// # Arguments
    /// * `valid_tables` - Tuples of (table id, row count) for the present tables
    /// * `large_str` - If the `#Strings` heap indexes are 4 bytes
    /// * `large_blob` - If the `#Blob` heap indexes are 4 bytes
    /// * `large_guid` - If the `#GUID` heap indexes are 4 bytes
    pub fn new_test(
        valid_tables: &[(TableId, u32)],
        large_str: bool,
        large_blob: bool,
        large_guid: bool,
    ) -> Self {
        let mut table_info = TableInfo {
            rows: vec![TableRowInfo::default(); TableId::GenericParamConstraint as usize + 1],
            coded_indexes: vec![0; CodedIndexType::COUNT],
            is_large_index_str: large_str,
            is_large_index_guid: large_guid,
            is_large_index_blob: large_blob,
        };

        for valid_table in valid_tables {
            table_info.rows[valid_table.0 as usize] = TableRowInfo::new(valid_table.1);
        }

        table_info.calculate_coded_index_bits();
        table_info
    }

    /// Decodes a coded index value into its target table and row index.
    ///
    /// # Arguments
    /// * `value` - The encoded value to decode
    /// * `coded_index_type` - The coded index family being decoded
    ///
    /// # Errors
    /// Returns an error if the tag value is out of bounds for the coded index type.
    pub fn decode_coded_index(
        &self,
        value: u32,
        coded_index_type: CodedIndexType,
    ) -> Result<(TableId, u32)> {
        let tables = coded_index_type.tables();
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let tag_bits = (tables.len() as f32).log2().ceil() as u8;
        let tag_mask = (1 << tag_bits) - 1;

        let tag = value & tag_mask;
        let index = value >> tag_bits;

        if tag as usize >= tables.len() {
            return Err(OutOfBounds);
        }

        Ok((tables[tag as usize], index))
    }

    /// Encodes a [`CodedIndex`] back into its packed column value.
    ///
    /// The inverse of [`TableInfo::decode_coded_index`]: the tag is the position of
    /// the target table within the family's candidate list, the row goes into the
    /// remaining upper bits.
    ///
    /// # Errors
    /// Returns an error if the index's table is not a member of the coded index
    /// family.
    pub fn encode_coded_index(
        &self,
        index: &CodedIndex,
        coded_index_type: CodedIndexType,
    ) -> Result<u32> {
        let tables = coded_index_type.tables();
        let Some(tag) = tables.iter().position(|table| *table == index.tag) else {
            return Err(malformed_error!(
                "Table {:?} is not encodable in this coded index family",
                index.tag
            ));
        };

        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let tag_bits = (tables.len() as f32).log2().ceil() as u8;

        Ok((index.row << tag_bits) | tag as u32)
    }

    /// Returns true if the requested table has more than 2^16 rows and hence needs
    /// 4-byte indexes.
    #[must_use]
    pub fn is_large(&self, id: TableId) -> bool {
        self.rows[id as usize].is_large
    }

    /// Index width into the `#Strings` heap. True means 4 bytes, false 2 bytes.
    #[must_use]
    pub fn is_large_str(&self) -> bool {
        self.is_large_index_str
    }

    /// Index width into the `#GUID` heap. True means 4 bytes, false 2 bytes.
    #[must_use]
    pub fn is_large_guid(&self) -> bool {
        self.is_large_index_guid
    }

    /// Index width into the `#Blob` heap. True means 4 bytes, false 2 bytes.
    #[must_use]
    pub fn is_large_blob(&self) -> bool {
        self.is_large_index_blob
    }

    /// Byte width of `#Strings` heap indexes.
    #[must_use]
    pub fn str_bytes(&self) -> u8 {
        if self.is_large_index_str {
            4
        } else {
            2
        }
    }

    /// Byte width of `#GUID` heap indexes.
    #[must_use]
    pub fn guid_bytes(&self) -> u8 {
        if self.is_large_index_guid {
            4
        } else {
            2
        }
    }

    /// Byte width of `#Blob` heap indexes.
    #[must_use]
    pub fn blob_bytes(&self) -> u8 {
        if self.is_large_index_blob {
            4
        } else {
            2
        }
    }

    /// Returns the size information for a specific table.
    #[must_use]
    pub fn get(&self, table: TableId) -> &TableRowInfo {
        &self.rows[table as usize]
    }

    /// Number of bits required to represent an index into `table_id`.
    #[must_use]
    pub fn table_index_bits(&self, table_id: TableId) -> u8 {
        self.rows[table_id as usize].bits
    }

    /// Number of bytes required to represent an index into `table_id`.
    #[must_use]
    pub fn table_index_bytes(&self, table_id: TableId) -> u8 {
        if self.rows[table_id as usize].bits > 16 {
            4
        } else {
            2
        }
    }

    /// Cached bit size for a specific coded index family.
    #[must_use]
    pub fn coded_index_bits(&self, coded_index_type: CodedIndexType) -> u8 {
        self.coded_indexes[coded_index_type as usize]
    }

    /// Cached byte size for a specific coded index family.
    #[must_use]
    pub fn coded_index_bytes(&self, coded_index_type: CodedIndexType) -> u8 {
        if self.coded_indexes[coded_index_type as usize] > 16 {
            4
        } else {
            2
        }
    }

    fn calculate_coded_index_size(&self, coded_index_type: CodedIndexType) -> u8 {
        let tables = coded_index_type.tables();
        let max_bits = tables
            .iter()
            .map(|table| self.table_index_bits(*table))
            .max()
            .unwrap_or(1);

        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let tag_bits = (tables.len() as f32).log2().ceil() as u8;
        max_bits + tag_bits
    }

    fn calculate_coded_index_bits(&mut self) {
        for coded_index in CodedIndexType::iter() {
            let size = self.calculate_coded_index_size(coded_index);
            self.coded_indexes[coded_index as usize] = size;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_info_bits() {
        assert_eq!(TableRowInfo::new(0).bits, 1);
        assert_eq!(TableRowInfo::new(1).bits, 1);
        assert_eq!(TableRowInfo::new(0xFF).bits, 8);
        assert!(!TableRowInfo::new(0xFFFF).is_large);
        assert!(TableRowInfo::new(0x1_0000).is_large);
    }

    #[test]
    fn coded_index_widths() {
        let small = TableInfo::new_test(
            &[(TableId::TypeDef, 10), (TableId::MethodDef, 10)],
            false,
            false,
            false,
        );
        assert_eq!(small.coded_index_bytes(CodedIndexType::HasDeclSecurity), 2);

        // 0x8000 rows need 16 bits, plus 2 tag bits pushes past the 2-byte limit
        let large = TableInfo::new_test(&[(TableId::TypeDef, 0x8000)], false, false, false);
        assert_eq!(large.coded_index_bytes(CodedIndexType::HasDeclSecurity), 4);
    }

    #[test]
    fn decode_encode_roundtrip() {
        let info = TableInfo::new_test(
            &[(TableId::TypeDef, 50), (TableId::MethodDef, 50)],
            false,
            false,
            false,
        );

        // HasDeclSecurity: tag 1 selects MethodDef, row in the upper bits
        let (tag, row) = info
            .decode_coded_index((7 << 2) | 1, CodedIndexType::HasDeclSecurity)
            .unwrap();
        assert_eq!(tag, TableId::MethodDef);
        assert_eq!(row, 7);

        let encoded = info
            .encode_coded_index(
                &CodedIndex::new(TableId::MethodDef, 7),
                CodedIndexType::HasDeclSecurity,
            )
            .unwrap();
        assert_eq!(encoded, (7 << 2) | 1);
    }

    #[test]
    fn encode_rejects_foreign_table() {
        let info = TableInfo::new_test(&[(TableId::TypeDef, 50)], false, false, false);
        assert!(info
            .encode_coded_index(
                &CodedIndex::new(TableId::Field, 1),
                CodedIndexType::HasDeclSecurity,
            )
            .is_err());
    }

    #[test]
    fn decode_invalid_tag() {
        let info = TableInfo::new_test(&[(TableId::TypeDef, 50)], false, false, false);
        // HasDeclSecurity has 3 candidates, tag 3 is unused
        assert!(info
            .decode_coded_index(3, CodedIndexType::HasDeclSecurity)
            .is_err());
    }
}
