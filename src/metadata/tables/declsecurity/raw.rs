use crate::{
    file::io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    metadata::{
        tables::types::{CodedIndex, CodedIndexType, RowReadable, RowWritable, TableInfoRef},
        token::Token,
    },
    Result,
};

/// One undecoded row of the `DeclSecurity` table (ECMA-335 II.22.11).
///
/// Columns in order: a 2-byte security action, a `HasDeclSecurity` coded index
/// naming the owner, and a blob heap index holding the serialized permission set.
/// The owner and the payload stay undecoded here; [`crate::metadata::tables::DeclSecurity`]
/// resolves both lazily.
#[derive(Clone, Debug)]
pub struct DeclSecurityRaw {
    /// The 1-based row identifier within the `DeclSecurity` table
    pub rid: u32,
    /// The metadata token of this row
    pub token: Token,
    /// Byte offset of this row within the tables stream
    pub offset: usize,
    /// The raw security action code
    pub action: u16,
    /// Coded index of the owning type, method, or assembly
    pub parent: CodedIndex,
    /// Blob heap index of the serialized permission set
    pub permission_set: u32,
}

impl RowReadable for DeclSecurityRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* action */         2 +
            /* parent */         sizes.coded_index_bytes(CodedIndexType::HasDeclSecurity) +
            /* permission_set */ sizes.blob_bytes()
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(DeclSecurityRaw {
            rid,
            token: Token::new(0x0E00_0000 + rid),
            offset: *offset,
            action: read_le_at::<u16>(data, offset)?,
            parent: CodedIndex::read(data, offset, sizes, CodedIndexType::HasDeclSecurity)?,
            permission_set: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}

impl RowWritable for DeclSecurityRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        <DeclSecurityRaw as RowReadable>::row_size(sizes)
    }

    fn row_write(
        &self,
        data: &mut [u8],
        offset: &mut usize,
        _rid: u32,
        sizes: &TableInfoRef,
    ) -> Result<()> {
        write_le_at::<u16>(data, offset, self.action)?;
        self.parent
            .write(data, offset, sizes, CodedIndexType::HasDeclSecurity)?;
        write_le_at_dyn(data, offset, self.permission_set, sizes.is_large_blob())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::types::{MetadataTable, TableId, TableInfo};
    use std::sync::Arc;

    #[test]
    fn crafted_short() {
        let data = vec![
            0x01, 0x01, // action
            0x02, 0x02, // parent
            0x03, 0x03, // permission_set
        ];

        let sizes = Arc::new(TableInfo::new_test(
            &[(TableId::DeclSecurity, 1)],
            false,
            false,
            false,
        ));
        let table = MetadataTable::<DeclSecurityRaw>::new(&data, 1, sizes).unwrap();

        let row = table.get(1).unwrap();
        assert_eq!(row.rid, 1);
        assert_eq!(row.token.value(), 0x0E00_0001);
        assert_eq!(row.offset, 0);
        assert_eq!(row.action, 0x0101);
        assert_eq!(row.parent.tag, TableId::Assembly);
        assert_eq!(row.parent.row, 0x80);
        assert_eq!(row.parent.token.value(), 0x80 | 0x2000_0000);
        assert_eq!(row.permission_set, 0x0303);
    }

    #[test]
    fn crafted_long() {
        let data = vec![
            0x01, 0x01, // action
            0x02, 0x02, 0x02, 0x02, // parent
            0x03, 0x03, 0x03, 0x03, // permission_set
        ];

        let sizes = Arc::new(TableInfo::new_test(
            &[
                (TableId::TypeDef, u32::from(u16::MAX) + 3),
                (TableId::MethodDef, u32::from(u16::MAX) + 3),
                (TableId::Assembly, u32::from(u16::MAX) + 3),
            ],
            true,
            true,
            true,
        ));
        let table = MetadataTable::<DeclSecurityRaw>::new(&data, 1, sizes).unwrap();

        let row = table.get(1).unwrap();
        assert_eq!(row.action, 0x0101);
        assert_eq!(row.parent.tag, TableId::Assembly);
        assert_eq!(row.parent.row, 0x0080_8080);
        assert_eq!(row.parent.token.value(), 0x0080_8080 | 0x2000_0000);
        assert_eq!(row.permission_set, 0x0303_0303);
    }

    #[test]
    fn write_reproduces_source_bytes() {
        let data = vec![
            0x01, 0x01, // action
            0x02, 0x02, // parent
            0x03, 0x03, // permission_set
        ];

        let sizes = Arc::new(TableInfo::new_test(
            &[(TableId::DeclSecurity, 1)],
            false,
            false,
            false,
        ));
        let table = MetadataTable::<DeclSecurityRaw>::new(&data, 1, sizes.clone()).unwrap();
        let row = table.get(1).unwrap();

        let mut out = vec![0_u8; data.len()];
        let mut offset = 0;
        row.row_write(&mut out, &mut offset, 1, &sizes).unwrap();

        assert_eq!(out, data);
        assert_eq!(offset, data.len());
    }

    #[test]
    fn write_rejects_wide_value_in_narrow_column() {
        let sizes = Arc::new(TableInfo::new_test(
            &[(TableId::DeclSecurity, 1)],
            false,
            false,
            false,
        ));

        let row = DeclSecurityRaw {
            rid: 1,
            token: Token::new(0x0E00_0001),
            offset: 0,
            action: 0x0002,
            parent: CodedIndex::new(TableId::Assembly, 1),
            permission_set: 0x10000, // needs 4 bytes, heap index column is 2
        };

        let mut out = vec![0_u8; 6];
        let mut offset = 0;
        assert!(row.row_write(&mut out, &mut offset, 1, &sizes).is_err());
    }
}
