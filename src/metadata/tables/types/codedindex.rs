//! Coded index decoding and encoding.
//!
//! A coded index packs a table selector and a row index into one column value: the
//! low bits pick a table out of a fixed candidate list, the remaining bits carry the
//! 1-based row (ECMA-335 II.24.2.6). Column width is 2 or 4 bytes depending on the
//! largest candidate table of the module.

use strum::{EnumCount, EnumIter};

use crate::{
    file::io::{read_le_at, write_le_at},
    metadata::{
        tables::types::{TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// The coded index families defined by the CLI metadata specification.
///
/// Each variant names the fixed, ordered list of tables its columns can reference;
/// the position within that list is the encoded tag value.
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy, EnumIter, EnumCount)]
#[repr(usize)]
pub enum CodedIndexType {
    /// `TypeDef`, `TypeRef`, or `TypeSpec`
    TypeDefOrRef,
    /// `Field`, `Param`, or `Property`
    HasConstant,
    /// Any entity that can carry custom attributes
    HasCustomAttribute,
    /// `Field` or `Param`
    HasFieldMarshal,
    /// `TypeDef`, `MethodDef`, or `Assembly` - owners of security records
    HasDeclSecurity,
    /// `TypeDef`, `TypeRef`, `ModuleRef`, `MethodDef`, or `TypeSpec`
    MemberRefParent,
    /// `Event` or `Property`
    HasSemantics,
    /// `MethodDef` or `MemberRef`
    MethodDefOrRef,
    /// `Field` or `MethodDef`
    MemberForwarded,
    /// `File`, `AssemblyRef`, or `ExportedType`
    Implementation,
    /// `MethodDef` or `MemberRef` constructors of custom attributes
    CustomAttributeType,
    /// `Module`, `ModuleRef`, `AssemblyRef`, or `TypeRef`
    ResolutionScope,
    /// `TypeDef` or `MethodDef`
    TypeOrMethodDef,
}

impl CodedIndexType {
    /// Returns the candidate tables of this family, in encoding order.
    #[must_use]
    pub fn tables(&self) -> &'static [TableId] {
        match self {
            CodedIndexType::TypeDefOrRef => {
                &[TableId::TypeDef, TableId::TypeRef, TableId::TypeSpec]
            }
            CodedIndexType::HasConstant => &[TableId::Field, TableId::Param, TableId::Property],
            CodedIndexType::HasCustomAttribute => &[
                TableId::MethodDef,
                TableId::Field,
                TableId::TypeRef,
                TableId::TypeDef,
                TableId::Param,
                TableId::InterfaceImpl,
                TableId::MemberRef,
                TableId::Module,
                TableId::DeclSecurity, // Labeled 'Permission' in the standard, no such table exists
                TableId::Property,
                TableId::Event,
                TableId::StandAloneSig,
                TableId::ModuleRef,
                TableId::TypeSpec,
                TableId::Assembly,
                TableId::AssemblyRef,
                TableId::File,
                TableId::ExportedType,
                TableId::ManifestResource,
                TableId::GenericParam,
                TableId::GenericParamConstraint,
                TableId::MethodSpec,
            ],
            CodedIndexType::HasFieldMarshal => &[TableId::Field, TableId::Param],
            CodedIndexType::HasDeclSecurity => {
                &[TableId::TypeDef, TableId::MethodDef, TableId::Assembly]
            }
            CodedIndexType::MemberRefParent => &[
                TableId::TypeDef,
                TableId::TypeRef,
                TableId::ModuleRef,
                TableId::MethodDef,
                TableId::TypeSpec,
            ],
            CodedIndexType::HasSemantics => &[TableId::Event, TableId::Property],
            CodedIndexType::MethodDefOrRef => &[TableId::MethodDef, TableId::MemberRef],
            CodedIndexType::MemberForwarded => &[TableId::Field, TableId::MethodDef],
            CodedIndexType::Implementation => {
                &[TableId::File, TableId::AssemblyRef, TableId::ExportedType]
            }
            // Tags 0, 1 and 4 are 'not used' per the standard, but the encoding allows them
            CodedIndexType::CustomAttributeType => &[
                TableId::MethodDef,
                TableId::MethodDef,
                TableId::MethodDef,
                TableId::MemberRef,
                TableId::MemberRef,
            ],
            CodedIndexType::ResolutionScope => &[
                TableId::Module,
                TableId::ModuleRef,
                TableId::AssemblyRef,
                TableId::TypeRef,
            ],
            CodedIndexType::TypeOrMethodDef => &[TableId::TypeDef, TableId::MethodDef],
        }
    }
}

/// A decoded coded index: the target table, 1-based row, and the equivalent token.
///
/// Row 0 is the null reference; its token is the null token of the target table.
#[derive(Clone, Debug, PartialEq)]
pub struct CodedIndex {
    /// The [`TableId`] this index refers to
    pub tag: TableId,
    /// The 1-based row within that table, 0 for null
    pub row: u32,
    /// The equivalent metadata token
    pub token: Token,
}

impl CodedIndex {
    /// Reads and decodes a coded index column.
    ///
    /// Reads 2 or 4 bytes depending on the module's table sizes, then splits the
    /// value into its table tag and row.
    ///
    /// # Arguments
    /// * `data` - The byte buffer to read from
    /// * `offset` - Current read position, advanced past the column
    /// * `info` - Table size information of the module
    /// * `ci_type` - The coded index family of this column
    ///
    /// # Errors
    /// Returns an error if the buffer is too small or the tag is invalid.
    pub fn read(
        data: &[u8],
        offset: &mut usize,
        info: &TableInfoRef,
        ci_type: CodedIndexType,
    ) -> Result<Self> {
        let size_needed = info.coded_index_bits(ci_type);
        let coded_index = if size_needed > 16 {
            read_le_at::<u32>(data, offset)?
        } else {
            u32::from(read_le_at::<u16>(data, offset)?)
        };

        let (tag, row) = info.decode_coded_index(coded_index, ci_type)?;
        Ok(CodedIndex::new(tag, row))
    }

    /// Encodes and writes this coded index as a column.
    ///
    /// The exact inverse of [`CodedIndex::read`]: packs tag and row and emits the
    /// column at the width the module's table sizes require.
    ///
    /// # Errors
    /// Returns an error if the buffer lacks space, the table is not a member of
    /// the family, or the packed value does not fit a narrow column.
    pub fn write(
        &self,
        data: &mut [u8],
        offset: &mut usize,
        info: &TableInfoRef,
        ci_type: CodedIndexType,
    ) -> Result<()> {
        let encoded = info.encode_coded_index(self, ci_type)?;

        if info.coded_index_bits(ci_type) > 16 {
            write_le_at::<u32>(data, offset, encoded)
        } else {
            let narrow = u16::try_from(encoded).map_err(|_| {
                malformed_error!("Coded index {} does not fit into a 2 byte column", encoded)
            })?;
            write_le_at::<u16>(data, offset, narrow)
        }
    }

    /// Creates a `CodedIndex` for the given table and row, computing its token.
    #[must_use]
    pub fn new(tag: TableId, row: u32) -> CodedIndex {
        CodedIndex {
            tag,
            row,
            token: match tag {
                TableId::Module => Token::new(row),
                TableId::TypeRef => Token::new(row | 0x0100_0000),
                TableId::TypeDef => Token::new(row | 0x0200_0000),
                TableId::Field => Token::new(row | 0x0400_0000),
                TableId::MethodDef => Token::new(row | 0x0600_0000),
                TableId::Param => Token::new(row | 0x0800_0000),
                TableId::InterfaceImpl => Token::new(row | 0x0900_0000),
                TableId::MemberRef => Token::new(row | 0x0A00_0000),
                TableId::Constant => Token::new(row | 0x0B00_0000),
                TableId::CustomAttribute => Token::new(row | 0x0C00_0000),
                TableId::FieldMarshal => Token::new(row | 0x0D00_0000),
                TableId::DeclSecurity => Token::new(row | 0x0E00_0000),
                TableId::ClassLayout => Token::new(row | 0x0F00_0000),
                TableId::FieldLayout => Token::new(row | 0x1000_0000),
                TableId::StandAloneSig => Token::new(row | 0x1100_0000),
                TableId::EventMap => Token::new(row | 0x1200_0000),
                TableId::Event => Token::new(row | 0x1400_0000),
                TableId::PropertyMap => Token::new(row | 0x1500_0000),
                TableId::Property => Token::new(row | 0x1700_0000),
                TableId::MethodSemantics => Token::new(row | 0x1800_0000),
                TableId::MethodImpl => Token::new(row | 0x1900_0000),
                TableId::ModuleRef => Token::new(row | 0x1A00_0000),
                TableId::TypeSpec => Token::new(row | 0x1B00_0000),
                TableId::ImplMap => Token::new(row | 0x1C00_0000),
                TableId::FieldRVA => Token::new(row | 0x1D00_0000),
                TableId::Assembly => Token::new(row | 0x2000_0000),
                TableId::AssemblyProcessor => Token::new(row | 0x2100_0000),
                TableId::AssemblyOS => Token::new(row | 0x2200_0000),
                TableId::AssemblyRef => Token::new(row | 0x2300_0000),
                TableId::AssemblyRefProcessor => Token::new(row | 0x2400_0000),
                TableId::AssemblyRefOS => Token::new(row | 0x2500_0000),
                TableId::File => Token::new(row | 0x2600_0000),
                TableId::ExportedType => Token::new(row | 0x2700_0000),
                TableId::ManifestResource => Token::new(row | 0x2800_0000),
                TableId::NestedClass => Token::new(row | 0x2900_0000),
                TableId::GenericParam => Token::new(row | 0x2A00_0000),
                TableId::MethodSpec => Token::new(row | 0x2B00_0000),
                TableId::GenericParamConstraint => Token::new(row | 0x2C00_0000),
            },
        }
    }

    /// Converts a metadata token into a coded index.
    ///
    /// # Errors
    /// Returns an error if the token is null or names an unknown table.
    pub fn from_token(token: Token) -> Result<CodedIndex> {
        if token.is_null() {
            return Err(malformed_error!(
                "Cannot convert a null token to a coded index"
            ));
        }

        let table = match token.table() {
            0x00 => TableId::Module,
            0x01 => TableId::TypeRef,
            0x02 => TableId::TypeDef,
            0x04 => TableId::Field,
            0x06 => TableId::MethodDef,
            0x08 => TableId::Param,
            0x09 => TableId::InterfaceImpl,
            0x0A => TableId::MemberRef,
            0x0B => TableId::Constant,
            0x0C => TableId::CustomAttribute,
            0x0D => TableId::FieldMarshal,
            0x0E => TableId::DeclSecurity,
            0x0F => TableId::ClassLayout,
            0x10 => TableId::FieldLayout,
            0x11 => TableId::StandAloneSig,
            0x12 => TableId::EventMap,
            0x14 => TableId::Event,
            0x15 => TableId::PropertyMap,
            0x17 => TableId::Property,
            0x18 => TableId::MethodSemantics,
            0x19 => TableId::MethodImpl,
            0x1A => TableId::ModuleRef,
            0x1B => TableId::TypeSpec,
            0x1C => TableId::ImplMap,
            0x1D => TableId::FieldRVA,
            0x20 => TableId::Assembly,
            0x21 => TableId::AssemblyProcessor,
            0x22 => TableId::AssemblyOS,
            0x23 => TableId::AssemblyRef,
            0x24 => TableId::AssemblyRefProcessor,
            0x25 => TableId::AssemblyRefOS,
            0x26 => TableId::File,
            0x27 => TableId::ExportedType,
            0x28 => TableId::ManifestResource,
            0x29 => TableId::NestedClass,
            0x2A => TableId::GenericParam,
            0x2B => TableId::MethodSpec,
            0x2C => TableId::GenericParamConstraint,
            unknown => {
                return Err(malformed_error!("Unknown table ID: 0x{:02x}", unknown));
            }
        };

        Ok(CodedIndex::new(table, token.row()))
    }
}
