//! Metadata table access: the shared row codec machinery and the concrete
//! tables built on top of it.

mod declsecurity;
pub(crate) mod types;

pub use declsecurity::{DeclSecurity, DeclSecurityRc, DeclSecurityRaw, SecurityParent};
pub use types::{
    CodedIndex, CodedIndexType, MetadataTable, RowReadable, RowWritable, TableId, TableInfo,
    TableInfoRef, TableRowInfo,
};
