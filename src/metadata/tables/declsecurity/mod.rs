//! The `DeclSecurity` table: declarative security records attached to types,
//! methods, and assemblies.

mod owned;
mod raw;

pub use owned::{DeclSecurity, DeclSecurityRc, SecurityParent};
pub use raw::DeclSecurityRaw;
