//! Declarative security support.
//!
//! Declarative security records attach permission requirements to assemblies,
//! types, and methods. Each record pairs a [`SecurityAction`] with a serialized
//! [`PermissionSet`]; this module decodes both serialization formats and exposes
//! the result as structured [`Permission`] values.

mod permission;
mod permissionset;
mod types;

pub use permission::{NamedArgument, Permission};
pub use permissionset::PermissionSet;
pub use types::{
    security_classes, ArgumentType, ArgumentValue, PermissionSetFormat, Security, SecurityAction,
    SecurityPermissionFlags,
};
