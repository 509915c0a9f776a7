//! Metadata parsing and representation for .NET modules.
//!
//! This module implements the CLI metadata backbone per ECMA-335: the COR20
//! header locating the metadata, the metadata root and its stream directory,
//! typed access over the metadata tables, the declarative security model, and
//! resolution of member references against the loaded type system.
//!
//! # Key Components
//!
//! - [`cor20`] - The .NET directory header and the regions it locates
//! - [`root`] - The metadata root and stream directory
//! - [`tables`] - Generic table machinery and the concrete tables
//! - [`security`] - Declarative security records and permission sets
//! - [`typesystem`] - Definitions, references, and loaded modules
//! - [`resolver`] - Resolution of references to definitions
//! - [`token`] - Metadata table row references used throughout .NET

/// Implementation of the .NET directory (COR20) header
pub mod cor20;
/// One-shot lazy values shared by the lazily decoded structures
pub(crate) mod lazy;
/// Implementation of member reference resolution
pub mod resolver;
/// Implementation of the root metadata structure
pub mod root;
/// Implementation of the .NET declarative security model
pub mod security;
/// Implementation of the metadata heaps and stream headers
pub mod streams;
/// Implementation of the metadata tables
pub mod tables;
/// Implementation of metadata tokens
pub mod token;
/// Implementation of the loaded type system
pub mod typesystem;
