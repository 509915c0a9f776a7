// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # cilmeta
//!
//! A cross-platform library for parsing and editing the CLI metadata backbone of
//! .NET executables. Built in pure Rust, `cilmeta` provides the COR20 directory
//! header, the metadata root and streams, typed metadata table access, the
//! declarative security model, and resolution of member references - without
//! requiring Windows or the .NET runtime.
//!
//! ## Features
//!
//! - **📦 Efficient memory access** - Memory-mapped file access with minimal allocations and reference-based parsing
//! - **🔍 Metadata backbone** - COR20 header, metadata root, stream directory, and heap access per ECMA-335
//! - **📋 Typed tables** - Generic row codec with raw and owned views over the metadata tables
//! - **🛡️ Declarative security** - Decode binary and XML permission sets attached to types, methods, and assemblies
//! - **🔗 Member resolution** - Resolve type, method, and field references to their definitions across modules
//! - **⚡ Lazy evaluation** - Expensive decoding runs once, on first access, and is cached
//! - **🔧 Cross-platform** - Works on Windows, Linux, macOS, and any Rust-supported platform
//!
//! ## Quick Start
//!
//! Add `cilmeta` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! cilmeta = "0.1"
//! ```
//!
//! ### Reading the .NET directory header
//!
//! ```rust,no_run
//! use cilmeta::metadata::cor20::NetDirectory;
//!
//! let image: Vec<u8> = std::fs::read("assembly.dll")?;
//! let header = NetDirectory::read(&image, None)?;
//!
//! println!("Runtime: {}.{}", header.major_runtime_version, header.minor_runtime_version);
//! println!("Metadata at RVA {:#x}", header.metadata.rva);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Resolving member references
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cilmeta::metadata::resolver::{AssemblyMap, MemberResolver};
//! use cilmeta::metadata::typesystem::TypeReference;
//!
//! let assemblies = Arc::new(AssemblyMap::new());
//! let resolver = MemberResolver::new(assemblies);
//!
//! let reference = TypeReference::None;
//! match resolver.resolve_type(Some(&reference)) {
//!     Ok(Some(definition)) => println!("Resolved {}", definition.full_name()),
//!     Ok(None) => println!("Not found"),
//!     Err(e) => println!("Error: {}", e),
//! }
//! ```
//!
//! ## Architecture
//!
//! `cilmeta` is organized into several key modules:
//!
//! - [`metadata`] - The CLI metadata backbone: header, root, streams, tables, security, resolution
//! - [`Parser`], [`File`] - Low-level byte and image access
//! - [`Error`] and [`Result`] - Comprehensive error handling
//!
//! ### Metadata Backbone
//!
//! The [`metadata::cor20::NetDirectory`] is the entry point into a CLI image. It
//! locates and lazily materializes:
//!
//! - **Metadata root**: Version string and stream directory via [`metadata::root::Root`]
//! - **Heaps**: The blob heap via [`metadata::streams::Blob`]
//! - **Tables**: Raw and owned table rows via [`metadata::tables`]
//! - **Resources**: Embedded resource blobs with their length prefix
//! - **Security**: The strong name signature and declarative permission sets
//!
//! ## Standards Compliance
//!
//! `cilmeta` implements the **ECMA-335 specification** (6th edition) for the Common Language Infrastructure.
//! All metadata structures and type system features conform to this standard.
//!
//! ### References
//!
//! - [ECMA-335 Standard](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Official CLI specification
//! - [.NET Runtime](https://github.com/dotnet/runtime) - Microsoft's reference implementation
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result) with comprehensive error information:
//!
//! ```rust,no_run
//! use cilmeta::{metadata::cor20::NetDirectory, Error};
//!
//! match NetDirectory::read(&[0u8; 72], None) {
//!     Ok(header) => println!("Header parsed, cb = {}", header.cb),
//!     Err(Error::Malformed { message, .. }) => println!("Malformed header: {}", message),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Definitions, parsing, and mapping of CLI metadata based on ECMA-335
///
/// This module implements the metadata backbone of .NET assemblies: the COR20
/// directory header, the metadata root and streams, the metadata tables, the
/// declarative security model, and member reference resolution.
///
/// # Key Components
///
/// ## Image Structure
/// - [`metadata::cor20`] - The .NET directory (COR20) header
/// - [`metadata::root`] - Metadata root and stream directory
/// - [`metadata::streams`] - Heaps and stream headers
///
/// ## Tables
/// - [`metadata::tables`] - Generic row codec and the concrete tables
/// - [`metadata::token`] - Metadata tokens for cross-references
///
/// ## Security and Resolution
/// - [`metadata::security`] - Declarative security and permission sets
/// - [`metadata::typesystem`] - Definitions, references, and loaded modules
/// - [`metadata::resolver`] - Resolution of references to definitions
pub mod metadata;

/// `cilmeta` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
/// This is used consistently throughout the crate for all fallible operations.
///
/// # Examples
///
/// ```rust,no_run
/// use cilmeta::{metadata::root::Root, Result};
///
/// fn parse_root(data: &[u8]) -> Result<Root> {
///     Root::read(data)
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `cilmeta` Error type
///
/// The main error type for all operations in this crate. Provides detailed error
/// information for file parsing, metadata validation, and member resolution.
///
/// # Examples
///
/// ```rust,no_run
/// use cilmeta::{metadata::root::Root, Error};
///
/// match Root::read(&[0u8; 4]) {
///     Ok(root) => println!("Version: {}", root.version),
///     Err(Error::Malformed { message, .. }) => println!("Malformed: {}", message),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
pub use error::Error;

/// Provides access to low-level file and memory parsing utilities.
///
/// The [`Parser`] type is used for decoding metadata streams, [`File`] maps a
/// CLI image and translates RVAs through its [`Section`] table, and [`FileRc`]
/// is the shared handle the lazy metadata structures hold onto.
///
/// # Example
///
/// ```rust,no_run
/// use cilmeta::Parser;
/// let data = [0x03, b'a', b'b', b'c'];
/// let mut parser = Parser::new(&data);
/// let len = parser.read_compressed_uint()?;
/// assert_eq!(len, 3);
/// # Ok::<(), cilmeta::Error>(())
/// ```
pub use file::{parser::Parser, File, FileRc, Section};
