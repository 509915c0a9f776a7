//! Metadata stream primitives.
//!
//! The metadata root divides its payload into named streams. This module carries the
//! stream directory entry type and the heaps the rest of the crate reads from.
//!
//! # Key Components
//!
//! - [`StreamHeader`] - one stream directory entry (name, offset, size)
//! - [`Blob`] / [`BlobBuilder`] - read and build the `#Blob` heap

mod blob;
mod streamheader;

pub use blob::{Blob, BlobBuilder};
pub use streamheader::StreamHeader;
