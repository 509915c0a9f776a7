//! The .NET directory header (COR20) of a CLI image.
//!
//! The header lives in the `IMAGE_DIRECTORY_ENTRY_COM_DESCRIPTOR` data directory
//! of the PE file and locates every other piece of CLI metadata: the metadata
//! root, embedded resources, the strong name signature, and the native interop
//! directories.
//!
//! # Reference
//! - [ECMA-335 II.25.3.3](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use bitflags::bitflags;
use std::sync::Arc;

use crate::{
    file::{
        io::{read_le_at, write_le_at},
        parser::Parser,
    },
    metadata::{lazy::LazyValue, root::Root},
    Error::OutOfBounds,
    FileRc, Result,
};

/// An RVA and size pair locating one region of the image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataDirectory {
    /// Relative virtual address of the region, 0 if absent
    pub rva: u32,
    /// Size of the region in bytes
    pub size: u32,
}

impl DataDirectory {
    /// Creates a directory entry.
    #[must_use]
    pub fn new(rva: u32, size: u32) -> Self {
        DataDirectory { rva, size }
    }

    /// True if this directory points at data.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.rva != 0
    }

    fn read(parser: &mut Parser) -> Result<Self> {
        Ok(DataDirectory {
            rva: parser.read_le::<u32>()?,
            size: parser.read_le::<u32>()?,
        })
    }

    fn write(&self, data: &mut [u8], offset: &mut usize) -> Result<()> {
        write_le_at::<u32>(data, offset, self.rva)?;
        write_le_at::<u32>(data, offset, self.size)
    }
}

bitflags! {
    /// Runtime flags of the .NET directory header (ECMA-335 II.25.3.3.1).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NetDirectoryFlags: u32 {
        /// The image contains only IL code
        const IL_ONLY = 0x0000_0001;
        /// The image requires a 32-bit process
        const BIT32_REQUIRED = 0x0000_0002;
        /// Obsolete IL library marker
        const IL_LIBRARY = 0x0000_0004;
        /// The image is signed with a strong name
        const STRONG_NAME_SIGNED = 0x0000_0008;
        /// The entry point is an unmanaged method
        const NATIVE_ENTRY_POINT = 0x0000_0010;
        /// The runtime should generate debug tracking information
        const TRACK_DEBUG_DATA = 0x0001_0000;
        /// The image prefers but does not require a 32-bit process
        const BIT32_PREFERRED = 0x0002_0000;
    }
}

/// The COR20 header of a CLI image.
///
/// Parsing validates the fixed layout and the reserved fields but defers the
/// expensive pieces: the metadata root and the strong name blob are read from the
/// backing file only when first requested, and each at most once. Resource
/// payloads are read fresh on every call since callers typically extract each
/// resource a single time.
pub struct NetDirectory {
    /// Size of the header in bytes, always 72
    pub cb: u32,
    /// The minimum runtime major version required to run this image
    pub major_runtime_version: u16,
    /// The minor portion of the required runtime version
    pub minor_runtime_version: u16,
    /// Location of the metadata root
    pub metadata: DataDirectory,
    /// Runtime flags
    pub flags: NetDirectoryFlags,
    /// Token of the entry point method, or file index for multi-module images
    pub entry_point_token: u32,
    /// Location of embedded resources
    pub resources: DataDirectory,
    /// Location of the strong name signature hash
    pub strong_name: DataDirectory,
    /// Reserved, always 0
    pub code_manager_table: DataDirectory,
    /// Location of the vtable fixup array for mixed-mode images
    pub vtable_fixups: DataDirectory,
    /// Reserved, always 0
    pub export_address_table_jumps: DataDirectory,
    /// Location of the managed native header for prejitted images
    pub managed_native_header: DataDirectory,
    file: Option<FileRc>,
    metadata_root: LazyValue<Arc<Root>>,
    strong_name_data: LazyValue<Option<Arc<Vec<u8>>>>,
}

impl NetDirectory {
    /// Byte size of the serialized header.
    pub const SIZE: usize = 72;

    /// Parses a COR20 header.
    ///
    /// # Arguments
    /// * `data` - The header bytes
    /// * `file` - The backing image, used to resolve the metadata root, strong
    ///   name, and resource regions; pass `None` for a detached header
    ///
    /// # Errors
    /// Returns an error if the data is too short, the size or version fields are
    /// invalid, a directory pair is inconsistent, or a reserved field is nonzero.
    pub fn read(data: &[u8], file: Option<FileRc>) -> Result<NetDirectory> {
        if data.len() < Self::SIZE {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(data);

        let cb = parser.read_le::<u32>()?;
        if cb != 72 {
            return Err(malformed_error!(
                "Invalid CLR header size: expected 72, got {}",
                cb
            ));
        }

        let major_runtime_version = parser.read_le::<u16>()?;
        let minor_runtime_version = parser.read_le::<u16>()?;
        if major_runtime_version == 0 || major_runtime_version > 10 {
            return Err(malformed_error!(
                "Invalid major runtime version: {}",
                major_runtime_version
            ));
        }

        let metadata = DataDirectory::read(&mut parser)?;
        if metadata.rva == 0 {
            return Err(malformed_error!("Metadata RVA cannot be zero"));
        }
        if metadata.size == 0 {
            return Err(malformed_error!("Metadata size cannot be zero"));
        } else if metadata.size > 0x1000_0000 {
            return Err(malformed_error!(
                "Metadata size {} exceeds reasonable limit (256MB)",
                metadata.size
            ));
        }

        let raw_flags = parser.read_le::<u32>()?;
        let Some(flags) = NetDirectoryFlags::from_bits(raw_flags) else {
            return Err(malformed_error!(
                "Invalid CLR flags: 0x{:08X} contains undefined bits",
                raw_flags
            ));
        };

        // No validation, the entry point can be any value
        let entry_point_token = parser.read_le::<u32>()?;

        let resources = DataDirectory::read(&mut parser)?;
        if resources.is_present() != (resources.size != 0) {
            return Err(malformed_error!("Resource values are invalid"));
        }

        let strong_name = DataDirectory::read(&mut parser)?;
        if strong_name.is_present() != (strong_name.size != 0) {
            return Err(malformed_error!("Strong name values are invalid"));
        }

        let code_manager_table = DataDirectory::read(&mut parser)?;
        if code_manager_table != DataDirectory::default() {
            return Err(malformed_error!(
                "Code Manager Table fields must be zero (reserved)"
            ));
        }

        let vtable_fixups = DataDirectory::read(&mut parser)?;
        if vtable_fixups.is_present() != (vtable_fixups.size != 0) {
            return Err(malformed_error!("VTable fixups are invalid"));
        }

        let export_address_table_jumps = DataDirectory::read(&mut parser)?;
        if export_address_table_jumps != DataDirectory::default() {
            return Err(malformed_error!(
                "Export Address Table Jump fields must be zero (reserved)"
            ));
        }

        let managed_native_header = DataDirectory::read(&mut parser)?;

        let root_file = file.clone();
        let metadata_root = LazyValue::new(move || {
            let Some(file) = &root_file else {
                return Ok(Arc::new(Root::empty()));
            };

            let Ok(offset) = file.rva_to_offset(metadata.rva as usize) else {
                // Unmappable metadata keeps the rest of the image usable
                return Ok(Arc::new(Root::empty()));
            };

            let data = file.data_slice(offset, metadata.size as usize)?;
            Ok(Arc::new(Root::read(data)?))
        });

        let name_file = file.clone();
        let strong_name_data = LazyValue::new(move || {
            let Some(file) = &name_file else {
                return Ok(None);
            };

            if !strong_name.is_present() {
                return Ok(None);
            }

            let Ok(offset) = file.rva_to_offset(strong_name.rva as usize) else {
                return Ok(None);
            };

            let data = file.data_slice(offset, strong_name.size as usize)?;
            Ok(Some(Arc::new(data.to_vec())))
        });

        Ok(NetDirectory {
            cb,
            major_runtime_version,
            minor_runtime_version,
            metadata,
            flags,
            entry_point_token,
            resources,
            strong_name,
            code_manager_table,
            vtable_fixups,
            export_address_table_jumps,
            managed_native_header,
            file,
            metadata_root,
            strong_name_data,
        })
    }

    /// Creates a detached header for a new image: CLR 2.5, IL only, everything
    /// else empty.
    #[must_use]
    pub fn new() -> Self {
        NetDirectory {
            cb: 72,
            major_runtime_version: 2,
            minor_runtime_version: 5,
            metadata: DataDirectory::default(),
            flags: NetDirectoryFlags::IL_ONLY,
            entry_point_token: 0,
            resources: DataDirectory::default(),
            strong_name: DataDirectory::default(),
            code_manager_table: DataDirectory::default(),
            vtable_fixups: DataDirectory::default(),
            export_address_table_jumps: DataDirectory::default(),
            managed_native_header: DataDirectory::default(),
            file: None,
            metadata_root: LazyValue::with_value(Arc::new(Root::empty())),
            strong_name_data: LazyValue::with_value(None),
        }
    }

    /// Serialized size of this header in bytes.
    #[must_use]
    pub fn physical_size(&self) -> usize {
        Self::SIZE
    }

    /// Serializes the header into `data` at `offset`, advancing it. The field
    /// order mirrors [`NetDirectory::read`] exactly.
    ///
    /// # Errors
    /// Returns an error if the buffer lacks space.
    pub fn write(&self, data: &mut [u8], offset: &mut usize) -> Result<()> {
        write_le_at::<u32>(data, offset, self.cb)?;
        write_le_at::<u16>(data, offset, self.major_runtime_version)?;
        write_le_at::<u16>(data, offset, self.minor_runtime_version)?;
        self.metadata.write(data, offset)?;
        write_le_at::<u32>(data, offset, self.flags.bits())?;
        write_le_at::<u32>(data, offset, self.entry_point_token)?;
        self.resources.write(data, offset)?;
        self.strong_name.write(data, offset)?;
        self.code_manager_table.write(data, offset)?;
        self.vtable_fixups.write(data, offset)?;
        self.export_address_table_jumps.write(data, offset)?;
        self.managed_native_header.write(data, offset)?;

        Ok(())
    }

    /// The metadata root, parsed from the backing file on first access.
    ///
    /// A detached header or an unmappable metadata RVA yields an empty root;
    /// a mappable root that fails to parse is an error.
    ///
    /// # Errors
    /// Returns an error if the metadata root bytes are malformed.
    pub fn metadata_root(&self) -> Result<Arc<Root>> {
        self.metadata_root.get()
    }

    /// The strong name signature blob, read from the backing file on first
    /// access. `None` if the image carries no signature.
    ///
    /// # Errors
    /// Returns an error if the signature region cannot be read.
    pub fn strong_name_blob(&self) -> Result<Option<Arc<Vec<u8>>>> {
        self.strong_name_data.get()
    }

    /// Replaces the strong name signature blob, e.g. after re-signing.
    ///
    /// # Errors
    /// Returns an error if the internal lock is poisoned.
    pub fn set_strong_name_blob(&self, blob: Vec<u8>) -> Result<()> {
        self.strong_name_data.set(Some(Arc::new(blob)))
    }

    /// Reads one length-prefixed resource from the resources directory.
    ///
    /// `offset` is relative to the start of the directory and points at a 4-byte
    /// little-endian length followed by the payload. Returns `None` for a
    /// detached header, an absent directory, an out-of-range offset, or a length
    /// that runs past the directory end. Results are not cached.
    #[must_use]
    pub fn get_resource_data(&self, offset: u32) -> Option<&[u8]> {
        let file = self.file.as_ref()?;
        if !self.resources.is_present() || offset >= self.resources.size {
            return None;
        }

        let base = file.rva_to_offset(self.resources.rva as usize).ok()?;
        let mut pos = base.checked_add(offset as usize)?;
        let length = read_le_at::<u32>(file.data(), &mut pos).ok()? as usize;

        // The payload must stay inside the resources directory
        let end = (offset as usize).checked_add(4)?.checked_add(length)?;
        if end > self.resources.size as usize {
            return None;
        }

        file.data().get(pos..pos + length)
    }
}

impl Default for NetDirectory {
    fn default() -> Self {
        Self::new()
    }
}
