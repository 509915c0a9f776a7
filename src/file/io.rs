//! Bounds-checked little-endian reading and writing primitives.
//!
//! Everything in this module operates on plain byte slices and returns
//! [`crate::Error::OutOfBounds`] instead of panicking when a buffer is too small. The
//! [`CilIO`] trait abstracts the byte conversion per primitive type; the free functions
//! provide positional access with automatic offset advancement, plus dynamic-width
//! variants for the 2-or-4-byte index fields used throughout .NET metadata.

use crate::{Error::OutOfBounds, Result};

/// Trait for type-specific safe binary conversion.
///
/// Implemented for the primitive integer types that appear in metadata structures.
/// Each implementation defines a `Bytes` associated type representing the fixed-size
/// byte array required for that particular type (e.g. `[u8; 4]` for `u32`).
pub trait CilIO: Sized {
    /// Byte array type backing this numeric type.
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]> + AsRef<[u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Write T to a byte buffer in little-endian
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_cil_io {
    ($($ty:ty),*) => {
        $(
            impl CilIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
            }
        )*
    };
}

impl_cil_io!(u8, i8, u16, i16, u32, i32, u64, i64);

/// Safely reads a value of type `T` in little-endian byte order from the start of a buffer.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le<T: CilIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Safely reads a value of type `T` in little-endian byte order at a specific offset.
///
/// The offset is advanced by the number of bytes read.
///
/// # Arguments
/// * `data` - The byte buffer to read from
/// * `offset` - Mutable reference to the offset position
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    if (type_len + *offset) > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..*offset + type_len].try_into() else {
        return Err(OutOfBounds);
    };

    *offset += type_len;

    Ok(T::from_le_bytes(read))
}

/// Dynamically reads either a 2-byte or 4-byte value in little-endian byte order.
///
/// Metadata index columns are 2 or 4 bytes wide depending on heap and table sizes;
/// this reads the appropriate width and promotes the result to `u32`.
///
/// # Arguments
/// * `data` - The byte buffer to read from
/// * `offset` - Mutable reference to the offset position
/// * `is_large` - If `true`, reads 4 bytes; if `false`, reads 2 bytes
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le_at_dyn(data: &[u8], offset: &mut usize, is_large: bool) -> Result<u32> {
    let res = if is_large {
        read_le_at::<u32>(data, offset)?
    } else {
        u32::from(read_le_at::<u16>(data, offset)?)
    };

    Ok(res)
}

/// Safely writes a value of type `T` in little-endian byte order at a specific offset.
///
/// The offset is advanced by the number of bytes written.
///
/// # Arguments
/// * `data` - The byte buffer to write into
/// * `offset` - Mutable reference to the offset position
/// * `value` - The value to write
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the buffer lacks space.
pub fn write_le_at<T: CilIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let type_len = std::mem::size_of::<T>();
    if (type_len + *offset) > data.len() {
        return Err(OutOfBounds);
    }

    data[*offset..*offset + type_len].copy_from_slice(value.to_le_bytes().as_ref());
    *offset += type_len;

    Ok(())
}

/// Dynamically writes either a 2-byte or 4-byte value in little-endian byte order.
///
/// The inverse of [`read_le_at_dyn`]. When writing the narrow form, the value must
/// fit in 16 bits.
///
/// # Arguments
/// * `data` - The byte buffer to write into
/// * `offset` - Mutable reference to the offset position
/// * `value` - The value to write
/// * `is_large` - If `true`, writes 4 bytes; if `false`, writes 2 bytes
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the buffer lacks space, or a malformed
/// error if a narrow write would truncate the value.
pub fn write_le_at_dyn(data: &mut [u8], offset: &mut usize, value: u32, is_large: bool) -> Result<()> {
    if is_large {
        write_le_at::<u32>(data, offset, value)
    } else {
        let narrow = u16::try_from(value)
            .map_err(|_| malformed_error!("Value {} does not fit into a 2 byte index", value))?;
        write_le_at::<u16>(data, offset, narrow)
    }
}
