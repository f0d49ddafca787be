//! Bounds-checked reads over page bytes
//!
//! Every decoder reads through these helpers instead of indexing slices
//! directly. A read that does not fit returns [`ReadError`] and the caller
//! decides whether that aborts a field, a row or the whole record.

use binrw::BinRead;
use std::io::Cursor;
use thiserror::Error;

use crate::limits::MAX_STRING_LENGTH;

/// Failure of a single bounds-checked read
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// The read does not fit inside the buffer
    #[error("read of {len} bytes at offset {offset} exceeds buffer of {available} bytes")]
    OutOfBounds {
        /// Requested offset
        offset: usize,
        /// Requested length
        len: usize,
        /// Buffer length
        available: usize,
    },

    /// No NUL terminator within the buffer or the string length cap
    #[error("unterminated string at offset {0}")]
    Unterminated(usize),

    /// Structure decoding failed for a reason other than running out of bytes
    #[error("malformed structure at offset {offset}: {reason}")]
    Malformed {
        /// Offset of the structure
        offset: usize,
        /// Parser message
        reason: String,
    },
}

/// Result type for bounds-checked reads
pub type ReadResult<T> = Result<T, ReadError>;

/// Borrow `len` bytes at `offset`
pub fn slice(data: &[u8], offset: usize, len: usize) -> ReadResult<&[u8]> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or(ReadError::OutOfBounds {
            offset,
            len,
            available: data.len(),
        })
}

fn array<const N: usize>(data: &[u8], offset: usize) -> ReadResult<[u8; N]> {
    let bytes = slice(data, offset, N)?;
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    Ok(out)
}

/// Read a byte
pub fn read_u8(data: &[u8], offset: usize) -> ReadResult<u8> {
    Ok(array::<1>(data, offset)?[0])
}

/// Read a little-endian `u16`
pub fn read_u16(data: &[u8], offset: usize) -> ReadResult<u16> {
    array(data, offset).map(u16::from_le_bytes)
}

/// Read a little-endian `u32`
pub fn read_u32(data: &[u8], offset: usize) -> ReadResult<u32> {
    array(data, offset).map(u32::from_le_bytes)
}

/// Read a little-endian `i32`
pub fn read_i32(data: &[u8], offset: usize) -> ReadResult<i32> {
    array(data, offset).map(i32::from_le_bytes)
}

/// Read a little-endian `u64`
pub fn read_u64(data: &[u8], offset: usize) -> ReadResult<u64> {
    array(data, offset).map(u64::from_le_bytes)
}

/// Read a little-endian IEEE-754 `f32`
pub fn read_f32(data: &[u8], offset: usize) -> ReadResult<f32> {
    array(data, offset).map(f32::from_le_bytes)
}

/// Read `N` contiguous little-endian `f32` values
pub fn read_f32_array<const N: usize>(data: &[u8], offset: usize) -> ReadResult<[f32; N]> {
    // Check the whole span up front so a partial vector never leaks out
    slice(data, offset, N * 4)?;
    let mut out = [0f32; N];
    for (i, value) in out.iter_mut().enumerate() {
        *value = read_f32(data, offset + i * 4)?;
    }
    Ok(out)
}

/// Read a fixed-layout structure with binrw
///
/// Running out of bytes maps to [`ReadError::OutOfBounds`]; any other parser
/// failure (a failed `assert`, for example) maps to [`ReadError::Malformed`].
pub fn read_struct<T>(data: &[u8], offset: usize) -> ReadResult<T>
where
    T: BinRead,
    for<'a> <T as BinRead>::Args<'a>: Default,
{
    let tail = data.get(offset..).ok_or(ReadError::OutOfBounds {
        offset,
        len: 0,
        available: data.len(),
    })?;
    let mut cursor = Cursor::new(tail);
    T::read_le(&mut cursor).map_err(|e| {
        if e.is_eof() {
            ReadError::OutOfBounds {
                offset,
                len: tail.len() + 1,
                available: data.len(),
            }
        } else {
            ReadError::Malformed {
                offset,
                reason: e.to_string(),
            }
        }
    })
}

/// Read the `index`-th element of an array of `stride`-byte structures
pub fn read_indexed<T>(data: &[u8], index: usize, stride: usize) -> ReadResult<T>
where
    T: BinRead,
    for<'a> <T as BinRead>::Args<'a>: Default,
{
    let offset = index.checked_mul(stride).ok_or(ReadError::OutOfBounds {
        offset: usize::MAX,
        len: stride,
        available: data.len(),
    })?;
    // Confirm the full stride is present, not only the prefix T consumes
    slice(data, offset, stride)?;
    read_struct(data, offset)
}

/// Read a NUL-terminated string, decoding invalid UTF-8 lossily
pub fn read_cstring(data: &[u8], offset: usize) -> ReadResult<String> {
    let tail = data.get(offset..).ok_or(ReadError::OutOfBounds {
        offset,
        len: 1,
        available: data.len(),
    })?;
    let window = &tail[..tail.len().min(MAX_STRING_LENGTH)];
    let end = window
        .iter()
        .position(|&b| b == 0)
        .ok_or(ReadError::Unterminated(offset))?;
    Ok(String::from_utf8_lossy(&window[..end]).into_owned())
}

/// Split a block of NUL-separated strings, skipping empty segments
pub fn split_cstrings(block: &[u8]) -> Vec<String> {
    block
        .split(|&b| b == 0)
        .filter(|s| !s.is_empty())
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect()
}
