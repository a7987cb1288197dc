//! Typed values to and from the byte spans the engine stores.
//!
//! Three shapes are supported:
//!
//! - **Fixed-size values** ([`Plain`] types): stored as their raw in-memory
//!   representation. Primitive numbers use native byte order, so the
//!   encoding is *not* portable between machines of different endianness or
//!   word size. Unpacking requires the span length to equal the type's size.
//! - **Character strings** (`String`, `str`, `Vec<u8>`, `[u8]`): stored as
//!   their raw content bytes. The length is carried by the span, with no
//!   terminator.
//! - **String sequences** (`Vec<String>`): every element is followed by a
//!   single NUL byte. Elements must not contain NUL themselves; packing one
//!   that does fails with `InvalidArgument`.
//!
//! [`Bincode`] adds an explicit, portable encoding for anything else.

use std::borrow::Cow;
use std::mem;

use crate::errors::{StoreError, StoreResult};

/// Separator that terminates each element of a packed string sequence.
pub const SEQUENCE_SEPARATOR: u8 = 0;

/// A value that can be written to the engine.
pub trait Pack {
    fn pack(&self) -> StoreResult<Cow<'_, [u8]>>;
}

/// A value that can be read back from engine bytes.
pub trait Unpack: Sized {
    fn unpack(bytes: &[u8]) -> StoreResult<Self>;
}

/// Marker for fixed-size types stored as their raw memory.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]` (or a primitive) with no padding bytes,
/// and every bit pattern of `size_of::<Self>()` bytes must be a valid value.
pub unsafe trait Plain: Copy + 'static {}

macro_rules! impl_plain {
    ($($t:ty),* $(,)?) => {
        $(unsafe impl Plain for $t {})*
    };
}

impl_plain!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64);

unsafe impl<T: Plain, const N: usize> Plain for [T; N] {}

impl<T: Plain> Pack for T {
    fn pack(&self) -> StoreResult<Cow<'_, [u8]>> {
        // SAFETY: `Plain` guarantees there are no padding bytes, so every byte
        // of the value is initialised.
        let bytes = unsafe {
            std::slice::from_raw_parts((self as *const T).cast::<u8>(), mem::size_of::<T>())
        };
        Ok(Cow::Borrowed(bytes))
    }
}

impl<T: Plain> Unpack for T {
    fn unpack(bytes: &[u8]) -> StoreResult<Self> {
        if bytes.len() != mem::size_of::<T>() {
            return Err(StoreError::bad_size(
                format!("{} bytes", mem::size_of::<T>()),
                bytes.len(),
            ));
        }
        // SAFETY: length checked above and `Plain` guarantees any bit pattern
        // is valid; engine memory carries no alignment promise.
        Ok(unsafe { std::ptr::read_unaligned(bytes.as_ptr().cast::<T>()) })
    }
}

impl Pack for str {
    fn pack(&self) -> StoreResult<Cow<'_, [u8]>> {
        Ok(Cow::Borrowed(self.as_bytes()))
    }
}

impl Pack for String {
    fn pack(&self) -> StoreResult<Cow<'_, [u8]>> {
        self.as_str().pack()
    }
}

impl Unpack for String {
    fn unpack(bytes: &[u8]) -> StoreResult<Self> {
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}

impl Pack for [u8] {
    fn pack(&self) -> StoreResult<Cow<'_, [u8]>> {
        Ok(Cow::Borrowed(self))
    }
}

impl Pack for Vec<u8> {
    fn pack(&self) -> StoreResult<Cow<'_, [u8]>> {
        Ok(Cow::Borrowed(self.as_slice()))
    }
}

impl Unpack for Vec<u8> {
    fn unpack(bytes: &[u8]) -> StoreResult<Self> {
        Ok(bytes.to_vec())
    }
}

impl Pack for Vec<String> {
    fn pack(&self) -> StoreResult<Cow<'_, [u8]>> {
        pack_sequence(self.iter().map(String::as_str)).map(Cow::Owned)
    }
}

impl Pack for [&str] {
    fn pack(&self) -> StoreResult<Cow<'_, [u8]>> {
        pack_sequence(self.iter().copied()).map(Cow::Owned)
    }
}

impl Unpack for Vec<String> {
    fn unpack(bytes: &[u8]) -> StoreResult<Self> {
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        let body = bytes.strip_suffix(&[SEQUENCE_SEPARATOR]).unwrap_or(bytes);
        body.split(|b| *b == SEQUENCE_SEPARATOR)
            .map(|item| Ok(String::from_utf8(item.to_vec())?))
            .collect()
    }
}

fn pack_sequence<'a>(items: impl Iterator<Item = &'a str>) -> StoreResult<Vec<u8>> {
    let mut out = Vec::new();
    for item in items {
        if item.as_bytes().contains(&SEQUENCE_SEPARATOR) {
            return Err(StoreError::InvalidArgument(format!(
                "string sequence element {item:?} contains a NUL byte"
            )));
        }
        out.extend_from_slice(item.as_bytes());
        out.push(SEQUENCE_SEPARATOR);
    }
    Ok(out)
}

// ============================================================================
// Portable encoding
// ============================================================================

/// Wrapper that stores any bincode-serialisable value in bincode's standard
/// (fixed byte order) encoding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Bincode<T>(pub T);

impl<T: bincode::Encode> Pack for Bincode<T> {
    fn pack(&self) -> StoreResult<Cow<'_, [u8]>> {
        bincode::encode_to_vec(&self.0, bincode::config::standard())
            .map(Cow::Owned)
            .map_err(|e| StoreError::Encoding(e.to_string()))
    }
}

impl<T: bincode::Decode<()>> Unpack for Bincode<T> {
    fn unpack(bytes: &[u8]) -> StoreResult<Self> {
        let (value, read) = bincode::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| StoreError::Encoding(e.to_string()))?;
        if read != bytes.len() {
            return Err(StoreError::bad_size(format!("{read} bytes"), bytes.len()));
        }
        Ok(Bincode(value))
    }
}
