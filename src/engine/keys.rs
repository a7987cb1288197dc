//! Order-preserving byte transforms.
//!
//! The engine compares stored bytes lexicographically. Tables that ask for a
//! different ordering store a transformed form of each key (and of each
//! duplicate value) whose lexicographic order equals the requested order,
//! and invert the transform when handing bytes back.

use crate::config::{TableFlag, TableFlags};
use crate::errors::{StoreError, StoreResult};

/// Largest key (and duplicate value) the engine accepts, in bytes.
pub const MAX_KEY_SIZE: usize = 511;

/// How one column of a table is ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ByteOrder {
    /// Plain lexicographic byte order
    Lexical,
    /// Lexicographic order of the reversed bytes
    Reverse,
    /// Numeric order of a native-endian u32 or u64
    Integer,
}

impl ByteOrder {
    pub(crate) fn for_keys(flags: TableFlags) -> Self {
        if flags.contains(TableFlag::IntegerKey) {
            ByteOrder::Integer
        } else if flags.contains(TableFlag::ReverseKey) {
            ByteOrder::Reverse
        } else {
            ByteOrder::Lexical
        }
    }

    pub(crate) fn for_dups(flags: TableFlags) -> Self {
        if flags.contains(TableFlag::IntegerDup) {
            ByteOrder::Integer
        } else if flags.contains(TableFlag::ReverseDup) {
            ByteOrder::Reverse
        } else {
            ByteOrder::Lexical
        }
    }

    /// Caller bytes to stored bytes.
    pub(crate) fn encode(self, bytes: &[u8]) -> StoreResult<Vec<u8>> {
        match self {
            ByteOrder::Lexical => Ok(bytes.to_vec()),
            ByteOrder::Reverse => Ok(bytes.iter().rev().copied().collect()),
            ByteOrder::Integer => integer_swap(bytes),
        }
    }

    /// Stored bytes to caller bytes.
    pub(crate) fn decode(self, bytes: &[u8]) -> StoreResult<Vec<u8>> {
        match self {
            ByteOrder::Lexical => Ok(bytes.to_vec()),
            ByteOrder::Reverse => Ok(bytes.iter().rev().copied().collect()),
            ByteOrder::Integer => integer_swap(bytes),
        }
    }
}

/// Native-endian <-> big-endian; the swap is its own inverse.
fn integer_swap(bytes: &[u8]) -> StoreResult<Vec<u8>> {
    match bytes.len() {
        4 | 8 => {
            let mut out = bytes.to_vec();
            if cfg!(target_endian = "little") {
                out.reverse();
            }
            Ok(out)
        }
        n => Err(StoreError::bad_size("4 or 8 byte integer", n)),
    }
}

/// The per-table pair of orderings plus the size rules that go with them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KeyCodec {
    pub(crate) keys: ByteOrder,
    pub(crate) dups: ByteOrder,
    pub(crate) dup_sort: bool,
}

impl KeyCodec {
    pub(crate) fn new(flags: TableFlags) -> Self {
        Self {
            keys: ByteOrder::for_keys(flags),
            dups: ByteOrder::for_dups(flags),
            dup_sort: flags.contains(TableFlag::DupSort),
        }
    }

    pub(crate) fn encode_key(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        check_size(key)?;
        self.keys.encode(key)
    }

    pub(crate) fn decode_key(&self, stored: &[u8]) -> StoreResult<Vec<u8>> {
        self.keys.decode(stored)
    }

    /// Values are only reordered (and size-limited) in duplicate tables.
    pub(crate) fn encode_value(&self, value: &[u8]) -> StoreResult<Vec<u8>> {
        if self.dup_sort {
            check_size(value)?;
            self.dups.encode(value)
        } else {
            Ok(value.to_vec())
        }
    }

    pub(crate) fn decode_value(&self, stored: &[u8]) -> StoreResult<Vec<u8>> {
        if self.dup_sort {
            self.dups.decode(stored)
        } else {
            Ok(stored.to_vec())
        }
    }
}

fn check_size(bytes: &[u8]) -> StoreResult<()> {
    if bytes.is_empty() || bytes.len() > MAX_KEY_SIZE {
        return Err(StoreError::bad_size(
            format!("1..={MAX_KEY_SIZE} bytes"),
            bytes.len(),
        ));
    }
    Ok(())
}
