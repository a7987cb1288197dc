//! Binding of the layer to the redb engine.
//!
//! Everything that touches redb types lives below this module: the catalog
//! of logical tables, the byte-order transforms, the read views cursors
//! navigate over, and the journaled write path nested transactions rely on.

pub(crate) mod catalog;
pub mod keys;
pub(crate) mod view;
pub(crate) mod write;

use std::cell::Cell;
use std::path::PathBuf;

use redb::{MultimapTableDefinition, TableDefinition};

use crate::config::{TableFlag, TableFlags};
use crate::errors::{StoreError, StoreResult};
use keys::KeyCodec;

/// Plain logical table: one value per key.
pub(crate) type RawTable<'a> = TableDefinition<'a, &'static [u8], &'static [u8]>;

/// Duplicate-key logical table: a sorted set of values per key.
pub(crate) type RawDupTable<'a> = MultimapTableDefinition<'a, &'static [u8], &'static [u8]>;

/// Engine name of the unnamed main table.
pub(crate) const MAIN_TABLE: &str = "m:";

/// Engine name for a named logical table.
pub(crate) fn engine_name(name: Option<&str>) -> String {
    match name {
        Some(name) => format!("t:{name}"),
        None => MAIN_TABLE.to_string(),
    }
}

/// Everything needed to reach one logical table in the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TableInfo {
    /// Caller-visible name; `None` for the main table
    pub(crate) name: Option<String>,
    pub(crate) engine_name: String,
    pub(crate) flags: TableFlags,
    pub(crate) codec: KeyCodec,
}

impl TableInfo {
    pub(crate) fn new(name: Option<&str>, flags: TableFlags) -> Self {
        let flags = flags.persistent();
        Self {
            name: name.map(str::to_string),
            engine_name: engine_name(name),
            flags,
            codec: KeyCodec::new(flags),
        }
    }

    pub(crate) fn is_dup(&self) -> bool {
        self.flags.contains(TableFlag::DupSort)
    }

    pub(crate) fn plain_def(&self) -> RawTable<'_> {
        TableDefinition::new(&self.engine_name)
    }

    pub(crate) fn dup_def(&self) -> RawDupTable<'_> {
        MultimapTableDefinition::new(&self.engine_name)
    }

    pub(crate) fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<main>")
    }
}

/// The root write transaction plus the accounting shared with its children.
pub(crate) struct WriteCore {
    pub(crate) tx: redb::WriteTransaction,
    written: Cell<u64>,
    budget: Option<u64>,
    map_limit: Option<(PathBuf, u64)>,
    /// Bumped on every change, so cursors know when cached groups are stale.
    generation: Cell<u64>,
}

impl WriteCore {
    pub(crate) fn new(
        tx: redb::WriteTransaction,
        budget: Option<u64>,
        map_limit: Option<(PathBuf, u64)>,
    ) -> Self {
        Self {
            tx,
            written: Cell::new(0),
            budget,
            map_limit,
            generation: Cell::new(0),
        }
    }

    /// Account for `bytes` about to be written, failing if either the data
    /// file or this transaction is out of room.
    pub(crate) fn reserve(&self, bytes: usize) -> StoreResult<()> {
        if let Some((path, limit)) = &self.map_limit {
            let size = match std::fs::metadata(path) {
                Ok(meta) => meta.len(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
                Err(e) => return Err(e.into()),
            };
            if size >= *limit {
                return Err(StoreError::MapFull {
                    size,
                    limit: *limit,
                });
            }
        }
        let written = self.written.get() + bytes as u64;
        if let Some(budget) = self.budget {
            if written > budget {
                return Err(StoreError::TxnFull { written, budget });
            }
        }
        self.written.set(written);
        Ok(())
    }

    /// Give back budget charged by writes that were rolled back.
    pub(crate) fn refund(&self, bytes: u64) {
        self.written.set(self.written.get().saturating_sub(bytes));
    }

    pub(crate) fn touch(&self) {
        self.generation.set(self.generation.get().wrapping_add(1));
    }

    pub(crate) fn into_inner(self) -> redb::WriteTransaction {
        self.tx
    }
}

/// Borrowed access to whichever engine transaction backs a handle.
#[derive(Clone, Copy)]
pub(crate) enum EngineTxn<'t> {
    Read(&'t redb::ReadTransaction),
    Write(&'t WriteCore),
}

impl<'t> EngineTxn<'t> {
    pub(crate) fn write_core(self) -> Option<&'t WriteCore> {
        match self {
            EngineTxn::Read(_) => None,
            EngineTxn::Write(core) => Some(core),
        }
    }

    /// Changes seen so far; a snapshot never changes.
    pub(crate) fn generation(self) -> u64 {
        match self {
            EngineTxn::Read(_) => 0,
            EngineTxn::Write(core) => core.generation.get(),
        }
    }
}
