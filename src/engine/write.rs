//! Write path with an optional undo journal.
//!
//! The engine has a single flat write transaction, so a nested write
//! transaction shares its parent's engine transaction and records, for every
//! change it makes, how to put things back. Aborting the child replays that
//! journal newest-first; committing it hands the entries to the parent (or
//! drops them when the parent is the root).

use std::cell::{Cell, RefCell};

use log::trace;
use redb::{ReadableMultimapTable, ReadableTable};

use super::{TableInfo, WriteCore, catalog};
use crate::config::{PutFlags, TableFlag};
use crate::errors::{StoreError, StoreResult};

/// One reversible change, in stored byte form.
#[derive(Debug)]
pub(crate) enum Undo {
    /// A plain entry changed; restore `previous` (or remove the key).
    Restore {
        table: TableInfo,
        key: Vec<u8>,
        previous: Option<Vec<u8>>,
    },
    /// A duplicate pair was added; remove it.
    Unlink {
        table: TableInfo,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    /// A duplicate pair was removed; add it back.
    Relink {
        table: TableInfo,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    /// A table was created; drop it and its catalog entry.
    Uncreate { table: TableInfo },
}

/// Undo entries of one nested writer, plus the write budget it charged.
#[derive(Debug, Default)]
pub(crate) struct Journal {
    entries: RefCell<Vec<Undo>>,
    charged: Cell<u64>,
}

impl Journal {
    /// Hand every entry and charge to the enclosing writer's journal.
    pub(crate) fn merge_into(self, parent: &Journal) {
        parent.entries.borrow_mut().extend(self.entries.into_inner());
        parent.charged.set(parent.charged.get() + self.charged.get());
    }

    /// Undo every change and refund the budget those changes used.
    pub(crate) fn roll_back(self, core: &WriteCore) -> StoreResult<()> {
        rollback(core, self.entries.into_inner())?;
        core.refund(self.charged.get());
        Ok(())
    }
}

/// Engine writes for one transaction; `journal` is set for nested writers.
pub(crate) struct Writer<'t> {
    pub(crate) core: &'t WriteCore,
    pub(crate) journal: Option<&'t Journal>,
}

impl Writer<'_> {
    /// Note a change that has just been applied.
    fn record(&self, undo: Undo) {
        self.core.touch();
        if let Some(journal) = self.journal {
            journal.entries.borrow_mut().push(undo);
        }
    }

    /// Charge the budget for an insert that is about to happen.
    fn charge(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let bytes = key.len() + value.len();
        self.core.reserve(bytes)?;
        if let Some(journal) = self.journal {
            journal.charged.set(journal.charged.get() + bytes as u64);
        }
        Ok(())
    }

    pub(crate) fn create_table(&self, info: &TableInfo) -> StoreResult<()> {
        catalog::record(self.core, &info.engine_name, info.flags)?;
        // Opening a table in a write transaction materialises it.
        if info.is_dup() {
            self.core.tx.open_multimap_table(info.dup_def())?;
        } else {
            self.core.tx.open_table(info.plain_def())?;
        }
        self.record(Undo::Uncreate {
            table: info.clone(),
        });
        Ok(())
    }

    /// Store an already-encoded pair according to `flags`.
    pub(crate) fn put(
        &self,
        info: &TableInfo,
        key: &[u8],
        value: &[u8],
        flags: PutFlags,
    ) -> StoreResult<()> {
        if info.is_dup() {
            self.put_dup(info, key, value, flags)
        } else {
            self.put_plain(info, key, value, flags)
        }
    }

    fn put_plain(
        &self,
        info: &TableInfo,
        key: &[u8],
        value: &[u8],
        flags: PutFlags,
    ) -> StoreResult<()> {
        let mut table = self.core.tx.open_table(info.plain_def())?;
        if flags.contains(PutFlags::APPEND) {
            if let Some((last, _)) = table.last()? {
                if last.value() >= key {
                    return Err(StoreError::KeyExists);
                }
            }
        }
        let previous = table.get(key)?.map(|v| v.value().to_vec());
        if previous.is_some() && flags.contains(PutFlags::NO_OVERWRITE) {
            return Err(StoreError::KeyExists);
        }
        self.charge(key, value)?;
        table.insert(key, value)?;
        trace!("put {} bytes into {}", value.len(), info.display_name());
        self.record(Undo::Restore {
            table: info.clone(),
            key: key.to_vec(),
            previous,
        });
        Ok(())
    }

    fn put_dup(
        &self,
        info: &TableInfo,
        key: &[u8],
        value: &[u8],
        flags: PutFlags,
    ) -> StoreResult<()> {
        let mut table = self.core.tx.open_multimap_table(info.dup_def())?;
        if flags.contains(PutFlags::APPEND) {
            let last = table.range::<&[u8]>(..)?.next_back().transpose()?;
            if let Some((last, _)) = last {
                if last.value() > key {
                    return Err(StoreError::KeyExists);
                }
            }
        }
        let existing = table
            .get(key)?
            .map(|v| v.map(|v| v.value().to_vec()))
            .collect::<Result<Vec<_>, _>>()?;
        if !existing.is_empty() && flags.contains(PutFlags::NO_OVERWRITE) {
            return Err(StoreError::KeyExists);
        }
        if info.flags.contains(TableFlag::DupFixed) {
            if let Some(first) = existing.first() {
                if first.len() != value.len() {
                    return Err(StoreError::bad_size(
                        format!("{} bytes (fixed duplicate size)", first.len()),
                        value.len(),
                    ));
                }
            }
        }
        let present = existing.iter().any(|v| v.as_slice() == value);
        if present {
            if flags.contains(PutFlags::NO_DUP_DATA) {
                return Err(StoreError::KeyExists);
            }
            return Ok(());
        }
        self.charge(key, value)?;
        table.insert(key, value)?;
        self.record(Undo::Unlink {
            table: info.clone(),
            key: key.to_vec(),
            value: value.to_vec(),
        });
        Ok(())
    }

    /// Remove `key` and every value under it.
    pub(crate) fn delete(&self, info: &TableInfo, key: &[u8]) -> StoreResult<bool> {
        if info.is_dup() {
            let mut table = self.core.tx.open_multimap_table(info.dup_def())?;
            let removed = table
                .remove_all(key)?
                .map(|v| v.map(|v| v.value().to_vec()))
                .collect::<Result<Vec<_>, _>>()?;
            let existed = !removed.is_empty();
            for value in removed {
                self.record(Undo::Relink {
                    table: info.clone(),
                    key: key.to_vec(),
                    value,
                });
            }
            Ok(existed)
        } else {
            let mut table = self.core.tx.open_table(info.plain_def())?;
            let previous = table.remove(key)?.map(|v| v.value().to_vec());
            let existed = previous.is_some();
            if existed {
                self.record(Undo::Restore {
                    table: info.clone(),
                    key: key.to_vec(),
                    previous,
                });
            }
            Ok(existed)
        }
    }

    /// Remove one pair. For plain tables the stored value must match.
    pub(crate) fn delete_pair(
        &self,
        info: &TableInfo,
        key: &[u8],
        value: &[u8],
    ) -> StoreResult<bool> {
        if info.is_dup() {
            let mut table = self.core.tx.open_multimap_table(info.dup_def())?;
            let existed = table.remove(key, value)?;
            if existed {
                self.record(Undo::Relink {
                    table: info.clone(),
                    key: key.to_vec(),
                    value: value.to_vec(),
                });
            }
            Ok(existed)
        } else {
            let matches = {
                let table = self.core.tx.open_table(info.plain_def())?;
                let stored = table.get(key)?.map(|v| v.value() == value);
                stored.unwrap_or(false)
            };
            if matches {
                self.delete(info, key)
            } else {
                Ok(false)
            }
        }
    }
}

/// Undo every journaled change, newest first.
fn rollback(core: &WriteCore, entries: Vec<Undo>) -> StoreResult<()> {
    for undo in entries.into_iter().rev() {
        match undo {
            Undo::Restore {
                table,
                key,
                previous,
            } => {
                let mut t = core.tx.open_table(table.plain_def())?;
                match previous {
                    Some(value) => {
                        t.insert(key.as_slice(), value.as_slice())?;
                    }
                    None => {
                        t.remove(key.as_slice())?;
                    }
                }
            }
            Undo::Unlink { table, key, value } => {
                let mut t = core.tx.open_multimap_table(table.dup_def())?;
                t.remove(key.as_slice(), value.as_slice())?;
            }
            Undo::Relink { table, key, value } => {
                let mut t = core.tx.open_multimap_table(table.dup_def())?;
                t.insert(key.as_slice(), value.as_slice())?;
            }
            Undo::Uncreate { table } => {
                if table.is_dup() {
                    core.tx.delete_multimap_table(table.dup_def())?;
                } else {
                    core.tx.delete_table(table.plain_def())?;
                }
                catalog::forget(core, &table.engine_name)?;
            }
        }
    }
    core.touch();
    Ok(())
}
