//! K-way merge over cursors of several tables.
//!
//! A [`MergeIter`] keeps one cursor per table plus the pair each cursor last
//! fetched. The selected slot is the one holding the smallest key; ties go to
//! the lowest table index, and exhausted slots sort after every real key.
//! Advancing moves only the selected cursor, then selects again.
//!
//! Nothing is deduplicated: a key present in two tables is visited twice,
//! once per table, and [`MergeIter::table_index`] says which one produced the
//! current pair.
//!
//! Two iterators compare equal when both are exhausted or both sit on equal
//! keys, whatever table or value is behind them. That makes an iterator
//! positioned with [`seek_range`](MergeIter::seek_range) usable as the
//! exclusive end of a scan:
//!
//! ```no_run
//! # use tablekv::prelude::*;
//! # fn main() -> StoreResult<()> {
//! # let env = Environment::open(EnvConfig::new("./db"))?;
//! let txn = env.begin_read()?;
//! let primary = txn.db().open("primary")?;
//! let archive = txn.db().open("archive")?;
//!
//! let mut scan = txn.merge_iter::<u64, String>(&[primary, archive])?;
//! scan.seek_range(&100)?;
//! let mut end = txn.merge_iter::<u64, String>(&[primary, archive])?;
//! end.seek_range(&200)?;
//!
//! for entry in scan.scan_until(&end)? {
//!     println!("{} from table {}: {}", entry.key, entry.table_index, entry.value);
//! }
//! # Ok(())
//! # }
//! ```

use log::{debug, trace};

use crate::codec::{Pack, Unpack};
use crate::cursor::{Cursor, CursorOp};
use crate::errors::{StoreError, StoreResult};
use crate::table::Table;
use crate::transaction::{Txn, TxnMode};

/// One step of a merged traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedEntry<K, V> {
    pub key: K,
    pub value: V,
    /// Position of the source table in the list the iterator was built from.
    pub table_index: usize,
}

struct Slot<'t, K, V> {
    /// `None` when the table could not be opened; such a slot stays empty.
    cursor: Option<Cursor<'t, K, V>>,
    current: Option<(K, V)>,
}

pub struct MergeIter<'t, K, V> {
    slots: Vec<Slot<'t, K, V>>,
    selected: Option<usize>,
}

impl<'t, K, V> MergeIter<'t, K, V>
where
    K: Pack + Unpack + Ord,
    V: Pack + Unpack,
{
    /// Open one cursor per table and position each on its first entry.
    pub fn new<M: TxnMode>(txn: &'t Txn<'_, M>, tables: &[Table]) -> StoreResult<Self> {
        let mut slots = Vec::with_capacity(tables.len());
        for (index, table) in tables.iter().enumerate() {
            let slot = match table.open_cursor::<K, V, M>(txn) {
                Ok(mut cursor) => {
                    let current = cursor.get(CursorOp::First)?;
                    Slot {
                        cursor: Some(cursor),
                        current,
                    }
                }
                Err(e) => {
                    debug!("merge slot {index} left empty: {e}");
                    Slot {
                        cursor: None,
                        current: None,
                    }
                }
            };
            slots.push(slot);
        }
        let mut iter = Self {
            slots,
            selected: None,
        };
        iter.select();
        Ok(iter)
    }

    /// Reposition every cursor on its first key `>= key`.
    pub fn seek_range(&mut self, key: &K) -> StoreResult<()> {
        self.reposition(|cursor| cursor.seek(CursorOp::SetRange, key))
    }

    /// Reposition every cursor on the exact pair (`key`, `value`); slots
    /// without that pair become exhausted.
    pub fn seek_both(&mut self, key: &K, value: &V) -> StoreResult<()> {
        self.reposition(|cursor| cursor.seek_both(CursorOp::GetBoth, key, value))
    }

    fn reposition(
        &mut self,
        mut seek: impl FnMut(&mut Cursor<'t, K, V>) -> StoreResult<Option<(K, V)>>,
    ) -> StoreResult<()> {
        if self.slots.is_empty() {
            return Err(StoreError::InvalidPosition);
        }
        for slot in &mut self.slots {
            if let Some(cursor) = slot.cursor.as_mut() {
                slot.current = seek(cursor)?;
            }
        }
        self.select();
        Ok(())
    }

    /// Move past the current pair.
    pub fn advance(&mut self) -> StoreResult<()> {
        let index = self.selected.ok_or(StoreError::InvalidPosition)?;
        self.step(index)
    }

    fn step(&mut self, index: usize) -> StoreResult<()> {
        let slot = &mut self.slots[index];
        slot.current = match slot.cursor.as_mut() {
            Some(cursor) => cursor.get(CursorOp::Next)?,
            None => None,
        };
        self.select();
        Ok(())
    }

    /// Collect entries until this iterator reaches `end`'s key (exclusive)
    /// or is exhausted.
    pub fn scan_until(&mut self, end: &MergeIter<'_, K, V>) -> StoreResult<Vec<MergedEntry<K, V>>> {
        let mut entries = Vec::new();
        while let Some(key) = self.selected_key() {
            if end.selected_key().is_some_and(|stop| key >= stop) {
                break;
            }
            match self.next() {
                Some(entry) => entries.push(entry?),
                None => break,
            }
        }
        Ok(entries)
    }
}

impl<K: Ord, V> MergeIter<'_, K, V> {
    fn select(&mut self) {
        let mut best: Option<(usize, &K)> = None;
        for (index, slot) in self.slots.iter().enumerate() {
            if let Some((key, _)) = &slot.current {
                if best.is_none_or(|(_, smallest)| key < smallest) {
                    best = Some((index, key));
                }
            }
        }
        self.selected = best.map(|(index, _)| index);
        trace!("merge selected {:?}", self.selected);
    }
}

impl<K, V> MergeIter<'_, K, V> {
    pub fn is_exhausted(&self) -> bool {
        self.selected.is_none()
    }

    fn selected_key(&self) -> Option<&K> {
        let index = self.selected?;
        self.slots[index].current.as_ref().map(|(key, _)| key)
    }

    /// The pair at the selected slot.
    pub fn current(&self) -> StoreResult<(&K, &V)> {
        let index = self.selected.ok_or(StoreError::InvalidPosition)?;
        match &self.slots[index].current {
            Some((key, value)) => Ok((key, value)),
            None => Err(StoreError::InvalidPosition),
        }
    }

    /// Index of the table that produced the current pair.
    pub fn table_index(&self) -> StoreResult<usize> {
        self.selected.ok_or(StoreError::InvalidPosition)
    }
}

impl<K: PartialEq, V> PartialEq for MergeIter<'_, K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.selected_key() == other.selected_key()
    }
}

impl<K, V> Iterator for MergeIter<'_, K, V>
where
    K: Pack + Unpack + Ord,
    V: Pack + Unpack,
{
    type Item = StoreResult<MergedEntry<K, V>>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.selected?;
        let (key, value) = self.slots[index].current.take()?;
        let entry = MergedEntry {
            key,
            value,
            table_index: index,
        };
        match self.step(index) {
            Ok(()) => Some(Ok(entry)),
            Err(e) => {
                self.selected = None;
                Some(Err(e))
            }
        }
    }
}

impl<K: std::fmt::Debug, V> std::fmt::Debug for MergeIter<'_, K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeIter")
            .field("tables", &self.slots.len())
            .field("selected", &self.selected)
            .field("key", &self.selected_key())
            .finish()
    }
}
