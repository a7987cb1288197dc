//! Key-group navigation over plain and duplicate-key engine tables.
//!
//! A [`TableView`] answers "which key comes after/before this one" and
//! "what values does this key hold", in stored byte form. Cursors are built
//! entirely on these questions, so the same cursor logic serves read and
//! write transactions, plain and duplicate tables.

use std::ops::Bound;

use redb::{ReadableMultimapTable, ReadableTable};

use super::{EngineTxn, TableInfo};
use crate::errors::StoreResult;

/// One key together with all of its (stored, sorted) values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Group {
    pub(crate) key: Vec<u8>,
    pub(crate) values: Vec<Vec<u8>>,
}

pub(crate) trait TableView {
    /// Values stored under `key`, ascending; empty when the key is absent.
    fn values(&self, key: &[u8]) -> StoreResult<Vec<Vec<u8>>>;

    /// Number of values stored under `key`.
    fn count(&self, key: &[u8]) -> StoreResult<usize>;

    /// First group with a key strictly after `key`, or the first group.
    fn group_after(&self, key: Option<&[u8]>) -> StoreResult<Option<Group>>;

    /// Last group with a key strictly before `key`, or the last group.
    fn group_before(&self, key: Option<&[u8]>) -> StoreResult<Option<Group>>;

    /// First group whose key is greater than or equal to `key`.
    fn group_at_or_after(&self, key: &[u8]) -> StoreResult<Option<Group>>;
}

fn lower(key: Option<&[u8]>) -> Bound<&[u8]> {
    key.map_or(Bound::Unbounded, Bound::Excluded)
}

// ============================================================================
// Plain tables
// ============================================================================

struct PlainView<T>(T);

impl<T> PlainView<T>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    fn first_in(
        &self,
        range: (Bound<&[u8]>, Bound<&[u8]>),
        from_back: bool,
    ) -> StoreResult<Option<Group>> {
        let mut iter = self.0.range::<&[u8]>(range)?;
        let entry = if from_back { iter.next_back() } else { iter.next() };
        match entry {
            Some(entry) => {
                let (key, value) = entry?;
                Ok(Some(Group {
                    key: key.value().to_vec(),
                    values: vec![value.value().to_vec()],
                }))
            }
            None => Ok(None),
        }
    }
}

impl<T> TableView for PlainView<T>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    fn values(&self, key: &[u8]) -> StoreResult<Vec<Vec<u8>>> {
        Ok(self.0.get(key)?.map(|v| v.value().to_vec()).into_iter().collect())
    }

    fn count(&self, key: &[u8]) -> StoreResult<usize> {
        Ok(usize::from(self.0.get(key)?.is_some()))
    }

    fn group_after(&self, key: Option<&[u8]>) -> StoreResult<Option<Group>> {
        self.first_in((lower(key), Bound::Unbounded), false)
    }

    fn group_before(&self, key: Option<&[u8]>) -> StoreResult<Option<Group>> {
        self.first_in((Bound::Unbounded, lower(key)), true)
    }

    fn group_at_or_after(&self, key: &[u8]) -> StoreResult<Option<Group>> {
        self.first_in((Bound::Included(key), Bound::Unbounded), false)
    }
}

// ============================================================================
// Duplicate-key tables
// ============================================================================

struct DupView<T>(T);

impl<T> DupView<T>
where
    T: ReadableMultimapTable<&'static [u8], &'static [u8]>,
{
    fn first_in(
        &self,
        range: (Bound<&[u8]>, Bound<&[u8]>),
        from_back: bool,
    ) -> StoreResult<Option<Group>> {
        let mut iter = self.0.range::<&[u8]>(range)?;
        let entry = if from_back { iter.next_back() } else { iter.next() };
        match entry {
            Some(entry) => {
                let (key, values) = entry?;
                let values = values
                    .map(|v| v.map(|v| v.value().to_vec()))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Some(Group {
                    key: key.value().to_vec(),
                    values,
                }))
            }
            None => Ok(None),
        }
    }
}

impl<T> TableView for DupView<T>
where
    T: ReadableMultimapTable<&'static [u8], &'static [u8]>,
{
    fn values(&self, key: &[u8]) -> StoreResult<Vec<Vec<u8>>> {
        Ok(self
            .0
            .get(key)?
            .map(|v| v.map(|v| v.value().to_vec()))
            .collect::<Result<Vec<_>, _>>()?)
    }

    fn count(&self, key: &[u8]) -> StoreResult<usize> {
        Ok(self.0.get(key)?.len() as usize)
    }

    fn group_after(&self, key: Option<&[u8]>) -> StoreResult<Option<Group>> {
        self.first_in((lower(key), Bound::Unbounded), false)
    }

    fn group_before(&self, key: Option<&[u8]>) -> StoreResult<Option<Group>> {
        self.first_in((Bound::Unbounded, lower(key)), true)
    }

    fn group_at_or_after(&self, key: &[u8]) -> StoreResult<Option<Group>> {
        self.first_in((Bound::Included(key), Bound::Unbounded), false)
    }
}

/// A table that does not exist in a read snapshot.
struct EmptyView;

impl TableView for EmptyView {
    fn values(&self, _key: &[u8]) -> StoreResult<Vec<Vec<u8>>> {
        Ok(Vec::new())
    }

    fn count(&self, _key: &[u8]) -> StoreResult<usize> {
        Ok(0)
    }

    fn group_after(&self, _key: Option<&[u8]>) -> StoreResult<Option<Group>> {
        Ok(None)
    }

    fn group_before(&self, _key: Option<&[u8]>) -> StoreResult<Option<Group>> {
        Ok(None)
    }

    fn group_at_or_after(&self, _key: &[u8]) -> StoreResult<Option<Group>> {
        Ok(None)
    }
}

/// Open `info` in `engine` for reading and run `f` against it.
///
/// The engine table stays open only for the duration of `f`, so write
/// transactions can keep opening the same table for writes in between.
pub(crate) fn with_view<R>(
    engine: EngineTxn<'_>,
    info: &TableInfo,
    f: impl FnOnce(&dyn TableView) -> StoreResult<R>,
) -> StoreResult<R> {
    match (engine, info.is_dup()) {
        (EngineTxn::Read(tx), false) => match tx.open_table(info.plain_def()) {
            Ok(table) => f(&PlainView(table)),
            Err(redb::TableError::TableDoesNotExist(_)) => f(&EmptyView),
            Err(e) => Err(e.into()),
        },
        (EngineTxn::Read(tx), true) => match tx.open_multimap_table(info.dup_def()) {
            Ok(table) => f(&DupView(table)),
            Err(redb::TableError::TableDoesNotExist(_)) => f(&EmptyView),
            Err(e) => Err(e.into()),
        },
        (EngineTxn::Write(core), false) => f(&PlainView(core.tx.open_table(info.plain_def())?)),
        (EngineTxn::Write(core), true) => {
            f(&DupView(core.tx.open_multimap_table(info.dup_def())?))
        }
    }
}
