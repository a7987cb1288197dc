//! Typed cursors over one table within one transaction.
//!
//! A cursor remembers its position as the stored (key, value) pair it last
//! landed on and re-seeks from there on every step. It never holds an engine
//! table open between calls, so a write transaction can interleave cursor
//! reads with puts on the same table.
//!
//! Operations that cannot be satisfied return `Ok(None)`. Relative moves
//! (`Next`, `Prev`, the `*Dup` and `*NoDup` variants, `GetCurrent`) keep the
//! current position when they fail; absolute positioning (`First`, `Last`,
//! `Set*`, `GetBoth*`) leaves the cursor unpositioned when it fails.

use std::marker::PhantomData;
use std::sync::Arc;

use log::trace;

use crate::codec::{Pack, Unpack};
use crate::engine::view::{Group, TableView, with_view};
use crate::engine::{EngineTxn, TableInfo};
use crate::errors::{StoreError, StoreResult};

/// Cursor positioning operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum CursorOp {
    First,
    Last,
    /// Next pair, including the next duplicate of the current key.
    Next,
    Prev,
    /// First pair of the next key.
    NextNoDup,
    /// Last pair of the previous key.
    PrevNoDup,
    /// Next duplicate of the current key only.
    NextDup,
    PrevDup,
    FirstDup,
    LastDup,
    GetCurrent,
    /// Exact key, positioned on its first duplicate.
    Set,
    /// Same as `Set`.
    SetKey,
    /// First key greater than or equal to the target.
    SetRange,
    /// Exact (key, value) pair.
    GetBoth,
    /// Exact key, first duplicate greater than or equal to the target value.
    GetBothRange,
}

impl CursorOp {
    fn needs_key(self) -> bool {
        matches!(
            self,
            CursorOp::Set
                | CursorOp::SetKey
                | CursorOp::SetRange
                | CursorOp::GetBoth
                | CursorOp::GetBothRange
        )
    }

    fn needs_value(self) -> bool {
        matches!(self, CursorOp::GetBoth | CursorOp::GetBothRange)
    }

    fn is_relative(self) -> bool {
        matches!(
            self,
            CursorOp::Next
                | CursorOp::Prev
                | CursorOp::NextNoDup
                | CursorOp::PrevNoDup
                | CursorOp::NextDup
                | CursorOp::PrevDup
                | CursorOp::FirstDup
                | CursorOp::LastDup
                | CursorOp::GetCurrent
        )
    }
}

type Position = (Vec<u8>, Vec<u8>);

/// A positioned, typed reference into one table.
///
/// Borrows the transaction it was opened in. Duplicate with
/// [`try_clone`](Self::try_clone); a Rust move transfers the position.
pub struct Cursor<'t, K, V> {
    engine: EngineTxn<'t>,
    info: Arc<TableInfo>,
    position: Option<Position>,
    cache: Option<Cached>,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<'t, K, V> Cursor<'t, K, V> {
    pub(crate) fn new(engine: EngineTxn<'t>, info: Arc<TableInfo>) -> Self {
        Self {
            engine,
            info,
            position: None,
            cache: None,
            _types: PhantomData,
        }
    }

    pub fn is_positioned(&self) -> bool {
        self.position.is_some()
    }

    /// Number of values stored under the current key.
    pub fn count(&self) -> StoreResult<usize> {
        let (key, _) = self
            .position
            .as_ref()
            .ok_or_else(|| StoreError::InvalidArgument("cursor has no position".into()))?;
        with_view(self.engine, &self.info, |view| view.count(key))
    }

    /// A second cursor on the same table, positioned on the same pair.
    ///
    /// The copy re-seeks the exact stored pair, which is unique even in
    /// duplicate-key tables. If the source has no position (or its pair has
    /// since been deleted) the copy starts unpositioned.
    pub fn try_clone(&self) -> StoreResult<Self> {
        let mut copy = Cursor::new(self.engine, Arc::clone(&self.info));
        if let Some((key, value)) = &self.position {
            copy.step(CursorOp::GetBoth, Some(key.as_slice()), Some(value.as_slice()))?;
        }
        Ok(copy)
    }

    /// Apply `op`; returns whether it was satisfied.
    fn step(
        &mut self,
        op: CursorOp,
        key: Option<&[u8]>,
        value: Option<&[u8]>,
    ) -> StoreResult<bool> {
        let generation = self.engine.generation();
        let mut group = self
            .cache
            .take()
            .filter(|cached| cached.generation == generation)
            .map(|cached| cached.group);
        let current = self.position.as_ref();
        let found = with_view(self.engine, &self.info, |view| {
            let mut nav = Nav {
                view,
                group: &mut group,
            };
            locate(&mut nav, op, current, key, value)
        })?;
        self.cache = group.map(|group| Cached { generation, group });
        trace!(
            "cursor {op} on {}: {}",
            self.info.display_name(),
            if found.is_some() { "hit" } else { "miss" }
        );
        match found {
            Some(position) => {
                self.position = Some(position);
                Ok(true)
            }
            None => {
                if !op.is_relative() {
                    self.position = None;
                }
                Ok(false)
            }
        }
    }
}

impl<K: Unpack, V: Unpack> Cursor<'_, K, V> {
    fn decode(&self, (key, value): &Position) -> StoreResult<(K, V)> {
        let key = K::unpack(&self.info.codec.decode_key(key)?)?;
        let value = V::unpack(&self.info.codec.decode_value(value)?)?;
        Ok((key, value))
    }

    /// Reposition with an operation that takes no target.
    pub fn get(&mut self, op: CursorOp) -> StoreResult<Option<(K, V)>> {
        if op.needs_key() {
            return Err(StoreError::InvalidArgument(format!("{op} requires a target key")));
        }
        self.finish_step(op, None, None)
    }

    fn finish_step(
        &mut self,
        op: CursorOp,
        key: Option<&[u8]>,
        value: Option<&[u8]>,
    ) -> StoreResult<Option<(K, V)>> {
        if !self.step(op, key, value)? {
            return Ok(None);
        }
        match &self.position {
            Some(position) => Ok(Some(self.decode(position)?)),
            None => Ok(None),
        }
    }
}

impl<K: Pack + Unpack, V: Unpack> Cursor<'_, K, V> {
    /// Reposition relative to `key` (`Set`, `SetKey`, `SetRange`).
    pub fn seek(&mut self, op: CursorOp, key: &K) -> StoreResult<Option<(K, V)>> {
        if !op.needs_key() || op.needs_value() {
            return Err(StoreError::InvalidArgument(format!("{op} is not a key seek")));
        }
        let key = self.info.codec.encode_key(&key.pack()?)?;
        self.finish_step(op, Some(&key), None)
    }
}

impl<K: Pack + Unpack, V: Pack + Unpack> Cursor<'_, K, V> {
    /// Reposition on a (key, value) target (`GetBoth`, `GetBothRange`).
    pub fn seek_both(&mut self, op: CursorOp, key: &K, value: &V) -> StoreResult<Option<(K, V)>> {
        if !op.needs_value() {
            return Err(StoreError::InvalidArgument(format!("{op} is not a pair seek")));
        }
        let key = self.info.codec.encode_key(&key.pack()?)?;
        let value = self.info.codec.encode_value(&value.pack()?)?;
        self.finish_step(op, Some(&key), Some(&value))
    }
}

impl<K, V> std::fmt::Debug for Cursor<'_, K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("table", &self.info.display_name())
            .field("positioned", &self.position.is_some())
            .finish()
    }
}

// ============================================================================
// Positioning over stored bytes
// ============================================================================

/// Values of the key a cursor last visited, together with the transaction
/// generation they were read at.
struct Cached {
    generation: u64,
    group: Group,
}

/// A view plus the group loaded for the current key.
///
/// Stepping through one key's duplicates reuses the loaded values, so each
/// step is a binary search instead of a fresh scan of the group.
struct Nav<'a> {
    view: &'a dyn TableView,
    group: &'a mut Option<Group>,
}

impl Nav<'_> {
    /// Sorted stored values of `key`.
    fn values(&mut self, key: &[u8]) -> StoreResult<&[Vec<u8>]> {
        if !self.group.as_ref().is_some_and(|g| g.key == key) {
            let values = self.view.values(key)?;
            *self.group = Some(Group {
                key: key.to_vec(),
                values,
            });
        }
        Ok(self.group.as_ref().map_or(&[][..], |g| g.values.as_slice()))
    }

    /// Keep `group` as the current one and land on its first or last value.
    fn enter(&mut self, group: Option<Group>, last: bool) -> Option<Position> {
        let group = group?;
        let value = if last {
            group.values.last()
        } else {
            group.values.first()
        };
        let value = value?.clone();
        let position = (group.key.clone(), value);
        *self.group = Some(group);
        Some(position)
    }

    fn value_after(&mut self, key: &[u8], value: &[u8]) -> StoreResult<Option<Position>> {
        let values = self.values(key)?;
        let at = values.partition_point(|x| x.as_slice() <= value);
        Ok(values.get(at).map(|x| (key.to_vec(), x.clone())))
    }

    fn value_before(&mut self, key: &[u8], value: &[u8]) -> StoreResult<Option<Position>> {
        let values = self.values(key)?;
        let at = values.partition_point(|x| x.as_slice() < value);
        Ok(at
            .checked_sub(1)
            .map(|prev| (key.to_vec(), values[prev].clone())))
    }

    fn value_at_or_after(&mut self, key: &[u8], value: &[u8]) -> StoreResult<Option<Position>> {
        let values = self.values(key)?;
        let at = values.partition_point(|x| x.as_slice() < value);
        Ok(values.get(at).map(|x| (key.to_vec(), x.clone())))
    }

    fn edge_value(&mut self, key: &[u8], last: bool) -> StoreResult<Option<Position>> {
        let values = self.values(key)?;
        let value = if last { values.last() } else { values.first() };
        Ok(value.map(|x| (key.to_vec(), x.clone())))
    }

    fn contains(&mut self, key: &[u8], value: &[u8]) -> StoreResult<bool> {
        let values = self.values(key)?;
        Ok(values.binary_search_by(|x| x.as_slice().cmp(value)).is_ok())
    }
}

/// Where `op` lands, starting from `current`, in stored byte form.
fn locate(
    nav: &mut Nav<'_>,
    op: CursorOp,
    current: Option<&Position>,
    key: Option<&[u8]>,
    value: Option<&[u8]>,
) -> StoreResult<Option<Position>> {
    let target = || {
        key.ok_or_else(|| StoreError::InvalidArgument(format!("{op} requires a target key")))
    };
    let target_value = || {
        value.ok_or_else(|| StoreError::InvalidArgument(format!("{op} requires a value")))
    };

    let found = match (op, current) {
        (CursorOp::First, _) | (CursorOp::Next | CursorOp::NextNoDup, None) => {
            let group = nav.view.group_after(None)?;
            nav.enter(group, false)
        }
        (CursorOp::Last, _) | (CursorOp::Prev | CursorOp::PrevNoDup, None) => {
            let group = nav.view.group_before(None)?;
            nav.enter(group, true)
        }

        (CursorOp::Next, Some((k, v))) => match nav.value_after(k, v)? {
            Some(next) => Some(next),
            None => {
                let group = nav.view.group_after(Some(k.as_slice()))?;
                nav.enter(group, false)
            }
        },
        (CursorOp::Prev, Some((k, v))) => match nav.value_before(k, v)? {
            Some(prev) => Some(prev),
            None => {
                let group = nav.view.group_before(Some(k.as_slice()))?;
                nav.enter(group, true)
            }
        },
        (CursorOp::NextNoDup, Some((k, _))) => {
            let group = nav.view.group_after(Some(k.as_slice()))?;
            nav.enter(group, false)
        }
        (CursorOp::PrevNoDup, Some((k, _))) => {
            let group = nav.view.group_before(Some(k.as_slice()))?;
            nav.enter(group, true)
        }

        (CursorOp::NextDup, Some((k, v))) => nav.value_after(k, v)?,
        (CursorOp::PrevDup, Some((k, v))) => nav.value_before(k, v)?,
        (CursorOp::FirstDup, Some((k, _))) => nav.edge_value(k, false)?,
        (CursorOp::LastDup, Some((k, _))) => nav.edge_value(k, true)?,
        (CursorOp::GetCurrent, Some((k, v))) => {
            nav.contains(k, v)?.then(|| (k.clone(), v.clone()))
        }
        (
            CursorOp::NextDup
            | CursorOp::PrevDup
            | CursorOp::FirstDup
            | CursorOp::LastDup
            | CursorOp::GetCurrent,
            None,
        ) => None,

        (CursorOp::Set | CursorOp::SetKey, _) => nav.edge_value(target()?, false)?,
        (CursorOp::SetRange, _) => {
            let group = nav.view.group_at_or_after(target()?)?;
            nav.enter(group, false)
        }
        (CursorOp::GetBoth, _) => {
            let (k, v) = (target()?, target_value()?);
            nav.contains(k, v)?.then(|| (k.to_vec(), v.to_vec()))
        }
        (CursorOp::GetBothRange, _) => nav.value_at_or_after(target()?, target_value()?)?,
    };
    Ok(found)
}
