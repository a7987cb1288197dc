//! Tables: named ordered collections inside an environment.

use std::sync::Arc;

use log::debug;

use crate::codec::{Pack, Unpack};
use crate::config::{PutFlags, TableFlag, TableFlags};
use crate::cursor::Cursor;
use crate::engine::view::with_view;
use crate::engine::write::Writer;
use crate::engine::{TableInfo, catalog, engine_name};
use crate::errors::{StoreError, StoreResult};
use crate::transaction::{Access, Accessor, Txn, TxnMode, WriteTxn};

/// Handle to a table, resolved through [`TableFactory`].
///
/// A `Table` is a plain index into its environment's handle registry. It is
/// `Copy`, stays valid for as long as the environment is open, and is only
/// meaningful inside transactions of the environment that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Table {
    id: u32,
}

impl Table {
    pub(crate) fn from_id(id: u32) -> Self {
        Self { id }
    }

    pub fn id(self) -> u32 {
        self.id
    }

    /// Registry entry for this handle, if the table is present in the
    /// transaction's view with the flags it was opened with.
    fn live(self, access: &Access<'_>) -> StoreResult<Option<Arc<TableInfo>>> {
        let info = access.env.table_info(self)?;
        match catalog::lookup(access.engine, &info.engine_name)? {
            Some(flags) if flags == info.flags => Ok(Some(info)),
            Some(_) => Ok(None),
            // The main table always exists, recorded or not.
            None if info.name.is_none() => Ok(Some(info)),
            None => Ok(None),
        }
    }

    fn lookup<K, V, M>(self, txn: &Txn<'_, M>, key: &K) -> StoreResult<Option<V>>
    where
        K: Pack + ?Sized,
        V: Unpack,
        M: TxnMode,
    {
        let access = txn.access()?;
        let info = self.live(&access)?.ok_or_else(|| self.missing())?;
        let key = info.codec.encode_key(&key.pack()?)?;
        let values = with_view(access.engine, &info, |view| view.values(&key))?;
        match values.first() {
            Some(stored) => Ok(Some(V::unpack(&info.codec.decode_value(stored)?)?)),
            None => Ok(None),
        }
    }

    fn missing(self) -> StoreError {
        StoreError::TableNotFound(format!("table handle {} in this transaction", self.id))
    }

    /// Value stored under `key`; the first duplicate for duplicate-key tables.
    pub fn get<K, V, M>(self, txn: &Txn<'_, M>, key: &K) -> StoreResult<V>
    where
        K: Pack + ?Sized,
        V: Unpack,
        M: TxnMode,
    {
        self.lookup(txn, key)?.ok_or(StoreError::NotFound)
    }

    pub fn get_or<K, V, M>(self, txn: &Txn<'_, M>, key: &K, default: V) -> StoreResult<V>
    where
        K: Pack + ?Sized,
        V: Unpack,
        M: TxnMode,
    {
        Ok(self.lookup(txn, key)?.unwrap_or(default))
    }

    pub fn put<K, V>(
        self,
        txn: &WriteTxn<'_>,
        key: &K,
        value: &V,
        flags: PutFlags,
    ) -> StoreResult<()>
    where
        K: Pack + ?Sized,
        V: Pack + ?Sized,
    {
        let access = txn.access()?;
        let (info, writer) = self.writable(&access)?;
        let key = info.codec.encode_key(&key.pack()?)?;
        let value = info.codec.encode_value(&value.pack()?)?;
        writer.put(&info, &key, &value, flags)
    }

    /// Remove `key` with all of its values. Returns whether it existed.
    pub fn delete<K>(self, txn: &WriteTxn<'_>, key: &K) -> StoreResult<bool>
    where
        K: Pack + ?Sized,
    {
        let access = txn.access()?;
        let (info, writer) = self.writable(&access)?;
        let key = info.codec.encode_key(&key.pack()?)?;
        writer.delete(&info, &key)
    }

    /// Remove the single pair (`key`, `value`). Returns whether it existed.
    pub fn delete_pair<K, V>(self, txn: &WriteTxn<'_>, key: &K, value: &V) -> StoreResult<bool>
    where
        K: Pack + ?Sized,
        V: Pack + ?Sized,
    {
        let access = txn.access()?;
        let (info, writer) = self.writable(&access)?;
        let key = info.codec.encode_key(&key.pack()?)?;
        let value = info.codec.encode_value(&value.pack()?)?;
        writer.delete_pair(&info, &key, &value)
    }

    fn writable<'a>(
        self,
        access: &'a Access<'_>,
    ) -> StoreResult<(Arc<TableInfo>, &'a Writer<'a>)> {
        let writer = access
            .writer
            .as_ref()
            .ok_or(StoreError::ReadOnly("transaction is read-only"))?;
        let info = self
            .live(access)?
            .ok_or(StoreError::InvalidHandle("table is not present in this transaction"))?;
        Ok((info, writer))
    }

    /// Open a cursor on this table, unpositioned.
    pub fn open_cursor<'t, K, V, M>(self, txn: &'t Txn<'_, M>) -> StoreResult<Cursor<'t, K, V>>
    where
        M: TxnMode,
    {
        let resource = |reason: String| StoreError::Resource {
            resource: "cursor",
            reason,
        };
        let access = txn.access().map_err(|e| resource(e.to_string()))?;
        let info = self
            .live(&access)
            .map_err(|e| resource(e.to_string()))?
            .ok_or_else(|| {
                resource(format!(
                    "table handle {} is not present in this transaction",
                    self.id
                ))
            })?;
        Ok(Cursor::new(access.engine, info))
    }
}

// ============================================================================
// Table factory
// ============================================================================

/// Opens or creates tables within one transaction.
///
/// Obtained from [`Txn::db`]. Flags accumulate across calls and apply to every
/// subsequent `open`:
///
/// ```no_run
/// # use tablekv::prelude::*;
/// # fn main() -> StoreResult<()> {
/// # let env = Environment::open(EnvConfig::new("./db"))?;
/// let txn = env.begin_write()?;
/// let index = txn
///     .db()
///     .set(TableFlag::Create)
///     .set(TableFlag::DupSort)
///     .open("by_email")?;
/// # Ok(())
/// # }
/// ```
pub struct TableFactory<'t> {
    txn: &'t dyn Accessor,
    flags: TableFlags,
}

impl<'t> TableFactory<'t> {
    pub(crate) fn new(txn: &'t dyn Accessor) -> Self {
        Self {
            txn,
            flags: TableFlags::empty(),
        }
    }

    pub fn set(&mut self, flag: TableFlag) -> &mut Self {
        self.flags.set(flag);
        self
    }

    pub fn unset(&mut self, flag: TableFlag) -> &mut Self {
        self.flags.unset(flag);
        self
    }

    pub fn unset_flags(&mut self) -> &mut Self {
        self.flags.clear();
        self
    }

    pub fn flags(&self) -> TableFlags {
        self.flags
    }

    pub fn open(&self, name: &str) -> StoreResult<Table> {
        self.resolve(Some(name))
    }

    /// The environment's unnamed main table.
    pub fn open_main(&self) -> StoreResult<Table> {
        self.resolve(None)
    }

    fn resolve(&self, name: Option<&str>) -> StoreResult<Table> {
        let access = self.txn.access()?;
        let requested = self.flags.persistent();
        let engine_name = engine_name(name);

        let info = match catalog::lookup(access.engine, &engine_name)? {
            Some(stored) => {
                if !requested.is_empty() && requested != stored {
                    return Err(StoreError::Incompatible(format!(
                        "{} was created with {stored}, opened with {requested}",
                        name.unwrap_or("main table")
                    )));
                }
                TableInfo::new(name, stored)
            }
            None => {
                let info = TableInfo::new(name, requested);
                match (&access.writer, name) {
                    (Some(writer), None) => writer.create_table(&info)?,
                    (None, None) => {}
                    (_, Some(name)) if !self.flags.contains(TableFlag::Create) => {
                        return Err(StoreError::TableNotFound(name.to_string()));
                    }
                    (None, Some(_)) => {
                        return Err(StoreError::ReadOnly(
                            "cannot create a table in a read-only transaction",
                        ));
                    }
                    (Some(writer), Some(_)) => {
                        let max = access.env.config().max_tables;
                        if catalog::named_count(writer.core)? >= u64::from(max) {
                            return Err(StoreError::TablesFull(max));
                        }
                        writer.create_table(&info)?;
                        debug!("created table {} {}", info.display_name(), info.flags);
                    }
                }
                info
            }
        };

        debug!("opened table {} {}", info.display_name(), info.flags);
        Ok(access.env.register_table(info))
    }
}
