//! Persistent catalog of logical tables and their flags.

use redb::{ReadableTable, ReadableTableMetadata, TableDefinition};

use super::{EngineTxn, MAIN_TABLE, WriteCore};
use crate::config::TableFlags;
use crate::errors::StoreResult;

const CATALOG: TableDefinition<&str, u32> = TableDefinition::new("__tablekv_catalog__");

/// Stored flags of a logical table, if it exists in this transaction's view.
pub(crate) fn lookup(engine: EngineTxn<'_>, engine_name: &str) -> StoreResult<Option<TableFlags>> {
    let bits = match engine {
        EngineTxn::Read(tx) => match tx.open_table(CATALOG) {
            Ok(table) => stored_bits(&table, engine_name)?,
            Err(redb::TableError::TableDoesNotExist(_)) => None,
            Err(e) => return Err(e.into()),
        },
        EngineTxn::Write(core) => stored_bits(&core.tx.open_table(CATALOG)?, engine_name)?,
    };
    Ok(bits.map(TableFlags::from_bits))
}

fn stored_bits(
    table: &impl ReadableTable<&'static str, u32>,
    engine_name: &str,
) -> StoreResult<Option<u32>> {
    Ok(table.get(engine_name)?.map(|guard| guard.value()))
}

/// Number of named (non-main) tables recorded.
pub(crate) fn named_count(core: &WriteCore) -> StoreResult<u64> {
    let table = core.tx.open_table(CATALOG)?;
    let total = table.len()?;
    let main = u64::from(table.get(MAIN_TABLE)?.is_some());
    Ok(total - main)
}

pub(crate) fn record(core: &WriteCore, engine_name: &str, flags: TableFlags) -> StoreResult<()> {
    let mut table = core.tx.open_table(CATALOG)?;
    table.insert(engine_name, flags.persistent().bits())?;
    Ok(())
}

pub(crate) fn forget(core: &WriteCore, engine_name: &str) -> StoreResult<()> {
    let mut table = core.tx.open_table(CATALOG)?;
    table.remove(engine_name)?;
    Ok(())
}
