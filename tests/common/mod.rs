// Common test utilities and helpers
#![allow(dead_code)]

use tablekv::prelude::*;
use tempfile::TempDir;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Open a fresh environment in a temporary directory.
///
/// The directory is removed when the returned `TempDir` drops, so keep it
/// alive for the duration of the test.
pub fn open_env() -> StoreResult<(Environment, TempDir)> {
    open_env_with(|_| {})
}

/// Like [`open_env`], with a chance to adjust the configuration first.
pub fn open_env_with(
    configure: impl FnOnce(&mut EnvConfig),
) -> StoreResult<(Environment, TempDir)> {
    init_logging();
    let dir = TempDir::new()?;
    let mut config = EnvConfig::new(dir.path().join("env"));
    configure(&mut config);
    let env = Environment::open(config)?;
    Ok((env, dir))
}

/// Create (and commit) a named table with `Create` plus `flags`.
pub fn create_table(env: &Environment, name: &str, flags: &[TableFlag]) -> StoreResult<Table> {
    let txn = env.begin_write()?;
    let table = {
        let mut db = txn.db();
        db.set(TableFlag::Create);
        for flag in flags {
            db.set(*flag);
        }
        db.open(name)?
    };
    txn.commit()?;
    Ok(table)
}

/// Write `pairs` into `table` in one committed transaction.
pub fn fill(env: &Environment, table: Table, pairs: &[(u32, &str)]) -> StoreResult<()> {
    let txn = env.begin_write()?;
    for (key, value) in pairs {
        txn.put(table, key, *value, PutFlags::empty())?;
    }
    txn.commit()
}

/// Integer-keyed table holding `pairs`.
pub fn int_table(env: &Environment, name: &str, pairs: &[(u32, &str)]) -> StoreResult<Table> {
    let table = create_table(env, name, &[TableFlag::IntegerKey])?;
    fill(env, table, pairs)?;
    Ok(table)
}
