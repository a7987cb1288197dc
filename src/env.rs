//! Shared handle to one open engine instance.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, warn};
use redb::ReadableDatabase;

use crate::config::{EnvConfig, EnvConfigBuilder};
use crate::engine::{TableInfo, WriteCore};
use crate::errors::{StoreError, StoreResult};
use crate::table::Table;
use crate::transaction::{ReadTxn, Txn, WriteTxn};

/// An open environment.
///
/// Cloning is cheap and shares the same engine instance; the engine is
/// closed when the last clone (and every transaction holding one) is
/// dropped. `Environment` is `Send + Sync`; transactions are not shared
/// across threads.
#[derive(Clone)]
pub struct Environment {
    inner: Arc<EnvInner>,
}

struct EnvInner {
    db: redb::Database,
    config: EnvConfig,
    /// Table handles resolved so far; a [`Table`] is an index into this list.
    tables: RwLock<Vec<Arc<TableInfo>>>,
    readers: AtomicU32,
}

impl Drop for EnvInner {
    fn drop(&mut self) {
        debug!("closing environment at {}", self.config.path.display());
    }
}

impl Environment {
    /// Start building an [`EnvConfig`]; finish with [`Environment::open`].
    pub fn builder() -> EnvConfigBuilder<((), (), (), (), (), (), (), ())> {
        EnvConfig::builder()
    }

    /// Open (or create, unless read-only) the environment described by `config`.
    pub fn open(config: EnvConfig) -> StoreResult<Self> {
        let file = config.data_file();
        if !config.flags.no_sub_dir && !config.flags.read_only {
            fs::create_dir_all(&config.path)?;
        }
        let existed = file.exists();

        let mut builder = redb::Builder::new();
        if let Some(bytes) = config.cache_size {
            builder.set_cache_size(bytes);
        }
        let db = if config.flags.read_only || existed {
            if !existed {
                return Err(StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no environment at {}", file.display()),
                )));
            }
            builder.open(&file)?
        } else {
            builder.create(&file)?
        };
        if !existed {
            apply_mode(&file, config.mode)?;
        }

        debug!(
            "opened environment at {} (read_only={}, no_sync={})",
            file.display(),
            config.flags.read_only,
            config.flags.no_sync
        );

        Ok(Self {
            inner: Arc::new(EnvInner {
                db,
                config,
                tables: RwLock::new(Vec::new()),
                readers: AtomicU32::new(0),
            }),
        })
    }

    pub fn config(&self) -> &EnvConfig {
        &self.inner.config
    }

    /// Begin a read-only transaction on a fresh snapshot.
    pub fn begin_read(&self) -> StoreResult<ReadTxn<'static>> {
        let slot = ReaderSlot::acquire(self)?;
        let tx = self.snapshot()?;
        debug!("begin read transaction");
        Ok(Txn::root_read(self.clone(), tx, slot))
    }

    /// Begin the environment's write transaction, blocking while another
    /// writer is active.
    pub fn begin_write(&self) -> StoreResult<WriteTxn<'static>> {
        let config = &self.inner.config;
        if config.flags.read_only {
            return Err(StoreError::ReadOnly("environment was opened read-only"));
        }
        let mut tx = self.inner.db.begin_write()?;
        if config.flags.no_sync {
            tx.set_durability(redb::Durability::None)?;
        }
        let map_limit = config.map_size.map(|limit| (config.data_file(), limit));
        debug!("begin write transaction");
        Ok(Txn::root_write(
            self.clone(),
            WriteCore::new(tx, config.txn_write_budget, map_limit),
        ))
    }

    pub(crate) fn snapshot(&self) -> StoreResult<redb::ReadTransaction> {
        Ok(self.inner.db.begin_read()?)
    }

    /// Number of root read transactions currently holding a reader slot.
    pub fn active_readers(&self) -> u32 {
        self.inner.readers.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------------
    // Table handle registry
    // ------------------------------------------------------------------------

    /// Register (or refresh) the handle for a resolved table.
    pub(crate) fn register_table(&self, info: TableInfo) -> Table {
        let mut tables = self
            .inner
            .tables
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = tables.iter().position(|t| t.engine_name == info.engine_name) {
            if *tables[id] != info {
                tables[id] = Arc::new(info);
            }
            return Table::from_id(id as u32);
        }
        tables.push(Arc::new(info));
        Table::from_id((tables.len() - 1) as u32)
    }

    pub(crate) fn table_info(&self, table: Table) -> StoreResult<Arc<TableInfo>> {
        let tables = self
            .inner
            .tables
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        tables
            .get(table.id() as usize)
            .cloned()
            .ok_or(StoreError::InvalidHandle("table handle is not known to this environment"))
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("path", &self.inner.config.path)
            .field("readers", &self.active_readers())
            .finish()
    }
}

#[cfg(unix)]
fn apply_mode(file: &Path, mode: u32) -> StoreResult<()> {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(file, fs::Permissions::from_mode(mode)) {
        warn!("could not set mode {mode:o} on {}: {e}", file.display());
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_mode(_file: &Path, _mode: u32) -> StoreResult<()> {
    Ok(())
}

/// One of the environment's `max_readers` slots, held by a root read
/// transaction from begin to end (including while it is reset).
pub(crate) struct ReaderSlot {
    env: Environment,
}

impl ReaderSlot {
    fn acquire(env: &Environment) -> StoreResult<Self> {
        let max = env.inner.config.max_readers;
        env.inner
            .readers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
            .map_err(|_| StoreError::ReadersFull(max))?;
        Ok(Self { env: env.clone() })
    }
}

impl Drop for ReaderSlot {
    fn drop(&mut self) {
        self.env.inner.readers.fetch_sub(1, Ordering::AcqRel);
    }
}
