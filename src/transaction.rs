//! Transactions with a type-state for read-only vs read-write access.
//!
//! `Txn<'p, Mode>` tracks its mode through a phantom type, so write
//! operations only exist on [`WriteTxn`]:
//! - `ReadTxn`: a consistent snapshot; any number may be open at once.
//!   Root read transactions can be [`reset`](ReadTxn::reset) and
//!   [`renew`](ReadTxn::renew)ed to take a fresh snapshot without giving up
//!   their reader slot.
//! - `WriteTxn`: the environment's single writer. Dropping it without
//!   [`commit`](Txn::commit) aborts.
//!
//! Nested transactions borrow their parent (`'p`). A nested writer shares the
//! parent's engine transaction and keeps an undo journal, so its abort
//! discards only its own changes:
//!
//! ```no_run
//! # use tablekv::prelude::*;
//! # fn main() -> StoreResult<()> {
//! # let env = Environment::open(EnvConfig::new("./db"))?;
//! let mut txn = env.begin_write()?;
//! let table = txn.db().set(TableFlag::Create).open("users")?;
//! txn.put(table, "alice", &1u32, PutFlags::empty())?;
//!
//! let child = txn.nested_write()?;
//! child.put(table, "bob", &2u32, PutFlags::empty())?;
//! child.abort()?; // "bob" is gone, "alice" stays
//!
//! txn.commit()?;
//! # Ok(())
//! # }
//! ```
//!
//! Cursors, merge iterators and table factories borrow the transaction they
//! came from, and `commit`/`abort` consume it, so a handle can never outlive
//! its transaction.

use std::marker::PhantomData;

use log::{debug, warn};

use crate::codec::{Pack, Unpack};
use crate::config::PutFlags;
use crate::cursor::Cursor;
use crate::engine::write::{Journal, Writer};
use crate::engine::{EngineTxn, WriteCore};
use crate::env::{Environment, ReaderSlot};
use crate::errors::{StoreError, StoreResult};
use crate::merge::MergeIter;
use crate::table::{Table, TableFactory};

/// Marker type for read-only transactions.
#[derive(Debug)]
pub struct ReadOnly;

/// Marker type for read-write transactions.
#[derive(Debug)]
pub struct ReadWrite;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::ReadOnly {}
    impl Sealed for super::ReadWrite {}
}

/// Transaction mode marker.
pub trait TxnMode: sealed::Sealed {
    const READ_ONLY: bool;
}

impl TxnMode for ReadOnly {
    const READ_ONLY: bool = true;
}

impl TxnMode for ReadWrite {
    const READ_ONLY: bool = false;
}

pub type ReadTxn<'p> = Txn<'p, ReadOnly>;
pub type WriteTxn<'p> = Txn<'p, ReadWrite>;

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum TxnState {
    Active,
    /// Root read transaction whose snapshot was released by `reset`.
    Reset,
    Committed,
    Aborted,
}

enum Backend<'p> {
    /// Root reader; `None` while reset.
    Snapshot(Option<redb::ReadTransaction>),
    /// Root writer; `None` once finished.
    Writer(Option<WriteCore>),
    /// Child of another transaction.
    Nested(EngineTxn<'p>),
}

pub struct Txn<'p, M: TxnMode> {
    env: Environment,
    backend: Backend<'p>,
    state: TxnState,
    /// Undo journal of a nested writer.
    journal: Option<Journal>,
    parent_journal: Option<&'p Journal>,
    _slot: Option<ReaderSlot>,
    _mode: PhantomData<M>,
}

/// What a table operation needs from its transaction.
pub(crate) struct Access<'t> {
    pub(crate) env: &'t Environment,
    pub(crate) engine: EngineTxn<'t>,
    /// Present only for read-write transactions.
    pub(crate) writer: Option<Writer<'t>>,
}

pub(crate) trait Accessor {
    fn access(&self) -> StoreResult<Access<'_>>;
}

impl<M: TxnMode> Accessor for Txn<'_, M> {
    fn access(&self) -> StoreResult<Access<'_>> {
        Txn::access(self)
    }
}

impl ReadTxn<'static> {
    pub(crate) fn root_read(env: Environment, tx: redb::ReadTransaction, slot: ReaderSlot) -> Self {
        Txn {
            env,
            backend: Backend::Snapshot(Some(tx)),
            state: TxnState::Active,
            journal: None,
            parent_journal: None,
            _slot: Some(slot),
            _mode: PhantomData,
        }
    }
}

impl WriteTxn<'static> {
    pub(crate) fn root_write(env: Environment, core: WriteCore) -> Self {
        Txn {
            env,
            backend: Backend::Writer(Some(core)),
            state: TxnState::Active,
            journal: None,
            parent_journal: None,
            _slot: None,
            _mode: PhantomData,
        }
    }
}

impl<'p, M: TxnMode> Txn<'p, M> {
    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn state(&self) -> TxnState {
        self.state
    }

    pub fn is_nested(&self) -> bool {
        matches!(self.backend, Backend::Nested(_))
    }

    pub(crate) fn access(&self) -> StoreResult<Access<'_>> {
        let engine = match &self.backend {
            Backend::Snapshot(Some(tx)) => EngineTxn::Read(tx),
            Backend::Snapshot(None) => {
                return Err(StoreError::InvalidHandle("read transaction has been reset"));
            }
            Backend::Writer(Some(core)) => EngineTxn::Write(core),
            Backend::Writer(None) => return Err(StoreError::InvalidHandle("transaction has ended")),
            Backend::Nested(engine) => *engine,
        };
        let writer = if M::READ_ONLY {
            None
        } else {
            engine.write_core().map(|core| Writer {
                core,
                journal: self.journal.as_ref(),
            })
        };
        Ok(Access {
            env: &self.env,
            engine,
            writer,
        })
    }

    /// Factory for opening and creating tables in this transaction.
    pub fn db(&self) -> TableFactory<'_> {
        TableFactory::new(self)
    }

    pub fn get<K, V>(&self, table: Table, key: &K) -> StoreResult<V>
    where
        K: Pack + ?Sized,
        V: Unpack,
    {
        table.get(self, key)
    }

    pub fn get_or<K, V>(&self, table: Table, key: &K, default: V) -> StoreResult<V>
    where
        K: Pack + ?Sized,
        V: Unpack,
    {
        table.get_or(self, key, default)
    }

    pub fn open_cursor<K, V>(&self, table: Table) -> StoreResult<Cursor<'_, K, V>> {
        table.open_cursor(self)
    }

    /// Merge iterator over `tables`, in the order given.
    pub fn merge_iter<K, V>(&self, tables: &[Table]) -> StoreResult<MergeIter<'_, K, V>>
    where
        K: Pack + Unpack + Ord,
        V: Pack + Unpack,
    {
        MergeIter::new(self, tables)
    }

    fn child<N: TxnMode>(&self, journal: Option<Journal>) -> StoreResult<Txn<'_, N>> {
        let engine = self.access()?.engine;
        Ok(Txn {
            env: self.env.clone(),
            backend: Backend::Nested(engine),
            state: TxnState::Active,
            journal,
            parent_journal: self.journal.as_ref(),
            _slot: None,
            _mode: PhantomData,
        })
    }

    /// Commit this transaction. A nested writer hands its changes to its
    /// parent; they become durable when the root commits.
    pub fn commit(mut self) -> StoreResult<()> {
        self.finish(true)
    }

    /// Discard every change made in this transaction and its children.
    pub fn abort(mut self) -> StoreResult<()> {
        self.finish(false)
    }

    fn finish(&mut self, commit: bool) -> StoreResult<()> {
        if matches!(self.state, TxnState::Committed | TxnState::Aborted) {
            return Ok(());
        }
        self.state = if commit {
            TxnState::Committed
        } else {
            TxnState::Aborted
        };
        let outcome = if commit { "committed" } else { "aborted" };

        match &mut self.backend {
            Backend::Snapshot(tx) => {
                tx.take();
                self._slot.take();
                debug!("read transaction {outcome}");
            }
            Backend::Writer(core) => {
                let Some(core) = core.take() else {
                    return Ok(());
                };
                let tx = core.into_inner();
                if commit {
                    tx.commit()?;
                } else {
                    tx.abort()?;
                }
                debug!("write transaction {outcome}");
            }
            Backend::Nested(engine) => {
                match (commit, engine.write_core(), self.journal.take()) {
                    (true, Some(_), Some(journal)) => {
                        if let Some(parent) = self.parent_journal {
                            journal.merge_into(parent);
                        }
                    }
                    (false, Some(core), Some(journal)) => journal.roll_back(core)?,
                    _ => {}
                }
                debug!("nested transaction {outcome}");
            }
        }
        Ok(())
    }
}

impl<'p> ReadTxn<'p> {
    /// Nested read-only transaction over the same snapshot.
    pub fn nested_read(&self) -> StoreResult<ReadTxn<'_>> {
        let txn = self.child(None)?;
        debug!("begin nested read transaction");
        Ok(txn)
    }

    /// Release the snapshot while keeping the reader slot.
    pub fn reset(&mut self) -> StoreResult<()> {
        match (&mut self.backend, self.state) {
            (Backend::Snapshot(tx), TxnState::Active) => {
                tx.take();
                self.state = TxnState::Reset;
                debug!("read transaction reset");
                Ok(())
            }
            (Backend::Snapshot(_), _) => {
                Err(StoreError::InvalidHandle("read transaction is not active"))
            }
            _ => Err(StoreError::InvalidHandle("only root read transactions can be reset")),
        }
    }

    /// Take a fresh snapshot after [`reset`](Self::reset).
    pub fn renew(&mut self) -> StoreResult<()> {
        if self.state != TxnState::Reset {
            return Err(StoreError::InvalidHandle("renew requires a reset read transaction"));
        }
        let Backend::Snapshot(tx) = &mut self.backend else {
            return Err(StoreError::InvalidHandle("only root read transactions can be renewed"));
        };
        *tx = Some(self.env.snapshot()?);
        self.state = TxnState::Active;
        debug!("read transaction renewed");
        Ok(())
    }
}

impl<'p> WriteTxn<'p> {
    /// Read-only child that sees this transaction's uncommitted writes.
    pub fn nested_read(&mut self) -> StoreResult<ReadTxn<'_>> {
        let txn = self.child(None)?;
        debug!("begin nested read transaction");
        Ok(txn)
    }

    /// Child writer whose changes can be aborted independently.
    pub fn nested_write(&mut self) -> StoreResult<WriteTxn<'_>> {
        let txn = self.child(Some(Journal::default()))?;
        debug!("begin nested write transaction");
        Ok(txn)
    }

    pub fn put<K, V>(&self, table: Table, key: &K, value: &V, flags: PutFlags) -> StoreResult<()>
    where
        K: Pack + ?Sized,
        V: Pack + ?Sized,
    {
        table.put(self, key, value, flags)
    }

    pub fn delete<K>(&self, table: Table, key: &K) -> StoreResult<bool>
    where
        K: Pack + ?Sized,
    {
        table.delete(self, key)
    }

    pub fn delete_pair<K, V>(&self, table: Table, key: &K, value: &V) -> StoreResult<bool>
    where
        K: Pack + ?Sized,
        V: Pack + ?Sized,
    {
        table.delete_pair(self, key, value)
    }
}

impl<M: TxnMode> Drop for Txn<'_, M> {
    fn drop(&mut self) {
        if matches!(self.state, TxnState::Active | TxnState::Reset) {
            if let Err(e) = self.finish(false) {
                warn!("implicit abort failed: {e}");
            }
        }
    }
}

impl<M: TxnMode> std::fmt::Debug for Txn<'_, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Txn")
            .field("read_only", &M::READ_ONLY)
            .field("nested", &self.is_nested())
            .field("state", &self.state)
            .finish()
    }
}
