//! # tablekv
//!
//! Typed, resource-safe access to named ordered tables in an embedded
//! transactional key-value store, with a k-way merge iterator over several
//! tables at once.
//!
//! ## Features
//!
//! - **Environments**: one shared, reference-counted handle per data file
//! - **Transactions**: read snapshots, a single writer, nested children with
//!   independent abort, and reusable (reset/renew) readers
//! - **Tables**: named or main, with duplicate keys, reverse and integer
//!   orderings
//! - **Cursors**: the full positioning vocabulary, typed through [`codec`]
//! - **Merge iterator**: one ordered pass over many tables, reporting which
//!   table each entry came from
//!
//! ## Quick Start
//!
//! ```no_run
//! use tablekv::prelude::*;
//!
//! # fn main() -> StoreResult<()> {
//! let env = Environment::open(EnvConfig::new("./my-env"))?;
//!
//! // Write data
//! let txn = env.begin_write()?;
//! let users = txn.db().set(TableFlag::Create).open("users")?;
//! txn.put(users, "alice", &30u32, PutFlags::empty())?;
//! txn.commit()?;
//!
//! // Read data
//! let txn = env.begin_read()?;
//! let age: u32 = txn.get(users, "alice")?;
//! assert_eq!(age, 30);
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod cursor;
pub mod engine;
pub mod env;
pub mod errors;
pub mod merge;
pub mod prelude;
pub mod table;
pub mod transaction;

pub use cursor::{Cursor, CursorOp};
pub use engine::keys::MAX_KEY_SIZE;
pub use env::Environment;
pub use errors::{ErrorKind, StoreError, StoreResult};
pub use merge::{MergeIter, MergedEntry};
pub use table::{Table, TableFactory};
pub use transaction::{ReadOnly, ReadTxn, ReadWrite, Txn, TxnMode, TxnState, WriteTxn};
