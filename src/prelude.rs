//! Prelude module for convenient imports.
//!
//! ```rust
//! use tablekv::prelude::*;
//! ```
//!
//! Brings in the environment and transaction types, table and cursor
//! handles, the merge iterator, configuration and flag types, the codec
//! traits, and the crate's error types.

pub use crate::codec::{Bincode, Pack, Plain, Unpack};
pub use crate::config::{EnvConfig, EnvFlags, PutFlags, TableFlag, TableFlags};
pub use crate::cursor::{Cursor, CursorOp};
pub use crate::engine::keys::MAX_KEY_SIZE;
pub use crate::env::Environment;
pub use crate::errors::{ErrorKind, StoreError, StoreResult};
pub use crate::merge::{MergeIter, MergedEntry};
pub use crate::table::{Table, TableFactory};
pub use crate::transaction::{ReadTxn, TxnState, WriteTxn};
