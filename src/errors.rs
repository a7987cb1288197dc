use std::io;

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Coarse classification of every [`StoreError`].
///
/// Callers that only care about "what went wrong" rather than the exact
/// engine condition should match on this instead of the error itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ErrorKind {
    /// A handle (environment, transaction, table, cursor) could not be created.
    Resource,
    /// A required key or table is missing.
    NotFound,
    /// The map or the transaction's write budget is exhausted.
    Full,
    /// The key already exists and overwriting was not allowed.
    Conflict,
    Io,
    OutOfMemory,
    /// A handle was used after its owner ended.
    InvalidHandle,
    /// A merge iterator was dereferenced without a selection.
    InvalidPosition,
    /// The environment is corrupt or was written by an incompatible version.
    Corruption,
    /// Anything the engine reports that has no more specific kind.
    Storage,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Resource Error: failed to open {resource}: {reason}")]
    Resource {
        resource: &'static str,
        reason: String,
    },

    #[error("Key Not Found")]
    NotFound,

    #[error("Table Not Found: {0}")]
    TableNotFound(String),

    #[error("Map Full: data file is {size} bytes, limit is {limit}")]
    MapFull { size: u64, limit: u64 },

    #[error("Transaction Full: {written} bytes written, budget is {budget}")]
    TxnFull { written: u64, budget: u64 },

    #[error("Tables Full: environment allows {0} named tables")]
    TablesFull(u32),

    #[error("Readers Full: environment allows {0} concurrent readers")]
    ReadersFull(u32),

    #[error("Key Exists")]
    KeyExists,

    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid Handle: {0}")]
    InvalidHandle(&'static str),

    #[error("Invalid Position: iterator has no current entry")]
    InvalidPosition,

    #[error("Incompatible Table: {0}")]
    Incompatible(String),

    #[error("Bad Value Size: expected {expected}, found {found}")]
    BadValueSize { expected: String, found: usize },

    #[error("Invalid Argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("Encoding Error: {0}")]
    Encoding(String),

    #[error("Read Only: {0}")]
    ReadOnly(&'static str),

    #[error("Corrupted Environment: {0}")]
    Corrupted(String),

    #[error("Version Mismatch: {0}")]
    VersionMismatch(String),

    #[error("Commit Failed: {0}")]
    CommitFailed(String),

    #[error("Storage Error: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Resource { .. }
            | StoreError::TablesFull(_)
            | StoreError::ReadersFull(_) => ErrorKind::Resource,
            StoreError::NotFound | StoreError::TableNotFound(_) => ErrorKind::NotFound,
            StoreError::MapFull { .. } | StoreError::TxnFull { .. } => ErrorKind::Full,
            StoreError::KeyExists => ErrorKind::Conflict,
            StoreError::Io(e) if e.kind() == io::ErrorKind::OutOfMemory => ErrorKind::OutOfMemory,
            StoreError::Io(_) => ErrorKind::Io,
            StoreError::InvalidHandle(_) => ErrorKind::InvalidHandle,
            StoreError::InvalidPosition => ErrorKind::InvalidPosition,
            StoreError::Corrupted(_) | StoreError::VersionMismatch(_) => ErrorKind::Corruption,
            StoreError::Incompatible(_)
            | StoreError::BadValueSize { .. }
            | StoreError::InvalidArgument(_)
            | StoreError::InvalidUtf8(_)
            | StoreError::Encoding(_)
            | StoreError::ReadOnly(_)
            | StoreError::CommitFailed(_)
            | StoreError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn bad_size(expected: impl Into<String>, found: usize) -> Self {
        StoreError::BadValueSize {
            expected: expected.into(),
            found,
        }
    }
}

// ============================================================================
// Engine error translation
// ============================================================================

impl From<redb::StorageError> for StoreError {
    fn from(err: redb::StorageError) -> Self {
        match err {
            redb::StorageError::Corrupted(msg) => StoreError::Corrupted(msg),
            redb::StorageError::ValueTooLarge(len) => StoreError::MapFull {
                size: len as u64,
                limit: u32::MAX as u64,
            },
            redb::StorageError::Io(e) => StoreError::Io(e),
            other => StoreError::Storage(other.to_string()),
        }
    }
}

impl From<redb::DatabaseError> for StoreError {
    fn from(err: redb::DatabaseError) -> Self {
        match err {
            redb::DatabaseError::DatabaseAlreadyOpen => StoreError::Resource {
                resource: "environment",
                reason: "environment is locked".to_string(),
            },
            redb::DatabaseError::UpgradeRequired(version) => {
                StoreError::VersionMismatch(format!("file format version {version}"))
            }
            redb::DatabaseError::Storage(e) => e.into(),
            other => StoreError::Storage(other.to_string()),
        }
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(err: redb::TransactionError) -> Self {
        match err {
            redb::TransactionError::Storage(e) => e.into(),
            other => StoreError::Resource {
                resource: "transaction",
                reason: other.to_string(),
            },
        }
    }
}

impl From<redb::TableError> for StoreError {
    fn from(err: redb::TableError) -> Self {
        match err {
            redb::TableError::TableDoesNotExist(name) => StoreError::TableNotFound(name),
            redb::TableError::Storage(e) => e.into(),
            e @ (redb::TableError::TableTypeMismatch { .. }
            | redb::TableError::TableIsMultimap(_)
            | redb::TableError::TableIsNotMultimap(_)) => StoreError::Incompatible(e.to_string()),
            other => StoreError::Storage(other.to_string()),
        }
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(err: redb::CommitError) -> Self {
        match err {
            redb::CommitError::Storage(e) => e.into(),
            other => StoreError::CommitFailed(other.to_string()),
        }
    }
}

impl From<redb::SetDurabilityError> for StoreError {
    fn from(err: redb::SetDurabilityError) -> Self {
        StoreError::Resource {
            resource: "transaction",
            reason: err.to_string(),
        }
    }
}
