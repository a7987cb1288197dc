//! Environment, table and put configuration.
//!
//! Environment options use the builder pattern via `typed-builder`; table
//! and put flags are small bit sets mirroring the engine's flag words.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};
use typed_builder::TypedBuilder;

/// Name of the data file inside an environment directory.
pub const DATA_FILE_NAME: &str = "data.redb";

/// Configuration for opening an [`Environment`](crate::env::Environment).
///
/// # Examples
///
/// ```
/// use tablekv::config::{EnvConfig, EnvFlags};
///
/// let config = EnvConfig::builder()
///     .path("/tmp/my_env")
///     .max_tables(16)
///     .map_size(Some(64 * 1024 * 1024))
///     .flags(EnvFlags::builder().no_sync(true).build())
///     .build();
/// assert_eq!(config.max_readers, 126);
/// ```
#[derive(Debug, Clone, TypedBuilder, Serialize, Deserialize)]
#[builder(doc)]
pub struct EnvConfig {
    /// Environment directory, or the data file itself with `no_sub_dir`
    #[builder(setter(into))]
    pub path: PathBuf,

    /// Upper bound on the data file size in bytes
    #[builder(default = None)]
    pub map_size: Option<u64>,

    /// Maximum number of concurrently active root read transactions
    #[builder(default = 126)]
    pub max_readers: u32,

    /// Maximum number of named tables in the catalog
    #[builder(default = 128)]
    pub max_tables: u32,

    /// Page cache size handed to the engine
    #[builder(default = None)]
    pub cache_size: Option<usize>,

    /// Bytes of keys and values a single write transaction may write
    #[builder(default = None)]
    pub txn_write_budget: Option<u64>,

    /// Unix permission bits for a newly created data file
    #[builder(default = 0o644)]
    pub mode: u32,

    #[builder(default)]
    #[serde(default)]
    pub flags: EnvFlags,
}

impl EnvConfig {
    /// Create a configuration with defaults for everything but the path
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self::builder().path(path).build()
    }

    /// Location of the engine's data file
    pub fn data_file(&self) -> PathBuf {
        if self.flags.no_sub_dir {
            self.path.clone()
        } else {
            self.path.join(DATA_FILE_NAME)
        }
    }

    pub fn dir(&self) -> &Path {
        &self.path
    }
}

/// Environment-wide switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, TypedBuilder, Serialize, Deserialize)]
#[builder(doc)]
pub struct EnvFlags {
    /// `path` names the data file, not a directory
    #[builder(default = false)]
    pub no_sub_dir: bool,

    /// Open an existing environment and refuse write transactions
    #[builder(default = false)]
    pub read_only: bool,

    /// Commit without flushing to disk
    #[builder(default = false)]
    pub no_sync: bool,
}

// ============================================================================
// Table flags
// ============================================================================

/// A single table option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum TableFlag {
    /// Keys compare from their last byte towards the first
    ReverseKey,
    /// A key may hold several sorted values
    DupSort,
    /// Keys are native-endian 4 or 8 byte unsigned integers
    IntegerKey,
    /// All values of a duplicate group share one size
    DupFixed,
    /// Duplicate values are native-endian unsigned integers
    IntegerDup,
    /// Duplicate values compare from their last byte
    ReverseDup,
    /// Create the table if it is missing
    Create,
}

impl TableFlag {
    const fn bit(self) -> u32 {
        match self {
            TableFlag::ReverseKey => 0x02,
            TableFlag::DupSort => 0x04,
            TableFlag::IntegerKey => 0x08,
            TableFlag::DupFixed => 0x10,
            TableFlag::IntegerDup => 0x20,
            TableFlag::ReverseDup => 0x40,
            TableFlag::Create => 0x4_0000,
        }
    }
}

/// Set of [`TableFlag`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TableFlags(u32);

impl TableFlags {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn from_bits(bits: u32) -> Self {
        let known = TableFlag::iter().fold(0, |acc, f| acc | f.bit());
        Self(bits & known)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn set(&mut self, flag: TableFlag) -> &mut Self {
        self.0 |= flag.bit();
        self
    }

    pub fn unset(&mut self, flag: TableFlag) -> &mut Self {
        self.0 &= !flag.bit();
        self
    }

    pub fn clear(&mut self) -> &mut Self {
        self.0 = 0;
        self
    }

    pub const fn with(self, flag: TableFlag) -> Self {
        Self(self.0 | flag.bit())
    }

    pub const fn contains(self, flag: TableFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The flags that are stored with the table; `Create` only affects opening.
    pub const fn persistent(self) -> Self {
        Self(self.0 & !TableFlag::Create.bit())
    }

    pub fn iter(self) -> impl Iterator<Item = TableFlag> {
        TableFlag::iter().filter(move |f| self.contains(*f))
    }
}

impl From<TableFlag> for TableFlags {
    fn from(flag: TableFlag) -> Self {
        Self(flag.bit())
    }
}

impl FromIterator<TableFlag> for TableFlags {
    fn from_iter<I: IntoIterator<Item = TableFlag>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), |acc, f| acc.with(f))
    }
}

impl std::fmt::Display for TableFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&'static str> = self.iter().map(<&'static str>::from).collect();
        write!(f, "[{}]", names.join("|"))
    }
}

// ============================================================================
// Put flags
// ============================================================================

/// Options for a single put.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutFlags(u32);

impl PutFlags {
    /// Fail with `KeyExists` if the key is already present
    pub const NO_OVERWRITE: PutFlags = PutFlags(0x10);
    /// Fail with `KeyExists` if the exact key/value pair is already present
    pub const NO_DUP_DATA: PutFlags = PutFlags(0x20);
    /// The key must sort after every key in the table
    pub const APPEND: PutFlags = PutFlags(0x2_0000);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(self, other: PutFlags) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }
}

impl std::ops::BitOr for PutFlags {
    type Output = PutFlags;

    fn bitor(self, rhs: PutFlags) -> PutFlags {
        PutFlags(self.0 | rhs.0)
    }
}
