//! # Engine Configuration
//!
//! `DbConfig` is the explicit configuration struct passed by reference to
//! `DbStructure`, `Database`, and every maintenance tool. It replaces the
//! process-wide registry the engine historically grew around: there are no
//! ambient statics, the struct is created once at startup and threaded
//! through.
//!
//! ## File Naming
//!
//! All paths for a database named `N` derive from the working directory:
//!
//! ```text
//! workdir/
//! ├── N.dbs             # structure file (schema + version + build)
//! ├── N.<table>.tbd     # record storage, one per table
//! ├── N.<table>.idx     # index snapshot, one per table
//! └── N.lock            # advisory lock while the database is open
//! ```

use std::path::{Path, PathBuf};

/// Flush index/header state after this many commits. 0 disables autoflush
/// (state persists on `flush()`/`shutdown()` only).
pub const DEFAULT_AUTOFLUSH_RECORDS: u32 = 0;

/// Engine configuration, created once and passed by reference.
#[derive(Debug, Clone)]
pub struct DbConfig {
    workdir: PathBuf,
    autoflush_records: u32,
}

impl DbConfig {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            autoflush_records: DEFAULT_AUTOFLUSH_RECORDS,
        }
    }

    pub fn with_autoflush_records(mut self, records: u32) -> Self {
        self.autoflush_records = records;
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn autoflush_records(&self) -> u32 {
        self.autoflush_records
    }

    /// Path of the structure file for database `db`.
    pub fn structure_path(&self, db: &str) -> PathBuf {
        self.workdir.join(format!("{}.dbs", db))
    }

    /// Path of the record storage file for `table` in database `db`.
    pub fn table_data_path(&self, db: &str, table: &str) -> PathBuf {
        self.workdir.join(format!("{}.{}.tbd", db, table))
    }

    /// Path of the index snapshot file for `table` in database `db`.
    pub fn table_index_path(&self, db: &str, table: &str) -> PathBuf {
        self.workdir.join(format!("{}.{}.idx", db, table))
    }

    /// Path of the advisory lock file for database `db`.
    pub fn lock_path(&self, db: &str) -> PathBuf {
        self.workdir.join(format!("{}.lock", db))
    }
}
