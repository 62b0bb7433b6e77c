//! # Database Facade
//!
//! The runtime entry point over one database: it acquires the advisory
//! lock, opens every table described by the structure, and vends `Table`
//! handles, `Record`s, and `ResultSet`s. Shutdown flushes all per-table
//! state, releases the lock, and flips a closed flag that every later
//! operation checks, so use-after-shutdown fails loudly.
//!
//! ## Sharing
//!
//! All handles derived from one `Database` share state through `Arc`;
//! per-table state sits behind a `parking_lot::Mutex`. The engine performs
//! no internal threading and expects the host to serialize mutations, but
//! read-only cursors are safe to drive from other threads.

pub(crate) mod lock;
pub mod record;
pub mod result_set;
pub mod table;

pub use record::Record;
pub use result_set::ResultSet;
pub use table::Table;

use crate::config::DbConfig;
use crate::error::DbError;
use crate::schema::DbStructure;
use eyre::Result;
use lock::DbLock;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use table::TableShared;
use tracing::{info, warn};

pub(crate) struct SharedDb {
    name: String,
    closed: AtomicBool,
    tables: HashMap<String, Arc<TableShared>>,
    lock: Mutex<Option<DbLock>>,
}

impl SharedDb {
    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DbError::DatabaseClosed.into());
        }
        Ok(())
    }
}

/// An open database: the facade the host application talks to.
pub struct Database {
    shared: Arc<SharedDb>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.shared.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Database {
    /// Opens every table of `structure`, holding the database lock for the
    /// lifetime of this instance.
    pub(crate) fn open(config: &DbConfig, structure: DbStructure) -> Result<Self> {
        let db_lock = DbLock::acquire(config, structure.name())?;

        let mut tables = HashMap::new();
        for table in structure.tables() {
            let shared = TableShared::open(config, structure.name(), table.clone())?;
            tables.insert(table.name().to_string(), shared);
        }

        info!(db = structure.name(), tables = tables.len(), "database opened");

        Ok(Self {
            shared: Arc::new(SharedDb {
                name: structure.name().to_string(),
                closed: AtomicBool::new(false),
                tables,
                lock: Mutex::new(Some(db_lock)),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Hands out a table handle.
    pub fn table(&self, name: &str) -> Result<Table> {
        self.shared.ensure_open()?;
        let table = self
            .shared
            .tables
            .get(name)
            .ok_or_else(|| DbError::TableDoesNotExist(name.to_string()))?;
        Ok(Table {
            db: self.shared.clone(),
            shared: table.clone(),
        })
    }

    /// Table names, sorted for stable diagnostics output.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shared.tables.keys().cloned().collect();
        names.sort();
        names
    }

    /// Flushes every table, releases the database lock, and marks the
    /// instance closed. Idempotent; records and result sets obtained from
    /// this database error out afterwards.
    pub fn shutdown(&self) -> Result<()> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut first_error = None;
        for (name, table) in &self.shared.tables {
            if let Err(e) = table.flush() {
                warn!(table = %name, error = %e, "flush failed during shutdown");
                first_error.get_or_insert(e);
            }
        }

        *self.shared.lock.lock() = None;
        info!(db = %self.shared.name, "database shut down");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if !self.is_closed() {
            if let Err(e) = self.shutdown() {
                warn!(db = %self.shared.name, error = %e, "shutdown on drop failed");
            }
        }
    }
}
