//! Advisory database lock.
//!
//! One `.lock` file per database, held exclusively (via `fs4`) while a
//! `Database` is open or a destructive maintenance operation runs. A second
//! open of the same physical database fails fast with
//! `DbError::DatabaseLocked` instead of corrupting files.

use crate::config::DbConfig;
use crate::error::DbError;
use eyre::{Result, WrapErr};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use tracing::debug;

/// Exclusive lock on one database, released on drop.
#[derive(Debug)]
pub(crate) struct DbLock {
    file: File,
    path: PathBuf,
}

impl DbLock {
    /// Acquires the lock, failing fast if another instance holds it.
    pub(crate) fn acquire(config: &DbConfig, db: &str) -> Result<Self> {
        let path = config.lock_path(db);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .wrap_err_with(|| format!("failed to open lock file {}", path.display()))?;

        let acquired = file
            .try_lock_exclusive()
            .wrap_err_with(|| format!("failed to lock {}", path.display()))?;
        if !acquired {
            return Err(DbError::DatabaseLocked(path).into());
        }

        debug!(lock = %path.display(), "database lock acquired");
        Ok(Self { file, path })
    }
}

impl Drop for DbLock {
    fn drop(&mut self) {
        // Dropping the handle releases the OS lock; unlock explicitly so a
        // failure at least leaves a trace.
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(lock = %self.path.display(), error = %e, "failed to unlock");
        }
    }
}
