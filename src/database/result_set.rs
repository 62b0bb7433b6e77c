//! Result sets.
//!
//! A `ResultSet` is a forward-only cursor over the records that matched an
//! index key at creation time. The matching entries are snapshotted up
//! front (record IDs only); each step re-resolves the next ID against
//! storage, so a record deleted mid-iteration is skipped and never
//! duplicated, and updates to later records are observed when the cursor
//! reaches them.
//!
//! Iterating after the owning database has shut down is a loud error, not a
//! silent empty sequence. Disposal is idempotent and also runs on drop.

use super::record::Record;
use super::table::TableShared;
use super::SharedDb;
use crate::error::DbError;
use eyre::Result;
use std::sync::Arc;

/// Forward cursor over index-matched records.
pub struct ResultSet {
    db: Arc<SharedDb>,
    table: Arc<TableShared>,
    ids: Vec<u64>,
    pos: usize,
    disposed: bool,
}

impl ResultSet {
    pub(crate) fn new(db: Arc<SharedDb>, table: Arc<TableShared>, ids: Vec<u64>) -> Self {
        Self {
            db,
            table,
            ids,
            pos: 0,
            disposed: false,
        }
    }

    /// Number of records that matched when the set was created. A set
    /// recreated after a committed delete observes the decrease.
    pub fn count(&self) -> usize {
        self.ids.len()
    }

    /// Advances to the next record still live in storage. Returns None at
    /// the end of the matches.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        if self.disposed {
            return Err(DbError::ResultSetDisposed.into());
        }
        self.db.ensure_open()?;

        while self.pos < self.ids.len() {
            let id = self.ids[self.pos];
            self.pos += 1;
            // Deleted since the snapshot: skip, the index entry is gone too.
            if let Some(row) = self.table.read_row(id)? {
                return Ok(Some(Record::from_row(
                    id,
                    self.table.structure().clone(),
                    row,
                )));
            }
        }
        Ok(None)
    }

    /// Releases the cursor. Safe to call more than once; later
    /// `next_record` calls fail with `ResultSetDisposed`.
    pub fn dispose(&mut self) {
        self.disposed = true;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl std::fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("count", &self.ids.len())
            .field("pos", &self.pos)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl Iterator for ResultSet {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

impl Drop for ResultSet {
    fn drop(&mut self) {
        self.dispose();
    }
}
