//! Table handles.
//!
//! A `Table` is a cheap handle over the shared per-table state (record
//! storage plus indexes) owned by the database facade. All mutation goes
//! through `commit`/`delete`, which keep storage and every index consistent
//! with respect to the single record being written. Atomicity is per record
//! only; a crash between the storage write and the index snapshot is a
//! detect-and-repair case for the maintenance tools.

use super::record::Record;
use super::result_set::ResultSet;
use super::SharedDb;
use crate::config::DbConfig;
use crate::error::DbError;
use crate::index::{load_indexes, save_indexes, Index};
use crate::schema::{ColumnDef, TableStructure};
use crate::storage::row_codec::{decode_row, encode_row};
use crate::storage::{RecordFile, WastedSpace};
use crate::types::Value;
use eyre::{Result, WrapErr};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

pub(crate) struct TableState {
    pub(crate) storage: RecordFile,
    pub(crate) indexes: Vec<Index>,
    unflushed_commits: u32,
}

/// Shared state of one open table.
pub(crate) struct TableShared {
    structure: Arc<TableStructure>,
    index_path: PathBuf,
    autoflush_records: u32,
    state: Mutex<TableState>,
}

impl TableShared {
    /// Opens (or creates) the storage and indexes of one table. A missing
    /// index snapshot is rebuilt from storage; a corrupt one is an error,
    /// left to the maintenance tools to resolve.
    pub(crate) fn open(
        config: &DbConfig,
        db: &str,
        structure: TableStructure,
    ) -> Result<Arc<Self>> {
        let column_count = structure.columns().len() as u32;
        let data_path = config.table_data_path(db, structure.name());
        let index_path = config.table_index_path(db, structure.name());

        let mut storage = if data_path.exists() {
            RecordFile::open(&data_path, column_count)?
        } else {
            RecordFile::create(&data_path, column_count)?
        };

        let indexes = if index_path.exists() {
            load_indexes(&index_path, &structure)?
        } else {
            info!(table = structure.name(), "no index snapshot, rebuilding from storage");
            Self::indexes_from_storage(&mut storage, &structure)?
        };

        debug!(
            table = structure.name(),
            records = storage.live_count(),
            indexes = indexes.len(),
            "table opened"
        );

        Ok(Arc::new(Self {
            structure: Arc::new(structure),
            index_path,
            autoflush_records: config.autoflush_records(),
            state: Mutex::new(TableState {
                storage,
                indexes,
                unflushed_commits: 0,
            }),
        }))
    }

    /// Builds every index of `structure` by scanning storage in ascending
    /// record-ID order, which also fixes the equal-key tie-break.
    pub(crate) fn indexes_from_storage(
        storage: &mut RecordFile,
        structure: &TableStructure,
    ) -> Result<Vec<Index>> {
        let mut indexes = structure
            .indexes()
            .iter()
            .map(|def| Index::new(def.clone(), structure))
            .collect::<Result<Vec<_>>>()?;

        let ids: Vec<u64> = storage.record_ids().collect();
        for id in ids {
            let payload = storage
                .read(id)?
                .ok_or_else(|| DbError::corruption(format!("record {} vanished mid-scan", id)))?;
            let row = decode_row(&payload, structure.columns())?;
            for index in &mut indexes {
                index.insert(&row, id);
            }
        }
        Ok(indexes)
    }

    pub(crate) fn structure(&self) -> &Arc<TableStructure> {
        &self.structure
    }

    pub(crate) fn with_state<T>(&self, f: impl FnOnce(&mut TableState) -> T) -> T {
        f(&mut self.state.lock())
    }

    /// Reads and decodes one live row, or None if the record is gone.
    pub(crate) fn read_row(&self, id: u64) -> Result<Option<Vec<Value>>> {
        let mut state = self.state.lock();
        match state.storage.read(id)? {
            Some(payload) => Ok(Some(decode_row(&payload, self.structure.columns())?)),
            None => Ok(None),
        }
    }

    /// Persists the storage header and the index snapshot.
    pub(crate) fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.flush_locked(&mut state)
    }

    fn flush_locked(&self, state: &mut TableState) -> Result<()> {
        state
            .storage
            .flush()
            .wrap_err_with(|| format!("failed to flush table '{}'", self.structure.name()))?;
        save_indexes(&self.index_path, &state.indexes).wrap_err_with(|| {
            format!("failed to snapshot indexes of '{}'", self.structure.name())
        })?;
        state.unflushed_commits = 0;
        Ok(())
    }

    fn note_commit(&self, state: &mut TableState) -> Result<()> {
        state.unflushed_commits += 1;
        if self.autoflush_records > 0 && state.unflushed_commits >= self.autoflush_records {
            self.flush_locked(state)?;
        }
        Ok(())
    }
}

/// Handle to one open table of a `Database`.
#[derive(Clone)]
pub struct Table {
    pub(crate) db: Arc<SharedDb>,
    pub(crate) shared: Arc<TableShared>,
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

impl Table {
    pub fn name(&self) -> &str {
        self.shared.structure().name()
    }

    /// Column metadata for introspection and diagnostics.
    pub fn column_infos(&self) -> Vec<ColumnDef> {
        self.shared.structure().columns().to_vec()
    }

    /// Number of live records, maintained incrementally.
    pub fn count(&self) -> Result<u64> {
        self.db.ensure_open()?;
        Ok(self.shared.with_state(|state| state.storage.live_count()))
    }

    /// Fragmentation accounting without a rebuild.
    pub fn wasted_space(&self) -> Result<WastedSpace> {
        self.db.ensure_open()?;
        Ok(self.shared.with_state(|state| state.storage.wasted_space()))
    }

    /// Allocates a fresh record with per-type default values. It appears in
    /// storage and indexes only at `commit`.
    pub fn new_record(&self) -> Result<Record> {
        self.db.ensure_open()?;
        let id = self
            .shared
            .with_state(|state| state.storage.allocate_record_id());
        Ok(Record::new_uncommitted(id, self.shared.structure().clone()))
    }

    /// Reads a committed record by ID.
    pub fn get_record(&self, id: u64) -> Result<Option<Record>> {
        self.db.ensure_open()?;
        Ok(self
            .shared
            .read_row(id)?
            .map(|row| Record::from_row(id, self.shared.structure().clone(), row)))
    }

    /// Writes the record to storage and brings every index up to date.
    /// First commit inserts; later commits update in place and re-index
    /// only the keys that changed.
    pub fn commit(&self, record: &mut Record) -> Result<()> {
        self.db.ensure_open()?;
        if record.is_deleted() {
            return Err(DbError::RecordAlreadyDeleted(record.id()).into());
        }

        let id = record.id();
        let mut payload = Vec::new();
        encode_row(record.values(), &mut payload);

        self.shared.with_state(|state| {
            if record.is_committed() {
                let old_payload = state
                    .storage
                    .read(id)?
                    .ok_or(DbError::RecordAlreadyDeleted(id))?;
                let old_row = decode_row(&old_payload, self.shared.structure().columns())?;
                state.storage.update(id, &payload)?;
                for index in &mut state.indexes {
                    index.refresh(&old_row, record.values(), id);
                }
            } else {
                state.storage.insert(id, &payload)?;
                for index in &mut state.indexes {
                    index.insert(record.values(), id);
                }
            }
            self.shared.note_commit(state)
        })?;

        record.mark_committed();
        Ok(())
    }

    /// Removes the record from storage and every index. Deleting twice or
    /// deleting an uncommitted record fails loudly.
    pub fn delete(&self, record: &mut Record) -> Result<()> {
        self.db.ensure_open()?;
        let id = record.id();
        if record.is_deleted() {
            return Err(DbError::RecordAlreadyDeleted(id).into());
        }
        if !record.is_committed() {
            return Err(DbError::RecordNotCommitted(id).into());
        }

        self.shared.with_state(|state| {
            let payload = state
                .storage
                .read(id)?
                .ok_or(DbError::RecordAlreadyDeleted(id))?;
            let row = decode_row(&payload, self.shared.structure().columns())?;
            for index in &mut state.indexes {
                index.remove(&row, id);
            }
            state.storage.delete(id)?;
            self.shared.note_commit(state)
        })?;

        record.mark_deleted();
        Ok(())
    }

    /// Read-only forward cursor over the records whose index key starts
    /// with `key`, in index order. An empty `key` scans the whole index.
    pub fn result_set(&self, index_columns: &[&str], key: &[Value]) -> Result<ResultSet> {
        self.cursor(index_columns, key)
    }

    /// Like `result_set`, but the current record may be deleted or
    /// committed mid-iteration: the cursor resolves liveness per step, so a
    /// removed entry is skipped, never duplicated.
    pub fn modifiable_result_set(&self, index_columns: &[&str], key: &[Value]) -> Result<ResultSet> {
        self.cursor(index_columns, key)
    }

    fn cursor(&self, index_columns: &[&str], key: &[Value]) -> Result<ResultSet> {
        self.db.ensure_open()?;
        let ids = self.shared.with_state(|state| {
            let position = self
                .find_index_position(&state.indexes, index_columns)
                .ok_or_else(|| self.no_such_index(index_columns))?;
            Ok::<_, eyre::Report>(
                state.indexes[position]
                    .matches(key)
                    .into_iter()
                    .map(|e| e.record_id)
                    .collect::<Vec<u64>>(),
            )
        })?;
        Ok(ResultSet::new(self.db.clone(), self.shared.clone(), ids))
    }

    /// Scans a value-carrying index, answering `(record_id, inline value)`
    /// pairs without touching the base table.
    pub fn index_value_scan(
        &self,
        index_columns: &[&str],
        key: &[Value],
    ) -> Result<Vec<(u64, Value)>> {
        self.db.ensure_open()?;
        self.shared.with_state(|state| {
            let position = self
                .find_index_position(&state.indexes, index_columns)
                .filter(|&p| state.indexes[p].def().value_column().is_some())
                .ok_or_else(|| self.no_such_index(index_columns))?;
            state.indexes[position]
                .matches(key)
                .into_iter()
                .map(|entry| {
                    let value = entry.value.ok_or_else(|| {
                        DbError::corruption(format!(
                            "entry for record {} lacks its inline value",
                            entry.record_id
                        ))
                    })?;
                    Ok((entry.record_id, value))
                })
                .collect()
        })
    }

    /// Persists the storage header and index snapshot of this table.
    pub fn flush(&self) -> Result<()> {
        self.db.ensure_open()?;
        self.shared.flush()
    }

    fn find_index_position(&self, indexes: &[Index], columns: &[&str]) -> Option<usize> {
        indexes
            .iter()
            .position(|index| index.def().matches_columns(columns))
    }

    fn no_such_index(&self, columns: &[&str]) -> eyre::Report {
        DbError::IndexDoesNotExist {
            table: self.name().to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
        .into()
    }
}
