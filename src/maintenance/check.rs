//! Integrity checks.
//!
//! Two depths of validation, neither of which rewrites anything:
//!
//! - `is_database_correct`: structural check. Storage header counts against
//!   a slot scan, index entry counts against the live record count, and
//!   every index entry resolving to a live record ID.
//! - `low_level_check`: per-record validation. Every live row decodes
//!   against the schema, every index entry resolves to a live record whose
//!   current values produce that entry's key, and every live record has
//!   exactly one entry per index.
//!
//! Problems are reported, not fixed; the fix paths are `rebuild_indexes`
//! and `defragment`.

use crate::config::DbConfig;
use crate::database::lock::DbLock;
use crate::error::DbError;
use crate::index::{load_indexes, Index};
use crate::schema::{DbStructure, TableStructure};
use crate::storage::row_codec::decode_row;
use crate::storage::RecordFile;
use eyre::Result;
use std::collections::HashMap;
use tracing::info;

/// Findings for one table.
#[derive(Debug, Clone)]
pub struct TableCheck {
    pub table: String,
    pub live_records: u64,
    pub problems: Vec<String>,
}

impl TableCheck {
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Findings for a whole database.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub tables: Vec<TableCheck>,
}

impl CheckReport {
    pub fn is_ok(&self) -> bool {
        self.tables.iter().all(TableCheck::is_ok)
    }

    pub fn problem_count(&self) -> usize {
        self.tables.iter().map(|t| t.problems.len()).sum()
    }
}

/// Structural sanity check: count parity between storage headers, slot
/// scans, and index snapshots, plus every index entry resolving to a live
/// record. Returns false on the first inconsistency found; details come
/// from `low_level_check`.
pub fn is_database_correct(config: &DbConfig, name: &str) -> Result<bool> {
    let structure = DbStructure::load_structure(config, name, false)?;
    let _lock = DbLock::acquire(config, name)?;

    for table in structure.tables() {
        let mut check = TableCheck {
            table: table.name().to_string(),
            live_records: 0,
            problems: Vec::new(),
        };
        check_counts(config, name, table, &mut check)?;
        if !check.is_ok() {
            info!(table = table.name(), problems = check.problems.len(), "parity check failed");
            return Ok(false);
        }
    }
    Ok(true)
}

/// Per-table, per-record raw validation against the schema.
pub fn low_level_check(config: &DbConfig, structure: &DbStructure) -> Result<CheckReport> {
    let _lock = DbLock::acquire(config, structure.name())?;

    let mut tables = Vec::with_capacity(structure.tables().len());
    for table in structure.tables() {
        let mut check = TableCheck {
            table: table.name().to_string(),
            live_records: 0,
            problems: Vec::new(),
        };

        check_counts(config, structure.name(), table, &mut check)?;
        check_records_and_entries(config, structure.name(), table, &mut check)?;

        info!(
            table = table.name(),
            records = check.live_records,
            problems = check.problems.len(),
            "low-level check finished"
        );
        tables.push(check);
    }

    Ok(CheckReport { tables })
}

fn check_counts(
    config: &DbConfig,
    db: &str,
    table: &TableStructure,
    check: &mut TableCheck,
) -> Result<()> {
    let data_path = config.table_data_path(db, table.name());
    let storage = match RecordFile::open(&data_path, table.columns().len() as u32) {
        Ok(storage) => storage,
        Err(e) => {
            check.problems.push(format!("storage unopenable: {}", e));
            return Ok(());
        }
    };
    check.live_records = storage.live_count();

    if storage.header_live_count() != storage.live_count() {
        check.problems.push(format!(
            "header records {} live records, slot scan found {}",
            storage.header_live_count(),
            storage.live_count()
        ));
    }
    if storage.header_slot_count() != storage.slot_count() {
        check.problems.push(format!(
            "header records {} slots, slot scan found {}",
            storage.header_slot_count(),
            storage.slot_count()
        ));
    }

    match open_indexes(config, db, table) {
        Ok(indexes) => {
            for index in &indexes {
                if index.entry_count() != storage.live_count() {
                    check.problems.push(format!(
                        "index '{}' holds {} entries for {} live records",
                        index.def().describe(),
                        index.entry_count(),
                        storage.live_count()
                    ));
                }
                // Counts can agree while an entry dangles (one delete plus
                // one insert against a stale snapshot).
                if let Some((_, entry)) =
                    index.iter().find(|(_, e)| !storage.contains(e.record_id))
                {
                    check.problems.push(format!(
                        "index '{}' points at freed record {}",
                        index.def().describe(),
                        entry.record_id
                    ));
                }
            }
        }
        Err(e) => check.problems.push(format!("index snapshot unusable: {}", e)),
    }

    Ok(())
}

fn check_records_and_entries(
    config: &DbConfig,
    db: &str,
    table: &TableStructure,
    check: &mut TableCheck,
) -> Result<()> {
    let data_path = config.table_data_path(db, table.name());
    let mut storage = match RecordFile::open(&data_path, table.columns().len() as u32) {
        Ok(storage) => storage,
        // Already reported by the count pass.
        Err(_) => return Ok(()),
    };

    let ids: Vec<u64> = storage.record_ids().collect();
    let mut rows = HashMap::with_capacity(ids.len());
    for id in ids {
        let payload = storage
            .read(id)?
            .ok_or_else(|| DbError::corruption(format!("record {} vanished mid-scan", id)))?;
        match decode_row(&payload, table.columns()) {
            Ok(row) => {
                rows.insert(id, row);
            }
            Err(e) => check
                .problems
                .push(format!("record {} is undecodable: {}", id, e)),
        }
    }

    let indexes = match open_indexes(config, db, table) {
        Ok(indexes) => indexes,
        Err(_) => return Ok(()),
    };

    for index in &indexes {
        let mut seen: HashMap<u64, u32> = HashMap::new();
        for (key, entry) in index.iter() {
            match rows.get(&entry.record_id) {
                None => check.problems.push(format!(
                    "index '{}' points at dead record {}",
                    index.def().describe(),
                    entry.record_id
                )),
                Some(row) => {
                    if &index.key_for(row) != key {
                        check.problems.push(format!(
                            "index '{}' entry for record {} has a stale key",
                            index.def().describe(),
                            entry.record_id
                        ));
                    }
                }
            }
            *seen.entry(entry.record_id).or_default() += 1;
        }

        for (&id, &count) in &seen {
            if count > 1 {
                check.problems.push(format!(
                    "index '{}' holds {} entries for record {}",
                    index.def().describe(),
                    count,
                    id
                ));
            }
        }
        for id in rows.keys() {
            if !seen.contains_key(id) {
                check.problems.push(format!(
                    "record {} is missing from index '{}'",
                    id,
                    index.def().describe()
                ));
            }
        }
    }

    Ok(())
}

fn open_indexes(config: &DbConfig, db: &str, table: &TableStructure) -> Result<Vec<Index>> {
    let index_path = config.table_index_path(db, table.name());
    if !index_path.exists() {
        return Err(DbError::corruption(format!(
            "index snapshot {} is missing",
            index_path.display()
        ))
        .into());
    }
    load_indexes(&index_path, table)
}
