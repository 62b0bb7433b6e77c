//! Repair operations: index rebuild, storage compaction, wasted-space
//! accounting, and index-file deletion.
//!
//! All of these take the database lock and operate directly on the files.
//! The failure model favors surfacing problems over hiding them: a rebuild
//! or defragment that aborts halfway leaves the database openable (the
//! compacted file replaces the original only after it is complete).

use crate::config::DbConfig;
use crate::database::lock::DbLock;
use crate::database::table::TableShared;
use crate::index::save_indexes;
use crate::schema::{DbStructure, TableStructure};
use crate::storage::{RecordFile, WastedSpace};
use eyre::{Result, WrapErr};
use tracing::info;

/// Drops and regenerates every index from a storage scan. Without `force`,
/// tables whose snapshot already matches storage are left alone.
pub fn rebuild_indexes(config: &DbConfig, structure: &DbStructure, force: bool) -> Result<u32> {
    let _lock = DbLock::acquire(config, structure.name())?;

    let mut rebuilt = 0;
    for table in structure.tables() {
        if !force && snapshot_matches_storage(config, structure.name(), table) {
            continue;
        }
        rebuild_table_indexes(config, structure.name(), table)
            .wrap_err_with(|| format!("failed to rebuild indexes of '{}'", table.name()))?;
        rebuilt += 1;
    }
    Ok(rebuilt)
}

fn snapshot_matches_storage(config: &DbConfig, db: &str, table: &TableStructure) -> bool {
    let index_path = config.table_index_path(db, table.name());
    if !index_path.exists() {
        return false;
    }
    let Ok(storage) = RecordFile::open(
        config.table_data_path(db, table.name()),
        table.columns().len() as u32,
    ) else {
        return false;
    };
    match crate::index::load_indexes(&index_path, table) {
        // Entry counts alone can match a stale snapshot; every entry must
        // also resolve to a live record.
        Ok(indexes) => indexes.iter().all(|index| {
            index.entry_count() == storage.live_count()
                && index.iter().all(|(_, e)| storage.contains(e.record_id))
        }),
        Err(_) => false,
    }
}

fn rebuild_table_indexes(config: &DbConfig, db: &str, table: &TableStructure) -> Result<()> {
    let mut storage = RecordFile::open(
        config.table_data_path(db, table.name()),
        table.columns().len() as u32,
    )?;
    let indexes = TableShared::indexes_from_storage(&mut storage, table)?;
    save_indexes(&config.table_index_path(db, table.name()), &indexes)?;
    info!(
        table = table.name(),
        records = storage.live_count(),
        "indexes rebuilt"
    );
    Ok(())
}

/// Compacts every table's record storage, dropping freed slots while
/// preserving record IDs and the ID counter, then rebuilds the indexes
/// (entry order follows record-ID order, matching a rebuild).
pub fn defragment(config: &DbConfig, structure: &DbStructure) -> Result<()> {
    let _lock = DbLock::acquire(config, structure.name())?;

    for table in structure.tables() {
        defragment_table(config, structure.name(), table)
            .wrap_err_with(|| format!("failed to defragment '{}'", table.name()))?;
        rebuild_table_indexes(config, structure.name(), table)
            .wrap_err_with(|| format!("failed to rebuild indexes of '{}'", table.name()))?;
    }
    Ok(())
}

fn defragment_table(config: &DbConfig, db: &str, table: &TableStructure) -> Result<()> {
    let column_count = table.columns().len() as u32;
    let data_path = config.table_data_path(db, table.name());
    let compact_path = data_path.with_extension("tbd.compact");

    if compact_path.exists() {
        // Leftover from an aborted earlier run; the original is authoritative.
        std::fs::remove_file(&compact_path)
            .wrap_err_with(|| format!("failed to remove stale {}", compact_path.display()))?;
    }

    let mut storage = RecordFile::open(&data_path, column_count)?;
    let before = storage.wasted_space();

    let mut compact = RecordFile::create(&compact_path, column_count)?;
    let ids: Vec<u64> = storage.record_ids().collect();
    for id in ids {
        let payload = storage.read(id)?.ok_or_else(|| {
            crate::error::DbError::corruption(format!("record {} vanished mid-scan", id))
        })?;
        compact.insert(id, &payload)?;
    }
    compact.set_next_record_id(storage.next_record_id());
    compact.flush()?;

    drop(compact);
    drop(storage);
    // The compacted file is complete and synced; the rename is the commit
    // point. A crash before it leaves the fragmented original intact.
    std::fs::rename(&compact_path, &data_path)
        .wrap_err_with(|| format!("failed to replace {}", data_path.display()))?;

    info!(
        table = table.name(),
        slots_before = before.total_record_count,
        slots_after = before.normal_record_count,
        "storage compacted"
    );
    Ok(())
}

/// Per-table fragmentation accounting, without touching index files.
pub fn compute_wasted_space(
    config: &DbConfig,
    structure: &DbStructure,
) -> Result<Vec<(String, WastedSpace)>> {
    let _lock = DbLock::acquire(config, structure.name())?;

    let mut report = Vec::with_capacity(structure.tables().len());
    for table in structure.tables() {
        let storage = RecordFile::open(
            config.table_data_path(structure.name(), table.name()),
            table.columns().len() as u32,
        )?;
        report.push((table.name().to_string(), storage.wasted_space()));
    }
    Ok(report)
}

/// Removes every index snapshot file. The next open rebuilds them from
/// storage. Returns how many files were removed.
pub fn delete_index_files(config: &DbConfig, structure: &DbStructure) -> Result<u32> {
    let _lock = DbLock::acquire(config, structure.name())?;

    let mut removed = 0;
    for table in structure.tables() {
        let index_path = config.table_index_path(structure.name(), table.name());
        if index_path.exists() {
            std::fs::remove_file(&index_path)
                .wrap_err_with(|| format!("failed to remove {}", index_path.display()))?;
            removed += 1;
        }
    }
    info!(removed, "index snapshots deleted");
    Ok(removed)
}
