//! Diagnostic dump.
//!
//! Renders the database structure, and optionally every table's contents,
//! as plain text for the repair CLI. Output is deterministic: tables in
//! schema order, records in ascending ID order.

use crate::config::DbConfig;
use crate::database::lock::DbLock;
use crate::schema::DbStructure;
use crate::storage::row_codec::decode_row;
use crate::storage::RecordFile;
use eyre::Result;
use std::fmt::Write;

/// Renders structure (and with `contents`, every row) of `structure`.
pub fn dump(config: &DbConfig, structure: &DbStructure, contents: bool) -> Result<String> {
    let _lock = DbLock::acquire(config, structure.name())?;
    let mut out = String::new();

    writeln!(
        out,
        "database '{}' (build {}, version {})",
        structure.name(),
        structure.build(),
        structure.version()
    )?;

    for table in structure.tables() {
        writeln!(out, "\ntable '{}'", table.name())?;
        for column in table.columns() {
            writeln!(
                out,
                "  column {} {}{}",
                column.name(),
                column.column_type(),
                if column.is_key() { " key" } else { "" }
            )?;
        }
        for index in table.indexes() {
            writeln!(out, "  index {}", index.describe())?;
        }

        if !contents {
            continue;
        }

        let mut storage = RecordFile::open(
            config.table_data_path(structure.name(), table.name()),
            table.columns().len() as u32,
        )?;
        writeln!(out, "  {} records", storage.live_count())?;

        let ids: Vec<u64> = storage.record_ids().collect();
        for id in ids {
            let Some(payload) = storage.read(id)? else {
                continue;
            };
            let row = decode_row(&payload, table.columns())?;
            write!(out, "  #{}", id)?;
            for (column, value) in table.columns().iter().zip(&row) {
                write!(out, " {}={}", column.name(), value)?;
            }
            writeln!(out)?;
        }
    }

    Ok(out)
}
