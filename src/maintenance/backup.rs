//! Backup and restore.
//!
//! A backup is one archive file: the 64-byte backup header followed by one
//! entry per database file (structure file, every `.tbd`, every existing
//! `.idx`). Entries carry their file name, length, and a CRC-32 of the
//! data, so a truncated or bit-rotted archive is rejected at restore time
//! before anything in the working directory is overwritten.

use crate::config::DbConfig;
use crate::database::lock::DbLock;
use crate::error::DbError;
use crate::schema::DbStructure;
use crate::storage::headers::BackupFileHeader;
use crate::storage::{CRC32, FILE_HEADER_SIZE};
use eyre::{ensure, Result, WrapErr};
use std::path::{Path, PathBuf};
use tracing::info;
use zerocopy::IntoBytes;

fn database_files(config: &DbConfig, structure: &DbStructure) -> Vec<PathBuf> {
    let mut files = vec![config.structure_path(structure.name())];
    for table in structure.tables() {
        files.push(config.table_data_path(structure.name(), table.name()));
        let index_path = config.table_index_path(structure.name(), table.name());
        if index_path.exists() {
            files.push(index_path);
        }
    }
    files
}

fn file_name(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| eyre::eyre!("unrepresentable file name: {}", path.display()))
}

/// Copies the structure and data files of `structure` into a single archive
/// at `dest`.
pub fn backup_database(config: &DbConfig, structure: &DbStructure, dest: &Path) -> Result<()> {
    let _lock = DbLock::acquire(config, structure.name())?;

    let files = database_files(config, structure);
    let header = BackupFileHeader::new(files.len() as u32);
    let mut buf = Vec::new();
    buf.extend(header.as_bytes());

    for path in &files {
        let data = std::fs::read(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        let name = file_name(path)?;

        buf.extend((name.len() as u32).to_le_bytes());
        buf.extend(name.as_bytes());
        buf.extend((data.len() as u64).to_le_bytes());
        buf.extend(CRC32.checksum(&data).to_le_bytes());
        buf.extend(&data);
    }

    std::fs::write(dest, &buf)
        .wrap_err_with(|| format!("failed to write backup archive {}", dest.display()))?;
    info!(archive = %dest.display(), files = files.len(), "backup written");
    Ok(())
}

/// Restores every file of a backup archive into the working directory,
/// overwriting what is there. Requires the database lock, so an open
/// `Database` blocks the restore. Returns the restored file names.
pub fn restore_from_backup(config: &DbConfig, db: &str, archive: &Path) -> Result<Vec<String>> {
    let _lock = DbLock::acquire(config, db)?;

    let bytes = std::fs::read(archive)
        .wrap_err_with(|| format!("failed to read backup archive {}", archive.display()))?;
    let header = BackupFileHeader::from_bytes(&bytes)
        .wrap_err_with(|| format!("bad header in {}", archive.display()))?;

    // Validate the whole archive before touching the working directory.
    let mut entries = Vec::with_capacity(header.entry_count() as usize);
    let mut pos = FILE_HEADER_SIZE;
    for _ in 0..header.entry_count() {
        ensure!(pos + 4 <= bytes.len(), "backup archive truncated in entry header");
        let name_len =
            u32::from_le_bytes(bytes[pos..pos + 4].try_into().expect("length checked")) as usize;
        pos += 4;

        ensure!(pos + name_len <= bytes.len(), "backup archive truncated in file name");
        let name = std::str::from_utf8(&bytes[pos..pos + name_len])
            .map_err(|e| DbError::corruption(format!("backup entry name is not UTF-8: {}", e)))?
            .to_string();
        ensure!(
            !name.contains('/') && !name.contains('\\') && name != "..",
            "backup entry '{}' is not a plain file name",
            name
        );
        pos += name_len;

        ensure!(pos + 12 <= bytes.len(), "backup archive truncated in entry header");
        let data_len =
            u64::from_le_bytes(bytes[pos..pos + 8].try_into().expect("length checked")) as usize;
        pos += 8;
        let expected_crc = u32::from_le_bytes(bytes[pos..pos + 4].try_into().expect("length checked"));
        pos += 4;

        ensure!(
            pos + data_len <= bytes.len(),
            "backup entry '{}' overruns the archive",
            name
        );
        let data = &bytes[pos..pos + data_len];
        pos += data_len;

        let actual_crc = CRC32.checksum(data);
        if actual_crc != expected_crc {
            return Err(DbError::corruption(format!(
                "backup entry '{}' CRC mismatch ({:08x} != {:08x})",
                name, actual_crc, expected_crc
            ))
            .into());
        }
        entries.push((name, data));
    }
    ensure!(
        pos == bytes.len(),
        "backup archive has {} trailing bytes",
        bytes.len() - pos
    );

    let mut restored = Vec::with_capacity(entries.len());
    for (name, data) in entries {
        let target = config.workdir().join(&name);
        std::fs::write(&target, data)
            .wrap_err_with(|| format!("failed to restore {}", target.display()))?;
        restored.push(name);
    }

    info!(archive = %archive.display(), files = restored.len(), "backup restored");
    Ok(restored)
}
