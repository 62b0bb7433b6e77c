//! # Database Structure
//!
//! The persisted schema of one database: a named, versioned set of table
//! structures. The structure file is separate from the data files; it is
//! the source of truth for what tables and indexes *should* exist, while
//! the maintenance tools validate the data files against it.
//!
//! ## Lifecycle
//!
//! - `DbStructure::create` starts a fresh schema in Create mode (version 0,
//!   bumped to 1 by the first `save_structure`).
//! - `save_structure` serializes schema + build tag + version, incrementing
//!   the version each time.
//! - `load_structure` reads it back in Open mode, optionally validating the
//!   record storage file of every table (`low_level`).
//! - `load_version_info` is the cheap diagnostic path: header and build
//!   string only, no table opens.

use super::persistence::{decode_tables, encode_tables};
use super::table::TableStructure;
use crate::config::DbConfig;
use crate::database::Database;
use crate::error::DbError;
use crate::storage::headers::{StructureFileHeader, MODE_CREATE, MODE_OPEN};
use crate::storage::{RecordFile, CRC32, FILE_HEADER_SIZE};
use eyre::{ensure, Result, WrapErr};
use tracing::{debug, info};
use zerocopy::IntoBytes;

/// Whether this structure was freshly created or loaded from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbMode {
    Create,
    Open,
}

impl DbMode {
    fn as_byte(self) -> u8 {
        match self {
            DbMode::Create => MODE_CREATE,
            DbMode::Open => MODE_OPEN,
        }
    }

    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            MODE_CREATE => Ok(DbMode::Create),
            MODE_OPEN => Ok(DbMode::Open),
            other => Err(DbError::corruption(format!(
                "structure file carries unknown mode byte {}",
                other
            ))
            .into()),
        }
    }
}

/// Build tag and schema version, as read by `load_version_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub build: String,
    pub version: u32,
}

/// The schema of one database.
#[derive(Debug, Clone)]
pub struct DbStructure {
    name: String,
    build: String,
    version: u32,
    mode: DbMode,
    tables: Vec<TableStructure>,
}

impl DbStructure {
    /// Starts a fresh schema in Create mode.
    pub fn create(name: impl Into<String>, build: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            build: build.into(),
            version: 0,
            mode: DbMode::Create,
            tables: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn build(&self) -> &str {
        &self.build
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn mode(&self) -> DbMode {
        self.mode
    }

    pub fn tables(&self) -> &[TableStructure] {
        &self.tables
    }

    /// Adds a new table to the schema.
    pub fn create_table(&mut self, name: impl Into<String>) -> Result<&mut TableStructure> {
        let name = name.into();
        if self.tables.iter().any(|t| t.name() == name) {
            return Err(DbError::TableAlreadyExists(name).into());
        }
        self.tables.push(TableStructure::new(name));
        Ok(self.tables.last_mut().expect("just pushed"))
    }

    /// Looks up a table by name.
    pub fn table(&self, name: &str) -> Result<&TableStructure> {
        self.tables
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| DbError::TableDoesNotExist(name.to_string()).into())
    }

    /// Persists schema, build tag, and version to the structure file,
    /// incrementing the version first.
    pub fn save_structure(&mut self, config: &DbConfig) -> Result<()> {
        self.version += 1;

        let body = encode_tables(&self.tables);
        let header = StructureFileHeader::new(
            self.version,
            self.mode.as_byte(),
            self.build.len() as u32,
            body.len() as u32,
            CRC32.checksum(&body),
        );

        let mut buf = Vec::with_capacity(FILE_HEADER_SIZE + self.build.len() + body.len());
        buf.extend(header.as_bytes());
        buf.extend(self.build.as_bytes());
        buf.extend(&body);

        let path = config.structure_path(&self.name);
        std::fs::write(&path, &buf)
            .wrap_err_with(|| format!("failed to write structure file {}", path.display()))?;

        info!(
            db = %self.name,
            version = self.version,
            tables = self.tables.len(),
            "structure saved"
        );
        Ok(())
    }

    /// Loads the schema from disk in Open mode. With `low_level`, also opens
    /// and scans the record storage file of every table, so a table that
    /// cannot be opened fails the load instead of the first data access.
    pub fn load_structure(config: &DbConfig, name: &str, low_level: bool) -> Result<Self> {
        let path = config.structure_path(name);
        let bytes = std::fs::read(&path)
            .wrap_err_with(|| format!("failed to read structure file {}", path.display()))?;

        let header = StructureFileHeader::from_bytes(&bytes)
            .wrap_err_with(|| format!("bad header in {}", path.display()))?;
        DbMode::from_byte(header.mode())?;
        let build_len = header.build_len() as usize;
        let body_len = header.body_len() as usize;

        if bytes.len() != FILE_HEADER_SIZE + build_len + body_len {
            return Err(DbError::corruption(format!(
                "structure file {} is {} bytes, header promises {}",
                path.display(),
                bytes.len(),
                FILE_HEADER_SIZE + build_len + body_len
            ))
            .into());
        }

        let build = std::str::from_utf8(&bytes[FILE_HEADER_SIZE..FILE_HEADER_SIZE + build_len])
            .map_err(|e| DbError::corruption(format!("build tag is not UTF-8: {}", e)))?
            .to_string();

        let body = &bytes[FILE_HEADER_SIZE + build_len..];
        let actual_crc = CRC32.checksum(body);
        if actual_crc != header.body_crc() {
            return Err(DbError::corruption(format!(
                "structure body CRC mismatch in {} ({:08x} != {:08x})",
                path.display(),
                actual_crc,
                header.body_crc()
            ))
            .into());
        }

        let tables = decode_tables(body)
            .map_err(|e| DbError::corruption(format!("undecodable structure body: {}", e)))?;

        if low_level {
            for table in &tables {
                let data_path = config.table_data_path(name, table.name());
                RecordFile::open(&data_path, table.columns().len() as u32).wrap_err_with(|| {
                    format!("table '{}' cannot be opened", table.name())
                })?;
                debug!(table = table.name(), "low-level table validation passed");
            }
        }

        info!(
            db = name,
            version = header.db_version(),
            tables = tables.len(),
            low_level,
            "structure loaded"
        );

        Ok(Self {
            name: name.to_string(),
            build,
            version: header.db_version(),
            mode: DbMode::Open,
            tables,
        })
    }

    /// Reads only build tag and version, without decoding the table set or
    /// touching any data file.
    pub fn load_version_info(config: &DbConfig, name: &str) -> Result<VersionInfo> {
        let path = config.structure_path(name);
        let bytes = std::fs::read(&path)
            .wrap_err_with(|| format!("failed to read structure file {}", path.display()))?;

        let header = StructureFileHeader::from_bytes(&bytes)
            .wrap_err_with(|| format!("bad header in {}", path.display()))?;

        let build_len = header.build_len() as usize;
        ensure!(
            bytes.len() >= FILE_HEADER_SIZE + build_len,
            "structure file {} truncated inside the build tag",
            path.display()
        );
        let build = std::str::from_utf8(&bytes[FILE_HEADER_SIZE..FILE_HEADER_SIZE + build_len])
            .map_err(|e| DbError::corruption(format!("build tag is not UTF-8: {}", e)))?
            .to_string();

        Ok(VersionInfo {
            build,
            version: header.db_version(),
        })
    }

    /// Opens the runtime database facade over all tables in this schema.
    pub fn open_database(&self, config: &DbConfig) -> Result<Database> {
        Database::open(config, self.clone())
    }
}
