//! # pimdb - Embedded Record Store
//!
//! pimdb is the embedded record-oriented database engine behind a desktop
//! personal-information manager. It persists a versioned schema (tables,
//! typed columns, single and compound indexes), stores rows in slotted
//! per-table files with free-space reuse, and serves index-ordered cursors
//! that stay correct while the current record is deleted or rewritten
//! mid-iteration.
//!
//! ## Quick Start
//!
//! ```ignore
//! use pimdb::{ColumnType, DbConfig, DbStructure};
//!
//! let config = DbConfig::new("./data");
//! let mut structure = DbStructure::create("MyPal", "build-1");
//! let people = structure.create_table("People")?;
//! people.create_column("Id", ColumnType::Int, true)?;
//! people.create_column("Name", ColumnType::String, true)?;
//! people.set_compound_index(&["Name"])?;
//! structure.save_structure(&config)?;
//!
//! let db = structure.open_database(&config)?;
//! let people = db.table("People")?;
//! let mut record = people.new_record()?;
//! record.set_value("Id", 1i64)?;
//! record.set_value("Name", "zhu0")?;
//! people.commit(&mut record)?;
//! db.shutdown()?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │       Database facade (Table,        │
//! │       Record, ResultSet)             │
//! ├──────────────────────────────────────┤
//! │  Schema (DbStructure)  │  Indexes    │
//! ├────────────────────────┴─────────────┤
//! │    Row codec (typed values)          │
//! ├──────────────────────────────────────┤
//! │    Slotted record storage (.tbd)     │
//! └──────────────────────────────────────┘
//! ```
//!
//! ## File Layout
//!
//! ```text
//! workdir/
//! ├── MyPal.dbs          # structure file (schema, build, version)
//! ├── MyPal.People.tbd   # record storage, one per table
//! ├── MyPal.People.idx   # index snapshot, one per table
//! └── MyPal.lock         # advisory lock while the database is open
//! ```
//!
//! ## Durability Model
//!
//! Single-record commit semantics, no write-ahead log: mutations hit
//! storage at commit time, headers and index snapshots persist on flush and
//! shutdown. A crash in between is detected and repaired by the
//! [`maintenance`] tools (`is_database_correct`, `rebuild_indexes`,
//! `defragment`), which are also exposed through the `pimdb-repair` binary.
//!
//! ## Module Overview
//!
//! - [`types`]: column types and the `Value` sum type
//! - [`schema`]: table/column/index descriptors and the structure file
//! - [`storage`]: file headers, row codec, slotted record files
//! - [`index`]: ordered indexes and their snapshots
//! - [`database`]: the runtime facade (tables, records, result sets)
//! - [`maintenance`]: check, rebuild, defragment, backup, dump
//! - [`config`]: explicit engine configuration

pub mod config;
pub mod database;
pub mod error;
pub mod index;
pub mod maintenance;
pub mod schema;
pub mod storage;
pub mod types;

pub use config::DbConfig;
pub use database::{Database, Record, ResultSet, Table};
pub use error::DbError;
pub use schema::{ColumnDef, DbMode, DbStructure, IndexDef, TableStructure, VersionInfo};
pub use storage::WastedSpace;
pub use types::{ColumnType, Value};
