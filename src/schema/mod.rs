//! # Schema Layer
//!
//! Persisted database schema: typed columns, index descriptors, table
//! structures, and the versioned `DbStructure` that owns them. The schema
//! lives in its own structure file, separate from the per-table data files.

pub mod persistence;
pub mod structure;
pub mod table;

pub use structure::{DbMode, DbStructure, VersionInfo};
pub use table::{ColumnDef, IndexDef, TableStructure};
