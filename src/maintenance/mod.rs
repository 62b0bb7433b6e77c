//! # Maintenance Tools
//!
//! Offline operations over the persisted files of a closed database:
//! integrity checks, index rebuild, storage compaction, wasted-space
//! accounting, backup/restore, and a diagnostic dump. Every destructive
//! tool takes the database lock itself, so a running host application
//! blocks it instead of racing it.
//!
//! The tools trust the structure file for what *should* exist and the raw
//! data files for what *does*; crash recovery is detect (`check`) then
//! repair (`rebuild`/`defragment`), never silent in-place patching.

pub mod backup;
pub mod check;
pub mod dump;
pub mod rebuild;

pub use backup::{backup_database, restore_from_backup};
pub use check::{is_database_correct, low_level_check, CheckReport, TableCheck};
pub use dump::dump;
pub use rebuild::{compute_wasted_space, defragment, delete_index_files, rebuild_indexes};
