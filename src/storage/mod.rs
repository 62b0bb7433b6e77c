//! # Storage Layer
//!
//! Per-table record storage with stable integer IDs, free-slot reuse, and
//! raw-file recoverability. This is the layer the maintenance tools operate
//! on directly: a record file can be validated and compacted without the
//! structure file being in memory.
//!
//! ## File Layout
//!
//! Every pimdb file starts with a fixed 64-byte header carrying magic bytes
//! and a format version (see `headers`). A record storage file continues
//! with a sequence of slots:
//!
//! ```text
//! +------------------+ offset 0
//! | File header (64B)|  magic, format version, next id, live count
//! +------------------+ offset 64
//! | Slot 0           |  status, payload len, capacity, record id, payload
//! +------------------+
//! | Slot 1           |
//! +------------------+
//! | ...              |
//! ```
//!
//! Slots are never moved while the database is open; an update that outgrows
//! its slot frees the old slot and appends a new one under the same record
//! ID. Compaction (dropping freed slots) happens only in the offline
//! `defragment` maintenance pass.
//!
//! ## Durability Model
//!
//! Record mutations are written to the file at commit time; the header
//! (counts, next ID) and the index snapshots are persisted on flush and
//! shutdown. A crash in between is a detect-and-repair case for the
//! maintenance tools, not something the hot path prevents.
//!
//! ## Module Organization
//!
//! - `headers`: zerocopy file headers shared by all pimdb file types
//! - `row_codec`: typed row serialization (tag byte + little-endian payload)
//! - `record_file`: the slotted record store itself

pub mod headers;
pub mod record_file;
pub mod row_codec;

use crc::{Crc, CRC_32_ISO_HDLC};

pub use record_file::{RecordFile, WastedSpace};

/// Checksum used for every variable-length persisted payload.
pub const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Size of the fixed header at the start of every pimdb file.
pub const FILE_HEADER_SIZE: usize = 64;

/// Size of the fixed per-slot header in record storage files.
pub const SLOT_HEADER_SIZE: usize = 24;

pub const SLOT_FREE: u8 = 0;
pub const SLOT_LIVE: u8 = 1;
