//! # File Header Definitions
//!
//! Type-safe, zerocopy-based header structs for all pimdb file types. Each
//! file type has a 64-byte header at the beginning that contains magic
//! bytes, a format version, and type-specific metadata.
//!
//! ## File Types
//!
//! 1. **`.dbs`**: database structure (StructureFileHeader)
//!    - schema version, Create/Open mode marker, build string length,
//!      body length and CRC-32 of the serialized table set
//! 2. **`.tbd`**: record storage (TableFileHeader)
//!    - next record ID, live record count, total slot count
//! 3. **`.idx`**: index snapshot (IndexFileHeader)
//!    - index count, entry block length and CRC-32
//! 4. **backup archive** (BackupFileHeader)
//!    - entry count
//!
//! ## Zerocopy Safety
//!
//! All header structs use zerocopy traits for safe, zero-copy parsing:
//! `FromBytes`, `IntoBytes`, `Immutable`, `KnownLayout`, `Unaligned`.
//! Compile-time asserts pin every header to exactly 64 bytes.
//!
//! ## Endianness
//!
//! All multi-byte fields use little-endian encoding via zerocopy's
//! `U32`/`U64` wrappers.

use eyre::{ensure, Result};
use zerocopy::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::FILE_HEADER_SIZE;

pub const STRUCT_MAGIC: &[u8; 16] = b"pimdb struct v1\0";
pub const TABLE_MAGIC: &[u8; 16] = b"pimdb table v1\0\0";
pub const INDEX_MAGIC: &[u8; 16] = b"pimdb index v1\0\0";
pub const BACKUP_MAGIC: &[u8; 16] = b"pimdb backup v1\0";

pub const CURRENT_FORMAT_VERSION: u32 = 1;

pub const MODE_CREATE: u8 = 0;
pub const MODE_OPEN: u8 = 1;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct StructureFileHeader {
    magic: [u8; 16],
    format_version: U32,
    db_version: U32,
    mode: u8,
    _pad: [u8; 3],
    build_len: U32,
    body_len: U32,
    body_crc: U32,
    reserved: [u8; 24],
}

const _: () = assert!(std::mem::size_of::<StructureFileHeader>() == FILE_HEADER_SIZE);

impl StructureFileHeader {
    pub fn new(db_version: u32, mode: u8, build_len: u32, body_len: u32, body_crc: u32) -> Self {
        Self {
            magic: *STRUCT_MAGIC,
            format_version: U32::new(CURRENT_FORMAT_VERSION),
            db_version: U32::new(db_version),
            mode,
            _pad: [0u8; 3],
            build_len: U32::new(build_len),
            body_len: U32::new(body_len),
            body_crc: U32::new(body_crc),
            reserved: [0u8; 24],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        ensure!(
            bytes.len() >= FILE_HEADER_SIZE,
            "buffer too small for StructureFileHeader: {} < {}",
            bytes.len(),
            FILE_HEADER_SIZE
        );

        let header = Self::ref_from_bytes(&bytes[..FILE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse StructureFileHeader: {:?}", e))?;

        ensure!(
            &header.magic == STRUCT_MAGIC,
            "invalid magic bytes in structure file"
        );

        ensure!(
            header.format_version.get() == CURRENT_FORMAT_VERSION,
            "unsupported structure file format: {} (expected {})",
            header.format_version.get(),
            CURRENT_FORMAT_VERSION
        );

        Ok(header)
    }

    pub fn db_version(&self) -> u32 {
        self.db_version.get()
    }

    pub fn mode(&self) -> u8 {
        self.mode
    }

    pub fn build_len(&self) -> u32 {
        self.build_len.get()
    }

    pub fn body_len(&self) -> u32 {
        self.body_len.get()
    }

    pub fn body_crc(&self) -> u32 {
        self.body_crc.get()
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct TableFileHeader {
    magic: [u8; 16],
    format_version: U32,
    column_count: U32,
    next_record_id: U64,
    live_count: U64,
    slot_count: U64,
    reserved: [u8; 16],
}

const _: () = assert!(std::mem::size_of::<TableFileHeader>() == FILE_HEADER_SIZE);

impl TableFileHeader {
    pub fn new(column_count: u32, next_record_id: u64, live_count: u64, slot_count: u64) -> Self {
        Self {
            magic: *TABLE_MAGIC,
            format_version: U32::new(CURRENT_FORMAT_VERSION),
            column_count: U32::new(column_count),
            next_record_id: U64::new(next_record_id),
            live_count: U64::new(live_count),
            slot_count: U64::new(slot_count),
            reserved: [0u8; 16],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        ensure!(
            bytes.len() >= FILE_HEADER_SIZE,
            "buffer too small for TableFileHeader: {} < {}",
            bytes.len(),
            FILE_HEADER_SIZE
        );

        let header = Self::ref_from_bytes(&bytes[..FILE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse TableFileHeader: {:?}", e))?;

        ensure!(
            &header.magic == TABLE_MAGIC,
            "invalid magic bytes in record storage file"
        );

        ensure!(
            header.format_version.get() == CURRENT_FORMAT_VERSION,
            "unsupported record storage format: {} (expected {})",
            header.format_version.get(),
            CURRENT_FORMAT_VERSION
        );

        Ok(header)
    }

    pub fn column_count(&self) -> u32 {
        self.column_count.get()
    }

    pub fn next_record_id(&self) -> u64 {
        self.next_record_id.get()
    }

    pub fn set_next_record_id(&mut self, id: u64) {
        self.next_record_id = U64::new(id);
    }

    pub fn live_count(&self) -> u64 {
        self.live_count.get()
    }

    pub fn set_live_count(&mut self, count: u64) {
        self.live_count = U64::new(count);
    }

    pub fn slot_count(&self) -> u64 {
        self.slot_count.get()
    }

    pub fn set_slot_count(&mut self, count: u64) {
        self.slot_count = U64::new(count);
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct IndexFileHeader {
    magic: [u8; 16],
    format_version: U32,
    index_count: U32,
    block_len: U64,
    block_crc: U32,
    reserved: [u8; 28],
}

const _: () = assert!(std::mem::size_of::<IndexFileHeader>() == FILE_HEADER_SIZE);

impl IndexFileHeader {
    pub fn new(index_count: u32, block_len: u64, block_crc: u32) -> Self {
        Self {
            magic: *INDEX_MAGIC,
            format_version: U32::new(CURRENT_FORMAT_VERSION),
            index_count: U32::new(index_count),
            block_len: U64::new(block_len),
            block_crc: U32::new(block_crc),
            reserved: [0u8; 28],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        ensure!(
            bytes.len() >= FILE_HEADER_SIZE,
            "buffer too small for IndexFileHeader: {} < {}",
            bytes.len(),
            FILE_HEADER_SIZE
        );

        let header = Self::ref_from_bytes(&bytes[..FILE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse IndexFileHeader: {:?}", e))?;

        ensure!(
            &header.magic == INDEX_MAGIC,
            "invalid magic bytes in index file"
        );

        ensure!(
            header.format_version.get() == CURRENT_FORMAT_VERSION,
            "unsupported index file format: {} (expected {})",
            header.format_version.get(),
            CURRENT_FORMAT_VERSION
        );

        Ok(header)
    }

    pub fn index_count(&self) -> u32 {
        self.index_count.get()
    }

    pub fn block_len(&self) -> u64 {
        self.block_len.get()
    }

    pub fn block_crc(&self) -> u32 {
        self.block_crc.get()
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct BackupFileHeader {
    magic: [u8; 16],
    format_version: U32,
    entry_count: U32,
    reserved: [u8; 40],
}

const _: () = assert!(std::mem::size_of::<BackupFileHeader>() == FILE_HEADER_SIZE);

impl BackupFileHeader {
    pub fn new(entry_count: u32) -> Self {
        Self {
            magic: *BACKUP_MAGIC,
            format_version: U32::new(CURRENT_FORMAT_VERSION),
            entry_count: U32::new(entry_count),
            reserved: [0u8; 40],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        ensure!(
            bytes.len() >= FILE_HEADER_SIZE,
            "buffer too small for BackupFileHeader: {} < {}",
            bytes.len(),
            FILE_HEADER_SIZE
        );

        let header = Self::ref_from_bytes(&bytes[..FILE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse BackupFileHeader: {:?}", e))?;

        ensure!(
            &header.magic == BACKUP_MAGIC,
            "invalid magic bytes in backup archive"
        );

        ensure!(
            header.format_version.get() == CURRENT_FORMAT_VERSION,
            "unsupported backup archive format: {} (expected {})",
            header.format_version.get(),
            CURRENT_FORMAT_VERSION
        );

        Ok(header)
    }

    pub fn entry_count(&self) -> u32 {
        self.entry_count.get()
    }
}
