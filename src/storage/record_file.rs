//! # Slotted Record Storage
//!
//! `RecordFile` persists the rows of one table as a sequence of slots with
//! stable integer record IDs. The design goals, in order:
//!
//! 1. **Stable IDs**: a record keeps its ID for life; IDs are never reused
//!    while the table exists, even across updates that relocate the row.
//! 2. **In-place update**: a row that does not outgrow its slot capacity is
//!    rewritten where it is; a growing row frees its slot and appends.
//! 3. **Free-slot reuse**: freed slots are reused for later inserts of the
//!    same table. Physical removal of freed slots is the offline
//!    `defragment` pass only.
//! 4. **Raw recoverability**: the file is self-describing enough for the
//!    maintenance tools to walk it slot by slot with nothing but the column
//!    count in hand.
//!
//! ## Slot Layout
//!
//! ```text
//! Offset  Size  Description
//! ------  ----  -----------------------------------------
//! 0       1     status: 0 = free, 1 = live
//! 1       3     padding
//! 4       4     payload_len: bytes of row payload in use
//! 8       4     capacity: bytes reserved for the payload
//! 12      4     reserved
//! 16      8     record_id
//! 24      cap   payload (row codec), zero-padded to capacity
//! ```
//!
//! ## Open Scan
//!
//! Opening walks every slot sequentially, rebuilding the ID → slot map and
//! the free list. Truncated slots, duplicate live IDs, and payloads that
//! overrun their capacity surface as `DbError::Corruption`. The header's
//! live count is kept for parity checks (`is_database_correct`) but the
//! scan result is what the open instance trusts.

use super::headers::TableFileHeader;
use super::{FILE_HEADER_SIZE, SLOT_FREE, SLOT_HEADER_SIZE, SLOT_LIVE};
use crate::error::DbError;
use eyre::{ensure, Result, WrapErr};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use zerocopy::IntoBytes;

/// Fragmentation accounting for one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WastedSpace {
    /// Slots present in the file, live and freed.
    pub total_record_count: u64,
    /// Live records.
    pub normal_record_count: u64,
}

#[derive(Debug, Clone, Copy)]
struct SlotLocation {
    offset: u64,
    capacity: u32,
}

/// Record storage for one table.
#[derive(Debug)]
pub struct RecordFile {
    file: File,
    path: PathBuf,
    column_count: u32,
    next_record_id: u64,
    live: BTreeMap<u64, SlotLocation>,
    free_slots: Vec<SlotLocation>,
    slot_count: u64,
    end_offset: u64,
    header_live_count: u64,
    header_slot_count: u64,
}

impl RecordFile {
    /// Creates a fresh, empty record file. Fails if the file exists.
    pub fn create(path: impl Into<PathBuf>, column_count: u32) -> Result<Self> {
        let path = path.into();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .wrap_err_with(|| format!("failed to create record file {}", path.display()))?;

        let header = TableFileHeader::new(column_count, 1, 0, 0);
        file.write_all(header.as_bytes())
            .wrap_err_with(|| format!("failed to write header of {}", path.display()))?;

        Ok(Self {
            file,
            path,
            column_count,
            next_record_id: 1,
            live: BTreeMap::new(),
            free_slots: Vec::new(),
            slot_count: 0,
            end_offset: FILE_HEADER_SIZE as u64,
            header_live_count: 0,
            header_slot_count: 0,
        })
    }

    /// Opens an existing record file and rebuilds its slot map by a full
    /// sequential scan.
    pub fn open(path: impl Into<PathBuf>, column_count: u32) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .wrap_err_with(|| format!("failed to open record file {}", path.display()))?;

        let file_len = file
            .metadata()
            .wrap_err_with(|| format!("failed to stat {}", path.display()))?
            .len();

        if file_len < FILE_HEADER_SIZE as u64 {
            return Err(DbError::corruption(format!(
                "record file {} is shorter than its header",
                path.display()
            ))
            .into());
        }

        let mut reader = BufReader::new(&file);
        let mut header_buf = [0u8; FILE_HEADER_SIZE];
        reader
            .read_exact(&mut header_buf)
            .wrap_err_with(|| format!("failed to read header of {}", path.display()))?;
        let header = TableFileHeader::from_bytes(&header_buf)
            .wrap_err_with(|| format!("bad header in {}", path.display()))?;

        if header.column_count() != column_count {
            return Err(DbError::corruption(format!(
                "record file {} holds {} columns, schema expects {}",
                path.display(),
                header.column_count(),
                column_count
            ))
            .into());
        }

        let header_live_count = header.live_count();
        let header_slot_count = header.slot_count();
        let header_next_id = header.next_record_id();

        let mut live = BTreeMap::new();
        let mut free_slots = Vec::new();
        let mut slot_count = 0u64;
        let mut max_id = 0u64;
        let mut pos = FILE_HEADER_SIZE as u64;
        let mut slot_buf = [0u8; SLOT_HEADER_SIZE];

        while pos < file_len {
            if pos + SLOT_HEADER_SIZE as u64 > file_len {
                return Err(DbError::corruption(format!(
                    "truncated slot header at offset {} in {}",
                    pos,
                    path.display()
                ))
                .into());
            }
            reader
                .read_exact(&mut slot_buf)
                .wrap_err_with(|| format!("failed to read slot at {}", pos))?;

            let status = slot_buf[0];
            let payload_len =
                u32::from_le_bytes(slot_buf[4..8].try_into().expect("length checked"));
            let capacity = u32::from_le_bytes(slot_buf[8..12].try_into().expect("length checked"));
            let record_id =
                u64::from_le_bytes(slot_buf[16..24].try_into().expect("length checked"));

            if status != SLOT_FREE && status != SLOT_LIVE {
                return Err(DbError::corruption(format!(
                    "slot at offset {} has status byte {}",
                    pos, status
                ))
                .into());
            }
            if payload_len > capacity {
                return Err(DbError::corruption(format!(
                    "slot at offset {} uses {} of {} bytes",
                    pos, payload_len, capacity
                ))
                .into());
            }
            let slot_end = pos + SLOT_HEADER_SIZE as u64 + capacity as u64;
            if slot_end > file_len {
                return Err(DbError::corruption(format!(
                    "slot at offset {} overruns the file ({} > {})",
                    pos, slot_end, file_len
                ))
                .into());
            }

            let location = SlotLocation {
                offset: pos,
                capacity,
            };
            if status == SLOT_LIVE {
                if live.insert(record_id, location).is_some() {
                    return Err(DbError::corruption(format!(
                        "record {} appears in more than one live slot",
                        record_id
                    ))
                    .into());
                }
            } else {
                free_slots.push(location);
            }
            // Freed slots keep their last record_id; it must still fence the
            // counter, or a crash-lost header flush would let a deleted
            // record's ID be handed out again.
            max_id = max_id.max(record_id);

            slot_count += 1;
            reader
                .seek(SeekFrom::Start(slot_end))
                .wrap_err("failed to seek past slot payload")?;
            pos = slot_end;
        }

        drop(reader);

        Ok(Self {
            file,
            path,
            column_count,
            next_record_id: header_next_id.max(max_id + 1),
            live,
            free_slots,
            slot_count,
            end_offset: file_len,
            header_live_count,
            header_slot_count,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn column_count(&self) -> u32 {
        self.column_count
    }

    /// Hands out the next record ID, advancing the counter.
    pub fn allocate_record_id(&mut self) -> u64 {
        let id = self.next_record_id;
        self.next_record_id += 1;
        id
    }

    pub fn next_record_id(&self) -> u64 {
        self.next_record_id
    }

    /// Restores the ID counter, used by compaction to preserve the no-reuse
    /// guarantee across a rewrite.
    pub fn set_next_record_id(&mut self, id: u64) {
        self.next_record_id = self.next_record_id.max(id);
    }

    pub fn live_count(&self) -> u64 {
        self.live.len() as u64
    }

    pub fn slot_count(&self) -> u64 {
        self.slot_count
    }

    /// Live count as recorded in the on-disk header at open time. Diverges
    /// from `live_count()` when a crash lost a header flush; the parity is
    /// checked by the maintenance tools.
    pub fn header_live_count(&self) -> u64 {
        self.header_live_count
    }

    pub fn header_slot_count(&self) -> u64 {
        self.header_slot_count
    }

    pub fn contains(&self, record_id: u64) -> bool {
        self.live.contains_key(&record_id)
    }

    /// Live record IDs in ascending order.
    pub fn record_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.live.keys().copied()
    }

    pub fn wasted_space(&self) -> WastedSpace {
        WastedSpace {
            total_record_count: self.slot_count,
            normal_record_count: self.live.len() as u64,
        }
    }

    /// Inserts a new record payload under `record_id`, reusing a freed slot
    /// when one is large enough.
    pub fn insert(&mut self, record_id: u64, payload: &[u8]) -> Result<()> {
        ensure!(
            !self.live.contains_key(&record_id),
            "record {} already present in storage",
            record_id
        );
        let location = self.allocate_slot(payload.len())?;
        self.write_slot(location, record_id, payload)?;
        self.live.insert(record_id, location);
        Ok(())
    }

    /// Rewrites the payload of a live record, in place when it fits.
    pub fn update(&mut self, record_id: u64, payload: &[u8]) -> Result<()> {
        let location = match self.live.get(&record_id) {
            Some(loc) => *loc,
            None => return Err(DbError::RecordAlreadyDeleted(record_id).into()),
        };

        if payload.len() <= location.capacity as usize {
            self.write_slot(location, record_id, payload)?;
            return Ok(());
        }

        // Outgrew the slot: free it and place the row elsewhere.
        self.mark_free(location)?;
        self.free_slots.push(location);
        let new_location = self.allocate_slot(payload.len())?;
        self.write_slot(new_location, record_id, payload)?;
        self.live.insert(record_id, new_location);
        Ok(())
    }

    /// Frees the slot of a live record. Double delete is a loud misuse
    /// error, never a silent no-op.
    pub fn delete(&mut self, record_id: u64) -> Result<()> {
        let location = match self.live.remove(&record_id) {
            Some(loc) => loc,
            None => return Err(DbError::RecordAlreadyDeleted(record_id).into()),
        };
        self.mark_free(location)?;
        self.free_slots.push(location);
        Ok(())
    }

    /// Reads the payload of a live record, or None for a freed/unknown ID.
    pub fn read(&mut self, record_id: u64) -> Result<Option<Vec<u8>>> {
        let location = match self.live.get(&record_id) {
            Some(loc) => *loc,
            None => return Ok(None),
        };

        let mut slot_buf = [0u8; SLOT_HEADER_SIZE];
        self.file
            .seek(SeekFrom::Start(location.offset))
            .wrap_err("failed to seek to slot")?;
        self.file
            .read_exact(&mut slot_buf)
            .wrap_err_with(|| format!("failed to read slot header of record {}", record_id))?;

        let payload_len = u32::from_le_bytes(slot_buf[4..8].try_into().expect("length checked"));
        if payload_len > location.capacity {
            return Err(DbError::corruption(format!(
                "record {} payload length {} exceeds slot capacity {}",
                record_id, payload_len, location.capacity
            ))
            .into());
        }

        let mut payload = vec![0u8; payload_len as usize];
        self.file
            .read_exact(&mut payload)
            .wrap_err_with(|| format!("failed to read payload of record {}", record_id))?;
        Ok(Some(payload))
    }

    /// Persists the header (ID counter and counts) and syncs file data.
    pub fn flush(&mut self) -> Result<()> {
        let header = TableFileHeader::new(
            self.column_count,
            self.next_record_id,
            self.live.len() as u64,
            self.slot_count,
        );
        self.file
            .seek(SeekFrom::Start(0))
            .wrap_err("failed to seek to header")?;
        self.file
            .write_all(header.as_bytes())
            .wrap_err_with(|| format!("failed to write header of {}", self.path.display()))?;
        self.file
            .sync_data()
            .wrap_err_with(|| format!("failed to sync {}", self.path.display()))?;
        self.header_live_count = self.live.len() as u64;
        self.header_slot_count = self.slot_count;
        Ok(())
    }

    fn allocate_slot(&mut self, payload_len: usize) -> Result<SlotLocation> {
        ensure!(
            payload_len <= u32::MAX as usize,
            "row payload of {} bytes exceeds the slot limit",
            payload_len
        );

        if let Some(idx) = self
            .free_slots
            .iter()
            .position(|slot| slot.capacity as usize >= payload_len)
        {
            return Ok(self.free_slots.swap_remove(idx));
        }

        let location = SlotLocation {
            offset: self.end_offset,
            capacity: payload_len as u32,
        };
        self.end_offset += (SLOT_HEADER_SIZE + payload_len) as u64;
        self.slot_count += 1;
        Ok(location)
    }

    fn write_slot(&mut self, location: SlotLocation, record_id: u64, payload: &[u8]) -> Result<()> {
        let mut buf = Vec::with_capacity(SLOT_HEADER_SIZE + payload.len());
        buf.push(SLOT_LIVE);
        buf.extend([0u8; 3]);
        buf.extend((payload.len() as u32).to_le_bytes());
        buf.extend(location.capacity.to_le_bytes());
        buf.extend([0u8; 4]);
        buf.extend(record_id.to_le_bytes());
        buf.extend(payload);

        self.file
            .seek(SeekFrom::Start(location.offset))
            .wrap_err("failed to seek to slot")?;
        self.file
            .write_all(&buf)
            .wrap_err_with(|| format!("failed to write record {}", record_id))?;
        Ok(())
    }

    fn mark_free(&mut self, location: SlotLocation) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(location.offset))
            .wrap_err("failed to seek to slot")?;
        self.file
            .write_all(&[SLOT_FREE])
            .wrap_err("failed to mark slot free")?;
        Ok(())
    }
}
