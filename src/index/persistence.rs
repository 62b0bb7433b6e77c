//! # Index Snapshots
//!
//! All indexes of one table persist into a single `.idx` file: a 64-byte
//! header followed by one CRC-32-protected block holding, per index, a
//! descriptor echo and its ordered entry list. The echo is validated against
//! the table structure on load, so a snapshot written for a different schema
//! is rejected instead of silently misinterpreted.
//!
//! A missing snapshot is not an error at this layer (the table opens with a
//! rebuild); a corrupt one is `DbError::Corruption`, and the caller decides
//! between failing and rebuilding.

use super::{Index, IndexEntry, IndexKey};
use crate::error::DbError;
use crate::schema::TableStructure;
use crate::storage::headers::IndexFileHeader;
use crate::storage::row_codec::{decode_value, encode_value};
use crate::storage::{CRC32, FILE_HEADER_SIZE};
use eyre::{ensure, Result, WrapErr};
use std::path::Path;
use zerocopy::IntoBytes;

fn write_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend((s.len() as u32).to_le_bytes());
    buf.extend(s.as_bytes());
}

fn read_u8(bytes: &[u8], pos: &mut usize) -> Result<u8> {
    ensure!(*pos < bytes.len(), "unexpected end of index snapshot");
    let v = bytes[*pos];
    *pos += 1;
    Ok(v)
}

fn read_u32(bytes: &[u8], pos: &mut usize) -> Result<u32> {
    ensure!(
        *pos + 4 <= bytes.len(),
        "unexpected end of index snapshot reading u32"
    );
    let v = u32::from_le_bytes(bytes[*pos..*pos + 4].try_into().expect("length checked"));
    *pos += 4;
    Ok(v)
}

fn read_u64(bytes: &[u8], pos: &mut usize) -> Result<u64> {
    ensure!(
        *pos + 8 <= bytes.len(),
        "unexpected end of index snapshot reading u64"
    );
    let v = u64::from_le_bytes(bytes[*pos..*pos + 8].try_into().expect("length checked"));
    *pos += 8;
    Ok(v)
}

fn read_string(bytes: &[u8], pos: &mut usize) -> Result<String> {
    let len = read_u32(bytes, pos)? as usize;
    ensure!(
        *pos + len <= bytes.len(),
        "string of {} bytes exceeds index snapshot",
        len
    );
    let s = std::str::from_utf8(&bytes[*pos..*pos + len])
        .map_err(|e| eyre::eyre!("invalid UTF-8 in index snapshot: {}", e))?
        .to_string();
    *pos += len;
    Ok(s)
}

/// Writes the snapshot of all `indexes` to `path`, replacing any previous
/// snapshot.
pub fn save_indexes(path: &Path, indexes: &[Index]) -> Result<()> {
    let mut block = Vec::new();

    for index in indexes {
        let def = index.def();
        block.extend((def.columns().len() as u32).to_le_bytes());
        for column in def.columns() {
            write_string(&mut block, column);
        }
        match def.value_column() {
            Some(value) => {
                block.push(1);
                write_string(&mut block, value);
            }
            None => block.push(0),
        }

        block.extend(index.entry_count().to_le_bytes());
        for (key, entry) in index.iter() {
            for value in key.values() {
                encode_value(value, &mut block);
            }
            block.extend(entry.record_id.to_le_bytes());
            match &entry.value {
                Some(value) => {
                    block.push(1);
                    encode_value(value, &mut block);
                }
                None => block.push(0),
            }
        }
    }

    let header = IndexFileHeader::new(
        indexes.len() as u32,
        block.len() as u64,
        CRC32.checksum(&block),
    );

    let mut buf = Vec::with_capacity(FILE_HEADER_SIZE + block.len());
    buf.extend(header.as_bytes());
    buf.extend(&block);

    std::fs::write(path, &buf)
        .wrap_err_with(|| format!("failed to write index snapshot {}", path.display()))?;
    Ok(())
}

/// Reads the snapshot at `path` back into one `Index` per descriptor of
/// `table`, in declaration order.
pub fn load_indexes(path: &Path, table: &TableStructure) -> Result<Vec<Index>> {
    let bytes = std::fs::read(path)
        .wrap_err_with(|| format!("failed to read index snapshot {}", path.display()))?;

    let header = IndexFileHeader::from_bytes(&bytes)
        .wrap_err_with(|| format!("bad header in {}", path.display()))?;

    if header.index_count() as usize != table.indexes().len() {
        return Err(DbError::corruption(format!(
            "index snapshot {} holds {} indexes, schema declares {}",
            path.display(),
            header.index_count(),
            table.indexes().len()
        ))
        .into());
    }

    if bytes.len() != FILE_HEADER_SIZE + header.block_len() as usize {
        return Err(DbError::corruption(format!(
            "index snapshot {} is {} bytes, header promises {}",
            path.display(),
            bytes.len(),
            FILE_HEADER_SIZE + header.block_len() as usize
        ))
        .into());
    }

    let block = &bytes[FILE_HEADER_SIZE..];
    let actual_crc = CRC32.checksum(block);
    if actual_crc != header.block_crc() {
        return Err(DbError::corruption(format!(
            "index snapshot CRC mismatch in {} ({:08x} != {:08x})",
            path.display(),
            actual_crc,
            header.block_crc()
        ))
        .into());
    }

    let mut pos = 0;
    let mut indexes = Vec::with_capacity(table.indexes().len());

    for def in table.indexes() {
        let key_count = read_u32(block, &mut pos)? as usize;
        let mut echo_columns = Vec::with_capacity(key_count);
        for _ in 0..key_count {
            echo_columns.push(read_string(block, &mut pos)?);
        }
        let echo_value = if read_u8(block, &mut pos)? != 0 {
            Some(read_string(block, &mut pos)?)
        } else {
            None
        };

        if echo_columns != def.columns() || echo_value.as_deref() != def.value_column() {
            return Err(DbError::corruption(format!(
                "index snapshot descriptor '{}' does not match schema index '{}'",
                echo_columns.join("+"),
                def.describe()
            ))
            .into());
        }

        let mut index = Index::new(def.clone(), table)?;
        let entry_count = read_u64(block, &mut pos)?;
        for _ in 0..entry_count {
            let mut key_values = Vec::with_capacity(key_count);
            for _ in 0..key_count {
                let (value, next) = decode_value(block, pos)?;
                key_values.push(value);
                pos = next;
            }
            let record_id = read_u64(block, &mut pos)?;
            let value = if read_u8(block, &mut pos)? != 0 {
                let (value, next) = decode_value(block, pos)?;
                pos = next;
                Some(value)
            } else {
                None
            };
            index.insert_entry(IndexKey::new(key_values), IndexEntry { record_id, value });
        }
        indexes.push(index);
    }

    ensure!(
        pos == block.len(),
        "index snapshot has {} trailing bytes",
        block.len() - pos
    );

    Ok(indexes)
}
