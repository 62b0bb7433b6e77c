//! # Structure Body Codec
//!
//! Manual little-endian serialization of the table set persisted in the
//! structure file. The format is length-prefixed throughout and every read
//! is bounds-checked with `ensure!`, so a truncated or bit-flipped body
//! surfaces as a structural error, never a panic.
//!
//! ```text
//! body := u32 table_count, table*
//! table := string name, u32 column_count, column*, u32 index_count, index*
//! column := string name, u8 type_tag, u8 is_key
//! index := u32 key_count, string*, u8 has_value, [string value_column]
//! string := u32 len, UTF-8 bytes
//! ```

use super::table::{ColumnDef, IndexDef, TableStructure};
use crate::types::ColumnType;
use eyre::{ensure, Result};

pub(crate) fn write_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend((s.len() as u32).to_le_bytes());
    buf.extend(s.as_bytes());
}

pub(crate) fn read_u8(bytes: &[u8], pos: &mut usize) -> Result<u8> {
    ensure!(*pos < bytes.len(), "unexpected end of structure data");
    let v = bytes[*pos];
    *pos += 1;
    Ok(v)
}

pub(crate) fn read_u32(bytes: &[u8], pos: &mut usize) -> Result<u32> {
    ensure!(
        *pos + 4 <= bytes.len(),
        "unexpected end of structure data reading u32"
    );
    let v = u32::from_le_bytes(bytes[*pos..*pos + 4].try_into().expect("length checked"));
    *pos += 4;
    Ok(v)
}

pub(crate) fn read_string(bytes: &[u8], pos: &mut usize) -> Result<String> {
    let len = read_u32(bytes, pos)? as usize;
    ensure!(
        *pos + len <= bytes.len(),
        "string of {} bytes exceeds structure data",
        len
    );
    let s = std::str::from_utf8(&bytes[*pos..*pos + len])
        .map_err(|e| eyre::eyre!("invalid UTF-8 in structure data: {}", e))?
        .to_string();
    *pos += len;
    Ok(s)
}

/// Serializes the table set into the structure file body.
pub fn encode_tables(tables: &[TableStructure]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend((tables.len() as u32).to_le_bytes());

    for table in tables {
        write_string(&mut buf, table.name());

        buf.extend((table.columns().len() as u32).to_le_bytes());
        for column in table.columns() {
            write_string(&mut buf, column.name());
            buf.push(column.column_type() as u8);
            buf.push(column.is_key() as u8);
        }

        buf.extend((table.indexes().len() as u32).to_le_bytes());
        for index in table.indexes() {
            buf.extend((index.columns().len() as u32).to_le_bytes());
            for column in index.columns() {
                write_string(&mut buf, column);
            }
            match index.value_column() {
                Some(value) => {
                    buf.push(1);
                    write_string(&mut buf, value);
                }
                None => buf.push(0),
            }
        }
    }

    buf
}

/// Decodes a structure file body back into the table set.
pub fn decode_tables(bytes: &[u8]) -> Result<Vec<TableStructure>> {
    let mut pos = 0;
    let table_count = read_u32(bytes, &mut pos)?;
    let mut tables = Vec::with_capacity(table_count as usize);

    for _ in 0..table_count {
        let name = read_string(bytes, &mut pos)?;

        let column_count = read_u32(bytes, &mut pos)?;
        let mut columns = Vec::with_capacity(column_count as usize);
        for _ in 0..column_count {
            let column_name = read_string(bytes, &mut pos)?;
            let column_type = ColumnType::try_from(read_u8(bytes, &mut pos)?)?;
            let is_key = read_u8(bytes, &mut pos)? != 0;
            columns.push(ColumnDef::new(column_name, column_type, is_key));
        }

        let index_count = read_u32(bytes, &mut pos)?;
        let mut indexes = Vec::with_capacity(index_count as usize);
        for _ in 0..index_count {
            let key_count = read_u32(bytes, &mut pos)?;
            let mut key_columns = Vec::with_capacity(key_count as usize);
            for _ in 0..key_count {
                key_columns.push(read_string(bytes, &mut pos)?);
            }
            let value_column = if read_u8(bytes, &mut pos)? != 0 {
                Some(read_string(bytes, &mut pos)?)
            } else {
                None
            };
            indexes.push(IndexDef::new(key_columns, value_column));
        }

        tables.push(TableStructure::from_parts(name, columns, indexes));
    }

    ensure!(
        pos == bytes.len(),
        "structure body has {} trailing bytes",
        bytes.len() - pos
    );

    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tables() -> Vec<TableStructure> {
        let mut people = TableStructure::new("People");
        people.create_column("Id", ColumnType::Int, true).unwrap();
        people
            .create_column("Name", ColumnType::String, true)
            .unwrap();
        people
            .create_column("Weight", ColumnType::Double, false)
            .unwrap();
        people.set_compound_index(&["Name"]).unwrap();
        people
            .set_compound_index_with_value(&["Name", "Id"], "Weight")
            .unwrap();

        let mut notes = TableStructure::new("Notes");
        notes
            .create_column("Created", ColumnType::DateTime, true)
            .unwrap();
        notes
            .create_column("Text", ColumnType::String, false)
            .unwrap();

        vec![people, notes]
    }

    #[test]
    fn table_set_roundtrip() {
        let tables = sample_tables();
        let body = encode_tables(&tables);
        let decoded = decode_tables(&body).unwrap();
        assert_eq!(decoded, tables);
    }

    #[test]
    fn empty_table_set_roundtrip() {
        let body = encode_tables(&[]);
        assert_eq!(decode_tables(&body).unwrap(), Vec::new());
    }

    #[test]
    fn truncated_body_is_rejected() {
        let body = encode_tables(&sample_tables());
        assert!(decode_tables(&body[..body.len() - 3]).is_err());
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut body = encode_tables(&sample_tables());
        body.push(0);
        assert!(decode_tables(&body).is_err());
    }
}
