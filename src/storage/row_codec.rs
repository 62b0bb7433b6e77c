//! # Row Codec
//!
//! Typed serialization of record rows and single values. The same codec
//! serves record payloads, index keys, and inline index values, so every
//! persisted `Value` has exactly one byte representation.
//!
//! ## Encoding
//!
//! Each value is a type tag byte (the `ColumnType` discriminant) followed by
//! its payload:
//!
//! ```text
//! Int       tag 0 | i64 LE
//! String    tag 1 | u32 LE length | UTF-8 bytes
//! DateTime  tag 2 | i64 LE (microseconds)
//! Double    tag 3 | f64 LE bits
//! ```
//!
//! A row is its values concatenated in column order; the column count comes
//! from the table structure, not the payload. Decoding is bounds-checked
//! with `ensure!` and type-checked against the expected column types, so a
//! corrupted slot surfaces as a structural error instead of garbage values.

use crate::error::DbError;
use crate::schema::ColumnDef;
use crate::types::{ColumnType, Value};
use eyre::{ensure, Result};

/// Appends one encoded value to `buf`.
pub fn encode_value(value: &Value, buf: &mut Vec<u8>) {
    buf.push(value.column_type() as u8);
    match value {
        Value::Int(v) | Value::DateTime(v) => buf.extend(v.to_le_bytes()),
        Value::Double(v) => buf.extend(v.to_bits().to_le_bytes()),
        Value::String(v) => {
            buf.extend((v.len() as u32).to_le_bytes());
            buf.extend(v.as_bytes());
        }
    }
}

/// Decodes one value starting at `pos`, returning it and the next offset.
pub fn decode_value(bytes: &[u8], mut pos: usize) -> Result<(Value, usize)> {
    ensure!(pos < bytes.len(), "unexpected end of data reading value tag");
    let ty = ColumnType::try_from(bytes[pos])?;
    pos += 1;

    match ty {
        ColumnType::Int | ColumnType::DateTime => {
            ensure!(
                pos + 8 <= bytes.len(),
                "unexpected end of data reading {} payload",
                ty
            );
            let raw = i64::from_le_bytes(bytes[pos..pos + 8].try_into().expect("length checked"));
            pos += 8;
            let value = match ty {
                ColumnType::Int => Value::Int(raw),
                _ => Value::DateTime(raw),
            };
            Ok((value, pos))
        }
        ColumnType::Double => {
            ensure!(
                pos + 8 <= bytes.len(),
                "unexpected end of data reading double payload"
            );
            let bits = u64::from_le_bytes(bytes[pos..pos + 8].try_into().expect("length checked"));
            pos += 8;
            Ok((Value::Double(f64::from_bits(bits)), pos))
        }
        ColumnType::String => {
            ensure!(
                pos + 4 <= bytes.len(),
                "unexpected end of data reading string length"
            );
            let len =
                u32::from_le_bytes(bytes[pos..pos + 4].try_into().expect("length checked")) as usize;
            pos += 4;
            ensure!(
                pos + len <= bytes.len(),
                "string payload of {} bytes exceeds buffer",
                len
            );
            let text = std::str::from_utf8(&bytes[pos..pos + len])
                .map_err(|e| eyre::eyre!("invalid UTF-8 in string value: {}", e))?
                .to_string();
            pos += len;
            Ok((Value::String(text), pos))
        }
    }
}

/// Encodes a full row in column order.
pub fn encode_row(values: &[Value], buf: &mut Vec<u8>) {
    for value in values {
        encode_value(value, buf);
    }
}

/// Decodes a full row, validating value types against `columns`.
pub fn decode_row(bytes: &[u8], columns: &[ColumnDef]) -> Result<Vec<Value>> {
    let mut values = Vec::with_capacity(columns.len());
    let mut pos = 0;

    for column in columns {
        let (value, next) = decode_value(bytes, pos)?;
        if value.column_type() != column.column_type() {
            return Err(DbError::corruption(format!(
                "column '{}' stored as {}, expected {}",
                column.name(),
                value.column_type(),
                column.column_type()
            ))
            .into());
        }
        values.push(value);
        pos = next;
    }

    ensure!(
        pos == bytes.len(),
        "row payload has {} trailing bytes",
        bytes.len() - pos
    );

    Ok(values)
}
