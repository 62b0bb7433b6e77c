//! # Column Type System
//!
//! This module provides the canonical `ColumnType` enum and the `Value` sum
//! type used across schema definitions, record storage, and index keys.
//!
//! ## Design Principles
//!
//! 1. **Single source of truth**: one `ColumnType` enum used everywhere
//! 2. **Storage-efficient**: `#[repr(u8)]` for a single-byte discriminant
//! 3. **Closed set**: a column holds exactly one of the supported types;
//!    a type mismatch is caught at `Record::set_value`, not at commit time
//!
//! ## Supported Types
//!
//! | Type | Payload | Encoding |
//! |----------|----------------------------|--------------------|
//! | Int | `i64` | 8 bytes LE |
//! | String | UTF-8 text | u32 length + bytes |
//! | DateTime | `i64` microseconds (Unix) | 8 bytes LE |
//! | Double | `f64` | 8 bytes LE bits |
//!
//! ## Ordering
//!
//! `Value` carries a total order so index keys can be compared without a
//! runtime panic: values of the same type compare naturally (`Double` via
//! `f64::total_cmp`), values of different types compare by discriminant.
//! Within one index column all values share a type, so the cross-type case
//! only matters for making `Ord` total.

mod value;

pub use value::Value;

/// Canonical column type enum.
///
/// Uses `#[repr(u8)]` so the discriminant doubles as the persisted type tag
/// in the structure file and the row codec.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Int = 0,
    String = 1,
    DateTime = 2,
    Double = 3,
}

impl ColumnType {
    /// Returns the lowercase name used in diagnostics and dump output.
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Int => "int",
            ColumnType::String => "string",
            ColumnType::DateTime => "datetime",
            ColumnType::Double => "double",
        }
    }

    /// Returns the fixed encoded payload size, or None for variable-length
    /// types.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            ColumnType::Int | ColumnType::DateTime | ColumnType::Double => Some(8),
            ColumnType::String => None,
        }
    }
}

impl TryFrom<u8> for ColumnType {
    type Error = eyre::Report;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ColumnType::Int),
            1 => Ok(ColumnType::String),
            2 => Ok(ColumnType::DateTime),
            3 => Ok(ColumnType::Double),
            _ => eyre::bail!("invalid ColumnType discriminant: {}", value),
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_type_roundtrips_through_discriminant() {
        for ty in [
            ColumnType::Int,
            ColumnType::String,
            ColumnType::DateTime,
            ColumnType::Double,
        ] {
            assert_eq!(ColumnType::try_from(ty as u8).unwrap(), ty);
        }
    }

    #[test]
    fn column_type_rejects_unknown_discriminant() {
        assert!(ColumnType::try_from(17).is_err());
    }

    #[test]
    fn string_is_the_only_variable_type() {
        assert!(ColumnType::String.fixed_size().is_none());
        assert_eq!(ColumnType::Int.fixed_size(), Some(8));
        assert_eq!(ColumnType::DateTime.fixed_size(), Some(8));
        assert_eq!(ColumnType::Double.fixed_size(), Some(8));
    }
}
