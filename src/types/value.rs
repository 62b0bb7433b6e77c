//! Column values.
//!
//! `Value` is the closed sum type stored in records and index keys. It
//! replaces dynamic boxing with one matchable enum per supported column
//! type, so a type mismatch is a single well-defined check at
//! `Record::set_value`.

use super::ColumnType;
use std::cmp::Ordering;

/// A single column value.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    String(String),
    /// Microseconds since the Unix epoch.
    DateTime(i64),
    Double(f64),
}

impl Value {
    /// Returns the column type this value belongs to.
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Int(_) => ColumnType::Int,
            Value::String(_) => ColumnType::String,
            Value::DateTime(_) => ColumnType::DateTime,
            Value::Double(_) => ColumnType::Double,
        }
    }

    /// Returns the default value a freshly constructed record holds for a
    /// column of the given type.
    pub fn default_for(ty: ColumnType) -> Value {
        match ty {
            ColumnType::Int => Value::Int(0),
            ColumnType::String => Value::String(String::new()),
            ColumnType::DateTime => Value::DateTime(0),
            ColumnType::Double => Value::Double(0.0),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<i64> {
        match self {
            Value::DateTime(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Double(a), Value::Double(b)) => a.total_cmp(b),
            // Mixed types only arise when making the order total; rank by
            // discriminant so BTreeMap keys stay well-behaved.
            _ => (self.column_type() as u8).cmp(&(other.column_type() as u8)),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::String(v) => f.write_str(v),
            Value::DateTime(v) => write!(f, "{}us", v),
            Value::Double(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}
