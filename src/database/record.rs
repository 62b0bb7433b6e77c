//! Record value objects.
//!
//! A `Record` is an explicit value object: reads return a fresh one
//! reflecting on-disk state at read time, and `new_record` returns a
//! write-builder with per-type defaults. There is no hidden aliasing
//! between a record being iterated and one being mutated; visibility of a
//! mutation starts at `Table::commit`.

use crate::error::DbError;
use crate::schema::TableStructure;
use crate::types::Value;
use eyre::Result;
use std::sync::Arc;

/// One row of a table, identified by a stable integer ID.
#[derive(Debug, Clone)]
pub struct Record {
    id: u64,
    structure: Arc<TableStructure>,
    values: Vec<Value>,
    committed: bool,
    deleted: bool,
}

impl Record {
    pub(crate) fn new_uncommitted(id: u64, structure: Arc<TableStructure>) -> Self {
        let values = structure
            .columns()
            .iter()
            .map(|c| Value::default_for(c.column_type()))
            .collect();
        Self {
            id,
            structure,
            values,
            committed: false,
            deleted: false,
        }
    }

    pub(crate) fn from_row(id: u64, structure: Arc<TableStructure>, values: Vec<Value>) -> Self {
        Self {
            id,
            structure,
            values,
            committed: true,
            deleted: false,
        }
    }

    /// The ID assigned at creation, stable for the record's lifetime.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Sets an in-memory field, type-checked against the column. No disk
    /// I/O happens until `Table::commit`.
    pub fn set_value(&mut self, column: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let position = self.column_position(column)?;
        let expected = self.structure.columns()[position].column_type();
        if value.column_type() != expected {
            return Err(DbError::TypeMismatch {
                column: column.to_string(),
                expected,
                got: value.column_type(),
            }
            .into());
        }
        self.values[position] = value;
        Ok(())
    }

    /// Current in-memory value of `column`.
    pub fn get_value(&self, column: &str) -> Result<&Value> {
        let position = self.column_position(column)?;
        Ok(&self.values[position])
    }

    /// Current value of `column`, rendered as text.
    pub fn get_string_value(&self, column: &str) -> Result<String> {
        Ok(self.get_value(column)?.to_string())
    }

    fn column_position(&self, column: &str) -> Result<usize> {
        self.structure.column_position(column).ok_or_else(|| {
            DbError::ColumnDoesNotExist {
                table: self.structure.name().to_string(),
                column: column.to_string(),
            }
            .into()
        })
    }

    pub(crate) fn values(&self) -> &[Value] {
        &self.values
    }

    pub(crate) fn mark_committed(&mut self) {
        self.committed = true;
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.deleted = true;
    }
}
