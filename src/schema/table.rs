//! # Table Structure
//!
//! Column and index descriptors for one table. A `TableStructure` is built
//! up in Create mode (`create_column`, `set_compound_index`) and immutable
//! once the database structure has been saved; the engine validates every
//! index against the column set at registration time, so an index can never
//! reference a column that does not exist.

use crate::error::DbError;
use crate::types::ColumnType;
use eyre::Result;

/// One typed column of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    name: String,
    column_type: ColumnType,
    is_key: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType, is_key: bool) -> Self {
        Self {
            name: name.into(),
            column_type,
            is_key,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    /// Key columns are the ones eligible as index key components.
    pub fn is_key(&self) -> bool {
        self.is_key
    }
}

/// An index over an ordered tuple of columns, optionally carrying one
/// non-key column's value inline per entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    columns: Vec<String>,
    value_column: Option<String>,
}

impl IndexDef {
    pub fn new(columns: Vec<String>, value_column: Option<String>) -> Self {
        Self {
            columns,
            value_column,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn value_column(&self) -> Option<&str> {
        self.value_column.as_deref()
    }

    /// True when the key tuple spans more than one column.
    pub fn is_compound(&self) -> bool {
        self.columns.len() > 1
    }

    /// Human-readable name used in diagnostics and dump output.
    pub fn describe(&self) -> String {
        let key = self.columns.join("+");
        match &self.value_column {
            Some(value) => format!("{}:{}", key, value),
            None => key,
        }
    }

    /// True when this index is keyed by exactly `columns` in order.
    pub fn matches_columns(&self, columns: &[&str]) -> bool {
        self.columns.len() == columns.len()
            && self.columns.iter().zip(columns).all(|(a, b)| a == b)
    }
}

/// Schema of one table: ordered columns plus its indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStructure {
    name: String,
    columns: Vec<ColumnDef>,
    indexes: Vec<IndexDef>,
}

impl TableStructure {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub(crate) fn from_parts(
        name: String,
        columns: Vec<ColumnDef>,
        indexes: Vec<IndexDef>,
    ) -> Self {
        Self {
            name,
            columns,
            indexes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn indexes(&self) -> &[IndexDef] {
        &self.indexes
    }

    /// Adds a column. Duplicate names within one table are rejected.
    pub fn create_column(
        &mut self,
        name: impl Into<String>,
        column_type: ColumnType,
        is_key: bool,
    ) -> Result<()> {
        let name = name.into();
        if self.column(&name).is_some() {
            return Err(DbError::ColumnAlreadyExists {
                table: self.name.clone(),
                column: name,
            }
            .into());
        }
        self.columns.push(ColumnDef::new(name, column_type, is_key));
        Ok(())
    }

    /// Registers an index over the named columns, in order. A single-column
    /// index is the one-element case.
    pub fn set_compound_index(&mut self, columns: &[&str]) -> Result<()> {
        self.register_index(columns, None)
    }

    /// Registers an index that additionally stores `value_column`'s contents
    /// inline per entry, so scans can answer without a base-table read.
    pub fn set_compound_index_with_value(
        &mut self,
        columns: &[&str],
        value_column: &str,
    ) -> Result<()> {
        self.register_index(columns, Some(value_column))
    }

    fn register_index(&mut self, columns: &[&str], value_column: Option<&str>) -> Result<()> {
        eyre::ensure!(
            !columns.is_empty(),
            "index on table '{}' needs at least one column",
            self.name
        );

        for column in columns.iter().copied().chain(value_column) {
            if self.column(column).is_none() {
                return Err(DbError::ColumnDoesNotExist {
                    table: self.name.clone(),
                    column: column.to_string(),
                }
                .into());
            }
        }

        if self.indexes.iter().any(|idx| idx.matches_columns(columns)) {
            return Err(DbError::IndexAlreadyExists {
                table: self.name.clone(),
                columns: columns.iter().map(|c| c.to_string()).collect(),
            }
            .into());
        }

        self.indexes.push(IndexDef::new(
            columns.iter().map(|c| c.to_string()).collect(),
            value_column.map(str::to_string),
        ));
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Position of `name` in the column order, used by the row codec and
    /// index key extraction.
    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// The index keyed by exactly `columns`, with its position.
    pub fn find_index(&self, columns: &[&str]) -> Option<(usize, &IndexDef)> {
        self.indexes
            .iter()
            .enumerate()
            .find(|(_, idx)| idx.matches_columns(columns))
    }
}
