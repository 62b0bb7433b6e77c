//! # Index Layer
//!
//! One ordered key → record-ID mapping per index descriptor. Indexes store
//! record IDs only, never references to live record objects; resolving an
//! entry back to a row goes through record storage. Value-carrying indexes
//! additionally keep one column's value inline per entry so scans can answer
//! without touching the base table.
//!
//! ## Ordering
//!
//! Keys order lexicographically over the column tuple in declaration order.
//! Entries under the same key keep insertion order, which is stable across
//! a rebuild because rebuilds scan storage in ascending record-ID order.
//!
//! ## Consistency
//!
//! The index lives in memory while the database is open and is snapshotted
//! to the `.idx` file on flush and shutdown (see `persistence`). After any
//! committed mutation every index is consistent with the current column
//! values of every live record; a deleted record has no entries anywhere.
//! The authoritative recovery path for a lost or corrupt snapshot is a
//! rebuild from storage, not snapshot surgery.

pub mod key;
pub mod persistence;

use crate::error::DbError;
use crate::schema::{IndexDef, TableStructure};
use crate::types::Value;
use eyre::Result;
use smallvec::SmallVec;
use std::collections::BTreeMap;

pub use key::IndexKey;
pub use persistence::{load_indexes, save_indexes};

/// One index entry: the record it points at, plus the inline value for
/// value-carrying indexes.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub record_id: u64,
    pub value: Option<Value>,
}

type EntryList = SmallVec<[IndexEntry; 1]>;

/// An ordered index over one table.
#[derive(Debug)]
pub struct Index {
    def: IndexDef,
    key_positions: Vec<usize>,
    value_position: Option<usize>,
    entries: BTreeMap<IndexKey, EntryList>,
    entry_count: u64,
}

impl Index {
    /// Builds an empty index for `def`, resolving its column names against
    /// the table structure.
    pub fn new(def: IndexDef, table: &TableStructure) -> Result<Self> {
        let mut key_positions = Vec::with_capacity(def.columns().len());
        for column in def.columns() {
            let position = table.column_position(column).ok_or_else(|| {
                DbError::ColumnDoesNotExist {
                    table: table.name().to_string(),
                    column: column.clone(),
                }
            })?;
            key_positions.push(position);
        }

        let value_position = match def.value_column() {
            Some(column) => Some(table.column_position(column).ok_or_else(|| {
                DbError::ColumnDoesNotExist {
                    table: table.name().to_string(),
                    column: column.to_string(),
                }
            })?),
            None => None,
        };

        Ok(Self {
            def,
            key_positions,
            value_position,
            entries: BTreeMap::new(),
            entry_count: 0,
        })
    }

    pub fn def(&self) -> &IndexDef {
        &self.def
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Extracts this index's key tuple from a full row.
    pub fn key_for(&self, row: &[Value]) -> IndexKey {
        IndexKey::new(
            self.key_positions
                .iter()
                .map(|&pos| row[pos].clone())
                .collect(),
        )
    }

    fn inline_value_for(&self, row: &[Value]) -> Option<Value> {
        self.value_position.map(|pos| row[pos].clone())
    }

    /// Inserts an entry for `record_id` keyed by `row`. Equal keys keep
    /// insertion order.
    pub fn insert(&mut self, row: &[Value], record_id: u64) {
        let key = self.key_for(row);
        let value = self.inline_value_for(row);
        self.entries
            .entry(key)
            .or_default()
            .push(IndexEntry { record_id, value });
        self.entry_count += 1;
    }

    /// Removes the entry for `record_id` under the key extracted from `row`.
    /// Returns whether an entry was present.
    pub fn remove(&mut self, row: &[Value], record_id: u64) -> bool {
        let key = self.key_for(row);
        let Some(list) = self.entries.get_mut(&key) else {
            return false;
        };
        let Some(pos) = list.iter().position(|e| e.record_id == record_id) else {
            return false;
        };
        list.remove(pos);
        if list.is_empty() {
            self.entries.remove(&key);
        }
        self.entry_count -= 1;
        true
    }

    /// Entries whose key starts with `prefix`, in key order (insertion order
    /// within equal keys). An empty prefix scans the whole index. Seeking a
    /// prefix past every key yields an empty sequence.
    pub fn matches(&self, prefix: &[Value]) -> Vec<IndexEntry> {
        self.range(prefix)
            .flat_map(|(_, list)| list.iter().cloned())
            .collect()
    }

    /// Like `matches`, but pairing each entry with its full key.
    pub fn matches_with_keys(&self, prefix: &[Value]) -> Vec<(IndexKey, IndexEntry)> {
        self.range(prefix)
            .flat_map(|(key, list)| list.iter().map(move |e| (key.clone(), e.clone())))
            .collect()
    }

    fn range<'a>(
        &'a self,
        prefix: &[Value],
    ) -> impl Iterator<Item = (&'a IndexKey, &'a EntryList)> + 'a {
        // Lower-bound seek: a prefix key sorts before all of its extensions,
        // so ranging from it and stopping at the first non-match visits
        // exactly the prefix's subtree.
        let lower = IndexKey::new(prefix.to_vec());
        let prefix = prefix.to_vec();
        self.entries
            .range(lower..)
            .take_while(move |(key, _)| key.starts_with(&prefix))
    }

    /// All entries in key order, with their keys.
    pub fn iter(&self) -> impl Iterator<Item = (&IndexKey, &IndexEntry)> {
        self.entries
            .iter()
            .flat_map(|(key, list)| list.iter().map(move |e| (key, e)))
    }

    /// Reconciles this index after a committed update from `old_row` to
    /// `new_row`. A changed key moves the entry; a changed inline value with
    /// an unchanged key is rewritten in place so the insertion-order
    /// tie-break is preserved.
    pub fn refresh(&mut self, old_row: &[Value], new_row: &[Value], record_id: u64) {
        let old_key = self.key_for(old_row);
        let new_key = self.key_for(new_row);
        let new_value = self.inline_value_for(new_row);

        if old_key != new_key {
            self.remove(old_row, record_id);
            self.insert(new_row, record_id);
            return;
        }

        if self.inline_value_for(old_row) != new_value {
            if let Some(entry) = self
                .entries
                .get_mut(&new_key)
                .and_then(|list| list.iter_mut().find(|e| e.record_id == record_id))
            {
                entry.value = new_value;
            }
        }
    }

    /// Inserts an already-keyed entry, preserving list order. Used when
    /// loading a snapshot, where keys were extracted at save time.
    pub(crate) fn insert_entry(&mut self, key: IndexKey, entry: IndexEntry) {
        self.entries.entry(key).or_default().push(entry);
        self.entry_count += 1;
    }

    /// Drops every entry, keeping the descriptor. Used by rebuild.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.entry_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnType;

    fn people_table() -> TableStructure {
        let mut table = TableStructure::new("People");
        table.create_column("Id", ColumnType::Int, true).unwrap();
        table
            .create_column("Name", ColumnType::String, true)
            .unwrap();
        table.create_column("Age", ColumnType::Int, false).unwrap();
        table.set_compound_index(&["Name", "Age"]).unwrap();
        table
            .set_compound_index_with_value(&["Name"], "Age")
            .unwrap();
        table
    }

    fn row(id: i64, name: &str, age: i64) -> Vec<Value> {
        vec![Value::Int(id), Value::String(name.into()), Value::Int(age)]
    }

    fn compound_index() -> Index {
        let table = people_table();
        Index::new(table.indexes()[0].clone(), &table).unwrap()
    }

    #[test]
    fn entries_iterate_in_key_order() {
        let mut index = compound_index();
        for (id, key) in (500..=510).rev().enumerate() {
            index.insert(&row(id as i64, "p", key), id as u64);
        }

        let scanned: Vec<i64> = index
            .iter()
            .map(|(key, _)| key.values()[1].as_int().unwrap())
            .collect();
        let mut expected: Vec<i64> = (500..=510).collect();
        expected.sort_unstable();
        assert_eq!(scanned, expected);
    }

    #[test]
    fn equal_keys_keep_insertion_order() {
        let mut index = compound_index();
        for id in [7u64, 3, 9] {
            index.insert(&row(id as i64, "same", 30), id);
        }

        let ids: Vec<u64> = index
            .matches(&[Value::String("same".into()), Value::Int(30)])
            .iter()
            .map(|e| e.record_id)
            .collect();
        assert_eq!(ids, vec![7, 3, 9]);
    }

    #[test]
    fn prefix_match_covers_all_extensions() {
        let mut index = compound_index();
        index.insert(&row(1, "zhu4", 30), 1);
        index.insert(&row(2, "zhu4", 31), 2);
        index.insert(&row(3, "zhu5", 30), 3);

        let hits = index.matches(&[Value::String("zhu4".into())]);
        let ids: Vec<u64> = hits.iter().map(|e| e.record_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn missing_prefix_yields_empty_not_error() {
        let mut index = compound_index();
        index.insert(&row(1, "zhu4", 30), 1);

        assert!(index.matches(&[Value::String("zzz".into())]).is_empty());
    }

    #[test]
    fn remove_deletes_exactly_one_entry() {
        let mut index = compound_index();
        index.insert(&row(1, "a", 1), 1);
        index.insert(&row(2, "a", 1), 2);

        assert!(index.remove(&row(1, "a", 1), 1));
        assert!(!index.remove(&row(1, "a", 1), 1));
        assert_eq!(index.entry_count(), 1);
        assert_eq!(index.matches(&[])[0].record_id, 2);
    }

    #[test]
    fn refresh_moves_the_entry_only_when_the_key_changed() {
        let mut index = compound_index();
        index.insert(&row(1, "a", 1), 1);
        index.insert(&row(2, "a", 1), 2);

        // Unchanged key: position among equal keys is preserved.
        index.refresh(&row(1, "a", 1), &row(1, "a", 1), 1);
        let ids: Vec<u64> = index.matches(&[]).iter().map(|e| e.record_id).collect();
        assert_eq!(ids, vec![1, 2]);

        // Changed key: entry moves to its new position.
        index.refresh(&row(1, "a", 1), &row(1, "z", 1), 1);
        let ids: Vec<u64> = index.matches(&[]).iter().map(|e| e.record_id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(index.entry_count(), 2);
    }

    #[test]
    fn refresh_rewrites_the_inline_value_in_place() {
        let table = people_table();
        let mut index = Index::new(table.indexes()[1].clone(), &table).unwrap();
        index.insert(&row(1, "zhu4", 30), 1);
        index.insert(&row(2, "zhu4", 40), 2);

        index.refresh(&row(1, "zhu4", 30), &row(1, "zhu4", 31), 1);

        let hits = index.matches(&[Value::String("zhu4".into())]);
        assert_eq!(hits[0].record_id, 1);
        assert_eq!(hits[0].value, Some(Value::Int(31)));
    }

    #[test]
    fn value_carrying_index_stores_the_inline_value() {
        let table = people_table();
        let mut index = Index::new(table.indexes()[1].clone(), &table).unwrap();
        index.insert(&row(1, "zhu4", 33), 1);

        let hits = index.matches(&[Value::String("zhu4".into())]);
        assert_eq!(hits[0].value, Some(Value::Int(33)));
    }

    #[test]
    fn unknown_index_column_is_rejected() {
        let table = people_table();
        let def = IndexDef::new(vec!["Ghost".into()], None);
        assert!(Index::new(def, &table).is_err());
    }
}
