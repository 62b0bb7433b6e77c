//! End-to-end engine scenarios: schema + storage + indexes + cursors
//! working together over a real working directory.

use pimdb::{ColumnType, DbConfig, DbError, DbStructure, ResultSet, Value};
use tempfile::tempdir;

fn mypal_structure() -> DbStructure {
    let mut structure = DbStructure::create("MyPal", "test-build");
    let people = structure.create_table("People").unwrap();
    people.create_column("Id", ColumnType::Int, true).unwrap();
    people
        .create_column("Name", ColumnType::String, true)
        .unwrap();
    people.create_column("Age", ColumnType::Int, false).unwrap();
    people
        .create_column("Birthday", ColumnType::DateTime, false)
        .unwrap();
    people.set_compound_index(&["Name", "Age"]).unwrap();
    people.set_compound_index(&["Id"]).unwrap();
    people
        .set_compound_index_with_value(&["Name"], "Age")
        .unwrap();
    structure
}

fn insert_person(table: &pimdb::Table, id: i64, name: &str, age: i64) -> pimdb::Record {
    let mut record = table.new_record().unwrap();
    record.set_value("Id", id).unwrap();
    record.set_value("Name", name).unwrap();
    record.set_value("Age", age).unwrap();
    record
        .set_value("Birthday", Value::DateTime(1_000_000 * id))
        .unwrap();
    table.commit(&mut record).unwrap();
    record
}

#[test]
fn mypal_zhu_scenario() {
    let dir = tempdir().unwrap();
    let config = DbConfig::new(dir.path());
    let db = mypal_structure().open_database(&config).unwrap();
    let people = db.table("People").unwrap();

    for i in 0..10i64 {
        insert_person(&people, i, &format!("zhu{}", i), 20 + i);
    }
    assert_eq!(people.count().unwrap(), 10);

    let key = [Value::String("zhu4".into())];
    let mut rs = people.modifiable_result_set(&["Name", "Age"], &key).unwrap();
    assert_eq!(ResultSet::count(&rs), 1);

    let mut victim = rs.next_record().unwrap().unwrap();
    people.delete(&mut victim).unwrap();
    assert!(rs.next_record().unwrap().is_none());

    let rs = people.modifiable_result_set(&["Name", "Age"], &key).unwrap();
    assert_eq!(rs.count(), 0);
    assert_eq!(people.count().unwrap(), 9);
}

#[test]
fn count_tracks_every_commit_and_delete() {
    let dir = tempdir().unwrap();
    let config = DbConfig::new(dir.path());
    let db = mypal_structure().open_database(&config).unwrap();
    let people = db.table("People").unwrap();

    let mut records = Vec::new();
    for i in 0..200i64 {
        records.push(insert_person(&people, i, &format!("p{}", i), i));
        assert_eq!(people.count().unwrap(), i as u64 + 1);
    }

    for (deleted, record) in records.iter_mut().enumerate() {
        people.delete(record).unwrap();
        assert_eq!(people.count().unwrap(), 200 - deleted as u64 - 1);
    }
}

#[test]
fn descending_inserts_scan_in_ascending_key_order() {
    let dir = tempdir().unwrap();
    let config = DbConfig::new(dir.path());
    let db = mypal_structure().open_database(&config).unwrap();
    let people = db.table("People").unwrap();

    for id in (491..=500i64).rev() {
        insert_person(&people, id, "same", 0);
    }

    let scanned: Vec<i64> = people
        .result_set(&["Id"], &[])
        .unwrap()
        .map(|r| r.unwrap().get_value("Id").unwrap().as_int().unwrap())
        .collect();
    assert_eq!(scanned, (491..=500).collect::<Vec<i64>>());
}

#[test]
fn equal_keys_come_back_in_insertion_order() {
    let dir = tempdir().unwrap();
    let config = DbConfig::new(dir.path());
    let db = mypal_structure().open_database(&config).unwrap();
    let people = db.table("People").unwrap();

    for id in [7i64, 3, 9] {
        insert_person(&people, id, "twin", 30);
    }

    let ids: Vec<i64> = people
        .result_set(&["Name", "Age"], &[Value::String("twin".into())])
        .unwrap()
        .map(|r| r.unwrap().get_value("Id").unwrap().as_int().unwrap())
        .collect();
    assert_eq!(ids, vec![7, 3, 9]);
}

#[test]
fn updating_the_key_moves_the_record_between_result_sets() {
    let dir = tempdir().unwrap();
    let config = DbConfig::new(dir.path());
    let db = mypal_structure().open_database(&config).unwrap();
    let people = db.table("People").unwrap();

    let mut record = insert_person(&people, 1, "before", 30);
    record.set_value("Name", "after").unwrap();
    record.set_value("Age", 31i64).unwrap();
    people.commit(&mut record).unwrap();

    let old_key = [Value::String("before".into())];
    let new_key = [Value::String("after".into())];
    assert_eq!(
        people.result_set(&["Name", "Age"], &old_key).unwrap().count(),
        0
    );

    let mut rs = people.result_set(&["Name", "Age"], &new_key).unwrap();
    assert_eq!(ResultSet::count(&rs), 1);
    let found = rs.next_record().unwrap().unwrap();
    assert_eq!(found.id(), record.id());
    assert_eq!(found.get_value("Age").unwrap(), &Value::Int(31));
}

#[test]
fn deleting_during_iteration_skips_nothing_and_duplicates_nothing() {
    let dir = tempdir().unwrap();
    let config = DbConfig::new(dir.path());
    let db = mypal_structure().open_database(&config).unwrap();
    let people = db.table("People").unwrap();

    for id in 0..5i64 {
        insert_person(&people, id, "bulk", 30);
    }

    let mut rs = people
        .modifiable_result_set(&["Name", "Age"], &[Value::String("bulk".into())])
        .unwrap();
    let mut seen = Vec::new();
    while let Some(mut record) = rs.next_record().unwrap() {
        seen.push(record.id());
        people.delete(&mut record).unwrap();
    }

    assert_eq!(seen.len(), 5);
    seen.dedup();
    assert_eq!(seen.len(), 5);
    assert_eq!(people.count().unwrap(), 0);
}

#[test]
fn value_carrying_index_answers_without_the_base_table() {
    let dir = tempdir().unwrap();
    let config = DbConfig::new(dir.path());
    let db = mypal_structure().open_database(&config).unwrap();
    let people = db.table("People").unwrap();

    let mut record = insert_person(&people, 1, "zhu4", 33);

    let hits = people
        .index_value_scan(&["Name"], &[Value::String("zhu4".into())])
        .unwrap();
    assert_eq!(hits, vec![(record.id(), Value::Int(33))]);

    // Inline value follows an update of the carried column.
    record.set_value("Age", 34i64).unwrap();
    people.commit(&mut record).unwrap();
    let hits = people
        .index_value_scan(&["Name"], &[Value::String("zhu4".into())])
        .unwrap();
    assert_eq!(hits, vec![(record.id(), Value::Int(34))]);

    // The key-only index cannot serve a value scan.
    let err = people.index_value_scan(&["Id"], &[]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DbError>(),
        Some(DbError::IndexDoesNotExist { .. })
    ));
}

#[test]
fn misuse_fails_loudly() {
    let dir = tempdir().unwrap();
    let config = DbConfig::new(dir.path());
    let db = mypal_structure().open_database(&config).unwrap();
    let people = db.table("People").unwrap();

    // Delete of a never-committed record.
    let mut fresh = people.new_record().unwrap();
    let err = people.delete(&mut fresh).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DbError>(),
        Some(DbError::RecordNotCommitted(_))
    ));

    // Double delete.
    let mut record = insert_person(&people, 1, "zhu0", 20);
    people.delete(&mut record).unwrap();
    let err = people.delete(&mut record).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DbError>(),
        Some(DbError::RecordAlreadyDeleted(_))
    ));

    // Commit after delete.
    let err = people.commit(&mut record).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DbError>(),
        Some(DbError::RecordAlreadyDeleted(_))
    ));

    // Type mismatch at set_value.
    let mut typed = people.new_record().unwrap();
    let err = typed.set_value("Age", "forty").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DbError>(),
        Some(DbError::TypeMismatch { .. })
    ));
}

#[test]
fn dispose_is_idempotent_and_later_reads_fail() {
    let dir = tempdir().unwrap();
    let config = DbConfig::new(dir.path());
    let db = mypal_structure().open_database(&config).unwrap();
    let people = db.table("People").unwrap();
    insert_person(&people, 1, "zhu0", 20);

    let mut rs = people.result_set(&["Id"], &[]).unwrap();
    rs.dispose();
    rs.dispose();
    assert!(rs.is_disposed());

    let err = rs.next_record().unwrap_err();
    assert_eq!(
        err.downcast_ref::<DbError>(),
        Some(&DbError::ResultSetDisposed)
    );
}

#[test]
fn slots_freed_by_delete_are_reused() {
    let dir = tempdir().unwrap();
    let config = DbConfig::new(dir.path());
    let db = mypal_structure().open_database(&config).unwrap();
    let people = db.table("People").unwrap();

    let mut record = insert_person(&people, 1, "first", 20);
    people.delete(&mut record).unwrap();
    insert_person(&people, 2, "secnd", 21);

    let space = people.wasted_space().unwrap();
    assert_eq!(space.total_record_count, 1);
    assert_eq!(space.normal_record_count, 1);
}
