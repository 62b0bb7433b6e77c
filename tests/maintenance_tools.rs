//! Maintenance tool behavior over real database files: checks, rebuild,
//! defragment, backup/restore, dump, and lock interaction.

use pimdb::maintenance::{
    backup_database, compute_wasted_space, defragment, delete_index_files, dump,
    is_database_correct, low_level_check, rebuild_indexes, restore_from_backup,
};
use pimdb::{ColumnType, DbConfig, DbError, DbStructure, Value};
use tempfile::tempdir;

fn mypal_structure() -> DbStructure {
    let mut structure = DbStructure::create("MyPal", "test-build");
    let people = structure.create_table("People").unwrap();
    people.create_column("Id", ColumnType::Int, true).unwrap();
    people
        .create_column("Name", ColumnType::String, true)
        .unwrap();
    people.create_column("Age", ColumnType::Int, false).unwrap();
    people.set_compound_index(&["Name", "Age"]).unwrap();
    people.set_compound_index(&["Id"]).unwrap();
    structure
}

/// Creates the database, commits `count` people, and shuts down cleanly.
fn seed_database(config: &DbConfig, count: i64) -> DbStructure {
    let mut structure = mypal_structure();
    structure.save_structure(config).unwrap();

    let db = structure.open_database(config).unwrap();
    let people = db.table("People").unwrap();
    for i in 0..count {
        let mut record = people.new_record().unwrap();
        record.set_value("Id", i).unwrap();
        record.set_value("Name", format!("zhu{}", i)).unwrap();
        record.set_value("Age", 20 + i).unwrap();
        people.commit(&mut record).unwrap();
    }
    db.shutdown().unwrap();
    structure
}

fn delete_people(config: &DbConfig, structure: &DbStructure, ids: &[i64]) {
    let db = structure.open_database(config).unwrap();
    let people = db.table("People").unwrap();
    for &id in ids {
        let mut rs = people.result_set(&["Id"], &[Value::Int(id)]).unwrap();
        let mut record = rs.next_record().unwrap().unwrap();
        drop(rs);
        people.delete(&mut record).unwrap();
    }
    db.shutdown().unwrap();
}

#[test]
fn a_cleanly_closed_database_passes_all_checks() {
    let dir = tempdir().unwrap();
    let config = DbConfig::new(dir.path());
    let structure = seed_database(&config, 10);

    assert!(is_database_correct(&config, "MyPal").unwrap());
    let report = low_level_check(&config, &structure).unwrap();
    assert!(report.is_ok());
    assert_eq!(report.tables[0].live_records, 10);
}

#[test]
fn missing_index_snapshot_is_detected_and_rebuilt() {
    let dir = tempdir().unwrap();
    let config = DbConfig::new(dir.path());
    let structure = seed_database(&config, 10);

    assert_eq!(delete_index_files(&config, &structure).unwrap(), 1);
    assert!(!is_database_correct(&config, "MyPal").unwrap());

    assert_eq!(rebuild_indexes(&config, &structure, false).unwrap(), 1);
    assert!(is_database_correct(&config, "MyPal").unwrap());
}

#[test]
fn stale_index_snapshot_is_detected_and_rebuilt() {
    let dir = tempdir().unwrap();
    let config = DbConfig::new(dir.path());
    let structure = seed_database(&config, 10);

    let index_path = config.table_index_path("MyPal", "People");
    let stale = std::fs::read(&index_path).unwrap();

    delete_people(&config, &structure, &[3, 4]);
    std::fs::write(&index_path, &stale).unwrap();

    assert!(!is_database_correct(&config, "MyPal").unwrap());
    let report = low_level_check(&config, &structure).unwrap();
    assert!(!report.is_ok());
    assert!(report
        .tables[0]
        .problems
        .iter()
        .any(|p| p.contains("dead record")));

    rebuild_indexes(&config, &structure, false).unwrap();
    assert!(is_database_correct(&config, "MyPal").unwrap());
    assert!(low_level_check(&config, &structure).unwrap().is_ok());
}

#[test]
fn stale_snapshot_with_matching_counts_is_still_detected() {
    let dir = tempdir().unwrap();
    let config = DbConfig::new(dir.path());
    let structure = seed_database(&config, 10);

    let index_path = config.table_index_path("MyPal", "People");
    let stale = std::fs::read(&index_path).unwrap();

    // One delete plus one insert: the live count is back to 10, so the
    // stale snapshot dangles without any count disagreeing.
    let db = structure.open_database(&config).unwrap();
    let people = db.table("People").unwrap();
    let mut rs = people.result_set(&["Id"], &[Value::Int(3)]).unwrap();
    let mut victim = rs.next_record().unwrap().unwrap();
    drop(rs);
    people.delete(&mut victim).unwrap();
    let mut record = people.new_record().unwrap();
    record.set_value("Id", 10i64).unwrap();
    record.set_value("Name", "zhu10").unwrap();
    record.set_value("Age", 30i64).unwrap();
    people.commit(&mut record).unwrap();
    assert_eq!(people.count().unwrap(), 10);
    db.shutdown().unwrap();

    std::fs::write(&index_path, &stale).unwrap();

    assert!(!is_database_correct(&config, "MyPal").unwrap());

    // The unforced rebuild must not be fooled by the matching counts.
    assert_eq!(rebuild_indexes(&config, &structure, false).unwrap(), 1);
    assert!(is_database_correct(&config, "MyPal").unwrap());
    assert!(low_level_check(&config, &structure).unwrap().is_ok());
}

#[test]
fn unforced_rebuild_skips_consistent_tables() {
    let dir = tempdir().unwrap();
    let config = DbConfig::new(dir.path());
    let structure = seed_database(&config, 5);

    assert_eq!(rebuild_indexes(&config, &structure, false).unwrap(), 0);
    assert_eq!(rebuild_indexes(&config, &structure, true).unwrap(), 1);
}

#[test]
fn defragment_reclaims_slots_and_preserves_records() {
    let dir = tempdir().unwrap();
    let config = DbConfig::new(dir.path());
    let structure = seed_database(&config, 10);
    delete_people(&config, &structure, &[0, 2, 4, 6, 8]);

    let before = compute_wasted_space(&config, &structure).unwrap();
    assert_eq!(before[0].1.total_record_count, 10);
    assert_eq!(before[0].1.normal_record_count, 5);

    defragment(&config, &structure).unwrap();

    let after = compute_wasted_space(&config, &structure).unwrap();
    assert_eq!(after[0].1.total_record_count, 5);
    assert_eq!(after[0].1.normal_record_count, 5);
    assert!(is_database_correct(&config, "MyPal").unwrap());

    // Surviving records keep their IDs and values.
    let db = structure.open_database(&config).unwrap();
    let people = db.table("People").unwrap();
    assert_eq!(people.count().unwrap(), 5);
    let names: Vec<String> = people
        .result_set(&["Id"], &[])
        .unwrap()
        .map(|r| r.unwrap().get_string_value("Name").unwrap())
        .collect();
    assert_eq!(names, vec!["zhu1", "zhu3", "zhu5", "zhu7", "zhu9"]);
    db.shutdown().unwrap();
}

#[test]
fn record_ids_are_not_reused_after_defragment() {
    let dir = tempdir().unwrap();
    let config = DbConfig::new(dir.path());
    let structure = seed_database(&config, 4);
    delete_people(&config, &structure, &[0, 1, 2, 3]);
    defragment(&config, &structure).unwrap();

    let db = structure.open_database(&config).unwrap();
    let people = db.table("People").unwrap();
    let record = people.new_record().unwrap();
    assert!(record.id() > 4);
    db.shutdown().unwrap();
}

#[test]
fn backup_and_restore_roundtrip() {
    let dir = tempdir().unwrap();
    let config = DbConfig::new(dir.path());
    let structure = seed_database(&config, 10);

    let archive = dir.path().join("mypal.bak");
    backup_database(&config, &structure, &archive).unwrap();

    delete_people(&config, &structure, &[1, 2, 3, 4, 5, 6, 7]);

    let restored = restore_from_backup(&config, "MyPal", &archive).unwrap();
    assert!(restored.iter().any(|f| f.ends_with(".dbs")));
    assert!(restored.iter().any(|f| f.ends_with(".tbd")));

    let loaded = DbStructure::load_structure(&config, "MyPal", true).unwrap();
    let db = loaded.open_database(&config).unwrap();
    assert_eq!(db.table("People").unwrap().count().unwrap(), 10);
    db.shutdown().unwrap();
}

#[test]
fn corrupted_backup_archive_is_rejected_before_restore() {
    let dir = tempdir().unwrap();
    let config = DbConfig::new(dir.path());
    let structure = seed_database(&config, 3);

    let archive = dir.path().join("mypal.bak");
    backup_database(&config, &structure, &archive).unwrap();

    let mut bytes = std::fs::read(&archive).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(&archive, &bytes).unwrap();

    let tbd_before = std::fs::read(config.table_data_path("MyPal", "People")).unwrap();
    let err = restore_from_backup(&config, "MyPal", &archive).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DbError>(),
        Some(DbError::Corruption(_))
    ));
    // Nothing in the working directory was touched.
    assert_eq!(
        std::fs::read(config.table_data_path("MyPal", "People")).unwrap(),
        tbd_before
    );
}

#[test]
fn dump_renders_structure_and_contents() {
    let dir = tempdir().unwrap();
    let config = DbConfig::new(dir.path());
    let structure = seed_database(&config, 2);

    let text = dump(&config, &structure, false).unwrap();
    assert!(text.contains("database 'MyPal'"));
    assert!(text.contains("table 'People'"));
    assert!(text.contains("column Name string key"));
    assert!(text.contains("index Name+Age"));
    assert!(!text.contains("zhu0"));

    let full = dump(&config, &structure, true).unwrap();
    assert!(full.contains("zhu0"));
    assert!(full.contains("Age=21"));
}

#[test]
fn an_open_database_blocks_destructive_maintenance() {
    let dir = tempdir().unwrap();
    let config = DbConfig::new(dir.path());
    let structure = seed_database(&config, 3);

    let db = structure.open_database(&config).unwrap();
    let err = defragment(&config, &structure).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DbError>(),
        Some(DbError::DatabaseLocked(_))
    ));
    db.shutdown().unwrap();

    defragment(&config, &structure).unwrap();
}
