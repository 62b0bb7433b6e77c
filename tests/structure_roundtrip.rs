//! Structure file lifecycle: save/load round-trips, version bookkeeping,
//! and low-level validation at load time.

use pimdb::{ColumnType, DbConfig, DbError, DbMode, DbStructure};
use tempfile::tempdir;

fn build_structure() -> DbStructure {
    let mut structure = DbStructure::create("MyPal", "2026.08");

    let people = structure.create_table("People").unwrap();
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

    let notes = structure.create_table("Notes").unwrap();
    notes
        .create_column("Created", ColumnType::DateTime, true)
        .unwrap();
    notes
        .create_column("Text", ColumnType::String, false)
        .unwrap();
    notes.set_compound_index(&["Created"]).unwrap();

    structure
}

#[test]
fn save_then_load_reproduces_the_full_schema() {
    let dir = tempdir().unwrap();
    let config = DbConfig::new(dir.path());

    let mut structure = build_structure();
    assert_eq!(structure.mode(), DbMode::Create);
    structure.save_structure(&config).unwrap();

    let loaded = DbStructure::load_structure(&config, "MyPal", false).unwrap();
    assert_eq!(loaded.mode(), DbMode::Open);
    assert_eq!(loaded.build(), "2026.08");
    assert_eq!(loaded.version(), 1);
    assert_eq!(loaded.tables(), structure.tables());

    let people = loaded.table("People").unwrap();
    assert_eq!(people.columns().len(), 3);
    assert_eq!(people.indexes().len(), 2);
    assert_eq!(people.indexes()[1].value_column(), Some("Weight"));
}

#[test]
fn version_is_monotone_across_save_cycles() {
    let dir = tempdir().unwrap();
    let config = DbConfig::new(dir.path());

    let mut structure = build_structure();
    for expected in 1..=3u32 {
        structure.save_structure(&config).unwrap();
        assert_eq!(structure.version(), expected);
        assert_eq!(
            DbStructure::load_version_info(&config, "MyPal")
                .unwrap()
                .version,
            expected
        );
    }

    // A reloaded structure keeps counting from the persisted version.
    let mut reloaded = DbStructure::load_structure(&config, "MyPal", false).unwrap();
    reloaded.save_structure(&config).unwrap();
    assert_eq!(reloaded.version(), 4);
}

#[test]
fn schema_uniqueness_is_enforced() {
    let mut structure = build_structure();

    assert!(matches!(
        structure
            .create_table("People")
            .unwrap_err()
            .downcast_ref::<DbError>(),
        Some(DbError::TableAlreadyExists(_))
    ));

    let people = structure.create_table("People2").unwrap();
    people.create_column("Id", ColumnType::Int, true).unwrap();
    assert!(matches!(
        people
            .create_column("Id", ColumnType::String, false)
            .unwrap_err()
            .downcast_ref::<DbError>(),
        Some(DbError::ColumnAlreadyExists { .. })
    ));
}

#[test]
fn truncated_structure_file_is_corruption() {
    let dir = tempdir().unwrap();
    let config = DbConfig::new(dir.path());

    build_structure().save_structure(&config).unwrap();

    let path = config.structure_path("MyPal");
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 10]).unwrap();

    let err = DbStructure::load_structure(&config, "MyPal", false).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DbError>(),
        Some(DbError::Corruption(_))
    ));
}

#[test]
fn low_level_load_validates_table_files() {
    let dir = tempdir().unwrap();
    let config = DbConfig::new(dir.path());

    let mut structure = build_structure();
    structure.save_structure(&config).unwrap();

    // Data files do not exist yet: plain load passes, low-level load fails.
    assert!(DbStructure::load_structure(&config, "MyPal", false).is_ok());
    assert!(DbStructure::load_structure(&config, "MyPal", true).is_err());

    // Opening (and shutting down) the database creates the table files.
    let db = structure.open_database(&config).unwrap();
    db.shutdown().unwrap();
    drop(db);
    assert!(DbStructure::load_structure(&config, "MyPal", true).is_ok());
}
