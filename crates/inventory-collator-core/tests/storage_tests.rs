use inventory_collator_core::metadata::AudioMetadata;
use inventory_collator_core::storage::models::*;
use inventory_collator_core::storage::Database;
use inventory_collator_core::CatalogStore;

const VOLUME: &str = "6f1c2f5e-0d7b-4b4e-9a51-1d7c3b0e9f42";

fn register(db: &Database, seen_at: &str) -> bool {
    db.upsert_volume(
        &VolumeRegistration {
            volume_key: VOLUME.to_string(),
            label: Some("Archive 01".to_string()),
            root_path: "/media/archive".to_string(),
            ..VolumeRegistration::default()
        },
        seen_at,
    )
    .unwrap()
}

fn make_record(relative_path: &str, size: i64, hash: Option<&str>) -> FileRecord {
    let file_name = relative_path.rsplit('/').next().unwrap_or(relative_path).to_string();
    let extension = file_name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase());
    FileRecord {
        volume_key: VOLUME.to_string(),
        relative_path: relative_path.to_string(),
        file_name,
        extension,
        size_bytes: size,
        created_fs: None,
        modified_fs: Some("2024-03-01T10:00:00.000000000Z".to_string()),
        header_valid: hash.is_some(),
        content_hash: hash.map(|h| h.to_string()),
        metadata: MetadataUpdate::Clear,
    }
}

#[test]
fn test_register_volume_reports_new_then_existing() {
    let db = Database::open_in_memory().unwrap();
    assert!(register(&db, "2024-03-01T10:00:00.000000Z"));

    // A later registration without a label keeps the stored one.
    let is_new = db
        .upsert_volume(
            &VolumeRegistration {
                volume_key: VOLUME.to_string(),
                label: None,
                root_path: "E:\\".to_string(),
                ..VolumeRegistration::default()
            },
            "2024-03-02T10:00:00.000000Z",
        )
        .unwrap();
    assert!(!is_new);

    let volume = db.get_volume(VOLUME).unwrap().unwrap();
    assert_eq!(volume.label.as_deref(), Some("Archive 01"));
    assert_eq!(volume.last_root_path.as_deref(), Some("E:\\"));
    assert_eq!(volume.status, "active");
    assert_eq!(volume.created_at, "2024-03-01T10:00:00.000000Z");
    assert_eq!(volume.last_seen_at, "2024-03-02T10:00:00.000000Z");
    assert_eq!(db.list_volumes().unwrap().len(), 1);
}

#[test]
fn test_upsert_is_idempotent_and_keeps_first_seen() {
    let db = Database::open_in_memory().unwrap();
    register(&db, "2024-03-01T10:00:00.000000Z");

    let records = vec![
        make_record("Artist/Album/01.mp3", 10, Some("aa")),
        make_record("notes.txt", 5, None),
    ];
    assert_eq!(db.upsert_file_records(&records, "2024-03-01T10:00:00.000000Z").unwrap(), 2);
    let first = db.get_file(VOLUME, "Artist/Album/01.mp3").unwrap().unwrap();

    assert_eq!(db.upsert_file_records(&records, "2024-03-02T10:00:00.000000Z").unwrap(), 2);
    let second = db.get_file(VOLUME, "Artist/Album/01.mp3").unwrap().unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.first_seen_at, "2024-03-01T10:00:00.000000Z");
    assert_eq!(second.last_seen_at, "2024-03-02T10:00:00.000000Z");
    assert_eq!(second.content_hash.as_deref(), Some("aa"));
    assert_eq!(second.scan_status, ScanStatus::Active);
    assert_eq!(db.list_files(VOLUME, None).unwrap().len(), 2);
}

#[test]
fn test_mark_missing_then_upsert_resurrects() {
    let db = Database::open_in_memory().unwrap();
    register(&db, "2024-03-01T10:00:00.000000Z");
    db.upsert_file_records(
        &[make_record("a.mp3", 10, Some("aa")), make_record("b.txt", 10, None)],
        "2024-03-01T10:00:00.000000Z",
    )
    .unwrap();

    assert_eq!(db.mark_volume_files_missing(VOLUME).unwrap(), 2);
    // Already-missing entries are not counted twice.
    assert_eq!(db.mark_volume_files_missing(VOLUME).unwrap(), 0);

    db.upsert_file_records(&[make_record("b.txt", 12, None)], "2024-03-02T10:00:00.000000Z")
        .unwrap();

    let counts = db.count_files_by_status(VOLUME).unwrap();
    assert_eq!(counts, StatusCounts { active: 1, missing: 1 });
    assert_eq!(db.count_missing(VOLUME).unwrap(), 1);

    let missing = db.list_files(VOLUME, Some(ScanStatus::Missing)).unwrap();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].relative_path, "a.mp3");

    let b = db.get_file(VOLUME, "b.txt").unwrap().unwrap();
    assert_eq!(b.size_bytes, 12);
    assert_eq!(b.scan_status, ScanStatus::Active);
}

#[test]
fn test_path_components_are_rebuilt() {
    let db = Database::open_in_memory().unwrap();
    register(&db, "2024-03-01T10:00:00.000000Z");
    db.upsert_file_records(
        &[make_record("Artist/Album/01 Intro.flac", 10, Some("aa"))],
        "2024-03-01T10:00:00.000000Z",
    )
    .unwrap();
    db.upsert_file_records(
        &[make_record("Artist/Album/01 Intro.flac", 11, Some("bb"))],
        "2024-03-02T10:00:00.000000Z",
    )
    .unwrap();

    let entry = db.get_file(VOLUME, "Artist/Album/01 Intro.flac").unwrap().unwrap();
    assert_eq!(
        db.get_path_components(entry.id).unwrap(),
        vec!["Artist", "Album", "01 Intro.flac"]
    );
}

#[test]
fn test_metadata_replace_keep_and_clear() {
    let db = Database::open_in_memory().unwrap();
    register(&db, "2024-03-01T10:00:00.000000Z");

    let metadata = AudioMetadata {
        duration_seconds: Some(201.5),
        bitrate: Some(320),
        sample_rate: Some(44100),
        channels: Some(2),
        artist: Some("Artist".to_string()),
        album: None,
        title: Some("Intro".to_string()),
        year: Some(1999),
    };
    let mut record = make_record("01.mp3", 10, Some("aa"));
    record.metadata = MetadataUpdate::Replace(metadata.clone());
    db.upsert_file_records(&[record.clone()], "2024-03-01T10:00:00.000000Z")
        .unwrap();

    let id = db.get_file(VOLUME, "01.mp3").unwrap().unwrap().id;
    assert_eq!(db.get_audio_metadata(id).unwrap(), Some(metadata.clone()));
    assert!(db.get_prior_file_state(VOLUME, "01.mp3").unwrap().unwrap().has_metadata);

    record.metadata = MetadataUpdate::Keep;
    db.upsert_file_records(&[record.clone()], "2024-03-02T10:00:00.000000Z")
        .unwrap();
    assert_eq!(db.get_audio_metadata(id).unwrap(), Some(metadata));

    record.metadata = MetadataUpdate::Clear;
    db.upsert_file_records(&[record], "2024-03-03T10:00:00.000000Z")
        .unwrap();
    assert_eq!(db.get_audio_metadata(id).unwrap(), None);
    assert!(!db.get_prior_file_state(VOLUME, "01.mp3").unwrap().unwrap().has_metadata);
}

#[test]
fn test_prior_file_state_for_unknown_path() {
    let db = Database::open_in_memory().unwrap();
    register(&db, "2024-03-01T10:00:00.000000Z");
    assert!(db.get_prior_file_state(VOLUME, "nope.mp3").unwrap().is_none());
}

#[test]
fn test_files_require_a_registered_volume() {
    let db = Database::open_in_memory().unwrap();
    let result = db.upsert_file_records(
        &[make_record("a.mp3", 10, Some("aa"))],
        "2024-03-01T10:00:00.000000Z",
    );
    assert!(result.is_err());
    assert!(db.get_file(VOLUME, "a.mp3").unwrap().is_none());
}

#[test]
fn test_scan_run_lifecycle() {
    let db = Database::open_in_memory().unwrap();
    register(&db, "2024-03-01T10:00:00.000000Z");

    let first = db.create_scan_run(VOLUME, "/media/archive").unwrap();
    db.complete_scan_run(
        first,
        RunStatus::Completed,
        &RunCounters {
            files_seen: 2,
            audio_files: 1,
            bytes_scanned: 20,
            missing_files: 0,
        },
    )
    .unwrap();
    let second = db.create_scan_run(VOLUME, "/media/archive").unwrap();

    let runs = db.list_scan_runs(VOLUME).unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].id, second);
    assert_eq!(runs[0].status, RunStatus::Running);
    assert!(runs[0].completed_at.is_none());
    assert_eq!(runs[1].status, RunStatus::Completed);
    assert_eq!(runs[1].files_seen, 2);
    assert_eq!(runs[1].bytes_scanned, 20);
    assert!(runs[1].completed_at.is_some());
}

#[test]
fn test_reopen_keeps_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("inventory.db");
    let db_path = db_path.to_str().unwrap();

    {
        let db = Database::open(db_path).unwrap();
        register(&db, "2024-03-01T10:00:00.000000Z");
        let records = [make_record("a.mp3", 10, Some("aa"))];
        db.upsert_file_records(&records, "2024-03-01T10:00:00.000000Z").unwrap();
    }

    let db = Database::open(db_path).unwrap();
    assert!(db.get_file(VOLUME, "a.mp3").unwrap().is_some());
}

#[test]
fn test_schema_rejects_unknown_scan_status() {
    let db = Database::open_in_memory().unwrap();
    register(&db, "2024-03-01T10:00:00.000000Z");
    let records = [make_record("a.mp3", 10, Some("aa"))];
    db.upsert_file_records(&records, "2024-03-01T10:00:00.000000Z").unwrap();

    let result = db.connection().execute(
        "UPDATE files SET scan_status = 'deleted' WHERE relative_path = 'a.mp3'",
        [],
    );
    assert!(result.is_err());

    let (status, components): (String, i64) = db
        .connection()
        .query_row(
            "SELECT f.scan_status, COUNT(c.component_order) FROM files f \
             JOIN file_path_components c ON c.file_id = f.id \
             WHERE f.relative_path = ?1 GROUP BY f.id",
            rusqlite::params!["a.mp3"],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(status, "active");
    assert_eq!(components, 1);
}
