use blockpad_core::codec;
use blockpad_core::service::{export_document, open_document, save_document};
use blockpad_core::store::migrations::latest_version;
use blockpad_core::store::{export_snapshot, import_snapshot, open_store, StoreError};
use rusqlite::Connection;

const SOURCE: &str = "# BLOCKPAD v2\n::text\nkind: title\nSnapshots\n::text\nkind: h1\nPart\n::map\nzoom: 4\nmap.setView([0, 0]);\n::toc\n";

#[test]
fn new_store_is_migrated_to_latest_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fresh.docv");
    let conn = open_store(&path).unwrap();
    let version: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, latest_version());
    drop(conn);

    // Reopening an up-to-date store is a no-op.
    open_store(&path).unwrap();
}

#[test]
fn newer_schema_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.docv");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version() + 1))
        .unwrap();
    drop(conn);

    match open_store(&path) {
        Err(StoreError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        }) => {
            assert_eq!(db_version, latest_version() + 1);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("expected schema error, got {other:?}"),
    }
}

#[test]
fn snapshot_file_keeps_ids_and_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.docv");
    let document = codec::decode(SOURCE).unwrap();

    export_snapshot(&path, &document).unwrap();
    let restored = import_snapshot(&path).unwrap();

    let ids = |doc: &blockpad_core::Document| -> Vec<uuid::Uuid> {
        doc.ordered().iter().map(|block| block.id).collect()
    };
    assert_eq!(ids(&restored), ids(&document));
    assert_eq!(codec::encode(&restored).unwrap(), SOURCE);
}

#[test]
fn services_route_docv_paths_through_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let text_path = dir.path().join("doc.bpad");
    let snapshot_path = dir.path().join("doc.docv");
    std::fs::write(&text_path, SOURCE).unwrap();

    let mut document = open_document(&text_path).unwrap();
    export_document(&document, &snapshot_path).unwrap();
    let reopened = open_document(&snapshot_path).unwrap();
    assert!(reopened.structurally_eq(&document));

    save_document(&snapshot_path, &mut document).unwrap();
    assert!(!document.is_dirty());
    assert_eq!(std::fs::read_to_string(&text_path).unwrap(), SOURCE);
}
