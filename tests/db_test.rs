mod helpers;

use helpers::{notes_dir, test_store, write_note};
use notewatch::db;
use notewatch::db::migrations::{get_embedding_model, get_schema_version, run_migrations, CURRENT_SCHEMA_VERSION};
use notewatch::store::RecordStore;
use notewatch::sync::{Dispatcher, FsEvent};

#[test]
fn file_database_is_created_with_parent_dirs() {
    let (_tmp, root) = notes_dir();
    let db_path = root.join("state/deeper/index.db");

    let conn = db::open_database(&db_path).unwrap();

    assert!(db_path.exists());
    let mode: String = conn.query_row("PRAGMA journal_mode", [], |r| r.get(0)).unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
}

#[test]
fn reopening_keeps_records() {
    let (_tmp, root) = notes_dir();
    let db_path = root.join("index.db");
    {
        let mut conn = db::open_database(&db_path).unwrap();
        conn.execute(
            "INSERT INTO notes (id, file_path, title, tags, content, content_hash, created_at, updated_at) \
             VALUES ('k1', '/n/a.md', 'A', '[]', 'body', 'h', '2026-01-01T00:00:00.000000Z', '2026-01-01T00:00:00.000000Z')",
            [],
        )
        .unwrap();
        run_migrations(&mut conn).unwrap();
    }

    let conn = db::open_database(&db_path).unwrap();
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM notes", [], |r| r.get(0)).unwrap();
    assert_eq!(count, 1);
}

#[test]
fn v1_database_upgrades() {
    db::load_sqlite_vec();
    let mut conn = rusqlite::Connection::open_in_memory().unwrap();
    db::schema::init_schema(&conn).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), 1);
    assert!(get_embedding_model(&conn).unwrap().is_none());

    run_migrations(&mut conn).unwrap();

    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    assert_eq!(get_embedding_model(&conn).unwrap().as_deref(), Some("all-MiniLM-L6-v2"));
}

#[test]
fn status_counts_track_writes() {
    let (_tmp, root) = notes_dir();
    let a = write_note(&root, "a.md", "alpha");
    let b = write_note(&root, "b.md", "beta");
    let mut store = test_store();
    let d = Dispatcher::default();
    d.dispatch(&mut store, &FsEvent::created(&a));
    d.dispatch(&mut store, &FsEvent::created(&b));
    std::fs::remove_file(&b).unwrap();
    d.dispatch(&mut store, &FsEvent::deleted(&b));

    let status = db::index_status(store.conn()).unwrap();

    assert_eq!(status.note_count, 1);
    assert_eq!(status.vector_count, 1);
    assert_eq!(status.log_count, 3, "insert, insert, delete");
    assert!(status.last_write.is_some());
    assert!(status.sqlite_vec_version.starts_with('v'));
    assert_eq!(store.list_all().unwrap().len(), 1);
}

#[test]
fn search_ranks_matching_note_first() {
    let (_tmp, root) = notes_dir();
    let mut store = test_store();
    let d = Dispatcher::default();
    for (name, text) in [
        ("rust.md", "---\ntitle: Ownership\ntags: rust\n---\nborrow checker lifetimes ownership"),
        ("bread.md", "---\ntitle: Sourdough\n---\nflour water salt starter"),
        ("garden.md", "tomatoes need sun and water"),
    ] {
        let path = write_note(&root, name, text);
        d.dispatch(&mut store, &FsEvent::created(&path));
    }

    let hits = store.search("borrow checker ownership", 2).unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].title, "Ownership");
    assert_eq!(hits[0].tags, vec!["rust"]);
    assert!(hits[0].distance <= hits[1].distance);
    assert!(store.search("   ", 5).unwrap().is_empty());
}
