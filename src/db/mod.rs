pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;

static SQLITE_VEC_INIT: Once = Once::new();

/// Register the sqlite-vec extension globally. Safe to call multiple times.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Open (or create) the index database at the given path, with sqlite-vec
/// loaded and the schema migrated to the current version.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    load_sqlite_vec();

    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    // The watcher thread and the CLI may hold the file at the same time.
    conn.busy_timeout(std::time::Duration::from_millis(5000))?;

    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&mut conn).context("failed to run migrations")?;

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open a fully-migrated in-memory database. Used by tests.
pub fn open_memory_database() -> Result<Connection> {
    load_sqlite_vec();
    let mut conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&mut conn).context("failed to run migrations")?;
    Ok(conn)
}

/// Summary of index state for the `status` command.
#[derive(Debug)]
pub struct IndexStatus {
    pub schema_version: u32,
    pub sqlite_vec_version: String,
    pub embedding_model: Option<String>,
    pub note_count: i64,
    pub vector_count: i64,
    pub log_count: i64,
    pub last_write: Option<String>,
}

pub fn index_status(conn: &Connection) -> Result<IndexStatus> {
    let count = |sql: &str| -> Result<i64> {
        conn.query_row(sql, [], |row| row.get(0))
            .with_context(|| format!("query failed: {sql}"))
    };

    Ok(IndexStatus {
        schema_version: migrations::get_schema_version(conn)?,
        sqlite_vec_version: conn.query_row("SELECT vec_version()", [], |r| r.get(0))?,
        embedding_model: migrations::get_embedding_model(conn)?,
        note_count: count("SELECT COUNT(*) FROM notes")?,
        vector_count: count("SELECT COUNT(*) FROM notes_vec")?,
        log_count: count("SELECT COUNT(*) FROM note_log")?,
        last_write: conn.query_row("SELECT MAX(updated_at) FROM notes", [], |r| r.get(0))?,
    })
}
