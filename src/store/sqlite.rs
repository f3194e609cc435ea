//! SQLite + sqlite-vec implementation of [`RecordStore`].
//!
//! Each write runs in one transaction: the `notes` row, its `notes_vec`
//! embedding, and a `note_log` audit entry commit together. Embeddings are
//! computed before the transaction opens so a slow model never holds the
//! write lock.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;

use super::{dir_prefix, path_key, IndexEntry, Record, RecordStore};
use crate::embedding::{embedding_to_bytes, EmbeddingProvider};
use crate::error::StoreError;
use crate::note::Document;

const RECORD_COLUMNS: &str =
    "id, file_path, title, tags, content, content_hash, created_at, updated_at";

pub struct SqliteRecordStore {
    conn: Connection,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SqliteRecordStore {
    /// Wrap an already-initialized connection (see [`crate::db::open_database`]).
    pub fn new(conn: Connection, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { conn, embedder }
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }

    fn embed(&self, doc: &Document) -> Result<Vec<f32>, StoreError> {
        self.embedder
            .embed(&doc.embedding_text())
            .map_err(|e| StoreError::Embedding(format!("{}: {e}", doc.file_path.display())))
    }
}

impl RecordStore for SqliteRecordStore {
    fn find_by_path(&self, path: &Path) -> Result<Option<Record>, StoreError> {
        let key = path_key(path);
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {RECORD_COLUMNS} FROM notes WHERE file_path = ?1 LIMIT 2"
        ))?;
        let mut rows = stmt
            .query_map(params![key], read_record_row)?
            .collect::<Result<Vec<_>, _>>()?;

        match rows.len() {
            0 => Ok(None),
            1 => rows.pop().map(RawRecord::into_record).transpose(),
            _ => {
                let count: i64 = self.conn.query_row(
                    "SELECT COUNT(*) FROM notes WHERE file_path = ?1",
                    params![key],
                    |row| row.get(0),
                )?;
                Err(StoreError::DuplicatePath {
                    path: key,
                    count: count as usize,
                })
            }
        }
    }

    fn get(&self, id: &str) -> Result<Option<Record>, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM notes WHERE id = ?1"),
                params![id],
                read_record_row,
            )
            .optional()?
            .map(RawRecord::into_record)
            .transpose()
    }

    fn insert(&mut self, doc: &Document) -> Result<String, StoreError> {
        let embedding = self.embed(doc)?;
        let id = uuid::Uuid::now_v7().to_string();
        let now = timestamp(Utc::now());
        let tags = tags_json(&doc.tags);
        let metadata = metadata_json(doc);

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO notes (id, file_path, title, tags, content, metadata, content_hash, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                id,
                path_key(&doc.file_path),
                doc.title,
                tags,
                doc.content,
                metadata,
                doc.content_hash,
                now,
            ],
        )?;
        tx.execute(
            "INSERT INTO notes_vec (id, embedding) VALUES (?1, ?2)",
            params![id, embedding_to_bytes(&embedding)],
        )?;
        write_log(&tx, "insert", &id, Some(&serde_json::json!({ "file_path": path_key(&doc.file_path) })))?;
        tx.commit()?;

        Ok(id)
    }

    fn update_content(&mut self, id: &str, doc: &Document) -> Result<(), StoreError> {
        let embedding = self.embed(doc)?;
        let now = timestamp(Utc::now());

        let tx = self.conn.transaction()?;
        let rows = tx.execute(
            "UPDATE notes SET title = ?1, tags = ?2, content = ?3, metadata = ?4, content_hash = ?5, updated_at = ?6 \
             WHERE id = ?7",
            params![
                doc.title,
                tags_json(&doc.tags),
                doc.content,
                metadata_json(doc),
                doc.content_hash,
                now,
                id,
            ],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        // vec0 rows are replaced, not updated in place.
        tx.execute("DELETE FROM notes_vec WHERE id = ?1", params![id])?;
        tx.execute(
            "INSERT INTO notes_vec (id, embedding) VALUES (?1, ?2)",
            params![id, embedding_to_bytes(&embedding)],
        )?;
        write_log(&tx, "update", id, None)?;
        tx.commit()?;

        Ok(())
    }

    fn update_path(&mut self, id: &str, new_path: &Path) -> Result<(), StoreError> {
        let new_key = path_key(new_path);
        let tx = self.conn.transaction()?;
        let old_key: Option<String> = tx
            .query_row("SELECT file_path FROM notes WHERE id = ?1", params![id], |row| row.get(0))
            .optional()?;
        let Some(old_key) = old_key else {
            return Err(StoreError::NotFound(id.to_string()));
        };

        tx.execute(
            "UPDATE notes SET file_path = ?1, updated_at = ?2 WHERE id = ?3",
            params![new_key, timestamp(Utc::now()), id],
        )?;
        write_log(&tx, "move", id, Some(&serde_json::json!({ "from": old_key, "to": new_key })))?;
        tx.commit()?;

        Ok(())
    }

    fn touch(&mut self, id: &str) -> Result<(), StoreError> {
        let rows = self.conn.execute(
            "UPDATE notes SET updated_at = ?1 WHERE id = ?2",
            params![timestamp(Utc::now()), id],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        let rows = tx.execute("DELETE FROM notes WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        tx.execute("DELETE FROM notes_vec WHERE id = ?1", params![id])?;
        write_log(&tx, "delete", id, None)?;
        tx.commit()?;

        Ok(())
    }

    fn list_all(&self) -> Result<Vec<IndexEntry>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, file_path, updated_at, content_hash FROM notes ORDER BY file_path")?;
        let raw = stmt
            .query_map([], read_entry_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter().map(into_entry).collect()
    }

    fn list_under(&self, dir: &Path) -> Result<Vec<IndexEntry>, StoreError> {
        // Range scan on the file_path index: [prefix, prefix with its separator bumped by one).
        let prefix = dir_prefix(dir);
        let mut upper = prefix.clone();
        if let Some(sep) = upper.pop() {
            upper.push(char::from_u32(sep as u32 + 1).unwrap_or(char::MAX));
        }
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, file_path, updated_at, content_hash FROM notes \
             WHERE file_path >= ?1 AND file_path < ?2 ORDER BY file_path",
        )?;
        let raw = stmt
            .query_map(params![prefix, upper], read_entry_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter().map(into_entry).collect()
    }
}

type RawEntry = (String, String, String, String);

fn read_entry_row(row: &Row<'_>) -> rusqlite::Result<RawEntry> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_entry((id, file_path, updated_at, content_hash): RawEntry) -> Result<IndexEntry, StoreError> {
    let updated_at = parse_timestamp(&id, &updated_at)?;
    Ok(IndexEntry {
        id,
        file_path,
        updated_at,
        content_hash,
    })
}

/// Column values as stored, before timestamp and tag decoding.
struct RawRecord {
    id: String,
    file_path: String,
    title: String,
    tags: String,
    content: String,
    content_hash: String,
    created_at: String,
    updated_at: String,
}

fn read_record_row(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        id: row.get(0)?,
        file_path: row.get(1)?,
        title: row.get(2)?,
        tags: row.get(3)?,
        content: row.get(4)?,
        content_hash: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl RawRecord {
    fn into_record(self) -> Result<Record, StoreError> {
        let tags = serde_json::from_str(&self.tags).map_err(|e| StoreError::Corrupt {
            id: self.id.clone(),
            reason: format!("tags: {e}"),
        })?;
        Ok(Record {
            created_at: parse_timestamp(&self.id, &self.created_at)?,
            updated_at: parse_timestamp(&self.id, &self.updated_at)?,
            id: self.id,
            file_path: self.file_path,
            title: self.title,
            tags,
            content: self.content,
            content_hash: self.content_hash,
        })
    }
}

pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(id: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            id: id.to_string(),
            reason: format!("timestamp {value:?}: {e}"),
        })
}

fn tags_json(tags: &[String]) -> String {
    serde_json::Value::from(tags.to_vec()).to_string()
}

fn metadata_json(doc: &Document) -> Option<String> {
    (!doc.metadata.is_null()).then(|| doc.metadata.to_string())
}

fn write_log(
    conn: &Connection,
    operation: &str,
    note_id: &str,
    details: Option<&serde_json::Value>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO note_log (operation, note_id, details, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            operation,
            note_id,
            details.map(|d| d.to_string()),
            timestamp(Utc::now())
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// Deterministic provider: one spike per distinct first byte of the text.
    struct SpikeEmbedder;

    impl EmbeddingProvider for SpikeEmbedder {
        fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            let mut v = vec![0.0f32; crate::embedding::EMBEDDING_DIM];
            let seed = text.bytes().next().unwrap_or(0) as usize;
            v[seed % crate::embedding::EMBEDDING_DIM] = 1.0;
            Ok(v)
        }
    }

    struct FailingEmbedder;

    impl EmbeddingProvider for FailingEmbedder {
        fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            anyhow::bail!("model offline")
        }
    }

    fn store_with(embedder: Arc<dyn EmbeddingProvider>) -> SqliteRecordStore {
        SqliteRecordStore::new(crate::db::open_memory_database().unwrap(), embedder)
    }

    fn doc(path: &str, title: &str, content: &str) -> Document {
        Document {
            file_path: PathBuf::from(path),
            title: title.into(),
            tags: vec!["t".into()],
            content: content.into(),
            metadata: serde_json::Value::Null,
            content_hash: crate::note::document::hash_bytes(content.as_bytes()),
            modified_at: Utc::now(),
        }
    }

    fn count(store: &SqliteRecordStore, sql: &str) -> i64 {
        store.conn().query_row(sql, [], |r| r.get(0)).unwrap()
    }

    #[test]
    fn insert_then_find_by_path() {
        let mut store = store_with(Arc::new(SpikeEmbedder));
        let id = store.insert(&doc("/notes/a.md", "A", "hello")).unwrap();

        let record = store.find_by_path(Path::new("/notes/a.md")).unwrap().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.title, "A");
        assert_eq!(record.tags, vec!["t"]);
        assert_eq!(record.content, "hello");
        assert_eq!(record.created_at, record.updated_at);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM notes_vec"), 1);
    }

    #[test]
    fn find_by_path_absent_is_none() {
        let store = store_with(Arc::new(SpikeEmbedder));
        assert!(store.find_by_path(Path::new("/notes/none.md")).unwrap().is_none());
    }

    #[test]
    fn update_content_keeps_id_and_path() {
        let mut store = store_with(Arc::new(SpikeEmbedder));
        let id = store.insert(&doc("/notes/a.md", "A", "hello")).unwrap();
        store
            .update_content(&id, &doc("/notes/elsewhere.md", "A2", "goodbye"))
            .unwrap();

        let record = store.get(&id).unwrap().unwrap();
        assert_eq!(record.file_path, "/notes/a.md");
        assert_eq!(record.title, "A2");
        assert_eq!(record.content, "goodbye");
        assert!(record.updated_at >= record.created_at);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM notes_vec"), 1);
    }

    #[test]
    fn update_path_keeps_content() {
        let mut store = store_with(Arc::new(SpikeEmbedder));
        let id = store.insert(&doc("/notes/a.md", "A", "hello")).unwrap();
        store.update_path(&id, Path::new("/notes/b.md")).unwrap();

        assert!(store.find_by_path(Path::new("/notes/a.md")).unwrap().is_none());
        let record = store.find_by_path(Path::new("/notes/b.md")).unwrap().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.content, "hello");
    }

    #[test]
    fn delete_removes_row_and_vector() {
        let mut store = store_with(Arc::new(SpikeEmbedder));
        let id = store.insert(&doc("/notes/a.md", "A", "hello")).unwrap();
        store.delete(&id).unwrap();

        assert!(store.get(&id).unwrap().is_none());
        assert_eq!(count(&store, "SELECT COUNT(*) FROM notes_vec"), 0);
        assert_eq!(
            count(&store, "SELECT COUNT(*) FROM note_log WHERE operation = 'delete'"),
            1
        );
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let mut store = store_with(Arc::new(SpikeEmbedder));
        let d = doc("/notes/a.md", "A", "x");
        assert!(matches!(store.update_content("nope", &d), Err(StoreError::NotFound(_))));
        assert!(matches!(
            store.update_path("nope", Path::new("/x.md")),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(store.delete("nope"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn duplicate_paths_are_reported() {
        let mut store = store_with(Arc::new(SpikeEmbedder));
        store.insert(&doc("/notes/a.md", "A", "one")).unwrap();
        store.insert(&doc("/notes/a.md", "A", "two")).unwrap();

        match store.find_by_path(Path::new("/notes/a.md")) {
            Err(StoreError::DuplicatePath { count, .. }) => assert_eq!(count, 2),
            other => panic!("expected DuplicatePath, got {other:?}"),
        }
    }

    #[test]
    fn embedding_failure_writes_nothing() {
        let mut store = store_with(Arc::new(FailingEmbedder));
        let err = store.insert(&doc("/notes/a.md", "A", "hello")).unwrap_err();
        assert!(matches!(err, StoreError::Embedding(_)));
        assert_eq!(count(&store, "SELECT COUNT(*) FROM notes"), 0);
    }

    #[test]
    fn list_all_returns_every_record() {
        let mut store = store_with(Arc::new(SpikeEmbedder));
        let a = store.insert(&doc("/notes/a.md", "A", "1")).unwrap();
        let b = store.insert(&doc("/notes/b.md", "B", "2")).unwrap();

        let entries = store.list_all().unwrap();
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec![a.as_str(), b.as_str()]);
        assert_eq!(entries[0].file_path, "/notes/a.md");
    }

    #[test]
    fn list_under_matches_whole_directory_names() {
        let mut store = store_with(Arc::new(SpikeEmbedder));
        let inside = store.insert(&doc("/notes/sub/a.md", "A", "1")).unwrap();
        let deeper = store.insert(&doc("/notes/sub/x/b.md", "B", "2")).unwrap();
        store.insert(&doc("/notes/sub2/c.md", "C", "3")).unwrap();
        store.insert(&doc("/notes/sub.md", "D", "4")).unwrap();

        let ids: Vec<String> = store
            .list_under(Path::new("/notes/sub"))
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![inside, deeper]);
        assert!(store.list_under(Path::new("/elsewhere")).unwrap().is_empty());
    }

    #[test]
    fn touch_moves_only_updated_at() {
        let mut store = store_with(Arc::new(SpikeEmbedder));
        let id = store.insert(&doc("/notes/a.md", "A", "body")).unwrap();
        let before = store.get(&id).unwrap().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));

        store.touch(&id).unwrap();

        let after = store.get(&id).unwrap().unwrap();
        assert!(after.updated_at > before.updated_at);
        assert_eq!(after.content, before.content);
        assert_eq!(after.content_hash, before.content_hash);
        assert!(matches!(store.touch("missing"), Err(StoreError::NotFound(_))));
    }
}
