#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use notewatch::db;
use notewatch::embedding::{EmbeddingProvider, EMBEDDING_DIM};
use notewatch::store::{RecordStore, SqliteRecordStore};
use tempfile::TempDir;

/// Deterministic embedder: each word bumps one hashed dimension, then the
/// vector is L2-normalized. Texts sharing words land close together.
pub struct HashEmbedder;

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        for word in text.split_whitespace() {
            let h = word
                .to_lowercase()
                .bytes()
                .fold(5381usize, |h, b| h.wrapping_mul(33) ^ b as usize);
            v[h % EMBEDDING_DIM] += 1.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        } else {
            v[0] = 1.0;
        }
        Ok(v)
    }
}

/// A store over a fresh in-memory database.
pub fn test_store() -> SqliteRecordStore {
    let conn = db::open_memory_database().unwrap();
    SqliteRecordStore::new(conn, Arc::new(HashEmbedder))
}

/// A temporary notes directory and its canonical path.
pub fn notes_dir() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    (tmp, root)
}

/// Write `content` to `dir/name`, creating parent directories.
pub fn write_note(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

/// Push a file's mtime into the future so the next reconciliation sees it
/// as modified regardless of filesystem timestamp granularity.
pub fn bump_mtime(path: &Path) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(5))
        .unwrap();
}

pub fn record_count(store: &SqliteRecordStore) -> usize {
    store.list_all().unwrap().len()
}

/// Id of the single record at `path`; panics if there is none.
pub fn id_at(store: &SqliteRecordStore, path: &Path) -> String {
    store
        .find_by_path(path)
        .unwrap()
        .unwrap_or_else(|| panic!("no record for {}", path.display()))
        .id
}
