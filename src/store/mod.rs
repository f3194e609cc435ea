//! Record Store Adapter.
//!
//! [`RecordStore`] is the narrow interface the synchronization core needs from
//! the vector database. Records are keyed by a store-assigned id that never
//! changes; `file_path` is a mutable attribute used as the join key with disk.
//! [`SqliteRecordStore`] is the production implementation.

pub mod search;
pub mod sqlite;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, MAIN_SEPARATOR};

use crate::error::StoreError;
use crate::note::Document;

pub use sqlite::SqliteRecordStore;

/// A stored note.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    /// UUID v7 assigned on first insert.
    pub id: String,
    pub file_path: String,
    pub title: String,
    pub tags: Vec<String>,
    pub content: String,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    /// Time of the last successful write to this record.
    pub updated_at: DateTime<Utc>,
}

/// The slice of a record the reconciler needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub id: String,
    pub file_path: String,
    pub updated_at: DateTime<Utc>,
    pub content_hash: String,
}

/// CRUD over indexed notes.
///
/// Callers must look a path up with [`find_by_path`](Self::find_by_path) before
/// calling [`insert`](Self::insert); the store does not reject a second record
/// for a path it already holds.
pub trait RecordStore {
    /// Exact-match lookup. Errors with [`StoreError::DuplicatePath`] if more than
    /// one record claims `path`.
    fn find_by_path(&self, path: &Path) -> Result<Option<Record>, StoreError>;

    fn get(&self, id: &str) -> Result<Option<Record>, StoreError>;

    /// Create a record bound to `doc.file_path`; returns the new id.
    fn insert(&mut self, doc: &Document) -> Result<String, StoreError>;

    /// Overwrite title, tags, and content. Id and path are unchanged.
    fn update_content(&mut self, id: &str, doc: &Document) -> Result<(), StoreError>;

    /// Overwrite `file_path` only.
    fn update_path(&mut self, id: &str, new_path: &Path) -> Result<(), StoreError>;

    /// Record that the file was checked against the index just now without
    /// changing its content. Only `updated_at` moves.
    fn touch(&mut self, id: &str) -> Result<(), StoreError>;

    fn delete(&mut self, id: &str) -> Result<(), StoreError>;

    /// Every record, for full reconciliation.
    fn list_all(&self) -> Result<Vec<IndexEntry>, StoreError>;

    /// Records whose path lies strictly below `dir`.
    fn list_under(&self, dir: &Path) -> Result<Vec<IndexEntry>, StoreError> {
        let prefix = dir_prefix(dir);
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|e| e.file_path.starts_with(&prefix))
            .collect())
    }
}

/// Canonical string form of a path used as the stored `file_path`.
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Stored-path prefix shared by everything inside `dir`, separator included.
pub fn dir_prefix(dir: &Path) -> String {
    let mut prefix = path_key(dir);
    if !prefix.ends_with(MAIN_SEPARATOR) {
        prefix.push(MAIN_SEPARATOR);
    }
    prefix
}
