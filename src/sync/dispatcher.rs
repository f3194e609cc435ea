//! Event Dispatcher: maps one filesystem event to at most one logical store change.
//!
//! | Event            | Action                                                         |
//! |------------------|----------------------------------------------------------------|
//! | `Created(p)`     | load `p`; update the record at `p` if one exists, else insert  |
//! | `Modified(p)`    | same as `Created`, so a missed create still indexes the file   |
//! | `Moved(s, d)`    | record at `s` gets path `d`; if none, load and index `d`       |
//! | `Deleted(p)`     | delete the record at `p`; no record is a no-op                 |
//!
//! Moves are filtered per endpoint: a rename from noise to a note (editor atomic
//! save) indexes the destination, and a rename from a note to noise deletes the
//! source. Every write is preceded by `find_by_path`, the same discipline the
//! reconciler follows, so replayed or reordered events never create a second
//! record for one path.
//!
//! Directories never become records. A directory event stands for the same
//! event on every note beneath it: a moved directory re-paths its records, a
//! removed one deletes them, and one that appears is scanned and indexed.
//! A deleted path that is neither a note nor noise may have been a directory
//! (the OS no longer says), so it is treated as one.

use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::event::FsEvent;
use super::filter::EligibilityFilter;
use super::reconciler::scan_notes;
use crate::error::StoreError;
use crate::note::{self, Document};
use crate::store::{dir_prefix, RecordStore};

/// What a dispatched event did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Inserted(String),
    Updated(String),
    Moved(String),
    Deleted(String),
    /// The record already matched the file on disk.
    Unchanged(String),
    /// Filtered out before touching the store.
    Ignored,
    /// Nothing to do (e.g. deleting a path that was never indexed).
    NoOp,
    /// A load or store call failed; the failure was logged.
    Failed,
    /// A directory event; this many notes beneath it changed.
    Tree(usize),
}

/// The single store-level step an event resolves to after filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Upsert(PathBuf),
    Move { src: PathBuf, dest: PathBuf },
    Remove(PathBuf),
    IndexTree(PathBuf),
    MoveTree { src: PathBuf, dest: PathBuf },
    RemoveTree(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    filter: EligibilityFilter,
}

impl Dispatcher {
    pub fn new(filter: EligibilityFilter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> &EligibilityFilter {
        &self.filter
    }

    /// Pre-filter applied before any store call. A file event passes when its
    /// path is an eligible note (for moves, either endpoint), or when it is a
    /// deletion that may have removed a directory. Directory events pass except
    /// for `Modified`.
    pub fn should_process(&self, event: &FsEvent) -> bool {
        self.resolve(event).is_some()
    }

    /// Handle one event. Never fails: load and store errors are logged and
    /// reported as [`Outcome::Failed`].
    pub fn dispatch(&self, store: &mut dyn RecordStore, event: &FsEvent) -> Outcome {
        let Some(action) = self.resolve(event) else {
            debug!(path = %event.path().display(), ?event, "skipping event");
            return Outcome::Ignored;
        };

        match action {
            Action::Upsert(path) => {
                info!(path = %path.display(), "indexing changed note");
                match note::load(&path) {
                    Ok(doc) => log_failure(&path, upsert(store, &doc)),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to load note, skipping");
                        Outcome::Failed
                    }
                }
            }
            Action::Move { src, dest } => {
                info!(from = %src.display(), to = %dest.display(), "note moved");
                log_failure(&dest, move_record(store, &src, &dest))
            }
            Action::Remove(path) => {
                info!(path = %path.display(), "note deleted");
                log_failure(&path, remove(store, &path))
            }
            Action::IndexTree(dir) => {
                debug!(dir = %dir.display(), "directory appeared");
                Outcome::Tree(self.index_tree(store, &dir))
            }
            Action::MoveTree { src, dest } => {
                debug!(from = %src.display(), to = %dest.display(), "directory moved");
                log_failure(&src, move_tree(store, &src, &dest))
            }
            Action::RemoveTree(dir) => log_failure(&dir, remove_tree(store, &dir)),
        }
    }

    fn resolve(&self, event: &FsEvent) -> Option<Action> {
        if event.is_directory() {
            return match event {
                FsEvent::Created { path, .. } => Some(Action::IndexTree(path.clone())),
                FsEvent::Moved { src, dest, .. } => Some(Action::MoveTree {
                    src: src.clone(),
                    dest: dest.clone(),
                }),
                FsEvent::Deleted { path, .. } => Some(Action::RemoveTree(path.clone())),
                FsEvent::Modified { .. } => None,
            };
        }
        let eligible = |p: &Path| self.filter.is_eligible_file(p);

        match event {
            FsEvent::Created { path, .. } | FsEvent::Modified { path, .. } => {
                eligible(path).then(|| Action::Upsert(path.clone()))
            }
            FsEvent::Moved { src, dest, .. } => match (eligible(src), eligible(dest)) {
                (true, true) => Some(Action::Move {
                    src: src.clone(),
                    dest: dest.clone(),
                }),
                (false, true) => Some(Action::Upsert(dest.clone())),
                (true, false) => Some(Action::Remove(src.clone())),
                (false, false) => None,
            },
            FsEvent::Deleted { path, .. } if eligible(path) => Some(Action::Remove(path.clone())),
            FsEvent::Deleted { path, .. } => {
                (!self.filter.is_noise(path)).then(|| Action::RemoveTree(path.clone()))
            }
        }
    }

    /// Index every eligible note under `dir`; returns how many records changed.
    fn index_tree(&self, store: &mut dyn RecordStore, dir: &Path) -> usize {
        let mut changed = 0;
        for (_, (path, _)) in scan_notes(dir, &self.filter) {
            let outcome = match note::load(&path) {
                Ok(doc) => log_failure(&path, upsert(store, &doc)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load note, skipping");
                    Outcome::Failed
                }
            };
            if matches!(outcome, Outcome::Inserted(_) | Outcome::Updated(_)) {
                changed += 1;
            }
        }
        if changed > 0 {
            info!(dir = %dir.display(), notes = changed, "indexed notes in new directory");
        }
        changed
    }
}

/// Write `doc` to the record bound to its path, inserting only when no record exists.
pub(crate) fn upsert(store: &mut dyn RecordStore, doc: &Document) -> Result<Outcome, StoreError> {
    match store.find_by_path(&doc.file_path)? {
        Some(record) if record.content_hash == doc.content_hash => {
            debug!(path = %doc.file_path.display(), record_id = %record.id, "content unchanged");
            Ok(Outcome::Unchanged(record.id))
        }
        Some(record) => {
            store.update_content(&record.id, doc)?;
            info!(path = %doc.file_path.display(), record_id = %record.id, title = %doc.title, "updated note");
            Ok(Outcome::Updated(record.id))
        }
        None => {
            let id = store.insert(doc)?;
            info!(path = %doc.file_path.display(), record_id = %id, title = %doc.title, "inserted note");
            Ok(Outcome::Inserted(id))
        }
    }
}

fn move_record(store: &mut dyn RecordStore, src: &Path, dest: &Path) -> Result<Outcome, StoreError> {
    let Some(record) = store.find_by_path(src)? else {
        debug!(from = %src.display(), "moved note was never indexed, indexing destination");
        return match note::load(dest) {
            Ok(doc) => upsert(store, &doc),
            Err(e) => {
                warn!(path = %dest.display(), error = %e, "failed to load moved note, skipping");
                Ok(Outcome::Failed)
            }
        };
    };

    displace(store, dest, &record.id)?;
    store.update_path(&record.id, dest)?;
    info!(from = %src.display(), to = %dest.display(), record_id = %record.id, "updated note path");
    Ok(Outcome::Moved(record.id))
}

fn remove(store: &mut dyn RecordStore, path: &Path) -> Result<Outcome, StoreError> {
    match store.find_by_path(path)? {
        Some(record) => {
            store.delete(&record.id)?;
            info!(path = %path.display(), record_id = %record.id, "deleted note");
            Ok(Outcome::Deleted(record.id))
        }
        None => {
            debug!(path = %path.display(), "deleted note was not indexed");
            Ok(Outcome::NoOp)
        }
    }
}

/// A move overwrote `dest`; drop the record the overwritten file had, if any.
fn displace(store: &mut dyn RecordStore, dest: &Path, keep_id: &str) -> Result<(), StoreError> {
    if let Some(displaced) = store.find_by_path(dest)? {
        if displaced.id != keep_id {
            store.delete(&displaced.id)?;
            info!(path = %dest.display(), record_id = %displaced.id, "deleted record of overwritten note");
        }
    }
    Ok(())
}

/// Re-path every record under `src` to the same relative place under `dest`.
fn move_tree(store: &mut dyn RecordStore, src: &Path, dest: &Path) -> Result<Outcome, StoreError> {
    let entries = store.list_under(src)?;
    let prefix_len = dir_prefix(src).len();
    let mut moved = 0;
    for entry in entries {
        let new_path = dest.join(&entry.file_path[prefix_len..]);
        let result = displace(store, &new_path, &entry.id).and_then(|()| store.update_path(&entry.id, &new_path));
        match result {
            Ok(()) => moved += 1,
            Err(e) => {
                error!(from = %entry.file_path, to = %new_path.display(), error = %e, "failed to move note with its directory");
            }
        }
    }
    if moved > 0 {
        info!(from = %src.display(), to = %dest.display(), notes = moved, "updated note paths for moved directory");
    }
    Ok(Outcome::Tree(moved))
}

fn remove_tree(store: &mut dyn RecordStore, dir: &Path) -> Result<Outcome, StoreError> {
    let entries = store.list_under(dir)?;
    let mut deleted = 0;
    for entry in entries {
        match store.delete(&entry.id) {
            Ok(()) => deleted += 1,
            Err(e) => error!(path = %entry.file_path, error = %e, "failed to delete note with its directory"),
        }
    }
    if deleted > 0 {
        info!(dir = %dir.display(), notes = deleted, "deleted notes of removed directory");
    }
    Ok(Outcome::Tree(deleted))
}

fn log_failure(path: &Path, result: Result<Outcome, StoreError>) -> Outcome {
    match result {
        Ok(outcome) => outcome,
        Err(e @ StoreError::DuplicatePath { .. }) => {
            error!(path = %path.display(), error = %e, "index consistency violation, run a full sync after resolving");
            Outcome::Failed
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "store operation failed, skipping event");
            Outcome::Failed
        }
    }
}
