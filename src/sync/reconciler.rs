//! Reconciler: full comparison of the notes directory against the index.
//!
//! Catches up on events missed while the process was down and corrects drift
//! when run periodically. Per-file failures are counted and skipped; only a
//! missing root or a failure to enumerate the index aborts a pass.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use super::dispatcher::{upsert, Outcome};
use super::filter::EligibilityFilter;
use crate::error::{StoreError, SyncError};
use crate::note;
use crate::store::{path_key, IndexEntry, RecordStore};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub disk_files: usize,
    pub indexed_files: usize,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Paths claimed by more than one record; left untouched.
    pub conflicts: usize,
}

impl SyncReport {
    /// True when the pass wrote nothing to the store.
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.updated == 0 && self.deleted == 0
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on disk, {} indexed: {} inserted, {} updated, {} deleted, {} skipped, {} failed, {} conflicts",
            self.disk_files,
            self.indexed_files,
            self.inserted,
            self.updated,
            self.deleted,
            self.skipped,
            self.failed,
            self.conflicts
        )
    }
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    root: PathBuf,
    filter: EligibilityFilter,
}

impl Reconciler {
    pub fn new(root: impl Into<PathBuf>, filter: EligibilityFilter) -> Self {
        Self {
            root: root.into(),
            filter,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every eligible note under the root, keyed by stored path form, with its mtime.
    pub fn scan_disk(&self) -> BTreeMap<String, (PathBuf, DateTime<Utc>)> {
        scan_notes(&self.root, &self.filter)
    }

    /// Bring the index in line with disk: insert new notes, update notes modified
    /// since their last index write, delete records whose file is gone.
    ///
    /// Refuses to run when the root is not a readable directory, since an empty
    /// scan would delete every record.
    pub fn sync(&self, store: &mut dyn RecordStore) -> Result<SyncReport, SyncError> {
        if !self.root.is_dir() {
            return Err(SyncError::RootUnavailable(self.root.clone()));
        }
        info!(root = %self.root.display(), "starting reconciliation");
        let disk = self.scan_disk();
        let entries = store.list_all()?;

        let mut report = SyncReport {
            disk_files: disk.len(),
            indexed_files: entries.len(),
            ..Default::default()
        };

        let mut by_path: HashMap<String, Vec<IndexEntry>> = HashMap::new();
        for entry in entries {
            by_path.entry(entry.file_path.clone()).or_default().push(entry);
        }
        let mut indexed: HashMap<String, IndexEntry> = HashMap::with_capacity(by_path.len());
        let mut conflicted: HashSet<String> = HashSet::new();
        for (path, mut records) in by_path {
            if records.len() == 1 {
                indexed.extend(records.pop().map(|r| (path, r)));
            } else {
                let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
                error!(path = %path, ?ids, "multiple records share one file_path; leaving them for manual repair");
                conflicted.insert(path);
            }
        }
        report.conflicts = conflicted.len();

        for (key, (path, mtime)) in &disk {
            if conflicted.contains(key) {
                continue;
            }
            match indexed.get(key) {
                None => self.index_new(store, path, &mut report),
                Some(entry) if *mtime > entry.updated_at => {
                    self.refresh(store, path, entry, &mut report)
                }
                Some(_) => report.skipped += 1,
            }
        }

        for (key, entry) in &indexed {
            if disk.contains_key(key) {
                continue;
            }
            match store.delete(&entry.id) {
                Ok(()) => {
                    info!(path = %key, record_id = %entry.id, "deleted record of missing note");
                    report.deleted += 1;
                }
                Err(e) => {
                    error!(path = %key, record_id = %entry.id, error = %e, "failed to delete stale record");
                    report.failed += 1;
                }
            }
        }

        info!(%report, "reconciliation complete");
        Ok(report)
    }

    fn index_new(&self, store: &mut dyn RecordStore, path: &Path, report: &mut SyncReport) {
        let doc = match note::load(path) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load note, leaving unsynced");
                report.failed += 1;
                return;
            }
        };
        self.tally(upsert(store, &doc), path, report);
    }

    fn refresh(&self, store: &mut dyn RecordStore, path: &Path, entry: &IndexEntry, report: &mut SyncReport) {
        let doc = match note::load(path) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load note, leaving unsynced");
                report.failed += 1;
                return;
            }
        };
        if doc.content_hash == entry.content_hash {
            debug!(path = %path.display(), "mtime changed but content did not");
            // Bump updated_at past the mtime so later passes skip the reload.
            if let Err(e) = store.touch(&entry.id) {
                warn!(path = %path.display(), record_id = %entry.id, error = %e, "failed to refresh timestamp");
            }
            report.skipped += 1;
            return;
        }
        self.tally(upsert(store, &doc), path, report);
    }

    fn tally(&self, result: Result<Outcome, StoreError>, path: &Path, report: &mut SyncReport) {
        match result {
            Ok(Outcome::Inserted(_)) => report.inserted += 1,
            Ok(Outcome::Updated(_)) => report.updated += 1,
            Ok(_) => report.skipped += 1,
            Err(StoreError::DuplicatePath { count, .. }) => {
                error!(path = %path.display(), count, "multiple records share one file_path");
                report.conflicts += 1;
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "store operation failed, leaving unsynced");
                report.failed += 1;
            }
        }
    }
}

/// Eligible notes under `root`, keyed by stored path form, with their mtimes.
///
/// Symlinked notes are followed the same way [`note::load`] reads them;
/// symlinked directories are not descended.
pub(crate) fn scan_notes(root: &Path, filter: &EligibilityFilter) -> BTreeMap<String, (PathBuf, DateTime<Utc>)> {
    let mut files = BTreeMap::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "error walking notes directory");
                continue;
            }
        };
        if entry.file_type().is_dir() || !filter.is_eligible_file(entry.path()) {
            continue;
        }
        match std::fs::metadata(entry.path()) {
            Ok(meta) if meta.is_file() => match meta.modified() {
                Ok(mtime) => {
                    let path = entry.into_path();
                    files.insert(path_key(&path), (path, DateTime::<Utc>::from(mtime)));
                }
                Err(e) => warn!(path = %entry.path().display(), error = %e, "cannot read modification time"),
            },
            Ok(_) => {}
            Err(e) => debug!(path = %entry.path().display(), error = %e, "skipping unreadable entry"),
        }
    }
    files
}
