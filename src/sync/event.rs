//! Filesystem events as the dispatcher sees them, and their translation from `notify`.

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// How long a rename half waits for the event that pairs it.
pub const RENAME_PAIR_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    Created { path: PathBuf, is_directory: bool },
    Modified { path: PathBuf, is_directory: bool },
    Moved { src: PathBuf, dest: PathBuf, is_directory: bool },
    Deleted { path: PathBuf, is_directory: bool },
}

impl FsEvent {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::Created { path: path.into(), is_directory: false }
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self::Modified { path: path.into(), is_directory: false }
    }

    pub fn moved(src: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self::Moved { src: src.into(), dest: dest.into(), is_directory: false }
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self::Deleted { path: path.into(), is_directory: false }
    }

    pub fn is_directory(&self) -> bool {
        match self {
            Self::Created { is_directory, .. }
            | Self::Modified { is_directory, .. }
            | Self::Moved { is_directory, .. }
            | Self::Deleted { is_directory, .. } => *is_directory,
        }
    }

    /// The path a log line should name: the source for moves.
    pub fn path(&self) -> &Path {
        match self {
            Self::Created { path, .. } | Self::Modified { path, .. } | Self::Deleted { path, .. } => path,
            Self::Moved { src, .. } => src,
        }
    }

    /// Translate one `notify` event into zero or more [`FsEvent`]s.
    ///
    /// Rename halves (`From`/`To`) yield nothing here; [`RenamePairing`]
    /// decides what they mean once it knows whether a `Both` follows.
    pub fn from_notify(event: &Event) -> Vec<FsEvent> {
        match &event.kind {
            EventKind::Create(kind) => event
                .paths
                .iter()
                .map(|p| FsEvent::Created {
                    path: p.clone(),
                    is_directory: *kind == CreateKind::Folder || p.is_dir(),
                })
                .collect(),
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
                [src, dest, ..] => vec![FsEvent::Moved {
                    src: src.clone(),
                    dest: dest.clone(),
                    is_directory: dest.is_dir(),
                }],
                _ => Vec::new(),
            },
            EventKind::Modify(ModifyKind::Name(RenameMode::From | RenameMode::To)) => Vec::new(),
            EventKind::Modify(ModifyKind::Name(_)) => event
                .paths
                .iter()
                .map(|p| {
                    if p.exists() {
                        FsEvent::Modified { path: p.clone(), is_directory: p.is_dir() }
                    } else {
                        FsEvent::Deleted { path: p.clone(), is_directory: false }
                    }
                })
                .collect(),
            EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
            EventKind::Modify(_) => event
                .paths
                .iter()
                .map(|p| FsEvent::Modified { path: p.clone(), is_directory: p.is_dir() })
                .collect(),
            EventKind::Remove(kind) => event
                .paths
                .iter()
                .map(|p| FsEvent::Deleted {
                    path: p.clone(),
                    is_directory: *kind == RemoveKind::Folder,
                })
                .collect(),
            EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Half {
    From,
    To,
}

/// Holds rename halves until their pair shows up.
///
/// inotify reports a rename inside the watched tree as `From`, `To`, then
/// `Both`. A rename across the watch boundary produces only one half and no
/// `Both`: a note moved in gets a lone `To`, a note moved out a lone `From`.
/// Halves not claimed by a `Both` within [`RENAME_PAIR_WINDOW`] become a
/// `Created` (the path is here now) or a `Deleted` (the path is gone).
#[derive(Debug, Default)]
pub struct RenamePairing {
    pending: VecDeque<(Half, PathBuf, Instant)>,
}

impl RenamePairing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate `event`, holding back rename halves.
    pub fn translate(&mut self, event: &Event, now: Instant) -> Vec<FsEvent> {
        let half = match &event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Half::From,
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Half::To,
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                if let [src, dest, ..] = event.paths.as_slice() {
                    self.pending.retain(|(half, path, _)| match half {
                        Half::From => path != src,
                        Half::To => path != dest,
                    });
                }
                return FsEvent::from_notify(event);
            }
            _ => return FsEvent::from_notify(event),
        };
        let deadline = now + RENAME_PAIR_WINDOW;
        self.pending
            .extend(event.paths.iter().map(|p| (half, p.clone(), deadline)));
        Vec::new()
    }

    /// When the oldest held half expires.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.front().map(|(_, _, at)| *at)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Release halves whose window closed by `now`, in arrival order.
    pub fn expire(&mut self, now: Instant) -> Vec<FsEvent> {
        let mut out = Vec::new();
        while let Some((_, _, at)) = self.pending.front() {
            if *at > now {
                break;
            }
            let Some((half, path, _)) = self.pending.pop_front() else {
                break;
            };
            match half {
                Half::To if path.exists() => {
                    let is_directory = path.is_dir();
                    out.push(FsEvent::Created { path, is_directory });
                }
                Half::From if !path.exists() => out.push(FsEvent::Deleted {
                    path,
                    is_directory: false,
                }),
                // Something else already replaced or removed the path; its own
                // events cover it.
                _ => {}
            }
        }
        out
    }

    /// Release every held half regardless of its window.
    pub fn flush(&mut self) -> Vec<FsEvent> {
        match self.pending.back() {
            Some((_, _, last)) => {
                let last = *last;
                self.expire(last)
            }
            None => Vec::new(),
        }
    }
}
