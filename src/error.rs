//! Error taxonomy for the synchronization core.
//!
//! [`LoadError`] and [`StoreError`] are per-file failures: callers log them and
//! move on to the next event or file. [`SyncError`] aborts one reconciliation
//! pass. [`ConfigError`] is fatal at startup.

use std::path::PathBuf;

/// A note file could not be turned into a [`Document`](crate::note::Document).
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not valid UTF-8")]
    NotUtf8 { path: PathBuf },
    #[error("invalid frontmatter in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// A record store call failed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("{count} records share file_path {path}")]
    DuplicatePath { path: String, count: usize },
    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// A reconciliation pass could not run at all.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("notes directory is unavailable: {0}")]
    RootUnavailable(PathBuf),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Startup configuration problems. The watcher must not start when one occurs.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("notes directory is not configured (set notes.dir or NOTEWATCH_NOTES_DIR)")]
    MissingNotesDir,
    #[error("notes directory does not exist: {0}")]
    NotFound(PathBuf),
    #[error("notes path is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Failures starting the live watcher.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to subscribe to filesystem events: {0}")]
    Notify(#[from] notify::Error),
    #[error("failed to spawn watcher thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("watcher is already running")]
    AlreadyRunning,
}
