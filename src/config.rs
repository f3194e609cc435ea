use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::ConfigError;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct NotewatchConfig {
    pub server: ServerConfig,
    pub notes: NotesConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub sync: SyncConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotesConfig {
    /// Watched notes directory. Required by `serve` and `sync`.
    pub dir: Option<String>,
    /// Markdown extension, compared case-insensitively and without the dot.
    pub extension: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between periodic reconciliation passes while watching. 0 disables them.
    pub interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            dir: None,
            extension: "md".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_notewatch_dir()
            .join("index.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_notewatch_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { default_limit: 5 }
    }
}

/// Returns `~/.notewatch/`, or `./.notewatch/` when no home directory is known.
pub fn default_notewatch_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".notewatch")
}

/// Returns the default config file path: `~/.notewatch/config.toml`
pub fn default_config_path() -> PathBuf {
    default_notewatch_dir().join("config.toml")
}

impl NotewatchConfig {
    /// Load config from the default TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str(&contents)?
        } else {
            info!("no config file at {}, using defaults", path.display());
            NotewatchConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (NOTEWATCH_NOTES_DIR, NOTEWATCH_DB, NOTEWATCH_SYNC_INTERVAL, NOTEWATCH_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("NOTEWATCH_NOTES_DIR") {
            self.notes.dir = Some(val);
        }
        if let Ok(val) = std::env::var("NOTEWATCH_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("NOTEWATCH_SYNC_INTERVAL") {
            match val.parse() {
                Ok(secs) => self.sync.interval_secs = secs,
                Err(_) => tracing::warn!(value = %val, "ignoring non-numeric NOTEWATCH_SYNC_INTERVAL"),
            }
        }
        if let Ok(val) = std::env::var("NOTEWATCH_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// Resolve and validate the notes directory.
    ///
    /// The directory must exist and be a directory; the returned path is
    /// canonicalized so that watcher events and directory scans agree on prefixes.
    pub fn resolved_notes_dir(&self) -> Result<PathBuf, ConfigError> {
        let raw = self
            .notes
            .dir
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .ok_or(ConfigError::MissingNotesDir)?;
        validate_notes_dir(&expand_tilde(raw))
    }
}

/// Check that `dir` exists and is a directory, returning its canonical form.
pub fn validate_notes_dir(dir: &Path) -> Result<PathBuf, ConfigError> {
    if !dir.exists() {
        return Err(ConfigError::NotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(ConfigError::NotADirectory(dir.to_path_buf()));
    }
    dir.canonicalize().map_err(|source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
