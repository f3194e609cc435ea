use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use super::frontmatter::split_frontmatter;
use crate::error::LoadError;

/// A markdown note as read from disk, normalized for indexing.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub file_path: PathBuf,
    pub title: String,
    pub tags: Vec<String>,
    pub content: String,
    /// Frontmatter keys other than `title` and `tags`.
    pub metadata: serde_json::Value,
    /// SHA-256 of the raw file bytes, lowercase hex.
    pub content_hash: String,
    pub modified_at: DateTime<Utc>,
}

impl Document {
    /// Text handed to the embedding model.
    pub fn embedding_text(&self) -> String {
        if self.tags.is_empty() {
            format!("{}\n\n{}", self.title, self.content)
        } else {
            format!("{}\n{}\n\n{}", self.title, self.tags.join(", "), self.content)
        }
    }
}

/// Read and parse the note at `path`.
///
/// Fails when the file is gone or unreadable, is not UTF-8, or carries a
/// frontmatter block that does not parse.
pub fn load(path: &Path) -> Result<Document, LoadError> {
    let io_err = |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };
    let bytes = std::fs::read(path).map_err(io_err)?;
    let modified_at = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .map_err(io_err)?;

    let content_hash = hash_bytes(&bytes);
    let text = String::from_utf8(bytes).map_err(|_| LoadError::NotUtf8 {
        path: path.to_path_buf(),
    })?;
    let (frontmatter, body) = split_frontmatter(&text).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let mut frontmatter = frontmatter.unwrap_or_default();

    let title = frontmatter
        .remove("title")
        .and_then(scalar_to_string)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| file_stem(path));
    let tags = frontmatter.remove("tags").map(parse_tags).unwrap_or_default();

    Ok(Document {
        file_path: path.to_path_buf(),
        title,
        tags,
        content: body,
        metadata: metadata_json(frontmatter),
        content_hash,
        modified_at,
    })
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Tags may be a YAML list or a single comma-separated string.
fn parse_tags(value: Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::Sequence(items) => items.into_iter().filter_map(scalar_to_string).collect(),
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        other => scalar_to_string(other).into_iter().collect(),
    };
    raw.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn metadata_json(rest: Mapping) -> serde_json::Value {
    if rest.is_empty() {
        return serde_json::Value::Null;
    }
    // Non-string keys and YAML tags have no JSON form; drop the whole map rather
    // than fail the note over auxiliary metadata.
    serde_json::to_value(&rest).unwrap_or(serde_json::Value::Null)
}
