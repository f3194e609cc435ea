//! Nearest-neighbour lookup over indexed notes.

use rusqlite::params;
use serde::Serialize;

use super::SqliteRecordStore;
use crate::embedding::embedding_to_bytes;
use crate::error::StoreError;

/// Characters of body text included in a hit.
const PREVIEW_CHARS: usize = 160;

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub file_path: String,
    pub tags: Vec<String>,
    pub preview: String,
    /// L2 distance between unit vectors; smaller is closer.
    pub distance: f64,
}

impl SqliteRecordStore {
    /// Embed `query` and return the `limit` closest notes.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, StoreError> {
        if query.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let embedding = self
            .embedder()
            .embed(query)
            .map_err(|e| StoreError::Embedding(format!("query: {e}")))?;

        let mut stmt = self.conn().prepare(
            "SELECT n.id, n.title, n.file_path, n.tags, n.content, v.distance \
             FROM (SELECT id, distance FROM notes_vec WHERE embedding MATCH ?1 ORDER BY distance LIMIT ?2) v \
             JOIN notes n ON n.id = v.id \
             ORDER BY v.distance",
        )?;
        let hits = stmt
            .query_map(params![embedding_to_bytes(&embedding), limit as i64], |row| {
                let tags: String = row.get(3)?;
                let content: String = row.get(4)?;
                Ok(SearchHit {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    file_path: row.get(2)?,
                    tags: serde_json::from_str(&tags).unwrap_or_default(),
                    preview: preview(&content),
                    distance: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(hits)
    }
}

fn preview(content: &str) -> String {
    let trimmed = content.trim();
    match trimmed.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
