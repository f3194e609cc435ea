//! Eligibility filter: which paths are real notes and which are editor or OS noise.

use std::path::Path;

/// Suffixes left behind by editors while a file is being written.
const TEMP_SUFFIXES: &[&str] = &[".swp", ".swo", ".swx", ".tmp", ".temp"];

#[derive(Debug, Clone)]
pub struct EligibilityFilter {
    /// Lowercase, without the leading dot.
    extension: String,
}

impl Default for EligibilityFilter {
    fn default() -> Self {
        Self::new("md")
    }
}

impl EligibilityFilter {
    pub fn new(extension: &str) -> Self {
        Self {
            extension: extension.trim_start_matches('.').to_ascii_lowercase(),
        }
    }

    /// Whether `path` names an indexable note, judged by its file name alone.
    ///
    /// Rejects dotfiles, `~` backup and lock artifacts, temp-file suffixes, and
    /// anything whose extension is not the markdown extension (case-insensitive).
    pub fn is_eligible_file(&self, path: &Path) -> bool {
        !self.is_noise(path)
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension))
    }

    /// Editor or OS artifacts, whatever their extension: dotfiles, `~` names,
    /// temp suffixes, and paths without a usable file name.
    pub fn is_noise(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return true;
        };
        if name.starts_with('.') || name.starts_with('~') || name.ends_with('~') {
            return true;
        }
        let lower = name.to_ascii_lowercase();
        TEMP_SUFFIXES.iter().any(|s| lower.ends_with(s))
    }
}
