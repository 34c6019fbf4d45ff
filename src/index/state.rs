//! Persisted index state and the corruption marker
//!
//! The state file records which registry commit the store reflects. It is
//! loaded once at startup and saved after each successful update or
//! invalidation.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::index::constants::{CORRUPTION_MARKER_FILE, STATE_FILE};
use crate::index::types::CommitHash;
use crate::index::utils::{atomic_write, remove_file_if_exists};

/// State saved next to the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexState {
    #[serde(default)]
    pub indexed_commit_hash: CommitHash,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for IndexState {
    fn default() -> Self {
        Self {
            indexed_commit_hash: CommitHash::invalid(),
            updated_at: None,
        }
    }
}

impl IndexState {
    pub fn new(indexed_commit_hash: CommitHash) -> Self {
        Self {
            indexed_commit_hash,
            updated_at: Some(Utc::now()),
        }
    }

    /// Load the state, falling back to the default when missing or unreadable
    pub fn load(path: &Path) -> Self {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), "Failed to read index state: {}", e);
                return Self::default();
            }
        };

        match serde_json::from_str(&json) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Ignoring malformed index state: {}", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(path, json.as_bytes())
            .with_context(|| format!("Failed to save index state to {}", path.display()))
    }
}

/// Paths of the persisted files inside the cache directory
#[derive(Debug, Clone)]
pub struct StatePaths {
    cache_dir: PathBuf,
}

impl StatePaths {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn state_file(&self) -> PathBuf {
        self.cache_dir.join(STATE_FILE)
    }

    pub fn corruption_marker(&self) -> PathBuf {
        self.cache_dir.join(CORRUPTION_MARKER_FILE)
    }

    pub fn has_corruption_marker(&self) -> bool {
        self.corruption_marker().exists()
    }

    pub fn write_corruption_marker(&self) -> Result<()> {
        let marker = self.corruption_marker();
        atomic_write(&marker, Utc::now().to_rfc3339().as_bytes())
            .with_context(|| format!("Failed to write corruption marker {}", marker.display()))
    }

    pub fn clear_corruption_marker(&self) -> Result<()> {
        remove_file_if_exists(&self.corruption_marker())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_state_round_trip() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join(STATE_FILE);

        let state = IndexState::new(CommitHash::new("a".repeat(40)));
        state.save(&path)?;

        assert_eq!(IndexState::load(&path), state);
        Ok(())
    }

    #[test]
    fn test_missing_or_malformed_state_is_invalid() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join(STATE_FILE);
        assert!(!IndexState::load(&path).indexed_commit_hash.is_valid());

        fs::write(&path, "{ not json")?;
        assert!(!IndexState::load(&path).indexed_commit_hash.is_valid());
        Ok(())
    }

    #[test]
    fn test_corruption_marker_lifecycle() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let paths = StatePaths::new(temp_dir.path());
        assert!(!paths.has_corruption_marker());

        paths.write_corruption_marker()?;
        assert!(paths.has_corruption_marker());

        paths.clear_corruption_marker()?;
        assert!(!paths.has_corruption_marker());
        paths.clear_corruption_marker()?;
        Ok(())
    }
}
