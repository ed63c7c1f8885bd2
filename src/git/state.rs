//! Per-repository incremental load state.
//!
//! The history loader records the last commit it has processed for each
//! repository so later incremental loads only consider newer commits. The
//! state lives in one JSON file under the data directory, keyed by the
//! canonical repository path. Reads and writes are idempotent, and the
//! whole file can be ignored with a force-full load.
//!
//! The read-modify-write cycle here is not safe under concurrent writers;
//! callers must not run two ingestions of the same repository at once.

use crate::{Error, Result, current_timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// State file name under the data directory.
const STATE_FILE: &str = "git_state.json";

/// Last processed position for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighWaterMark {
    /// Full hash of the newest processed commit.
    pub last_commit: String,
    /// Unix timestamp of the update.
    pub updated_at: u64,
}

/// High-water marks for all known repositories.
#[derive(Debug)]
pub struct IncrementalState {
    path: PathBuf,
    entries: BTreeMap<String, HighWaterMark>,
}

impl IncrementalState {
    /// Loads state from the data directory, starting empty if no state
    /// file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing state file cannot be read or parsed.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(STATE_FILE);
        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::operation("read_git_state", e))?;
            serde_json::from_str(&contents)
                .map_err(|e| Error::operation("parse_git_state", e))?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    /// Returns the mark for a repository, if one was recorded.
    #[must_use]
    pub fn get(&self, repo_path: &Path) -> Option<&HighWaterMark> {
        self.entries.get(&Self::key(repo_path))
    }

    /// Records the newest processed commit for a repository.
    pub fn set(&mut self, repo_path: &Path, last_commit: impl Into<String>) {
        self.entries.insert(
            Self::key(repo_path),
            HighWaterMark {
                last_commit: last_commit.into(),
                updated_at: current_timestamp(),
            },
        );
    }

    /// Removes the mark for a repository.
    pub fn clear(&mut self, repo_path: &Path) {
        self.entries.remove(&Self::key(repo_path));
    }

    /// Persists the state file, creating the data directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::operation("create_data_dir", e))?;
        }
        let contents = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| Error::operation("serialize_git_state", e))?;
        std::fs::write(&self.path, contents).map_err(|e| Error::operation("write_git_state", e))
    }

    /// Canonical map key for a repository path.
    fn key(repo_path: &Path) -> String {
        std::fs::canonicalize(repo_path)
            .unwrap_or_else(|_| repo_path.to_path_buf())
            .to_string_lossy()
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        std::fs::create_dir(&repo).unwrap();

        let mut state = IncrementalState::load(dir.path()).unwrap();
        assert!(state.get(&repo).is_none());

        state.set(&repo, "abc123");
        state.save().unwrap();

        let reloaded = IncrementalState::load(dir.path()).unwrap();
        assert_eq!(reloaded.get(&repo).map(|m| m.last_commit.as_str()), Some("abc123"));
    }

    #[test]
    fn test_set_overwrites_idempotently() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        std::fs::create_dir(&repo).unwrap();

        let mut state = IncrementalState::load(dir.path()).unwrap();
        state.set(&repo, "first");
        state.set(&repo, "second");
        state.save().unwrap();
        state.save().unwrap();

        let reloaded = IncrementalState::load(dir.path()).unwrap();
        assert_eq!(
            reloaded.get(&repo).map(|m| m.last_commit.as_str()),
            Some("second")
        );
    }

    #[test]
    fn test_clear_removes_mark() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        std::fs::create_dir(&repo).unwrap();

        let mut state = IncrementalState::load(dir.path()).unwrap();
        state.set(&repo, "abc");
        state.clear(&repo);
        assert!(state.get(&repo).is_none());
    }
}
