//! Git history loader.
//!
//! Stateful: tracks a per-repository high-water mark so incremental loads
//! only consider commits after the last processed one; a force-full load
//! ignores the mark and reprocesses everything. Record ids are
//! deterministic functions of the source content, so repeated full loads
//! upsert rather than duplicate.
//!
//! Three pattern families are mined from commit history:
//! - *co-change*: file pairs that repeatedly change in the same commit
//! - *hotspot*: files with unusually frequent changes
//! - *solution*: fix-shaped commits capturing how a problem was resolved

use super::{LoadOptions, MemoryLoader};
use crate::config::GitConfig;
use crate::git::{CommitInfo, HistoryMiner, IncrementalState, MineOptions};
use crate::models::{Connection, HierarchyLevel, MemoryRecord, PatternType};
use crate::{Error, Result};
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Commits touching more files than this are treated as bulk changes and
/// excluded from pair counting.
const MAX_FILES_PER_COMMIT: usize = 20;

/// Matches commit subjects that describe a fix.
static FIX_PATTERN: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"(?i)\b(fix(es|ed)?|resolve[sd]?|close[sd]?|bug|hotfix|patch)\b").unwrap()
});

/// Loader for git repository history.
pub struct GitHistoryLoader {
    config: GitConfig,
    data_dir: PathBuf,
}

impl GitHistoryLoader {
    /// Creates a git history loader.
    ///
    /// `data_dir` is where the per-repository high-water mark lives.
    #[must_use]
    pub fn new(config: GitConfig, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            data_dir: data_dir.into(),
        }
    }

    /// Returns the recorded high-water mark for a repository, if any.
    pub fn last_processed_commit(&self, repo_path: &Path) -> Result<Option<String>> {
        let state = IncrementalState::load(&self.data_dir)?;
        Ok(state.get(repo_path).map(|mark| mark.last_commit.clone()))
    }

    /// Deterministic pattern record id.
    fn pattern_id(kind: PatternType, parts: &[&str]) -> String {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        format!("git::{}::{}", kind.as_str(), hex::encode(hasher.finalize()))
    }

    /// Canonical repository key used in ids and metadata.
    fn repo_key(path: &Path) -> String {
        std::fs::canonicalize(path)
            .unwrap_or_else(|_| path.to_path_buf())
            .to_string_lossy()
            .into_owned()
    }

    /// Short repository name for titles and content.
    fn repo_name(path: &Path) -> String {
        path.file_name()
            .map_or_else(|| path.to_string_lossy().into_owned(), |n| n.to_string_lossy().into_owned())
    }

    /// Derives pattern records from a span of commit history.
    fn derive_patterns(
        repo_key: &str,
        repo_name: &str,
        commits: &[CommitInfo],
        config: &GitConfig,
    ) -> Vec<MemoryRecord> {
        let mut records = Vec::new();

        // Co-change: count unordered file pairs across commits.
        let mut pair_counts: BTreeMap<(String, String), usize> = BTreeMap::new();
        let mut file_counts: BTreeMap<String, usize> = BTreeMap::new();

        for commit in commits {
            for file in &commit.affected_files {
                *file_counts.entry(file.clone()).or_default() += 1;
            }
            if commit.affected_files.len() > MAX_FILES_PER_COMMIT {
                continue;
            }
            for (i, a) in commit.affected_files.iter().enumerate() {
                for b in &commit.affected_files[i + 1..] {
                    let pair = if a <= b {
                        (a.clone(), b.clone())
                    } else {
                        (b.clone(), a.clone())
                    };
                    *pair_counts.entry(pair).or_default() += 1;
                }
            }
        }

        for ((a, b), support) in &pair_counts {
            if *support < config.cochange_min_support {
                continue;
            }
            records.push(
                MemoryRecord::new(
                    Self::pattern_id(PatternType::Cochange, &[repo_key, a, b]),
                    format!(
                        "Git pattern: co-change. {a} and {b} changed together in \
                         {support} commits in {repo_name}."
                    ),
                    HierarchyLevel::Context,
                )
                .with_metadata("title", format!("{a} <-> {b}"))
                .with_metadata("pattern_type", PatternType::Cochange.as_str())
                .with_metadata("loader_type", "git")
                .with_metadata("repository", repo_name)
                .with_metadata("source_path", repo_key)
                .with_metadata("files", serde_json::json!([a, b]))
                .with_metadata("support", *support),
            );
        }

        // Hotspot: files changed at least the configured number of times.
        for (file, count) in &file_counts {
            if *count < config.hotspot_min_changes {
                continue;
            }
            records.push(
                MemoryRecord::new(
                    Self::pattern_id(PatternType::Hotspot, &[repo_key, file]),
                    format!(
                        "Git pattern: maintenance hotspot. {file} changed {count} \
                         times in {repo_name}."
                    ),
                    HierarchyLevel::Context,
                )
                .with_metadata("title", file.clone())
                .with_metadata("pattern_type", PatternType::Hotspot.as_str())
                .with_metadata("loader_type", "git")
                .with_metadata("repository", repo_name)
                .with_metadata("source_path", repo_key)
                .with_metadata("file", file.clone())
                .with_metadata("change_count", *count),
            );
        }

        // Solution: fix-shaped commits, one episode each.
        for commit in commits {
            if !FIX_PATTERN.is_match(commit.subject()) {
                continue;
            }
            records.push(
                MemoryRecord::new(
                    Self::pattern_id(PatternType::Solution, &[&commit.hash]),
                    format!(
                        "Git pattern: solution. {}\n\nFiles: {}",
                        commit.message.trim(),
                        commit.affected_files.join(", ")
                    ),
                    HierarchyLevel::Episode,
                )
                .with_metadata("title", commit.subject())
                .with_metadata("pattern_type", PatternType::Solution.as_str())
                .with_metadata("loader_type", "git")
                .with_metadata("repository", repo_name)
                .with_metadata("source_path", repo_key)
                .with_metadata("commit_hash", commit.hash.clone())
                .with_metadata("author_name", commit.author_name.clone())
                .with_metadata("author_email", commit.author_email.clone())
                .with_metadata("timestamp", commit.timestamp.to_rfc3339())
                .with_metadata(
                    "affected_files",
                    serde_json::json!(commit.affected_files.clone()),
                ),
            );
        }

        records
    }
}

impl MemoryLoader for GitHistoryLoader {
    fn name(&self) -> &'static str {
        "git"
    }

    fn supported_extensions(&self) -> &[&'static str] {
        // Repository-shaped sources are matched by structure, not suffix.
        &[]
    }

    fn validate_source(&self, path: &Path) -> bool {
        HistoryMiner::validate(path)
    }

    fn load_from_source(&self, path: &Path, options: &LoadOptions) -> Result<Vec<MemoryRecord>> {
        let miner = HistoryMiner::open(path)?;

        let since_commit = if options.force_full_load {
            None
        } else {
            // A recorded mark that no longer resolves (rebase, history
            // rewrite) falls back to a full load.
            self.last_processed_commit(path)?
                .filter(|mark| miner.is_known_commit(mark))
        };

        let window = options
            .time_window
            .as_deref()
            .unwrap_or(&self.config.time_window);
        let since_time = Some(Utc::now() - parse_time_window(window)?);

        let commits = miner.extract_history(&MineOptions {
            since_commit: since_commit.clone(),
            since_time,
            branch: None,
            max_commits: options.max_commits.unwrap_or(self.config.max_commits),
        })?;

        let repo_key = Self::repo_key(path);
        let repo_name = Self::repo_name(path);
        let records = Self::derive_patterns(&repo_key, &repo_name, &commits, &self.config);

        tracing::info!(
            repo = %repo_name,
            commits = commits.len(),
            patterns = records.len(),
            incremental = since_commit.is_some(),
            "mined git history"
        );
        Ok(records)
    }

    fn extract_connections(&self, records: &[MemoryRecord]) -> Vec<Connection> {
        // Hotspots indexed by file path; other patterns link to them.
        let hotspots: BTreeMap<&str, &MemoryRecord> = records
            .iter()
            .filter(|r| r.pattern_type() == Some(PatternType::Hotspot))
            .filter_map(|r| {
                r.metadata
                    .get("file")
                    .and_then(serde_json::Value::as_str)
                    .map(|file| (file, r))
            })
            .collect();

        let mut connections = Vec::new();
        for record in records {
            let (files, strength) = match record.pattern_type() {
                Some(PatternType::Cochange) => (record.metadata.get("files"), 0.6),
                Some(PatternType::Solution) => (record.metadata.get("affected_files"), 0.5),
                _ => continue,
            };
            let Some(files) = files.and_then(serde_json::Value::as_array) else {
                continue;
            };
            for file in files.iter().filter_map(serde_json::Value::as_str) {
                if let Some(hotspot) = hotspots.get(file) {
                    connections.push(Connection::new(
                        record.id.clone(),
                        hotspot.id.clone(),
                        strength,
                        format!("shared_file:{file}"),
                    ));
                }
            }
        }
        connections
    }

    fn commit_checkpoint(&self, path: &Path, _options: &LoadOptions) -> Result<()> {
        let miner = HistoryMiner::open(path)?;
        let head = miner.head_commit()?;
        let mut state = IncrementalState::load(&self.data_dir)?;
        state.set(path, head);
        state.save()
    }
}

/// Parses a time window like "30d", "2w", "3m", or "1y" into a duration.
fn parse_time_window(window: &str) -> Result<Duration> {
    let window = window.trim();
    if !window.is_ascii() || window.len() < 2 {
        return Err(Error::InvalidInput(format!(
            "invalid time window: {window}"
        )));
    }
    let (number, unit) = window.split_at(window.len() - 1);
    let count: i64 = number
        .parse()
        .map_err(|_| Error::InvalidInput(format!("invalid time window: {window}")))?;
    if count <= 0 {
        return Err(Error::InvalidInput(format!(
            "invalid time window: {window}"
        )));
    }
    let days = match unit {
        "d" => count,
        "w" => count * 7,
        "m" => count * 30,
        "y" => count * 365,
        _ => {
            return Err(Error::InvalidInput(format!(
                "invalid time window unit: {window}"
            )));
        },
    };
    Ok(Duration::days(days))
}
