//! Commit history mining.
//!
//! Walks a repository's commit graph and converts each commit into a
//! [`CommitInfo`] carrying the metadata the pattern analysis needs:
//! author, timestamp, message, and the set of affected files.

use crate::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use git2::{Delta, DiffOptions, Repository, Sort};
use std::path::{Path, PathBuf};

/// Upper bound on commits examined in a single walk, regardless of the
/// caller-supplied limit.
const MAX_COMMITS_HARD_LIMIT: usize = 10_000;

/// One commit, flattened for analysis.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    /// Full commit hash.
    pub hash: String,
    /// Author name.
    pub author_name: String,
    /// Author email.
    pub author_email: String,
    /// Author timestamp.
    pub timestamp: DateTime<Utc>,
    /// Full commit message.
    pub message: String,
    /// Repository-relative paths touched by this commit.
    pub affected_files: Vec<String>,
}

impl CommitInfo {
    /// First line of the commit message.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or_default().trim()
    }
}

/// Options for a history walk.
#[derive(Debug, Clone, Default)]
pub struct MineOptions {
    /// Only consider commits after this one (exclusive). Overrides
    /// `since_time` when set, matching incremental-load semantics.
    pub since_commit: Option<String>,
    /// Only consider commits authored after this instant.
    pub since_time: Option<DateTime<Utc>>,
    /// Branch to walk. Defaults to HEAD.
    pub branch: Option<String>,
    /// Maximum commits to return. Clamped to an internal safety limit.
    pub max_commits: usize,
}

/// Walks commit history of one repository.
pub struct HistoryMiner {
    repo: Repository,
    path: PathBuf,
}

impl HistoryMiner {
    /// Opens a repository at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not an accessible git repository.
    pub fn open(path: &Path) -> Result<Self> {
        let repo =
            Repository::open(path).map_err(|e| Error::operation("open_repository", e.message()))?;
        Ok(Self {
            repo,
            path: path.to_path_buf(),
        })
    }

    /// Returns true if the path is a git repository with at least one commit.
    ///
    /// Fails closed: missing paths, non-repositories, and repositories with
    /// an unborn HEAD all return false.
    #[must_use]
    pub fn validate(path: &Path) -> bool {
        if !path.is_dir() {
            return false;
        }
        Repository::open(path)
            .and_then(|repo| repo.head().and_then(|head| head.peel_to_commit().map(|_| ())))
            .is_ok()
    }

    /// Returns the repository path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the full hash of the current HEAD commit.
    ///
    /// # Errors
    ///
    /// Returns an error if HEAD is unborn.
    pub fn head_commit(&self) -> Result<String> {
        let head = self
            .repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .map_err(|e| Error::operation("resolve_head", e.message()))?;
        Ok(head.id().to_string())
    }

    /// Checks whether a (possibly abbreviated) commit hash resolves to a
    /// commit in this repository.
    ///
    /// Leading and trailing whitespace is tolerated. Non-hex input, hashes
    /// shorter than git's abbreviation minimum, and hashes that do not
    /// resolve all return false.
    #[must_use]
    pub fn is_known_commit(&self, hash: &str) -> bool {
        let hash = hash.trim();
        let valid_format = (7..=64).contains(&hash.len())
            && hash.chars().all(|c| c.is_ascii_hexdigit());
        if !valid_format {
            return false;
        }
        self.repo
            .revparse_single(hash)
            .and_then(|obj| obj.peel_to_commit().map(|_| ()))
            .is_ok()
    }

    /// Extracts commit history, newest first.
    ///
    /// `since_commit` makes the walk incremental: only commits reachable
    /// from the tip but not from the mark are returned, and the mark itself
    /// is excluded. When it is set, date filtering is skipped entirely.
    ///
    /// # Errors
    ///
    /// Returns an error if `since_commit` is invalid or unknown, if the
    /// branch does not exist, or if the walk itself fails.
    pub fn extract_history(&self, options: &MineOptions) -> Result<Vec<CommitInfo>> {
        let limit = if options.max_commits == 0 {
            MAX_COMMITS_HARD_LIMIT
        } else {
            options.max_commits.min(MAX_COMMITS_HARD_LIMIT)
        };

        let mut revwalk = self
            .repo
            .revwalk()
            .map_err(|e| Error::operation("revwalk", e.message()))?;
        revwalk
            .set_sorting(Sort::TIME | Sort::TOPOLOGICAL)
            .map_err(|e| Error::operation("revwalk_sort", e.message()))?;

        // Walk from the requested branch tip, defaulting to HEAD.
        match &options.branch {
            Some(branch) => {
                let reference = self
                    .repo
                    .find_branch(branch, git2::BranchType::Local)
                    .map_err(|e| Error::operation("find_branch", e.message()))?;
                let oid = reference
                    .get()
                    .peel_to_commit()
                    .map_err(|e| Error::operation("peel_branch", e.message()))?
                    .id();
                revwalk
                    .push(oid)
                    .map_err(|e| Error::operation("revwalk_push", e.message()))?;
            },
            None => {
                revwalk
                    .push_head()
                    .map_err(|e| Error::operation("revwalk_push_head", e.message()))?;
            },
        }

        if let Some(mark) = options.since_commit.as_deref() {
            let mark = mark.trim();
            if !self.is_known_commit(mark) {
                return Err(Error::InvalidInput(format!(
                    "invalid or non-existent commit hash: {mark}"
                )));
            }
            let oid = self
                .repo
                .revparse_single(mark)
                .and_then(|obj| obj.peel_to_commit().map(|c| c.id()))
                .map_err(|e| Error::operation("resolve_since_commit", e.message()))?;
            revwalk
                .hide(oid)
                .map_err(|e| Error::operation("revwalk_hide", e.message()))?;
        }

        let mut commits = Vec::new();
        for oid in revwalk {
            if commits.len() >= limit {
                break;
            }
            let oid = oid.map_err(|e| Error::operation("revwalk_next", e.message()))?;
            let commit = self
                .repo
                .find_commit(oid)
                .map_err(|e| Error::operation("find_commit", e.message()))?;

            let timestamp = Utc
                .timestamp_opt(commit.time().seconds(), 0)
                .single()
                .unwrap_or_else(Utc::now);

            // since_commit takes precedence over date filtering.
            if options.since_commit.is_none() {
                if let Some(since) = options.since_time {
                    if timestamp < since {
                        continue;
                    }
                }
            }

            let author = commit.author();
            commits.push(CommitInfo {
                hash: oid.to_string(),
                author_name: author.name().unwrap_or_default().to_string(),
                author_email: author.email().unwrap_or_default().to_string(),
                timestamp,
                message: commit.message().unwrap_or_default().to_string(),
                affected_files: self.affected_files(&commit)?,
            });
        }

        tracing::debug!(
            repo = %self.path.display(),
            commits = commits.len(),
            incremental = options.since_commit.is_some(),
            "extracted commit history"
        );
        Ok(commits)
    }

    /// Collects the repository-relative paths touched by a commit.
    ///
    /// Merge commits are diffed against their first parent only.
    fn affected_files(&self, commit: &git2::Commit<'_>) -> Result<Vec<String>> {
        let tree = commit
            .tree()
            .map_err(|e| Error::operation("commit_tree", e.message()))?;
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(
                parent
                    .tree()
                    .map_err(|e| Error::operation("parent_tree", e.message()))?,
            ),
            Err(_) => None,
        };

        let mut diff_options = DiffOptions::new();
        let diff = self
            .repo
            .diff_tree_to_tree(
                parent_tree.as_ref(),
                Some(&tree),
                Some(&mut diff_options),
            )
            .map_err(|e| Error::operation("diff_trees", e.message()))?;

        let mut files = Vec::new();
        for delta in diff.deltas() {
            if delta.status() == Delta::Unmodified {
                continue;
            }
            let path = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.to_string_lossy().into_owned());
            if let Some(path) = path {
                files.push(path);
            }
        }
        files.sort();
        files.dedup();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    fn commit_file(repo: &Repository, name: &str, content: &str, message: &str) -> String {
        let workdir = repo.workdir().unwrap();
        fs::write(workdir.join(name), content).unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("Test User", "test@example.com").unwrap();

        let parent = repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_validate_rejects_non_repos() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!HistoryMiner::validate(dir.path()));
        assert!(!HistoryMiner::validate(Path::new("/nonexistent/path")));

        // A repository with an unborn HEAD is not loadable either.
        let (empty_dir, _repo) = scratch_repo();
        assert!(!HistoryMiner::validate(empty_dir.path()));
    }

    #[test]
    fn test_extract_history_newest_first() {
        let (dir, repo) = scratch_repo();
        let first = commit_file(&repo, "a.txt", "one", "first");
        let second = commit_file(&repo, "b.txt", "two", "second");

        let miner = HistoryMiner::open(dir.path()).unwrap();
        let commits = miner.extract_history(&MineOptions::default()).unwrap();

        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].hash, second);
        assert_eq!(commits[1].hash, first);
        assert_eq!(commits[0].affected_files, vec!["b.txt".to_string()]);
        assert_eq!(commits[0].author_name, "Test User");
    }

    #[test]
    fn test_since_commit_excludes_mark() {
        let (dir, repo) = scratch_repo();
        let first = commit_file(&repo, "a.txt", "one", "first");
        let second = commit_file(&repo, "b.txt", "two", "second");
        let third = commit_file(&repo, "c.txt", "three", "third");

        let miner = HistoryMiner::open(dir.path()).unwrap();
        let commits = miner
            .extract_history(&MineOptions {
                since_commit: Some(first.clone()),
                ..MineOptions::default()
            })
            .unwrap();

        let hashes: Vec<_> = commits.iter().map(|c| c.hash.clone()).collect();
        assert_eq!(hashes, vec![third, second]);
        assert!(!hashes.contains(&first));
    }

    #[test]
    fn test_since_head_yields_nothing() {
        let (dir, repo) = scratch_repo();
        let head = commit_file(&repo, "a.txt", "one", "first");

        let miner = HistoryMiner::open(dir.path()).unwrap();
        let commits = miner
            .extract_history(&MineOptions {
                since_commit: Some(head),
                ..MineOptions::default()
            })
            .unwrap();
        assert!(commits.is_empty());
    }

    #[test]
    fn test_since_commit_accepts_partial_hash() {
        let (dir, repo) = scratch_repo();
        let first = commit_file(&repo, "a.txt", "one", "first");
        commit_file(&repo, "b.txt", "two", "second");

        let miner = HistoryMiner::open(dir.path()).unwrap();
        let commits = miner
            .extract_history(&MineOptions {
                since_commit: Some(first[..12].to_string()),
                ..MineOptions::default()
            })
            .unwrap();
        assert_eq!(commits.len(), 1);
    }

    #[test]
    fn test_since_commit_rejects_bad_hashes() {
        let (dir, repo) = scratch_repo();
        commit_file(&repo, "a.txt", "one", "first");
        let miner = HistoryMiner::open(dir.path()).unwrap();

        for bad in ["invalid_hash", "abc", "", "abcdef1234567890abcdef1234567890abcdef12"] {
            let result = miner.extract_history(&MineOptions {
                since_commit: Some(bad.to_string()),
                ..MineOptions::default()
            });
            assert!(result.is_err(), "expected rejection for {bad:?}");
        }
    }

    #[test]
    fn test_max_commits_limit() {
        let (dir, repo) = scratch_repo();
        for i in 0..5 {
            commit_file(&repo, &format!("f{i}.txt"), "x", &format!("commit {i}"));
        }

        let miner = HistoryMiner::open(dir.path()).unwrap();
        let commits = miner
            .extract_history(&MineOptions {
                max_commits: 2,
                ..MineOptions::default()
            })
            .unwrap();
        assert_eq!(commits.len(), 2);
    }

    #[test]
    fn test_is_known_commit_whitespace_tolerant() {
        let (dir, repo) = scratch_repo();
        let hash = commit_file(&repo, "a.txt", "one", "first");
        let miner = HistoryMiner::open(dir.path()).unwrap();

        assert!(miner.is_known_commit(&format!(" {hash} ")));
        assert!(miner.is_known_commit(&format!("\t{hash}\n")));
        assert!(!miner.is_known_commit("gggggggggggg"));
    }
}
