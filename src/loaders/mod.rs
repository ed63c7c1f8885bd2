//! Source loaders.
//!
//! A loader turns one external unit (a document, a repository) into a
//! batch of memory records plus the connections inferred between them.
//! Loaders never talk to storage: `load_from_source` is a pure transform,
//! which is what makes dry runs trivially side-effect free. Committing a
//! batch is the cognitive system's job
//! ([`crate::system::CognitiveSystem::load_memories_from_source`]).

pub mod git;
pub mod markdown;

pub use git::GitHistoryLoader;
pub use markdown::MarkdownLoader;

use crate::models::{Connection, MemoryRecord};
use crate::Result;
use std::path::Path;

/// Which loader to use for a source, resolved once at the CLI boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderKind {
    /// Markdown document loader (stateless, single file per unit).
    Markdown,
    /// Git history loader (stateful, incremental, one repository per unit).
    Git,
}

impl LoaderKind {
    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Git => "git",
        }
    }

    /// Parses a loader kind string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Some(Self::Markdown),
            "git" => Some(Self::Git),
            _ => None,
        }
    }
}

impl std::fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-load options passed through to the loader.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Cap on commits examined (history loader). `None` uses the configured default.
    pub max_commits: Option<usize>,
    /// Analysis window, e.g. "30d", "3m", "1y" (history loader).
    pub time_window: Option<String>,
    /// Ignore the incremental high-water mark and reprocess everything.
    pub force_full_load: bool,
    /// Override for the maximum episode chunk size (document loader).
    pub max_chunk_chars: Option<usize>,
}

impl LoadOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the commit cap.
    #[must_use]
    pub const fn with_max_commits(mut self, max_commits: usize) -> Self {
        self.max_commits = Some(max_commits);
        self
    }

    /// Sets the analysis time window.
    #[must_use]
    pub fn with_time_window(mut self, window: impl Into<String>) -> Self {
        self.time_window = Some(window.into());
        self
    }

    /// Enables or disables force-full loading.
    #[must_use]
    pub const fn with_force_full_load(mut self, force: bool) -> Self {
        self.force_full_load = force;
        self
    }
}

/// Capability set every source loader implements.
///
/// A unit is one file (document loaders) or one repository sweep (history
/// loaders). `load_from_source` and `extract_connections` are pure;
/// connections may only reference records from the batch they were
/// derived from.
pub trait MemoryLoader {
    /// Loader name for logs and reports.
    fn name(&self) -> &'static str;

    /// File suffixes this loader consumes. Empty for repository-shaped
    /// sources, which are matched by structure instead.
    fn supported_extensions(&self) -> &[&'static str];

    /// Checks whether the path is a well-formed source for this loader.
    ///
    /// Fails closed: missing, unreadable, or structurally wrong sources
    /// return false.
    fn validate_source(&self, path: &Path) -> bool;

    /// Derives the record batch from the source. Pure: must not mutate
    /// persistent state.
    fn load_from_source(&self, path: &Path, options: &LoadOptions) -> Result<Vec<MemoryRecord>>;

    /// Derives relationships from an in-memory batch.
    fn extract_connections(&self, records: &[MemoryRecord]) -> Vec<Connection>;

    /// Called by the store after a unit's batch was committed.
    ///
    /// Stateless loaders ignore this; the history loader advances its
    /// per-repository high-water mark here, which keeps dry runs from
    /// touching incremental state.
    fn commit_checkpoint(&self, path: &Path, options: &LoadOptions) -> Result<()> {
        let _ = (path, options);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("markdown", Some(LoaderKind::Markdown))]
    #[test_case("md", Some(LoaderKind::Markdown))]
    #[test_case("GIT", Some(LoaderKind::Git))]
    #[test_case("csv", None)]
    fn test_loader_kind_parse(input: &str, expected: Option<LoaderKind>) {
        assert_eq!(LoaderKind::parse(input), expected);
    }

    #[test]
    fn test_load_options_builders() {
        let options = LoadOptions::new()
            .with_max_commits(50)
            .with_time_window("6m")
            .with_force_full_load(true);
        assert_eq!(options.max_commits, Some(50));
        assert_eq!(options.time_window.as_deref(), Some("6m"));
        assert!(options.force_full_load);
    }
}
