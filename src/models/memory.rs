//! Memory records, identifiers, and hierarchy levels.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Open metadata mapping attached to every memory record.
///
/// Keys are unique; values are arbitrary JSON. Every record carries at
/// minimum a `title`; history-derived records additionally carry
/// `pattern_type` and an id with the `git::` provenance prefix.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Unique identifier for a memory record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(String);

impl MemoryId {
    /// Creates a new memory id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this id carries the git provenance prefix.
    #[must_use]
    pub fn is_git_derived(&self) -> bool {
        self.0.starts_with("git::")
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MemoryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MemoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Abstraction tier of a memory record.
///
/// Levels are strictly ordered by abstraction: concepts are the most
/// abstract, episodes the most concrete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum HierarchyLevel {
    /// L0: abstract concept.
    Concept = 0,
    /// L1: situational context.
    Context = 1,
    /// L2: concrete episode.
    Episode = 2,
}

impl HierarchyLevel {
    /// Returns the numeric level (0, 1, or 2).
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns the `L<n>` label used in reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Concept => "L0",
            Self::Context => "L1",
            Self::Episode => "L2",
        }
    }

    /// Returns the human-readable level name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Concept => "Concepts",
            Self::Context => "Contexts",
            Self::Episode => "Episodes",
        }
    }

    /// Parses a numeric level.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Concept),
            1 => Some(Self::Context),
            2 => Some(Self::Episode),
            _ => None,
        }
    }
}

impl fmt::Display for HierarchyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A unit of stored knowledge.
///
/// Records are created by a source loader from raw external data and
/// persisted (created or upserted) by the store during ingestion. The
/// ingestion path never deletes records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Stable identifier. History-derived ids are deterministic functions
    /// of the source content so that re-ingestion upserts in place.
    pub id: MemoryId,
    /// Full text body. Display truncation happens in the CLI only.
    pub content: String,
    /// Abstraction tier, assigned by the source loader.
    pub hierarchy_level: HierarchyLevel,
    /// Open metadata mapping. Carries at minimum a `title`.
    pub metadata: Metadata,
    /// Retrieval confidence in [0, 1]. Set by the store; read-only here.
    pub strength: f32,
}

impl MemoryRecord {
    /// Creates a record with the given id, content, and level.
    #[must_use]
    pub fn new(
        id: impl Into<MemoryId>,
        content: impl Into<String>,
        hierarchy_level: HierarchyLevel,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            hierarchy_level,
            metadata: Metadata::new(),
            strength: 1.0,
        }
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns the human title, falling back to "Untitled".
    #[must_use]
    pub fn title(&self) -> &str {
        self.metadata
            .get("title")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("Untitled")
    }

    /// Returns the pattern type for history-derived records.
    #[must_use]
    pub fn pattern_type(&self) -> Option<super::PatternType> {
        self.metadata
            .get("pattern_type")
            .and_then(serde_json::Value::as_str)
            .and_then(super::PatternType::parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_id_git_prefix() {
        assert!(MemoryId::new("git::cochange::abc").is_git_derived());
        assert!(!MemoryId::new("doc::abc").is_git_derived());
    }

    #[test]
    fn test_hierarchy_level_ordering() {
        assert!(HierarchyLevel::Concept < HierarchyLevel::Context);
        assert!(HierarchyLevel::Context < HierarchyLevel::Episode);
        assert_eq!(HierarchyLevel::from_u8(1), Some(HierarchyLevel::Context));
        assert_eq!(HierarchyLevel::from_u8(3), None);
    }

    #[test]
    fn test_record_title_fallback() {
        let record = MemoryRecord::new("id1", "body", HierarchyLevel::Episode);
        assert_eq!(record.title(), "Untitled");

        let record = record.with_metadata("title", "Auth flow");
        assert_eq!(record.title(), "Auth flow");
    }
}
