//! Retrieval result shapes.

use super::{MemoryId, MemoryRecord};
use serde::{Deserialize, Serialize};

/// Named result bucket of a stratified retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketKind {
    /// Directly relevant matches.
    Core,
    /// Weaker, surrounding matches.
    Peripheral,
    /// Non-obvious connections between distant concepts.
    Bridge,
}

impl BucketKind {
    /// All buckets, in display order.
    pub const ALL: [Self; 3] = [Self::Core, Self::Peripheral, Self::Bridge];

    /// Returns the bucket name as a string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Peripheral => "peripheral",
            Self::Bridge => "bridge",
        }
    }

    /// Parses a bucket name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "core" => Some(Self::Core),
            "peripheral" => Some(Self::Peripheral),
            "bridge" => Some(Self::Bridge),
            _ => None,
        }
    }
}

impl std::fmt::Display for BucketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record surfaced as a bridge, with its derived scores.
///
/// The three scalars are owned by the cognitive system; this layer passes
/// them through unaltered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeItem {
    /// The wrapped record.
    pub record: MemoryRecord,
    /// How unexpected the record is for the query, in [0, 1].
    pub novelty_score: f32,
    /// How well the record links the activated regions, in [0, 1].
    pub connection_potential: f32,
    /// Summary score over the other two, in [0, 1].
    pub bridge_score: f32,
}

/// A single retrieval hit.
///
/// Plain records and bridge-wrapped records have different shapes; the
/// explicit discriminant replaces runtime type inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum RetrievedItem {
    /// A record with store-assigned relevance.
    Record(MemoryRecord),
    /// A record surfaced as a bridge connection.
    Bridge(BridgeItem),
}

impl RetrievedItem {
    /// Returns the inner record regardless of shape.
    #[must_use]
    pub const fn record(&self) -> &MemoryRecord {
        match self {
            Self::Record(record) => record,
            Self::Bridge(bridge) => &bridge.record,
        }
    }

    /// Returns the inner record's id.
    #[must_use]
    pub const fn id(&self) -> &MemoryId {
        &self.record().id
    }

    /// Relevance used for display.
    ///
    /// Plain records use `metadata["similarity_score"]` when the store
    /// provided one, else the record strength. Bridges use the bridge score.
    #[must_use]
    pub fn relevance(&self) -> f32 {
        match self {
            Self::Record(record) => record
                .metadata
                .get("similarity_score")
                .and_then(serde_json::Value::as_f64)
                .map_or(record.strength, |score| score as f32),
            Self::Bridge(bridge) => bridge.bridge_score,
        }
    }
}

/// Result of a stratified retrieval: three ordered buckets.
///
/// Ordering within a bucket is assigned by the cognitive system; nothing
/// in this layer re-sorts it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Directly relevant matches.
    pub core: Vec<RetrievedItem>,
    /// Weaker, surrounding matches.
    pub peripheral: Vec<RetrievedItem>,
    /// Bridge connections.
    pub bridge: Vec<RetrievedItem>,
}

impl RetrievalResult {
    /// Creates an empty result.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            core: Vec::new(),
            peripheral: Vec::new(),
            bridge: Vec::new(),
        }
    }

    /// Returns the bucket for the given kind.
    #[must_use]
    pub fn bucket(&self, kind: BucketKind) -> &[RetrievedItem] {
        match kind {
            BucketKind::Core => &self.core,
            BucketKind::Peripheral => &self.peripheral,
            BucketKind::Bridge => &self.bridge,
        }
    }

    /// Returns a mutable bucket for the given kind.
    pub fn bucket_mut(&mut self, kind: BucketKind) -> &mut Vec<RetrievedItem> {
        match kind {
            BucketKind::Core => &mut self.core,
            BucketKind::Peripheral => &mut self.peripheral,
            BucketKind::Bridge => &mut self.bridge,
        }
    }

    /// Total number of items across all buckets.
    #[must_use]
    pub fn total(&self) -> usize {
        self.core.len() + self.peripheral.len() + self.bridge.len()
    }

    /// Iterates over all items across buckets, core first.
    pub fn iter(&self) -> impl Iterator<Item = &RetrievedItem> {
        self.core
            .iter()
            .chain(self.peripheral.iter())
            .chain(self.bridge.iter())
    }

    /// Returns true if every bucket is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HierarchyLevel;

    #[test]
    fn test_relevance_prefers_similarity_score() {
        let mut record = MemoryRecord::new("id1", "text", HierarchyLevel::Concept);
        record.strength = 0.4;
        let item = RetrievedItem::Record(record.clone());
        assert!((item.relevance() - 0.4).abs() < f32::EPSILON);

        let record = record.with_metadata("similarity_score", 0.9);
        let item = RetrievedItem::Record(record);
        assert!((item.relevance() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_bridge_relevance_is_bridge_score() {
        let item = RetrievedItem::Bridge(BridgeItem {
            record: MemoryRecord::new("id2", "text", HierarchyLevel::Context),
            novelty_score: 0.8,
            connection_potential: 0.6,
            bridge_score: 0.7,
        });
        assert!((item.relevance() - 0.7).abs() < f32::EPSILON);
        assert_eq!(item.id().as_str(), "id2");
    }

    #[test]
    fn test_bucket_totals() {
        let mut result = RetrievalResult::new();
        assert!(result.is_empty());

        result
            .bucket_mut(BucketKind::Core)
            .push(RetrievedItem::Record(MemoryRecord::new(
                "a",
                "x",
                HierarchyLevel::Episode,
            )));
        assert_eq!(result.total(), 1);
        assert_eq!(result.bucket(BucketKind::Core).len(), 1);
        assert!(result.bucket(BucketKind::Bridge).is_empty());
    }
}
