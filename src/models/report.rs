//! Ingestion and system reports.

use super::HierarchyLevel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Per-level record counts for an ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyDistribution {
    /// Concept-level records.
    pub l0: usize,
    /// Context-level records.
    pub l1: usize,
    /// Episode-level records.
    pub l2: usize,
}

impl HierarchyDistribution {
    /// Increments the count for the given level.
    pub const fn record(&mut self, level: HierarchyLevel) {
        match level {
            HierarchyLevel::Concept => self.l0 += 1,
            HierarchyLevel::Context => self.l1 += 1,
            HierarchyLevel::Episode => self.l2 += 1,
        }
    }

    /// Returns the count for the given level.
    #[must_use]
    pub const fn get(&self, level: HierarchyLevel) -> usize {
        match level {
            HierarchyLevel::Concept => self.l0,
            HierarchyLevel::Context => self.l1,
            HierarchyLevel::Episode => self.l2,
        }
    }

    /// Total records across all levels.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.l0 + self.l1 + self.l2
    }

    /// Adds another distribution into this one.
    pub const fn merge(&mut self, other: &Self) {
        self.l0 += other.l0;
        self.l1 += other.l1;
        self.l2 += other.l2;
    }
}

/// Aggregate outcome of one ingestion run.
///
/// Counters accumulate across units; `success` reflects only hard unit
/// failures. Validation skips and per-record failures are surfaced through
/// the counts without flipping it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestionReport {
    /// Records persisted (or, in a dry run, that would be persisted).
    pub records_loaded: usize,
    /// Records the store rejected.
    pub records_failed: usize,
    /// Connections persisted.
    pub connections_created: usize,
    /// Connections the store rejected.
    pub connections_failed: usize,
    /// Per-level distribution of loaded records.
    pub hierarchy_distribution: HierarchyDistribution,
    /// Wall-clock processing time.
    #[serde(with = "duration_secs")]
    pub processing_time: Duration,
    /// Units fully processed.
    pub units_processed: usize,
    /// Units excluded by source validation.
    pub units_skipped: usize,
    /// Units that raised a hard error.
    pub units_failed: usize,
    /// Preserved error messages from failed units.
    pub errors: Vec<String>,
    /// True iff no unit raised a hard error.
    pub success: bool,
}

impl IngestionReport {
    /// Creates an empty, successful report.
    #[must_use]
    pub fn new() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// Merges a per-unit report into this aggregate.
    pub fn merge(&mut self, other: &Self) {
        self.records_loaded += other.records_loaded;
        self.records_failed += other.records_failed;
        self.connections_created += other.connections_created;
        self.connections_failed += other.connections_failed;
        self.hierarchy_distribution.merge(&other.hierarchy_distribution);
        self.processing_time += other.processing_time;
        self.units_processed += other.units_processed;
        self.units_skipped += other.units_skipped;
        self.units_failed += other.units_failed;
        self.errors.extend(other.errors.iter().cloned());
        self.success = self.success && other.success;
    }

    /// Records a hard unit failure, preserving the original message.
    pub fn record_unit_failure(&mut self, message: impl Into<String>) {
        self.units_failed += 1;
        self.errors.push(message.into());
        self.success = false;
    }
}

/// Outcome of a consolidation pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ConsolidationReport {
    /// Episodic records examined.
    pub total_episodic: usize,
    /// Records promoted to a more abstract level.
    pub consolidated: usize,
    /// Records that failed to consolidate.
    pub failed: usize,
    /// Records left untouched.
    pub skipped: usize,
}

/// System statistics, as reported by the cognitive system.
///
/// All sections are optional; absent sections are simply not displayed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Record counts keyed by level or total.
    #[serde(default)]
    pub memory_counts: BTreeMap<String, u64>,
    /// Active system configuration values.
    #[serde(default)]
    pub system_config: BTreeMap<String, String>,
    /// Storage backend statistics.
    #[serde(default)]
    pub storage_stats: BTreeMap<String, u64>,
    /// Embedding model information.
    #[serde(default)]
    pub embedding_info: BTreeMap<String, String>,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}
