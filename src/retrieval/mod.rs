//! Retrieval stratification.
//!
//! Reshapes the cognitive system's multi-bucket search results for
//! presentation. Nothing here re-ranks, re-filters, or recomputes scores;
//! the only local logic is the plain-record versus bridge-item shape
//! discrimination and the local tally behind pattern counting.

use crate::models::{BucketKind, PatternType, RetrievalResult};
use crate::system::CognitiveSystem;
use crate::{Error, Result};

/// Width of the scan behind a count-only pattern query.
const PATTERN_SCAN_LIMIT: usize = 1000;

/// Fixed token prefix for pattern queries.
const PATTERN_QUERY: &str = "git pattern";

/// Local tally of git-derived pattern records by type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternCounts {
    /// Co-change patterns.
    pub cochange: usize,
    /// Maintenance hotspots.
    pub hotspot: usize,
    /// Solution patterns.
    pub solution: usize,
}

impl PatternCounts {
    /// Returns the count for one pattern type.
    #[must_use]
    pub const fn get(&self, pattern_type: PatternType) -> usize {
        match pattern_type {
            PatternType::Cochange => self.cochange,
            PatternType::Hotspot => self.hotspot,
            PatternType::Solution => self.solution,
        }
    }

    /// Total counted patterns.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.cochange + self.hotspot + self.solution
    }

    const fn increment(&mut self, pattern_type: PatternType) {
        match pattern_type {
            PatternType::Cochange => self.cochange += 1,
            PatternType::Hotspot => self.hotspot += 1,
            PatternType::Solution => self.solution += 1,
        }
    }
}

/// Stratified retrieval over the cognitive system.
pub struct RetrievalService<'a> {
    system: &'a dyn CognitiveSystem,
}

impl<'a> RetrievalService<'a> {
    /// Creates a retrieval service over the given cognitive system.
    #[must_use]
    pub const fn new(system: &'a dyn CognitiveSystem) -> Self {
        Self { system }
    }

    /// Retrieves memories for a query, stratified into buckets.
    ///
    /// `types` defaults to all three buckets. The result is returned as
    /// the store produced it: per-bucket ordering is preserved and scores
    /// are passed through unaltered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty query; store errors
    /// propagate as the failure of the whole call.
    pub fn stratify(
        &self,
        query: &str,
        types: Option<&[BucketKind]>,
        limit: usize,
    ) -> Result<RetrievalResult> {
        if query.trim().is_empty() {
            return Err(Error::InvalidInput("query cannot be empty".to_string()));
        }
        let types = types.unwrap_or(&BucketKind::ALL);
        let result = self.system.retrieve_memories(query, types, limit)?;
        tracing::debug!(query, total = result.total(), "stratified retrieval");
        Ok(result)
    }

    /// Searches git-derived patterns.
    ///
    /// The query is prefixed with the fixed pattern tokens, and with the
    /// pattern-type token when one is given; results come from the core
    /// and peripheral buckets only. The limit is widened because pattern
    /// hits share the result space with ordinary records.
    pub fn search_patterns(
        &self,
        query: &str,
        pattern_type: Option<PatternType>,
        limit: usize,
    ) -> Result<RetrievalResult> {
        let mut search_query = if query.trim().is_empty() {
            PATTERN_QUERY.to_string()
        } else {
            format!("{PATTERN_QUERY} {}", query.trim())
        };
        if let Some(pattern_type) = pattern_type {
            search_query = format!("{pattern_type} {search_query}");
        }

        self.stratify(
            &search_query,
            Some(&[BucketKind::Core, BucketKind::Peripheral]),
            limit.saturating_mul(2).max(1),
        )
    }

    /// Counts stored patterns by type.
    ///
    /// Issues one wide pattern query and tallies locally over items whose
    /// id carries the `git::` provenance prefix. This is aggregation over
    /// already-fetched items, not a new storage query shape.
    pub fn count_patterns(&self) -> Result<PatternCounts> {
        let result = self.system.retrieve_memories(
            PATTERN_QUERY,
            &[BucketKind::Core, BucketKind::Peripheral],
            PATTERN_SCAN_LIMIT,
        )?;

        let mut counts = PatternCounts::default();
        for item in result.iter() {
            let record = item.record();
            if !record.id.is_git_derived() {
                continue;
            }
            if let Some(pattern_type) = record.pattern_type() {
                counts.increment(pattern_type);
            }
        }
        Ok(counts)
    }
}
