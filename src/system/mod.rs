//! The cognitive system boundary.
//!
//! Everything this crate does not own — embeddings, activation spreading,
//! consolidation algorithms, vector indexing — sits behind the
//! [`CognitiveSystem`] trait. The orchestration layer is written against
//! the trait only; [`LocalCognitiveSystem`] is the shipped baseline
//! implementation backed by `SQLite`.

mod local;

pub use local::LocalCognitiveSystem;

use crate::loaders::{LoadOptions, MemoryLoader};
use crate::models::{BucketKind, ConsolidationReport, IngestionReport, MemoryId, MemoryStats, RetrievalResult};
use crate::Result;
use std::path::Path;

/// Contract of the cognitive memory store.
///
/// All operations are synchronous request/response; the store owns all
/// persistent state except the history loader's high-water mark.
pub trait CognitiveSystem {
    /// Stores a free-form experience and returns its id.
    ///
    /// # Errors
    ///
    /// Fails if the text is empty or storage is unavailable.
    fn store_experience(
        &self,
        text: &str,
        context: Option<&serde_json::Value>,
    ) -> Result<MemoryId>;

    /// Retrieves memories for a query, bucketed by the requested kinds.
    ///
    /// Ordering within each bucket is assigned here; callers must not
    /// re-sort. `max_results` caps each bucket independently.
    fn retrieve_memories(
        &self,
        query: &str,
        types: &[BucketKind],
        max_results: usize,
    ) -> Result<RetrievalResult>;

    /// Loads one unit through a source loader and commits the batch.
    ///
    /// Performs the loader's pure load and connection extraction, then
    /// upserts records and connections. Partial failures inside the unit
    /// are counted in the report, not rolled back. On success the
    /// loader's checkpoint hook is invoked.
    fn load_memories_from_source(
        &self,
        loader: &dyn MemoryLoader,
        path: &Path,
        options: &LoadOptions,
    ) -> Result<IngestionReport>;

    /// Runs one consolidation pass over episodic memories.
    fn consolidate_memories(&self) -> Result<ConsolidationReport>;

    /// Reports system statistics. Absent sections are left empty.
    fn memory_stats(&self) -> Result<MemoryStats>;
}
