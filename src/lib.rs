//! # Engram
//!
//! A layered cognitive memory system with ranked, explainable retrieval.
//!
//! Engram ingests external knowledge sources (markdown documents, git
//! history) into a three-level memory hierarchy and answers queries with a
//! stratified view: core matches, peripheral matches, and bridge
//! connections between otherwise distant concepts.
//!
//! ## Features
//!
//! - Three-level memory hierarchy (Concept, Context, Episode)
//! - Pluggable source loaders with partial-failure tolerant ingestion
//! - Deterministic record ids for idempotent re-ingestion (upsert)
//! - Incremental git history mining with a per-repository high-water mark
//! - Stratified retrieval with per-item provenance and bridge scoring
//!
//! ## Example
//!
//! ```rust,ignore
//! use engram::ingestion::{IngestOptions, IngestService};
//! use engram::loaders::markdown::MarkdownLoader;
//!
//! let service = IngestService::new(system);
//! let report = service.ingest(
//!     Path::new("docs/"),
//!     &MarkdownLoader::new(&config),
//!     &IngestOptions::default().with_recursive(true),
//! )?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// multiple_crate_versions is inherently crate-level (detects duplicate transitive dependencies).
// Cannot be moved to function level.
#![allow(clippy::multiple_crate_versions)]

use std::path::PathBuf;
use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod git;
pub mod ingestion;
pub mod loaders;
pub mod models;
pub mod observability;
pub mod retrieval;
pub mod system;

// Re-exports for convenience
pub use config::EngramConfig;
pub use ingestion::{IngestOptions, IngestService};
pub use loaders::{LoadOptions, LoaderKind, MemoryLoader};
pub use models::{
    BridgeItem, BucketKind, Connection, HierarchyLevel, IngestionReport, MemoryId, MemoryRecord,
    PatternType, RetrievalResult, RetrievedItem,
};
pub use retrieval::RetrievalService;
pub use system::{CognitiveSystem, LocalCognitiveSystem};

/// Error type for engram operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Empty query/text, directory scans without `recursive`, unknown loader kinds |
/// | `NoMatchingSources` | A directory scan matched zero files for the loader's extensions |
/// | `OperationFailed` | Git operations fail, database queries fail, state files are unreadable |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - Required parameters are missing (e.g., empty text in store)
    /// - A directory is ingested without the recursive option
    /// - An unknown loader kind or pattern type string is provided
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A directory scan found no files matching the loader's extensions.
    ///
    /// This is a hard failure of the whole ingestion run: nothing was
    /// processed. Files that matched an extension but failed validation
    /// are reported as skips instead, not through this variant.
    #[error("no matching sources under {}", path.display())]
    NoMatchingSources {
        /// The scanned directory.
        path: PathBuf,
    },

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` operations fail in the local store
    /// - Git repository access or history walking fails
    /// - Incremental state files cannot be read or written
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Shorthand for an [`Error::OperationFailed`] with a named operation.
    pub fn operation(operation: impl Into<String>, cause: impl ToString) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for engram operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Centralized so every record and state file stamps time the same way.
/// Falls back to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
