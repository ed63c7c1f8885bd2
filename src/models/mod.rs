//! Data models for engram.
//!
//! This module contains all the core data structures used throughout the system.

mod connection;
mod memory;
mod pattern;
mod report;
mod retrieval;

pub use connection::Connection;
pub use memory::{HierarchyLevel, MemoryId, MemoryRecord, Metadata};
pub use pattern::PatternType;
pub use report::{ConsolidationReport, HierarchyDistribution, IngestionReport, MemoryStats};
pub use retrieval::{BridgeItem, BucketKind, RetrievalResult, RetrievedItem};
