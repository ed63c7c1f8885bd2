//! Inferred relationships between memory records.

use super::MemoryId;
use serde::{Deserialize, Serialize};

/// An inferred relationship between two memory records.
///
/// Connections are produced by a source loader after its record batch and
/// may only reference records in that batch. They are transient: the store
/// consumes them at ingestion time and the orchestrator does not retain
/// them past the call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// The originating record.
    pub source_id: MemoryId,
    /// The target record.
    pub target_id: MemoryId,
    /// Relationship strength in [0, 1].
    pub strength: f32,
    /// Relationship kind, e.g. `shared_file:src/auth.rs` or `section_sequence`.
    pub kind: String,
}

impl Connection {
    /// Creates a new connection.
    #[must_use]
    pub fn new(
        source_id: impl Into<MemoryId>,
        target_id: impl Into<MemoryId>,
        strength: f32,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            strength: strength.clamp(0.0, 1.0),
            kind: kind.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strength_clamped() {
        let conn = Connection::new("a", "b", 1.7, "section_sequence");
        assert!((conn.strength - 1.0).abs() < f32::EPSILON);

        let conn = Connection::new("a", "b", -0.2, "section_sequence");
        assert!(conn.strength.abs() < f32::EPSILON);
    }
}
