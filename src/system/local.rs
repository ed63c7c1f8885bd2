//! Baseline `SQLite`-backed cognitive system.
//!
//! A deliberately simple reference implementation: token-overlap scoring
//! stands in for vector similarity, and the bridge bucket stays empty
//! because bridge discovery belongs to the external activation-spreading
//! engine. Everything the orchestration layer relies on — upsert by
//! deterministic id, per-record failure counting, bucket assignment with
//! a `similarity_score` on each hit — behaves like the real collaborator.

use super::CognitiveSystem;
use crate::loaders::{LoadOptions, MemoryLoader};
use crate::models::{
    BucketKind, ConsolidationReport, HierarchyLevel, IngestionReport, MemoryId, MemoryRecord,
    MemoryStats, Metadata, RetrievalResult, RetrievedItem,
};
use crate::{Error, Result, current_timestamp};
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Instant;

/// Minimum overlap score for the core bucket.
const CORE_THRESHOLD: f32 = 0.5;

/// Minimum overlap score for the peripheral bucket.
const PERIPHERAL_THRESHOLD: f32 = 0.1;

/// Strength at which an episode is promoted during consolidation.
const CONSOLIDATION_THRESHOLD: f32 = 0.9;

/// `SQLite`-backed cognitive system.
pub struct LocalCognitiveSystem {
    conn: Connection,
}

impl LocalCognitiveSystem {
    /// Opens (or creates) the store under the given data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or database cannot be created.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| Error::operation("create_data_dir", e))?;
        let conn = Connection::open(data_dir.join("engram.db"))
            .map_err(|e| Error::operation("open_database", e))?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory store, mainly for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn open_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| Error::operation("open_database", e))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS memories (
                id              TEXT PRIMARY KEY,
                content         TEXT NOT NULL,
                hierarchy_level INTEGER NOT NULL,
                metadata        TEXT NOT NULL,
                strength        REAL NOT NULL,
                created_at      INTEGER NOT NULL,
                updated_at      INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS connections (
                source_id TEXT NOT NULL,
                target_id TEXT NOT NULL,
                strength  REAL NOT NULL,
                kind      TEXT NOT NULL,
                PRIMARY KEY (source_id, target_id, kind)
            );",
        )
        .map_err(|e| Error::operation("init_schema", e))?;
        Ok(Self { conn })
    }

    /// Total number of stored records. Used by status output and tests.
    pub fn record_count(&self) -> Result<u64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM memories", [], |row| {
                row.get::<_, i64>(0).map(|n| n as u64)
            })
            .map_err(|e| Error::operation("count_memories", e))
    }

    /// Inserts or updates one record in place, keyed by id.
    fn upsert_record(&self, record: &MemoryRecord) -> Result<()> {
        let metadata = serde_json::to_string(&record.metadata)
            .map_err(|e| Error::operation("serialize_metadata", e))?;
        let now = current_timestamp();
        self.conn
            .execute(
                "INSERT INTO memories (id, content, hierarchy_level, metadata, strength, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                     content = excluded.content,
                     hierarchy_level = excluded.hierarchy_level,
                     metadata = excluded.metadata,
                     strength = excluded.strength,
                     updated_at = excluded.updated_at",
                rusqlite::params![
                    record.id.as_str(),
                    record.content,
                    record.hierarchy_level.as_u8(),
                    metadata,
                    f64::from(record.strength),
                    now as i64,
                ],
            )
            .map_err(|e| Error::operation("upsert_memory", e))?;
        Ok(())
    }

    /// Loads every record. The baseline scorer scans; a real collaborator
    /// would consult its vector index instead.
    fn all_records(&self) -> Result<Vec<MemoryRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, content, hierarchy_level, metadata, strength FROM memories ORDER BY id")
            .map_err(|e| Error::operation("prepare_scan", e))?;
        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let content: String = row.get(1)?;
                let level: u8 = row.get(2)?;
                let metadata: String = row.get(3)?;
                let strength: f64 = row.get(4)?;
                Ok((id, content, level, metadata, strength))
            })
            .map_err(|e| Error::operation("scan_memories", e))?;

        let mut records = Vec::new();
        for row in rows {
            let (id, content, level, metadata, strength) =
                row.map_err(|e| Error::operation("scan_memories", e))?;
            let metadata: Metadata = serde_json::from_str(&metadata)
                .map_err(|e| Error::operation("parse_metadata", e))?;
            records.push(MemoryRecord {
                id: MemoryId::new(id),
                content,
                hierarchy_level: HierarchyLevel::from_u8(level).unwrap_or(HierarchyLevel::Episode),
                metadata,
                strength: strength as f32,
            });
        }
        Ok(records)
    }
}

/// Lowercased alphanumeric tokens of at least two characters.
fn tokenize(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() >= 2)
        .map(ToString::to_string)
        .collect()
}

/// Fraction of query tokens present in the record's content and title.
fn overlap_score(query_tokens: &BTreeSet<String>, record: &MemoryRecord) -> f32 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let mut haystack = tokenize(&record.content);
    haystack.extend(tokenize(record.title()));
    let hits = query_tokens
        .iter()
        .filter(|token| haystack.contains(*token))
        .count();
    #[allow(clippy::cast_precision_loss)]
    {
        hits as f32 / query_tokens.len() as f32
    }
}

impl CognitiveSystem for LocalCognitiveSystem {
    fn store_experience(
        &self,
        text: &str,
        context: Option<&serde_json::Value>,
    ) -> Result<MemoryId> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("text cannot be empty".to_string()));
        }

        let level = context
            .and_then(|ctx| ctx.get("hierarchy_level"))
            .and_then(serde_json::Value::as_u64)
            .and_then(|v| u8::try_from(v).ok())
            .and_then(HierarchyLevel::from_u8)
            .unwrap_or(HierarchyLevel::Episode);

        let title: String = text.trim().chars().take(60).collect();
        let mut record = MemoryRecord::new(
            format!("exp::{}", uuid::Uuid::new_v4()),
            text.trim(),
            level,
        )
        .with_metadata("title", title)
        .with_metadata("loader_type", "experience");
        if let Some(serde_json::Value::Object(map)) = context {
            for (key, value) in map {
                if key != "hierarchy_level" {
                    record.metadata.insert(key.clone(), value.clone());
                }
            }
        }

        self.upsert_record(&record)?;
        tracing::debug!(id = %record.id, level = %level, "stored experience");
        Ok(record.id)
    }

    fn retrieve_memories(
        &self,
        query: &str,
        types: &[BucketKind],
        max_results: usize,
    ) -> Result<RetrievalResult> {
        if query.trim().is_empty() {
            return Err(Error::InvalidInput("query cannot be empty".to_string()));
        }

        let query_tokens = tokenize(query);
        let mut scored: Vec<(f32, MemoryRecord)> = self
            .all_records()?
            .into_iter()
            .filter_map(|record| {
                let score = overlap_score(&query_tokens, &record);
                (score >= PERIPHERAL_THRESHOLD).then_some((score, record))
            })
            .collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.id.cmp(&b.1.id))
        });

        let mut result = RetrievalResult::new();
        for (score, mut record) in scored {
            let bucket = if score >= CORE_THRESHOLD {
                BucketKind::Core
            } else {
                BucketKind::Peripheral
            };
            if !types.contains(&bucket) {
                continue;
            }
            let items = result.bucket_mut(bucket);
            if items.len() >= max_results {
                continue;
            }
            record.metadata.insert(
                "similarity_score".to_string(),
                serde_json::json!(f64::from(score)),
            );
            items.push(RetrievedItem::Record(record));
        }

        // Bridge discovery lives in the activation-spreading engine; the
        // baseline store has none, so the bridge bucket stays empty.
        Ok(result)
    }

    fn load_memories_from_source(
        &self,
        loader: &dyn MemoryLoader,
        path: &Path,
        options: &LoadOptions,
    ) -> Result<IngestionReport> {
        let started = Instant::now();
        let records = loader.load_from_source(path, options)?;
        let connections = loader.extract_connections(&records);

        let mut report = IngestionReport::new();
        for record in &records {
            match self.upsert_record(record) {
                Ok(()) => {
                    report.records_loaded += 1;
                    report.hierarchy_distribution.record(record.hierarchy_level);
                },
                Err(e) => {
                    tracing::warn!(id = %record.id, error = %e, "record upsert failed");
                    report.records_failed += 1;
                },
            }
        }

        for connection in &connections {
            let inserted = self.conn.execute(
                "INSERT OR REPLACE INTO connections (source_id, target_id, strength, kind)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    connection.source_id.as_str(),
                    connection.target_id.as_str(),
                    f64::from(connection.strength),
                    connection.kind,
                ],
            );
            match inserted {
                Ok(_) => report.connections_created += 1,
                Err(e) => {
                    tracing::warn!(error = %e, "connection insert failed");
                    report.connections_failed += 1;
                },
            }
        }

        // The unit is committed; let stateful loaders advance their mark.
        loader.commit_checkpoint(path, options)?;

        report.units_processed = 1;
        report.processing_time = started.elapsed();
        tracing::info!(
            source = %path.display(),
            loaded = report.records_loaded,
            connections = report.connections_created,
            "unit committed"
        );
        Ok(report)
    }

    fn consolidate_memories(&self) -> Result<ConsolidationReport> {
        let mut report = ConsolidationReport::default();
        for record in self.all_records()? {
            if record.hierarchy_level != HierarchyLevel::Episode {
                continue;
            }
            report.total_episodic += 1;
            if record.strength < CONSOLIDATION_THRESHOLD {
                report.skipped += 1;
                continue;
            }
            let updated = self.conn.execute(
                "UPDATE memories SET hierarchy_level = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![
                    HierarchyLevel::Context.as_u8(),
                    current_timestamp() as i64,
                    record.id.as_str(),
                ],
            );
            match updated {
                Ok(_) => report.consolidated += 1,
                Err(e) => {
                    tracing::warn!(id = %record.id, error = %e, "consolidation failed");
                    report.failed += 1;
                },
            }
        }
        Ok(report)
    }

    fn memory_stats(&self) -> Result<MemoryStats> {
        let mut stats = MemoryStats::default();

        for level in [
            HierarchyLevel::Concept,
            HierarchyLevel::Context,
            HierarchyLevel::Episode,
        ] {
            let count: u64 = self
                .conn
                .query_row(
                    "SELECT COUNT(*) FROM memories WHERE hierarchy_level = ?1",
                    [level.as_u8()],
                    |row| row.get::<_, i64>(0).map(|n| n as u64),
                )
                .map_err(|e| Error::operation("count_memories", e))?;
            stats
                .memory_counts
                .insert(format!("level_{}", level.as_u8()), count);
        }
        stats.memory_counts.insert("total".to_string(), self.record_count()?);

        let connection_count: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM connections", [], |row| {
                row.get::<_, i64>(0).map(|n| n as u64)
            })
            .map_err(|e| Error::operation("count_connections", e))?;
        stats
            .storage_stats
            .insert("connections".to_string(), connection_count);

        stats
            .system_config
            .insert("backend".to_string(), "sqlite-local".to_string());
        stats.system_config.insert(
            "core_threshold".to_string(),
            CORE_THRESHOLD.to_string(),
        );
        stats.system_config.insert(
            "peripheral_threshold".to_string(),
            PERIPHERAL_THRESHOLD.to_string(),
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Connection as MemoryConnection;

    struct StaticLoader {
        records: Vec<MemoryRecord>,
    }

    impl MemoryLoader for StaticLoader {
        fn name(&self) -> &'static str {
            "static"
        }

        fn supported_extensions(&self) -> &[&'static str] {
            &[".txt"]
        }

        fn validate_source(&self, _path: &Path) -> bool {
            true
        }

        fn load_from_source(
            &self,
            _path: &Path,
            _options: &LoadOptions,
        ) -> crate::Result<Vec<MemoryRecord>> {
            Ok(self.records.clone())
        }

        fn extract_connections(&self, records: &[MemoryRecord]) -> Vec<MemoryConnection> {
            records
                .windows(2)
                .map(|pair| {
                    MemoryConnection::new(pair[0].id.clone(), pair[1].id.clone(), 0.5, "sequence")
                })
                .collect()
        }
    }

    fn sample_records() -> Vec<MemoryRecord> {
        vec![
            MemoryRecord::new("r1", "authentication tokens rotate hourly", HierarchyLevel::Concept)
                .with_metadata("title", "Authentication"),
            MemoryRecord::new("r2", "session storage details", HierarchyLevel::Context)
                .with_metadata("title", "Sessions"),
            MemoryRecord::new("r3", "debugging the login flow", HierarchyLevel::Episode)
                .with_metadata("title", "Login debugging"),
        ]
    }

    #[test]
    fn test_store_experience_rejects_empty() {
        let system = LocalCognitiveSystem::open_in_memory().unwrap();
        assert!(system.store_experience("   ", None).is_err());
    }

    #[test]
    fn test_store_experience_with_level_context() {
        let system = LocalCognitiveSystem::open_in_memory().unwrap();
        let context = serde_json::json!({"hierarchy_level": 0, "project": "engram"});
        let id = system
            .store_experience("auth design decision", Some(&context))
            .unwrap();
        assert!(id.as_str().starts_with("exp::"));
        assert_eq!(system.record_count().unwrap(), 1);
    }

    #[test]
    fn test_load_upserts_and_counts() {
        let system = LocalCognitiveSystem::open_in_memory().unwrap();
        let loader = StaticLoader {
            records: sample_records(),
        };
        let dir = tempfile::tempdir().unwrap();

        let report = system
            .load_memories_from_source(&loader, dir.path(), &LoadOptions::default())
            .unwrap();
        assert!(report.success);
        assert_eq!(report.records_loaded, 3);
        assert_eq!(report.hierarchy_distribution.total(), 3);
        assert_eq!(report.connections_created, 2);
        assert_eq!(system.record_count().unwrap(), 3);

        // Re-loading the same batch upserts: no net new records.
        let report = system
            .load_memories_from_source(&loader, dir.path(), &LoadOptions::default())
            .unwrap();
        assert_eq!(report.records_loaded, 3);
        assert_eq!(system.record_count().unwrap(), 3);
    }

    #[test]
    fn test_retrieve_buckets_by_score() {
        let system = LocalCognitiveSystem::open_in_memory().unwrap();
        let loader = StaticLoader {
            records: sample_records(),
        };
        let dir = tempfile::tempdir().unwrap();
        system
            .load_memories_from_source(&loader, dir.path(), &LoadOptions::default())
            .unwrap();

        let result = system
            .retrieve_memories("authentication tokens", &BucketKind::ALL, 10)
            .unwrap();
        assert!(!result.core.is_empty());
        assert!(result.bridge.is_empty());

        let top = &result.core[0];
        assert_eq!(top.id().as_str(), "r1");
        assert!(top.record().metadata.contains_key("similarity_score"));
    }

    #[test]
    fn test_retrieve_rejects_empty_query() {
        let system = LocalCognitiveSystem::open_in_memory().unwrap();
        assert!(system.retrieve_memories("", &BucketKind::ALL, 10).is_err());
    }

    #[test]
    fn test_retrieve_respects_requested_types() {
        let system = LocalCognitiveSystem::open_in_memory().unwrap();
        let loader = StaticLoader {
            records: sample_records(),
        };
        let dir = tempfile::tempdir().unwrap();
        system
            .load_memories_from_source(&loader, dir.path(), &LoadOptions::default())
            .unwrap();

        let result = system
            .retrieve_memories("authentication tokens", &[BucketKind::Peripheral], 10)
            .unwrap();
        assert!(result.core.is_empty());
    }

    #[test]
    fn test_consolidation_promotes_strong_episodes() {
        let system = LocalCognitiveSystem::open_in_memory().unwrap();
        let mut strong = MemoryRecord::new("strong", "often revisited", HierarchyLevel::Episode);
        strong.strength = 0.95;
        let mut weak = MemoryRecord::new("weak", "rarely seen", HierarchyLevel::Episode);
        weak.strength = 0.2;
        system.upsert_record(&strong).unwrap();
        system.upsert_record(&weak).unwrap();

        let report = system.consolidate_memories().unwrap();
        assert_eq!(report.total_episodic, 2);
        assert_eq!(report.consolidated, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn test_memory_stats_sections() {
        let system = LocalCognitiveSystem::open_in_memory().unwrap();
        system.store_experience("one memory", None).unwrap();

        let stats = system.memory_stats().unwrap();
        assert_eq!(stats.memory_counts.get("total"), Some(&1));
        assert_eq!(stats.memory_counts.get("level_2"), Some(&1));
        assert_eq!(
            stats.system_config.get("backend").map(String::as_str),
            Some("sqlite-local")
        );
        assert!(stats.embedding_info.is_empty());
    }
}
