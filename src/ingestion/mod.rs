//! Ingestion orchestration.
//!
//! Drives one or many source-loader invocations against the cognitive
//! system and aggregates the outcome into a single [`IngestionReport`].
//! The central contract is failure isolation: one unit's failure never
//! aborts the batch. Failures are counted and their messages preserved;
//! the aggregate `success` flag only reflects hard unit errors.

use crate::loaders::{LoadOptions, MemoryLoader};
use crate::models::IngestionReport;
use crate::system::CognitiveSystem;
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Options for one orchestration run.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Simulate only: load and analyze without persisting anything.
    pub dry_run: bool,
    /// Allow scanning a directory of candidate files.
    pub recursive: bool,
    /// Cap on units processed in one batch.
    pub max_units: Option<usize>,
    /// Options forwarded to the loader.
    pub load: LoadOptions,
}

impl IngestOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables dry-run mode.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Enables or disables recursive directory scans.
    #[must_use]
    pub const fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Caps the number of units per batch.
    #[must_use]
    pub const fn with_max_units(mut self, max_units: usize) -> Self {
        self.max_units = Some(max_units);
        self
    }

    /// Sets the loader options.
    #[must_use]
    pub fn with_load_options(mut self, load: LoadOptions) -> Self {
        self.load = load;
        self
    }
}

/// Orchestrates ingestion runs.
pub struct IngestService<'a> {
    system: &'a dyn CognitiveSystem,
}

impl<'a> IngestService<'a> {
    /// Creates an ingestion service over the given cognitive system.
    #[must_use]
    pub const fn new(system: &'a dyn CognitiveSystem) -> Self {
        Self { system }
    }

    /// Runs one ingestion over a file, repository, or directory of files.
    ///
    /// Units are processed in lexicographic order of their resolved paths.
    /// A unit failing validation is recorded as a skip; a unit whose
    /// load/store raises is recorded as a failure; in both cases the batch
    /// continues. The returned report aggregates all per-unit counts.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] if the path does not exist, or is a
    ///   directory of files and `recursive` was not requested
    /// - [`Error::NoMatchingSources`] if a directory scan matched nothing
    pub fn ingest(
        &self,
        source_path: &Path,
        loader: &dyn MemoryLoader,
        options: &IngestOptions,
    ) -> Result<IngestionReport> {
        let started = Instant::now();
        let units = resolve_units(source_path, loader, options)?;

        tracing::info!(
            source = %source_path.display(),
            loader = loader.name(),
            units = units.len(),
            dry_run = options.dry_run,
            "starting ingestion"
        );

        let mut aggregate = IngestionReport::new();
        for unit in &units {
            if !loader.validate_source(unit) {
                tracing::warn!(unit = %unit.display(), "skipping invalid source");
                aggregate.units_skipped += 1;
                continue;
            }

            if options.dry_run {
                preview_unit(unit, loader, options, &mut aggregate);
            } else {
                match self.system.load_memories_from_source(loader, unit, &options.load) {
                    Ok(unit_report) => aggregate.merge(&unit_report),
                    Err(e) => {
                        tracing::error!(unit = %unit.display(), error = %e, "unit failed");
                        aggregate.record_unit_failure(format!("{}: {e}", unit.display()));
                    },
                }
            }
        }

        aggregate.processing_time = started.elapsed();
        Ok(aggregate)
    }
}

/// Dry-run analysis of one unit through the loader's pure path.
fn preview_unit(
    unit: &Path,
    loader: &dyn MemoryLoader,
    options: &IngestOptions,
    aggregate: &mut IngestionReport,
) {
    match loader.load_from_source(unit, &options.load) {
        Ok(records) => {
            let connections = loader.extract_connections(&records);
            for record in &records {
                aggregate.hierarchy_distribution.record(record.hierarchy_level);
            }
            aggregate.records_loaded += records.len();
            aggregate.connections_created += connections.len();
            aggregate.units_processed += 1;
        },
        Err(e) => {
            tracing::error!(unit = %unit.display(), error = %e, "dry-run analysis failed");
            aggregate.record_unit_failure(format!("{}: {e}", unit.display()));
        },
    }
}

/// Resolves a source path into an ordered list of units.
fn resolve_units(
    source_path: &Path,
    loader: &dyn MemoryLoader,
    options: &IngestOptions,
) -> Result<Vec<PathBuf>> {
    if source_path.is_file() {
        return Ok(vec![source_path.to_path_buf()]);
    }
    if !source_path.is_dir() {
        return Err(Error::InvalidInput(format!(
            "source path does not exist: {}",
            source_path.display()
        )));
    }

    // Repository-shaped loaders (no extension filter) may claim the
    // directory itself as one unit.
    if loader.supported_extensions().is_empty() && loader.validate_source(source_path) {
        return Ok(vec![source_path.to_path_buf()]);
    }

    if !options.recursive {
        return Err(Error::InvalidInput(format!(
            "{} is a directory; pass recursive to load all matching files",
            source_path.display()
        )));
    }

    let mut files = Vec::new();
    let mut visited = BTreeSet::new();
    collect_files(source_path, loader.supported_extensions(), &mut files, &mut visited)?;

    if files.is_empty() {
        return Err(Error::NoMatchingSources {
            path: source_path.to_path_buf(),
        });
    }

    // Stable order: lexicographic by resolved path.
    files.sort_by_key(|path| resolved(path));
    if let Some(max_units) = options.max_units {
        files.truncate(max_units);
    }
    Ok(files)
}

/// Recursively collects files whose name matches one of the extensions,
/// following symbolic links. Visited directories are tracked by resolved
/// path so link cycles terminate.
fn collect_files(
    dir: &Path,
    extensions: &[&str],
    files: &mut Vec<PathBuf>,
    visited: &mut BTreeSet<PathBuf>,
) -> Result<()> {
    if !visited.insert(resolved(dir)) {
        return Ok(());
    }

    let entries =
        std::fs::read_dir(dir).map_err(|e| Error::operation("read_source_dir", e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::operation("read_source_dir", e))?;
        let path = entry.path();
        // is_dir/is_file follow symlinks, matching the scan contract.
        if path.is_dir() {
            collect_files(&path, extensions, files, visited)?;
        } else if path.is_file() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            if extensions.iter().any(|ext| name.ends_with(ext)) {
                files.push(path);
            }
        }
    }
    Ok(())
}

/// Canonical path used for ordering and cycle detection.
fn resolved(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BucketKind, Connection, ConsolidationReport, HierarchyLevel, MemoryId, MemoryRecord,
        MemoryStats, RetrievalResult,
    };
    use std::cell::RefCell;

    /// Loader that fails validation for paths containing "bad" and errors
    /// while loading paths containing "broken".
    struct TestLoader {
        load_calls: RefCell<usize>,
    }

    impl TestLoader {
        fn new() -> Self {
            Self {
                load_calls: RefCell::new(0),
            }
        }
    }

    impl MemoryLoader for TestLoader {
        fn name(&self) -> &'static str {
            "test"
        }

        fn supported_extensions(&self) -> &[&'static str] {
            &[".md"]
        }

        fn validate_source(&self, path: &Path) -> bool {
            !path.is_dir() && !path.to_string_lossy().contains("bad")
        }

        fn load_from_source(
            &self,
            path: &Path,
            _options: &LoadOptions,
        ) -> crate::Result<Vec<MemoryRecord>> {
            *self.load_calls.borrow_mut() += 1;
            if path.to_string_lossy().contains("broken") {
                return Err(Error::operation("load", "malformed source"));
            }
            Ok(vec![
                MemoryRecord::new(
                    format!("{}::concept", path.display()),
                    "concept text",
                    HierarchyLevel::Concept,
                ),
                MemoryRecord::new(
                    format!("{}::episode", path.display()),
                    "episode text",
                    HierarchyLevel::Episode,
                ),
            ])
        }

        fn extract_connections(&self, records: &[MemoryRecord]) -> Vec<Connection> {
            records
                .windows(2)
                .map(|pair| Connection::new(pair[0].id.clone(), pair[1].id.clone(), 0.5, "hierarchy"))
                .collect()
        }
    }

    /// Minimal system double that counts stored batches.
    struct RecordingSystem {
        stored_units: RefCell<usize>,
    }

    impl RecordingSystem {
        fn new() -> Self {
            Self {
                stored_units: RefCell::new(0),
            }
        }
    }

    impl CognitiveSystem for RecordingSystem {
        fn store_experience(
            &self,
            _text: &str,
            _context: Option<&serde_json::Value>,
        ) -> crate::Result<MemoryId> {
            Ok(MemoryId::new("exp::test"))
        }

        fn retrieve_memories(
            &self,
            _query: &str,
            _types: &[BucketKind],
            _max_results: usize,
        ) -> crate::Result<RetrievalResult> {
            Ok(RetrievalResult::new())
        }

        fn load_memories_from_source(
            &self,
            loader: &dyn MemoryLoader,
            path: &Path,
            options: &LoadOptions,
        ) -> crate::Result<IngestionReport> {
            let records = loader.load_from_source(path, options)?;
            let connections = loader.extract_connections(&records);
            *self.stored_units.borrow_mut() += 1;

            let mut report = IngestionReport::new();
            for record in &records {
                report.records_loaded += 1;
                report.hierarchy_distribution.record(record.hierarchy_level);
            }
            report.connections_created = connections.len();
            report.units_processed = 1;
            Ok(report)
        }

        fn consolidate_memories(&self) -> crate::Result<ConsolidationReport> {
            Ok(ConsolidationReport::default())
        }

        fn memory_stats(&self) -> crate::Result<MemoryStats> {
            Ok(MemoryStats::default())
        }
    }

    fn write_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "content").unwrap();
        path
    }

    #[test]
    fn test_single_file_is_one_unit() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "one.md");
        let system = RecordingSystem::new();
        let loader = TestLoader::new();

        let report = IngestService::new(&system)
            .ingest(&file, &loader, &IngestOptions::default())
            .unwrap();

        assert!(report.success);
        assert_eq!(report.units_processed, 1);
        assert_eq!(report.records_loaded, 2);
        assert_eq!(report.hierarchy_distribution.total(), report.records_loaded);
        assert_eq!(*system.stored_units.borrow(), 1);
    }

    #[test]
    fn test_directory_without_recursive_is_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "one.md");
        let system = RecordingSystem::new();
        let loader = TestLoader::new();

        let result = IngestService::new(&system).ingest(
            dir.path(),
            &loader,
            &IngestOptions::default(),
        );

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        // Usage errors happen before any loader work.
        assert_eq!(*loader.load_calls.borrow(), 0);
        assert_eq!(*system.stored_units.borrow(), 0);
    }

    #[test]
    fn test_no_matching_sources_is_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "notes.txt");
        let system = RecordingSystem::new();
        let loader = TestLoader::new();

        let result = IngestService::new(&system).ingest(
            dir.path(),
            &loader,
            &IngestOptions::default().with_recursive(true),
        );
        assert!(matches!(result, Err(Error::NoMatchingSources { .. })));
    }

    #[test]
    fn test_missing_path_is_usage_error() {
        let system = RecordingSystem::new();
        let loader = TestLoader::new();
        let result = IngestService::new(&system).ingest(
            Path::new("/definitely/not/here"),
            &loader,
            &IngestOptions::default(),
        );
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_partial_failure_isolation() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.md");
        write_file(dir.path(), "broken.md");
        write_file(dir.path(), "c.md");
        let system = RecordingSystem::new();
        let loader = TestLoader::new();

        let report = IngestService::new(&system)
            .ingest(
                dir.path(),
                &loader,
                &IngestOptions::default().with_recursive(true),
            )
            .unwrap();

        // The malformed unit fails alone; the other two still commit.
        assert_eq!(report.units_failed, 1);
        assert_eq!(report.units_processed, 2);
        assert!(!report.success);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("broken.md"));
        assert_eq!(*system.stored_units.borrow(), 2);
    }

    #[test]
    fn test_validation_failures_are_skips_not_failures() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "good.md");
        write_file(dir.path(), "bad.md");
        let system = RecordingSystem::new();
        let loader = TestLoader::new();

        let report = IngestService::new(&system)
            .ingest(
                dir.path(),
                &loader,
                &IngestOptions::default().with_recursive(true),
            )
            .unwrap();

        assert!(report.success);
        assert_eq!(report.units_skipped, 1);
        assert_eq!(report.units_processed, 1);
    }

    #[test]
    fn test_all_units_invalid_is_soft_outcome() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "bad_one.md");
        write_file(dir.path(), "bad_two.md");
        let system = RecordingSystem::new();
        let loader = TestLoader::new();

        let report = IngestService::new(&system)
            .ingest(
                dir.path(),
                &loader,
                &IngestOptions::default().with_recursive(true),
            )
            .unwrap();

        // Extension matches existed, so this is reported, not raised.
        assert!(report.success);
        assert_eq!(report.units_skipped, 2);
        assert_eq!(report.units_processed, 0);
        assert_eq!(report.records_loaded, 0);
    }

    #[test]
    fn test_dry_run_persists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.md");
        write_file(dir.path(), "b.md");
        let system = RecordingSystem::new();
        let loader = TestLoader::new();

        let report = IngestService::new(&system)
            .ingest(
                dir.path(),
                &loader,
                &IngestOptions::default()
                    .with_recursive(true)
                    .with_dry_run(true),
            )
            .unwrap();

        assert!(report.success);
        assert_eq!(report.records_loaded, 4);
        assert_eq!(report.connections_created, 2);
        assert_eq!(*system.stored_units.borrow(), 0);
    }

    #[test]
    fn test_units_processed_in_lexicographic_order() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "z.md");
        write_file(dir.path(), "a.md");
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        write_file(&nested, "m.md");
        let loader = TestLoader::new();

        let units = resolve_units(
            dir.path(),
            &loader,
            &IngestOptions::default().with_recursive(true),
        )
        .unwrap();

        let names: Vec<_> = units
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.md", "nested/m.md", "z.md"]);
    }

    #[test]
    fn test_max_units_caps_batch() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.md", "b.md", "c.md"] {
            write_file(dir.path(), name);
        }
        let loader = TestLoader::new();

        let units = resolve_units(
            dir.path(),
            &loader,
            &IngestOptions::default().with_recursive(true).with_max_units(2),
        )
        .unwrap();
        assert_eq!(units.len(), 2);
    }
}
