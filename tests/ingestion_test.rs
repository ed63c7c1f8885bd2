//! Integration tests for the ingestion orchestrator.
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::uninlined_format_args
)]

use engram::config::MarkdownConfig;
use engram::ingestion::{IngestOptions, IngestService};
use engram::loaders::markdown::MarkdownLoader;
use engram::system::{CognitiveSystem, LocalCognitiveSystem};
use engram::{BucketKind, Error};
use std::path::{Path, PathBuf};

fn write_doc(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn sample_doc(topic: &str) -> String {
    format!(
        "# {topic} Guide\n\nOverview of {topic}.\n\n## Details\n\nHow {topic} works in practice.\n"
    )
}

fn markdown_loader() -> MarkdownLoader {
    MarkdownLoader::new(MarkdownConfig::default())
}

#[test]
fn test_single_file_ingestion_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(dir.path(), "auth.md", &sample_doc("authentication"));
    let system = LocalCognitiveSystem::open_in_memory().unwrap();
    let loader = markdown_loader();

    let report = IngestService::new(&system)
        .ingest(&doc, &loader, &IngestOptions::default())
        .unwrap();

    assert!(report.success);
    assert!(report.records_loaded > 0);
    assert_eq!(report.units_processed, 1);
    assert_eq!(
        report.hierarchy_distribution.total(),
        report.records_loaded,
        "distribution must account for every loaded record"
    );
    assert_eq!(system.record_count().unwrap(), report.records_loaded as u64);
}

#[test]
fn test_directory_requires_recursive() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(dir.path(), "a.md", &sample_doc("alpha"));
    let system = LocalCognitiveSystem::open_in_memory().unwrap();
    let loader = markdown_loader();

    let result = IngestService::new(&system).ingest(dir.path(), &loader, &IngestOptions::default());

    assert!(matches!(result, Err(Error::InvalidInput(_))));
    // Usage errors must not touch the store.
    assert_eq!(system.record_count().unwrap(), 0);
}

#[test]
fn test_zero_extension_matches_is_hard_error() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(dir.path(), "notes.txt", "not markdown");
    let system = LocalCognitiveSystem::open_in_memory().unwrap();
    let loader = markdown_loader();

    let result = IngestService::new(&system).ingest(
        dir.path(),
        &loader,
        &IngestOptions::default().with_recursive(true),
    );
    assert!(matches!(result, Err(Error::NoMatchingSources { .. })));
}

#[test]
fn test_partial_failure_isolation() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(dir.path(), "a.md", &sample_doc("alpha"));
    // Front matter without a closing delimiter fails during load.
    write_doc(dir.path(), "b.md", "---\ntitle: broken\nno closing delimiter");
    write_doc(dir.path(), "c.md", &sample_doc("gamma"));
    let system = LocalCognitiveSystem::open_in_memory().unwrap();
    let loader = markdown_loader();

    let report = IngestService::new(&system)
        .ingest(
            dir.path(),
            &loader,
            &IngestOptions::default().with_recursive(true),
        )
        .unwrap();

    assert_eq!(report.units_failed, 1, "exactly the malformed unit fails");
    assert_eq!(report.units_processed, 2, "remaining units still process");
    assert!(!report.success);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("b.md"));
    assert!(system.record_count().unwrap() > 0);
}

#[test]
fn test_dry_run_leaves_store_untouched() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(dir.path(), "a.md", &sample_doc("alpha"));
    write_doc(dir.path(), "b.md", &sample_doc("beta"));
    let system = LocalCognitiveSystem::open_in_memory().unwrap();
    let loader = markdown_loader();

    let before = system.record_count().unwrap();
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
    assert!(report.records_loaded > 0, "dry run still reports counts");
    assert_eq!(system.record_count().unwrap(), before, "nothing persisted");
}

#[test]
fn test_reingestion_upserts_documents() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(dir.path(), "auth.md", &sample_doc("authentication"));
    let system = LocalCognitiveSystem::open_in_memory().unwrap();
    let loader = markdown_loader();
    let service = IngestService::new(&system);

    service.ingest(&doc, &loader, &IngestOptions::default()).unwrap();
    let after_first = system.record_count().unwrap();

    service.ingest(&doc, &loader, &IngestOptions::default()).unwrap();
    assert_eq!(
        system.record_count().unwrap(),
        after_first,
        "unchanged document re-ingestion creates no net new records"
    );
}

#[test]
fn test_ingested_documents_are_retrievable() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(dir.path(), "auth.md", &sample_doc("authentication"));
    let system = LocalCognitiveSystem::open_in_memory().unwrap();
    let loader = markdown_loader();

    IngestService::new(&system)
        .ingest(&doc, &loader, &IngestOptions::default())
        .unwrap();

    let result = system
        .retrieve_memories("authentication guide", &BucketKind::ALL, 10)
        .unwrap();
    assert!(!result.is_empty());
    let top = result.iter().next().unwrap();
    assert!(top.record().metadata.contains_key("similarity_score"));
}
