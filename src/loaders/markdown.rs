//! Markdown document loader.
//!
//! Stateless: every invocation re-derives the full record set from the
//! file content. A document becomes one concept record (L0), each heading
//! section becomes a context record (L1), and section bodies are chunked
//! into episode records (L2). Record ids are content-addressed so that
//! re-loading an unchanged file upserts instead of duplicating.

use crate::config::MarkdownConfig;
use crate::models::{Connection, HierarchyLevel, MemoryRecord};
use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::path::Path;

use super::{LoadOptions, MemoryLoader};

/// Front matter delimiter.
const FRONT_MATTER_DELIMITER: &str = "---";

/// Loader for markdown documents.
pub struct MarkdownLoader {
    config: MarkdownConfig,
}

impl MarkdownLoader {
    /// Creates a markdown loader with the given settings.
    #[must_use]
    pub const fn new(config: MarkdownConfig) -> Self {
        Self { config }
    }

    /// Derives the deterministic record id for a document element.
    fn record_id(source: &Path, parts: &[&str]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.to_string_lossy().as_bytes());
        for part in parts {
            hasher.update([0u8]);
            hasher.update(part.as_bytes());
        }
        format!("doc::{}", hex::encode(hasher.finalize()))
    }

    /// Splits a section body into chunks of at most `max_chars`, breaking
    /// on paragraph boundaries.
    fn chunk_paragraphs(body: &str, max_chars: usize) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for paragraph in body.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            if !current.is_empty() && current.len() + paragraph.len() + 2 > max_chars {
                chunks.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(paragraph);
        }
        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }
}

impl MemoryLoader for MarkdownLoader {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn supported_extensions(&self) -> &[&'static str] {
        &[".md", ".markdown"]
    }

    fn validate_source(&self, path: &Path) -> bool {
        if !path.is_file() {
            return false;
        }
        let matches_extension = path
            .file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .is_some_and(|name| {
                self.supported_extensions()
                    .iter()
                    .any(|ext| name.ends_with(ext))
            });
        matches_extension && std::fs::read_to_string(path).is_ok()
    }

    fn load_from_source(&self, path: &Path, options: &LoadOptions) -> Result<Vec<MemoryRecord>> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::operation("read_markdown_source", e))?;
        let (front_matter, body) = parse_front_matter(&raw)?;
        let max_chars = options
            .max_chunk_chars
            .unwrap_or(self.config.max_chunk_chars)
            .max(1);

        let source_path = path.to_string_lossy().into_owned();
        let document = parse_sections(&body);
        let doc_title = front_matter
            .get("title")
            .and_then(serde_json::Value::as_str)
            .map_or_else(|| document.title(path), ToString::to_string);

        let mut records = Vec::new();

        // L0: the document itself, summarized by its title and preamble.
        let mut concept = MemoryRecord::new(
            Self::record_id(path, &["document"]),
            format!("{doc_title}\n\n{}", document.preamble.trim()),
            HierarchyLevel::Concept,
        )
        .with_metadata("title", doc_title.clone())
        .with_metadata("source_path", source_path.clone())
        .with_metadata("loader_type", "markdown");
        if let Some(tags) = front_matter.get("tags") {
            concept = concept.with_metadata("tags", tags.clone());
        }
        records.push(concept);

        for section in &document.sections {
            // L1: one context per section.
            let section_id = Self::record_id(path, &["section", &section.title]);
            records.push(
                MemoryRecord::new(
                    section_id.clone(),
                    format!("{}\n\n{}", section.title, summarize(&section.body, max_chars)),
                    HierarchyLevel::Context,
                )
                .with_metadata("title", section.title.clone())
                .with_metadata("document_title", doc_title.clone())
                .with_metadata("source_path", source_path.clone())
                .with_metadata("loader_type", "markdown"),
            );

            // L2: section body chunked into episodes.
            for (index, chunk) in Self::chunk_paragraphs(&section.body, max_chars)
                .into_iter()
                .enumerate()
            {
                records.push(
                    MemoryRecord::new(
                        Self::record_id(path, &["chunk", &section.title, &index.to_string()]),
                        chunk,
                        HierarchyLevel::Episode,
                    )
                    .with_metadata("title", format!("{} ({})", section.title, index + 1))
                    .with_metadata("section", section.title.clone())
                    .with_metadata("chunk_index", index)
                    .with_metadata("source_path", source_path.clone())
                    .with_metadata("loader_type", "markdown"),
                );
            }
        }

        tracing::debug!(
            source = %path.display(),
            records = records.len(),
            "loaded markdown document"
        );
        Ok(records)
    }

    fn extract_connections(&self, records: &[MemoryRecord]) -> Vec<Connection> {
        let mut connections = Vec::new();
        let Some(document) = records
            .iter()
            .find(|r| r.hierarchy_level == HierarchyLevel::Concept)
        else {
            return connections;
        };

        for record in records {
            match record.hierarchy_level {
                HierarchyLevel::Concept => {},
                HierarchyLevel::Context => {
                    connections.push(Connection::new(
                        document.id.clone(),
                        record.id.clone(),
                        0.8,
                        "hierarchy",
                    ));
                },
                HierarchyLevel::Episode => {
                    let section = record
                        .metadata
                        .get("section")
                        .and_then(serde_json::Value::as_str);
                    if let Some(parent) = records.iter().find(|r| {
                        r.hierarchy_level == HierarchyLevel::Context
                            && section.is_some_and(|s| r.title() == s)
                    }) {
                        connections.push(Connection::new(
                            parent.id.clone(),
                            record.id.clone(),
                            0.8,
                            "hierarchy",
                        ));
                    }
                },
            }
        }

        // Sequential links between adjacent episodes of the same section.
        let episodes: Vec<&MemoryRecord> = records
            .iter()
            .filter(|r| r.hierarchy_level == HierarchyLevel::Episode)
            .collect();
        for pair in episodes.windows(2) {
            let same_section = pair[0].metadata.get("section") == pair[1].metadata.get("section");
            if same_section {
                connections.push(Connection::new(
                    pair[0].id.clone(),
                    pair[1].id.clone(),
                    0.5,
                    "section_sequence",
                ));
            }
        }

        connections
    }
}

/// A heading section of a markdown document.
struct Section {
    title: String,
    body: String,
}

/// Parsed document: text before the first heading plus its sections.
struct Document {
    preamble: String,
    first_heading: Option<String>,
    sections: Vec<Section>,
}

impl Document {
    /// Document title: the first `#` heading, else the file stem.
    fn title(&self, path: &Path) -> String {
        self.first_heading.clone().unwrap_or_else(|| {
            path.file_stem()
                .map_or_else(|| "Untitled".to_string(), |s| s.to_string_lossy().into_owned())
        })
    }
}

/// Splits a markdown body into its heading sections.
fn parse_sections(body: &str) -> Document {
    let mut preamble = String::new();
    let mut first_heading = None;
    let mut sections: Vec<Section> = Vec::new();

    for line in body.lines() {
        let trimmed = line.trim_start();
        if let Some(heading) = trimmed.strip_prefix("# ") {
            if first_heading.is_none() {
                first_heading = Some(heading.trim().to_string());
                continue;
            }
        }
        if trimmed.starts_with("## ") || trimmed.starts_with("### ") {
            let title = trimmed.trim_start_matches('#').trim().to_string();
            sections.push(Section {
                title,
                body: String::new(),
            });
            continue;
        }
        match sections.last_mut() {
            Some(section) => {
                section.body.push_str(line);
                section.body.push('\n');
            },
            None => {
                preamble.push_str(line);
                preamble.push('\n');
            },
        }
    }

    Document {
        preamble,
        first_heading,
        sections,
    }
}

/// Truncates a section body to roughly one chunk for the context record.
fn summarize(body: &str, max_chars: usize) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= max_chars {
        return trimmed.to_string();
    }
    let mut cut = max_chars;
    while !trimmed.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &trimmed[..cut])
}

/// Parses optional YAML front matter, returning metadata and the body.
fn parse_front_matter(content: &str) -> Result<(serde_json::Value, String)> {
    let content = content.trim_start();

    if !content.starts_with(FRONT_MATTER_DELIMITER) {
        return Ok((
            serde_json::Value::Object(serde_json::Map::new()),
            content.to_string(),
        ));
    }

    let after_first = &content[FRONT_MATTER_DELIMITER.len()..];
    let after_first = after_first.trim_start_matches(['\r', '\n']);

    after_first.find(FRONT_MATTER_DELIMITER).map_or_else(
        || {
            Err(Error::InvalidInput(
                "front matter missing closing delimiter".to_string(),
            ))
        },
        |end_pos| {
            let yaml_content = after_first[..end_pos].trim();
            let body_start = end_pos + FRONT_MATTER_DELIMITER.len();
            let body = after_first[body_start..].trim_start_matches(['\r', '\n']);

            let metadata: serde_json::Value = serde_yaml_ng::from_str(yaml_content)
                .map_err(|e| Error::InvalidInput(format!("invalid YAML front matter: {e}")))?;

            Ok((metadata, body.to_string()))
        },
    )
}
