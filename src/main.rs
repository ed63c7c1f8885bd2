//! Binary entry point for engram.
//!
//! This binary provides the CLI interface for the engram memory system.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print macros in the main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow unnecessary_wraps for consistent command function signatures
#![allow(clippy::unnecessary_wraps)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use engram::config::EngramConfig;
use engram::ingestion::{IngestOptions, IngestService};
use engram::loaders::{GitHistoryLoader, LoadOptions, LoaderKind, MarkdownLoader, MemoryLoader};
use engram::models::{BucketKind, IngestionReport, PatternType, RetrievedItem};
use engram::retrieval::RetrievalService;
use engram::system::{CognitiveSystem, LocalCognitiveSystem};
use engram::{observability, HierarchyLevel};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Exit code for critical/unhealthy outcomes of status-style commands.
const EXIT_CRITICAL: u8 = 2;

/// Exit code reported when the process is interrupted.
const EXIT_INTERRUPT: i32 = 130;

/// Engram - a layered cognitive memory system.
#[derive(Parser)]
#[command(name = "engram")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "ENGRAM_CONFIG_PATH")]
    config: Option<String>,

    /// Override the data directory.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Store a new experience.
    Store {
        /// Experience text to store.
        text: String,

        /// Context as a JSON object.
        #[arg(long)]
        context: Option<String>,

        /// Hierarchy level (0=concepts, 1=contexts, 2=episodes).
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=2))]
        level: Option<u8>,
    },

    /// Retrieve memories for a query.
    Retrieve {
        /// Query text.
        query: String,

        /// Memory types to retrieve: core, peripheral, bridge.
        #[arg(short, long, value_delimiter = ',')]
        types: Vec<String>,

        /// Maximum results per type.
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show system status.
    Status {
        /// Show detailed statistics.
        #[arg(long)]
        detailed: bool,
    },

    /// Consolidate episodic memories.
    Consolidate,

    /// Load memories from an external source.
    Load {
        /// Path to the source file or directory.
        source_path: PathBuf,

        /// Type of loader to use: markdown or git.
        #[arg(long, default_value = "markdown")]
        loader_type: String,

        /// Analyze the source without loading memories.
        #[arg(long)]
        dry_run: bool,

        /// Recursively load all matching files in a directory.
        #[arg(long)]
        recursive: bool,

        /// Override maximum characters per chunk.
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// Load git repository patterns.
    GitLoad {
        /// Path to the git repository.
        repo_path: PathBuf,

        /// Analysis time window (e.g. 30d, 3m, 1y).
        #[arg(long)]
        time_window: Option<String>,

        /// Maximum commits to process.
        #[arg(long)]
        max_commits: Option<usize>,

        /// Show patterns without storing.
        #[arg(long)]
        dry_run: bool,

        /// Ignore incremental state and reprocess the full history.
        #[arg(long)]
        refresh: bool,
    },

    /// Show git analysis status.
    GitStatus {
        /// Repository path (optional).
        repo_path: Option<PathBuf>,
    },

    /// Search git patterns.
    GitPatterns {
        /// Search query for patterns.
        query: String,

        /// Pattern type filter: cochange, hotspot, solution.
        #[arg(long = "type")]
        pattern_type: Option<String>,

        /// Maximum results to show. Zero shows counts only.
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Enter interactive mode.
    Interactive,
}

/// Main entry point.
fn main() -> ExitCode {
    // Optional .env for local development; ignored when absent.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    observability::init(cli.verbose);

    if let Err(e) = ctrlc::set_handler(|| {
        eprintln!("\nInterrupted");
        std::process::exit(EXIT_INTERRUPT);
    }) {
        eprintln!("Failed to install interrupt handler: {e}");
    }

    let config = match load_config(cli.config.as_deref()) {
        Ok(mut config) => {
            if let Some(data_dir) = cli.data_dir.clone() {
                config = config.with_data_dir(data_dir);
            }
            config
        },
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli, config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(cli: Cli, config: EngramConfig) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let system = LocalCognitiveSystem::open(&config.data_dir)?;

    match cli.command {
        Commands::Store {
            text,
            context,
            level,
        } => cmd_store(&system, text, context, level),

        Commands::Retrieve {
            query,
            types,
            limit,
        } => cmd_retrieve(&system, query, types, limit),

        Commands::Status { detailed } => Ok(ExitCode::from(cmd_status(&system, detailed))),

        Commands::Consolidate => cmd_consolidate(&system),

        Commands::Load {
            source_path,
            loader_type,
            dry_run,
            recursive,
            chunk_size,
        } => cmd_load(
            &config,
            &system,
            source_path,
            loader_type,
            dry_run,
            recursive,
            chunk_size,
        ),

        Commands::GitLoad {
            repo_path,
            time_window,
            max_commits,
            dry_run,
            refresh,
        } => cmd_git_load(
            &config,
            &system,
            repo_path,
            time_window,
            max_commits,
            dry_run,
            refresh,
        ),

        Commands::GitStatus { repo_path } => Ok(ExitCode::from(cmd_git_status(&system, repo_path))),

        Commands::GitPatterns {
            query,
            pattern_type,
            limit,
        } => cmd_git_patterns(&system, query, pattern_type, limit),

        Commands::Interactive => cmd_interactive(&config, &system),
    }
}

/// Loads configuration from an explicit path or the default locations.
fn load_config(path: Option<&str>) -> Result<EngramConfig, Box<dyn std::error::Error>> {
    if let Some(config_path) = path {
        if !config_path.trim().is_empty() {
            return EngramConfig::load_from_file(Path::new(config_path))
                .map_err(std::convert::Into::into);
        }
    }
    Ok(EngramConfig::load_default())
}

/// Builds the loader for a kind string.
fn build_loader(
    config: &EngramConfig,
    kind: LoaderKind,
) -> Box<dyn MemoryLoader> {
    match kind {
        LoaderKind::Markdown => Box::new(MarkdownLoader::new(config.markdown.clone())),
        LoaderKind::Git => Box::new(GitHistoryLoader::new(
            config.git.clone(),
            config.data_dir.clone(),
        )),
    }
}

/// Store command.
fn cmd_store(
    system: &dyn CognitiveSystem,
    text: String,
    context: Option<String>,
    level: Option<u8>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut context_value = match context {
        Some(raw) => serde_json::from_str::<serde_json::Value>(&raw)
            .map_err(|e| format!("invalid JSON context: {e}"))?,
        None => serde_json::json!({}),
    };
    if !context_value.is_object() {
        return Err("context must be a JSON object".into());
    }
    if let Some(level) = level {
        context_value["hierarchy_level"] = serde_json::json!(level);
    }

    let id = system.store_experience(&text, Some(&context_value))?;
    println!("Experience stored with ID: {id}");
    Ok(ExitCode::SUCCESS)
}

/// Retrieve command.
fn cmd_retrieve(
    system: &dyn CognitiveSystem,
    query: String,
    types: Vec<String>,
    limit: usize,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let parsed_types = parse_bucket_kinds(&types)?;
    let service = RetrievalService::new(system);
    let result = service.stratify(&query, parsed_types.as_deref(), limit)?;

    if result.is_empty() {
        println!("No memories found for query");
        return Ok(ExitCode::SUCCESS);
    }

    println!("Retrieved {} memories for: '{query}'", result.total());
    for kind in BucketKind::ALL {
        let bucket = result.bucket(kind);
        if bucket.is_empty() {
            continue;
        }
        println!();
        println!("{} memories ({}):", kind.as_str().to_uppercase(), bucket.len());
        for (index, item) in bucket.iter().enumerate() {
            print_item(index + 1, item);
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Prints one retrieval hit, content truncated for display.
fn print_item(position: usize, item: &RetrievedItem) {
    let record = item.record();
    println!("  {position}. [{}] {}", record.hierarchy_level, truncate(&record.content, 100));
    match item {
        RetrievedItem::Bridge(bridge) => {
            println!(
                "     ID: {}, Novelty: {:.2}, Connection: {:.2}, Bridge Score: {:.2}",
                record.id, bridge.novelty_score, bridge.connection_potential, bridge.bridge_score
            );
        },
        RetrievedItem::Record(_) => {
            println!(
                "     ID: {}, Strength: {:.2}",
                record.id,
                item.relevance()
            );
        },
    }
}

/// Truncates content for display.
fn truncate(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.replace('\n', " ");
    }
    let cut: String = content.chars().take(max_chars).collect();
    format!("{}...", cut.replace('\n', " "))
}

/// Parses bucket kind strings, returning `None` for an empty selection.
fn parse_bucket_kinds(
    types: &[String],
) -> Result<Option<Vec<BucketKind>>, Box<dyn std::error::Error>> {
    if types.is_empty() {
        return Ok(None);
    }
    let mut kinds = Vec::new();
    for raw in types {
        let kind = BucketKind::parse(raw).ok_or_else(|| format!("unknown memory type: {raw}"))?;
        kinds.push(kind);
    }
    Ok(Some(kinds))
}

/// Status command. Unreachable storage is a critical outcome.
fn cmd_status(system: &dyn CognitiveSystem, detailed: bool) -> u8 {
    println!("Engram Status");
    println!("=============");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!();

    let stats = match system.memory_stats() {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("Failed to read system statistics: {e}");
            return EXIT_CRITICAL;
        },
    };

    if !stats.memory_counts.is_empty() {
        println!("Memory counts:");
        for (key, count) in &stats.memory_counts {
            println!("  {}: {count}", level_display_name(key));
        }
    }

    if detailed {
        if !stats.system_config.is_empty() {
            println!();
            println!("Configuration:");
            for (key, value) in &stats.system_config {
                println!("  {key}: {value}");
            }
        }
        if !stats.storage_stats.is_empty() {
            println!();
            println!("Storage statistics:");
            for (key, value) in &stats.storage_stats {
                println!("  {key}: {value}");
            }
        }
        if !stats.embedding_info.is_empty() {
            println!();
            println!("Embedding model:");
            for (key, value) in &stats.embedding_info {
                println!("  {key}: {value}");
            }
        }
    }

    0
}

/// Human name for a `level_<n>` stats key.
fn level_display_name(key: &str) -> String {
    key.strip_prefix("level_")
        .and_then(|level| level.parse::<u8>().ok())
        .and_then(HierarchyLevel::from_u8)
        .map_or_else(|| key.to_string(), |level| format!("{} ({})", level.label(), level.name()))
}

/// Consolidate command.
fn cmd_consolidate(
    system: &dyn CognitiveSystem,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    println!("Starting memory consolidation...");
    let report = system.consolidate_memories()?;

    println!("Consolidation completed:");
    println!("  Total episodic memories: {}", report.total_episodic);
    println!("  Consolidated: {}", report.consolidated);
    println!("  Failed: {}", report.failed);
    println!("  Skipped: {}", report.skipped);
    Ok(ExitCode::SUCCESS)
}

/// Load command.
fn cmd_load(
    config: &EngramConfig,
    system: &dyn CognitiveSystem,
    source_path: PathBuf,
    loader_type: String,
    dry_run: bool,
    recursive: bool,
    chunk_size: Option<usize>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let kind = LoaderKind::parse(&loader_type)
        .ok_or_else(|| format!("unsupported loader type: {loader_type} (markdown, git)"))?;
    let loader = build_loader(config, kind);

    let mut load_options = LoadOptions::new();
    load_options.max_chunk_chars = chunk_size;
    let options = IngestOptions::new()
        .with_dry_run(dry_run)
        .with_recursive(recursive)
        .with_load_options(load_options);

    if dry_run {
        println!("Dry run: analyzing {}", source_path.display());
    } else {
        println!("Loading memories from {}...", source_path.display());
    }

    let service = IngestService::new(system);
    let report = service.ingest(&source_path, loader.as_ref(), &options)?;
    print_ingestion_report(&report, dry_run);

    Ok(if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Git-load command.
fn cmd_git_load(
    config: &EngramConfig,
    system: &dyn CognitiveSystem,
    repo_path: PathBuf,
    time_window: Option<String>,
    max_commits: Option<usize>,
    dry_run: bool,
    refresh: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let loader = build_loader(config, LoaderKind::Git);

    let mut load_options = LoadOptions::new().with_force_full_load(refresh);
    load_options.time_window = time_window;
    load_options.max_commits = max_commits;
    let options = IngestOptions::new()
        .with_dry_run(dry_run)
        .with_load_options(load_options);

    if dry_run {
        println!("Dry run: analyzing repository {}", repo_path.display());
    } else {
        println!("Loading git patterns from {}...", repo_path.display());
    }

    let service = IngestService::new(system);
    let report = service.ingest(&repo_path, loader.as_ref(), &options)?;
    print_ingestion_report(&report, dry_run);

    Ok(if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Prints the outcome of an ingestion run.
fn print_ingestion_report(report: &IngestionReport, dry_run: bool) {
    if dry_run {
        println!("Dry run complete: would load {} memories", report.records_loaded);
        println!("  Would create {} connections", report.connections_created);
    } else if report.success {
        println!("Memory loading completed successfully");
        println!("  Memories loaded: {}", report.records_loaded);
        println!("  Connections created: {}", report.connections_created);
        println!("  Processing time: {:.2}s", report.processing_time.as_secs_f64());
    } else {
        println!("Memory loading completed with errors");
        println!("  Memories loaded: {}", report.records_loaded);
        println!("  Connections created: {}", report.connections_created);
    }

    println!("  Hierarchy distribution:");
    for level in [
        HierarchyLevel::Concept,
        HierarchyLevel::Context,
        HierarchyLevel::Episode,
    ] {
        println!(
            "    {} ({}): {}",
            level.label(),
            level.name(),
            report.hierarchy_distribution.get(level)
        );
    }

    if report.units_skipped > 0 {
        println!("  Skipped invalid sources: {}", report.units_skipped);
    }
    if report.records_failed > 0 {
        println!("  Failed memories: {}", report.records_failed);
    }
    if report.connections_failed > 0 {
        println!("  Failed connections: {}", report.connections_failed);
    }
    for error in &report.errors {
        println!("  Unit failure: {error}");
    }
}

/// Git-status command.
fn cmd_git_status(system: &dyn CognitiveSystem, repo_path: Option<PathBuf>) -> u8 {
    if let Some(repo_path) = repo_path {
        if !repo_path.exists() {
            eprintln!("Repository path does not exist: {}", repo_path.display());
            return 1;
        }
        if !repo_path.join(".git").exists() {
            eprintln!("Not a git repository: {}", repo_path.display());
            return 1;
        }
        println!("Git analysis status for: {}", repo_path.display());
        println!("==================================================");
    } else {
        let code = cmd_status(system, false);
        if code != 0 {
            return code;
        }
        println!();
        println!("========================================");
    }

    print_pattern_summary(system)
}

/// Prints stored pattern counts.
fn print_pattern_summary(system: &dyn CognitiveSystem) -> u8 {
    let service = RetrievalService::new(system);
    match service.count_patterns() {
        Ok(counts) => {
            println!("Git pattern summary:");
            println!("  Total git patterns: {}", counts.total());
            for pattern_type in PatternType::ALL {
                println!(
                    "  {}: {}",
                    pattern_type.description(),
                    counts.get(pattern_type)
                );
            }
            0
        },
        Err(e) => {
            eprintln!("Failed to summarize git patterns: {e}");
            1
        },
    }
}

/// Git-patterns command.
fn cmd_git_patterns(
    system: &dyn CognitiveSystem,
    query: String,
    pattern_type: Option<String>,
    limit: usize,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let pattern_type = match pattern_type {
        Some(raw) => Some(
            PatternType::parse(&raw)
                .ok_or_else(|| format!("unknown pattern type: {raw} (cochange, hotspot, solution)"))?,
        ),
        None => None,
    };

    // A zero limit asks for counts only.
    if limit == 0 {
        return Ok(ExitCode::from(print_pattern_summary(system)));
    }

    let service = RetrievalService::new(system);
    let result = service.search_patterns(&query, pattern_type, limit)?;

    let hits: Vec<&RetrievedItem> = result
        .iter()
        .filter(|item| item.id().is_git_derived())
        .filter(|item| {
            pattern_type.is_none_or(|wanted| item.record().pattern_type() == Some(wanted))
        })
        .take(limit)
        .collect();

    if hits.is_empty() {
        println!("No git patterns found");
        return Ok(ExitCode::SUCCESS);
    }

    println!("Found {} git patterns:", hits.len());
    for (index, item) in hits.iter().enumerate() {
        print_item(index + 1, item);
    }
    Ok(ExitCode::SUCCESS)
}

/// Interactive command loop.
fn cmd_interactive(
    config: &EngramConfig,
    system: &dyn CognitiveSystem,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    println!("Engram interactive mode");
    println!("Type 'help' for commands, 'quit' to exit");

    let stdin = std::io::stdin();
    loop {
        print!("engram> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!("Goodbye!");
            break;
        }
        let command = line.trim();
        if command.is_empty() {
            continue;
        }

        let outcome: Result<ExitCode, Box<dyn std::error::Error>> = match command {
            "quit" | "exit" | "q" => {
                println!("Goodbye!");
                break;
            },
            "help" | "h" | "?" => {
                print_interactive_help();
                Ok(ExitCode::SUCCESS)
            },
            "status" => Ok(ExitCode::from(cmd_status(system, false))),
            "config" => Ok(ExitCode::from(cmd_status(system, true))),
            "consolidate" => cmd_consolidate(system),
            _ => {
                if let Some(text) = command.strip_prefix("store ") {
                    cmd_store(system, text.to_string(), None, None)
                } else if let Some(query) = command.strip_prefix("retrieve ") {
                    cmd_retrieve(system, query.to_string(), Vec::new(), 10)
                } else if let Some(query) = command.strip_prefix("bridges ") {
                    cmd_retrieve(system, query.to_string(), vec!["bridge".to_string()], 10)
                } else if let Some(path) = command.strip_prefix("load ") {
                    cmd_load(
                        config,
                        system,
                        PathBuf::from(path.trim()),
                        "markdown".to_string(),
                        false,
                        false,
                        None,
                    )
                } else {
                    println!("Unknown command: {command}");
                    println!("Type 'help' for available commands");
                    Ok(ExitCode::SUCCESS)
                }
            },
        };

        if let Err(e) = outcome {
            println!("Error: {e}");
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Help text for interactive mode.
fn print_interactive_help() {
    println!("Available commands:");
    println!("  store <text>       - Store a new experience");
    println!("  retrieve <query>   - Retrieve memories");
    println!("  bridges <query>    - Show bridge connections");
    println!("  load <file_path>   - Load memories from a markdown file");
    println!("  status             - Show system status");
    println!("  config             - Show detailed configuration");
    println!("  consolidate        - Trigger memory consolidation");
    println!("  help               - Show this help");
    println!("  quit               - Exit interactive mode");
}
