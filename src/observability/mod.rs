//! Observability: structured logging initialization.
//!
//! Retrieval and ingestion paths log through `tracing`; this module wires
//! the subscriber once at process start. Output goes to stderr so command
//! output on stdout stays machine-consumable.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "engram=info";

/// Verbose filter enabled by the CLI `--verbose` flag.
const VERBOSE_FILTER: &str = "engram=debug";

/// Initializes the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise the filter defaults to info
/// (or debug with `verbose`). Safe to call once per process; subsequent
/// calls are ignored.
pub fn init(verbose: bool) {
    let fallback = if verbose {
        VERBOSE_FILTER
    } else {
        DEFAULT_FILTER
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init(false);
        init(true);
    }
}
