//! Configuration management.

use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration for engram.
#[derive(Debug, Clone)]
pub struct EngramConfig {
    /// Path to the data directory (local store, incremental state).
    pub data_dir: PathBuf,
    /// Maximum number of search results per bucket.
    pub max_results: usize,
    /// Markdown loader settings.
    pub markdown: MarkdownConfig,
    /// Git history loader settings.
    pub git: GitConfig,
}

/// Markdown loader configuration.
#[derive(Debug, Clone)]
pub struct MarkdownConfig {
    /// Maximum characters per episode chunk.
    pub max_chunk_chars: usize,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 2000,
        }
    }
}

/// Git history loader configuration.
#[derive(Debug, Clone)]
pub struct GitConfig {
    /// Maximum commits examined per load.
    pub max_commits: usize,
    /// Default analysis window, e.g. "30d", "3m", "1y".
    pub time_window: String,
    /// Minimum co-occurring commits before a file pair becomes a co-change pattern.
    pub cochange_min_support: usize,
    /// Minimum change count before a file becomes a hotspot pattern.
    pub hotspot_min_changes: usize,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            max_commits: 1000,
            time_window: "3m".to_string(),
            cochange_min_support: 2,
            hotspot_min_changes: 3,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// Max results.
    pub max_results: Option<usize>,
    /// Markdown section.
    pub markdown: Option<ConfigFileMarkdown>,
    /// Git section.
    pub git: Option<ConfigFileGit>,
}

/// Markdown section in the config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileMarkdown {
    /// Maximum characters per episode chunk.
    pub max_chunk_chars: Option<usize>,
}

/// Git section in the config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileGit {
    /// Maximum commits per load.
    pub max_commits: Option<usize>,
    /// Analysis time window.
    pub time_window: Option<String>,
    /// Co-change support threshold.
    pub cochange_min_support: Option<usize>,
    /// Hotspot change threshold.
    pub hotspot_min_changes: Option<usize>,
}

impl Default for EngramConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".engram"),
            max_results: 10,
            markdown: MarkdownConfig::default(),
            git: GitConfig::default(),
        }
    }
}

impl EngramConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &std::path::Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::operation("read_config_file", e))?;

        let file: ConfigFile = toml::from_str(&contents)
            .map_err(|e| crate::Error::operation("parse_config_file", e))?;

        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/engram/` on macOS)
    /// 2. XDG config dir (`~/.config/engram/` for Unix compatibility)
    ///
    /// Returns default configuration if no config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        // Check platform-specific config dir first
        let platform_config = base_dirs.config_dir().join("engram").join("config.toml");
        if platform_config.exists() {
            if let Ok(config) = Self::load_from_file(&platform_config) {
                return config;
            }
        }

        // Fall back to XDG-style ~/.config/engram/ for Unix compatibility
        let xdg_config = base_dirs
            .home_dir()
            .join(".config")
            .join("engram")
            .join("config.toml");
        if xdg_config.exists() {
            if let Ok(config) = Self::load_from_file(&xdg_config) {
                return config;
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `EngramConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }
        if let Some(max_results) = file.max_results {
            config.max_results = max_results;
        }
        if let Some(markdown) = file.markdown {
            if let Some(v) = markdown.max_chunk_chars {
                config.markdown.max_chunk_chars = v;
            }
        }
        if let Some(git) = file.git {
            if let Some(v) = git.max_commits {
                config.git.max_commits = v;
            }
            if let Some(v) = git.time_window {
                config.git.time_window = v;
            }
            if let Some(v) = git.cochange_min_support {
                config.git.cochange_min_support = v;
            }
            if let Some(v) = git.hotspot_min_changes {
                config.git.hotspot_min_changes = v;
            }
        }

        config
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Sets the per-bucket result limit.
    #[must_use]
    pub const fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngramConfig::default();
        assert_eq!(config.max_results, 10);
        assert_eq!(config.git.max_commits, 1000);
        assert_eq!(config.git.time_window, "3m");
    }

    #[test]
    fn test_from_config_file_overrides() {
        let file: ConfigFile = toml::from_str(
            r#"
            data_dir = "/var/lib/engram"
            max_results = 25

            [git]
            max_commits = 200
            time_window = "6m"
            "#,
        )
        .unwrap();

        let config = EngramConfig::from_config_file(file);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/engram"));
        assert_eq!(config.max_results, 25);
        assert_eq!(config.git.max_commits, 200);
        assert_eq!(config.git.time_window, "6m");
        // Untouched sections keep defaults
        assert_eq!(config.markdown.max_chunk_chars, 2000);
    }
}
