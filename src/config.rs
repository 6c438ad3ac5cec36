//! Configuration management for docmeta.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::ModelProfile;
use crate::engine::EngineConfig;
use crate::llm::LlmConfig;

/// Output subdirectory for extraction reports.
const OUTPUT_SUBDIR: &str = "output";

/// Subdirectory for feedback events.
const FEEDBACK_SUBDIR: &str = "feedback";

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Directory extraction reports are written to.
    pub output_dir: PathBuf,
    /// Directory feedback events are written to.
    pub feedback_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        // Default to ~/Documents/docmeta/ for user data
        // Falls back gracefully: Documents dir -> Home dir -> Current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docmeta");

        Self {
            output_dir: data_dir.join(OUTPUT_SUBDIR),
            feedback_dir: data_dir.join(FEEDBACK_SUBDIR),
            data_dir,
        }
    }
}

impl Settings {
    /// Create settings rooted at a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            output_dir: data_dir.join(OUTPUT_SUBDIR),
            feedback_dir: data_dir.join(FEEDBACK_SUBDIR),
            data_dir,
        }
    }

    /// Ensure all directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for (dir, label) in [
            (&self.data_dir, "data directory"),
            (&self.output_dir, "output directory"),
            (&self.feedback_dir, "feedback directory"),
        ] {
            fs::create_dir_all(dir).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!("Failed to create {} '{}': {}", label, dir.display(), e),
                )
            })?;
        }
        Ok(())
    }
}

fn default_workers() -> usize {
    4
}

fn default_task_timeout_secs() -> u64 {
    120
}

fn default_epsilon() -> f64 {
    crate::aggregate::DEFAULT_CONFIDENCE_EPSILON
}

/// Engine tuning section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSection {
    /// Maximum concurrent backend calls.
    #[serde(default = "default_workers")]
    pub max_concurrent_calls: usize,
    /// Per-task timeout in seconds.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
    /// Optional run deadline in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_deadline_secs: Option<u64>,
    /// Confidence window for accuracy tie-breaks.
    #[serde(default = "default_epsilon")]
    pub confidence_epsilon: f64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_concurrent_calls: default_workers(),
            task_timeout_secs: default_task_timeout_secs(),
            run_deadline_secs: None,
            confidence_epsilon: default_epsilon(),
        }
    }
}

impl EngineSection {
    /// Check if this is the default config.
    pub fn is_default(&self) -> bool {
        let defaults = Self::default();
        self.max_concurrent_calls == defaults.max_concurrent_calls
            && self.task_timeout_secs == defaults.task_timeout_secs
            && self.run_deadline_secs == defaults.run_deadline_secs
            && self.confidence_epsilon == defaults.confidence_epsilon
    }

    /// Convert to the engine's runtime configuration.
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_concurrent_calls: self.max_concurrent_calls,
            task_timeout: std::time::Duration::from_secs(self.task_timeout_secs),
            run_deadline: self.run_deadline_secs.map(std::time::Duration::from_secs),
            confidence_epsilon: self.confidence_epsilon,
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Output directory path (defaults to `<data_dir>/output`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    /// LLM endpoint configuration.
    #[serde(default, skip_serializing_if = "LlmConfig::is_default")]
    pub llm: LlmConfig,
    /// Engine tuning.
    #[serde(default, skip_serializing_if = "EngineSection::is_default")]
    pub engine: EngineSection,
    /// Catalog override: replaces the built-in model profiles when present.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<ModelProfile>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration by discovering a config file in standard locations.
    pub async fn load() -> Self {
        match find_config_file() {
            Some(path) => Self::load_from_path(&path)
                .await
                .unwrap_or_else(|_| Self::default()),
            None => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML, and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    /// Returns the config file's parent directory if available, otherwise None.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    /// `base_dir` is used to resolve relative paths.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            let resolved = self.resolve_path(data_dir, base_dir);
            *settings = Settings::with_data_dir(resolved);
        }
        if let Some(ref output_dir) = self.output_dir {
            settings.output_dir = self.resolve_path(output_dir, base_dir);
        }
    }

    /// Model profiles to register: the config's override, or the defaults.
    pub fn model_profiles(&self) -> Vec<ModelProfile> {
        if self.models.is_empty() {
            crate::catalog::default_profiles()
        } else {
            self.models.clone()
        }
    }
}

/// Look for a config file in conventional locations.
/// Checks docmeta.{ext} and config.{ext} in the working directory, then the
/// user config directory.
fn find_config_file() -> Option<PathBuf> {
    let extensions = ["toml", "yaml", "yml", "json"];
    let basenames = ["docmeta", "config"];

    for basename in basenames {
        for ext in extensions {
            let path = PathBuf::from(format!("{}.{}", basename, ext));
            if path.exists() {
                return Some(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        for ext in extensions {
            let path = config_dir.join("docmeta").join(format!("config.{}", ext));
            if path.exists() {
                return Some(path);
            }
        }
    }
    None
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Data directory override (--data-dir flag).
    pub data_dir: Option<PathBuf>,
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await.unwrap_or_else(|e| {
            tracing::warn!("config load failed, using defaults: {}", e);
            Config::default()
        }),
        None => Config::load().await,
    };

    let mut settings = Settings::default();

    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    config.apply_to_settings(&mut settings, &base_dir);

    // --data-dir flag takes precedence over config
    if let Some(data_dir) = options.data_dir {
        settings = Settings::with_data_dir(data_dir);
    }

    // DOCMETA_DATA_DIR environment variable takes highest precedence
    if let Some(dir) = std::env::var("DOCMETA_DATA_DIR")
        .ok()
        .filter(|s| !s.is_empty())
    {
        tracing::debug!("Using DOCMETA_DATA_DIR from environment: {}", dir);
        settings = Settings::with_data_dir(PathBuf::from(dir));
    }

    (settings, config)
}
