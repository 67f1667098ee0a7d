//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::promql::parse_duration;
use crate::translator::TranslatorOptions;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub translator: TranslatorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Translation settings
#[derive(Debug, Clone, Deserialize)]
pub struct TranslatorConfig {
    #[serde(default = "default_window")]
    pub default_window: String,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default = "default_max_or_groups")]
    pub max_or_groups: usize,
}

fn default_window() -> String {
    "1m".to_string()
}

fn default_max_depth() -> usize {
    64
}

fn default_max_or_groups() -> usize {
    64
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            default_window: default_window(),
            max_depth: default_max_depth(),
            max_or_groups: default_max_or_groups(),
        }
    }
}

impl From<&TranslatorConfig> for TranslatorOptions {
    fn from(config: &TranslatorConfig) -> Self {
        TranslatorOptions {
            default_window: config.default_window.clone(),
            max_depth: config.max_depth,
            max_or_groups: config.max_or_groups,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("influxql2promql").join("config.toml")),
            Some(PathBuf::from("/etc/influxql2promql/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Check values that deserialization alone cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_duration(&self.translator.default_window).map_err(|e| ConfigError::Invalid {
            field: "translator.default_window",
            error: e.to_string(),
        })?;
        if self.translator.max_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "translator.max_depth",
                error: "must be at least 1".to_string(),
            });
        }
        if self.translator.max_or_groups == 0 {
            return Err(ConfigError::Invalid {
                field: "translator.max_or_groups",
                error: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Options for [`crate::translator::Translator`]
    pub fn translator_options(&self) -> TranslatorOptions {
        TranslatorOptions::from(&self.translator)
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Translator overrides
        if let Some(window) = var("INFLUXQL2PROMQL_DEFAULT_WINDOW") {
            self.translator.default_window = window;
        }
        if let Some(depth) = var("INFLUXQL2PROMQL_MAX_DEPTH") {
            match depth.parse() {
                Ok(d) => self.translator.max_depth = d,
                Err(_) => tracing::warn!("Ignoring invalid INFLUXQL2PROMQL_MAX_DEPTH: {}", depth),
            }
        }

        // Logging overrides
        if let Some(level) = var("INFLUXQL2PROMQL_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("INFLUXQL2PROMQL_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid value for {field}: {error}")]
    Invalid { field: &'static str, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# influxql2promql Configuration
#
# Environment variables override these settings:
# - INFLUXQL2PROMQL_DEFAULT_WINDOW
# - INFLUXQL2PROMQL_MAX_DEPTH
# - INFLUXQL2PROMQL_LOG_LEVEL
# - INFLUXQL2PROMQL_LOG_FORMAT

[translator]
# Range used by aggregates when GROUP BY has no time(...) (Prometheus duration)
default_window = "1m"

# Maximum nesting of function calls and WHERE clauses
max_depth = 64

# Maximum number of OR groups a WHERE clause may expand to
max_or_groups = 64

[logging]
# Log level: trace, debug, info, warn, error
level = "warn"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
