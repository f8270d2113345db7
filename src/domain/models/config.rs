use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::run::OptimizationConfig;

/// Main configuration structure for evoprompt
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Generation backend configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Defaults for new optimization runs
    #[serde(default)]
    pub optimization: OptimizationConfig,

    /// Hard timeouts around external calls
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Adversarial probe configuration
    #[serde(default)]
    pub adversarial: AdversarialConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Generation backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GenerationConfig {
    /// Backend used for mutation and test execution: anthropic, openai, mock
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Override for the provider's API base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// API key (falls back to the provider's environment variable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Maximum tokens to generate per call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature for mutation calls
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_provider() -> String {
    "anthropic".to_string()
}

const fn default_max_tokens() -> u32 {
    2048
}

const fn default_temperature() -> f32 {
    0.7
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: None,
            api_key: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Per-call timeouts, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// One mutation or probe generation call
    #[serde(default = "default_generation_secs")]
    pub generation_secs: u64,

    /// One test case execution
    #[serde(default = "default_case_secs")]
    pub case_secs: u64,

    /// A whole validation target (every case)
    #[serde(default = "default_validation_target_secs")]
    pub validation_target_secs: u64,
}

const fn default_generation_secs() -> u64 {
    60
}

const fn default_case_secs() -> u64 {
    90
}

const fn default_validation_target_secs() -> u64 {
    600
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            generation_secs: default_generation_secs(),
            case_secs: default_case_secs(),
            validation_target_secs: default_validation_target_secs(),
        }
    }
}

impl TimeoutConfig {
    pub const fn generation(&self) -> Duration {
        Duration::from_secs(self.generation_secs)
    }

    pub const fn case(&self) -> Duration {
        Duration::from_secs(self.case_secs)
    }

    pub const fn validation_target(&self) -> Duration {
        Duration::from_secs(self.validation_target_secs)
    }
}

/// Adversarial probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AdversarialConfig {
    /// Cases requested per adversarial gate
    #[serde(default = "default_case_count")]
    pub case_count: usize,
}

const fn default_case_count() -> usize {
    3
}

impl Default for AdversarialConfig {
    fn default() -> Self {
        Self {
            case_count: default_case_count(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".evoprompt/runs.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (stderr only when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// File rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
