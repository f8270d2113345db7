use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::adapters::generation::registry::PROVIDERS;
use crate::domain::models::config::Config;

/// Project directory holding configuration and the run database.
pub const PROJECT_DIR: &str = ".evoprompt";

/// Environment variable prefix; nested keys are separated by `__`.
pub const ENV_PREFIX: &str = "EVOPROMPT_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Unknown generation provider: {0}. Must be one of: anthropic, openai, mock")]
    UnknownProvider(String),

    #[error("Invalid timeout for {0}: must be at least 1 second")]
    InvalidTimeout(&'static str),

    #[error("Invalid adversarial case_count: {0}. Must be between 1 and 20")]
    InvalidAdversarialCount(usize),

    #[error("Invalid optimization defaults: {0}")]
    InvalidOptimization(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the current directory.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .evoprompt/config.yaml (project config, created by init)
    /// 3. .evoprompt/local.yaml (local overrides, optional)
    /// 4. Environment variables (EVOPROMPT_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(Path::new("."))
    }

    /// Same as [`ConfigLoader::load`] with project files under `root`.
    pub fn load_from_dir(root: &Path) -> Result<Config> {
        let project = root.join(PROJECT_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(project.join("config.yaml")))
            .merge(Yaml::file(project.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file (no env overrides).
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Path of the project config file under `root`.
    pub fn project_config_path(root: &Path) -> PathBuf {
        root.join(PROJECT_DIR).join("config.yaml")
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(
                config.logging.rotation.clone(),
            ));
        }

        if !PROVIDERS.contains(&config.generation.provider.as_str()) {
            return Err(ConfigError::UnknownProvider(
                config.generation.provider.clone(),
            ));
        }

        if config.timeouts.generation_secs == 0 {
            return Err(ConfigError::InvalidTimeout("generation"));
        }
        if config.timeouts.case_secs == 0 {
            return Err(ConfigError::InvalidTimeout("case"));
        }
        if config.timeouts.validation_target_secs == 0 {
            return Err(ConfigError::InvalidTimeout("validation_target"));
        }

        if !(1..=20).contains(&config.adversarial.case_count) {
            return Err(ConfigError::InvalidAdversarialCount(
                config.adversarial.case_count,
            ));
        }

        config
            .optimization
            .validate()
            .map_err(|e| ConfigError::InvalidOptimization(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.path, ".evoprompt/runs.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.adversarial.case_count, 3);
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
generation:
  provider: openai
  base_url: http://localhost:11434
optimization:
  max_generations: 8
  candidates_per_generation: 4
  target_score: 0.9
  budget_limit: 2.5
  strategies: [persona, compression]
  validation_targets: ['anthropic:claude-haiku-4-5']
logging:
  level: debug
  format: json
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.generation.provider, "openai");
        assert_eq!(config.optimization.max_generations, 8);
        assert_eq!(config.optimization.budget_limit, Some(2.5));
        assert_eq!(config.optimization.strategies, vec!["persona", "compression"]);
        assert_eq!(config.optimization.model, "claude-sonnet-4-5");
        assert_eq!(config.timeouts.case_secs, 90);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = Config::default();
        config.generation.provider = "cohere".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.timeouts.case_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidTimeout("case"))
        ));
    }

    #[test]
    fn test_validate_optimization_ranges() {
        let mut config = Config::default();
        config.optimization.target_score = 1.2;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidOptimization(_))
        ));
    }

    #[test]
    fn test_hierarchical_merging() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join(PROJECT_DIR);
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(
            project.join("config.yaml"),
            "optimization:\n  max_generations: 4\n  candidates_per_generation: 2\nlogging:\n  format: json\n",
        )
        .unwrap();
        std::fs::write(
            project.join("local.yaml"),
            "optimization:\n  max_generations: 9\n",
        )
        .unwrap();

        let config = temp_env::with_vars_unset(
            ["EVOPROMPT_OPTIMIZATION__MAX_GENERATIONS", "EVOPROMPT_LOGGING__LEVEL"],
            || ConfigLoader::load_from_dir(dir.path()).unwrap(),
        );

        assert_eq!(config.optimization.max_generations, 9, "local.yaml wins");
        assert_eq!(config.optimization.candidates_per_generation, 2);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_env_override() {
        let dir = tempfile::tempdir().unwrap();

        let config = temp_env::with_vars(
            [
                ("EVOPROMPT_OPTIMIZATION__MAX_GENERATIONS", Some("12")),
                ("EVOPROMPT_LOGGING__LEVEL", Some("debug")),
                ("EVOPROMPT_GENERATION__PROVIDER", Some("mock")),
            ],
            || ConfigLoader::load_from_dir(dir.path()).unwrap(),
        );

        assert_eq!(config.optimization.max_generations, 12);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.generation.provider, "mock");
    }

    #[test]
    fn test_env_invalid_value_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = temp_env::with_var("EVOPROMPT_LOGGING__FORMAT", Some("xml"), || {
            ConfigLoader::load_from_dir(dir.path())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "adversarial:\n  case_count: 5").unwrap();
        file.flush().unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.adversarial.case_count, 5);
    }
}
