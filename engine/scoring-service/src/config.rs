//! Service configuration management

use anyhow::{Context, Result};
use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use scoring_engine::ScoringConfig;

/// Main service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Scoring engine configuration
    pub scoring: ScoringConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "compact".to_string() }
    }
}

/// Load configuration from an optional TOML file and environment variables
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    let mut config = match path {
        Some(path) => {
            tracing::debug!("Loading configuration from file: {:?}", path);
            load_from_file(path)?
        }
        None => ServiceConfig::default(),
    };

    // Override with environment variables
    load_from_env(&mut config)?;

    // Validate configuration
    validate_config(&config)?;

    Ok(config)
}

/// Load configuration from a TOML file. Missing keys keep their defaults.
pub fn load_from_file(path: &Path) -> Result<ServiceConfig> {
    let settings = Config::builder()
        .add_source(File::from(path).format(FileFormat::Toml))
        .build()
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    settings
        .try_deserialize::<ServiceConfig>()
        .with_context(|| format!("Failed to parse config file: {:?}", path))
}

/// Load configuration from environment variables
fn load_from_env(config: &mut ServiceConfig) -> Result<()> {
    if let Ok(level) = std::env::var("SCORING_LOG_LEVEL") {
        config.logging.level = level;
    }

    if let Ok(format) = std::env::var("SCORING_LOG_FORMAT") {
        config.logging.format = format;
    }

    config.scoring.apply_env().context("Invalid scoring environment override")?;

    Ok(())
}

/// Validate configuration
pub fn validate_config(config: &ServiceConfig) -> Result<()> {
    // Validate log level
    match config.logging.level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow::anyhow!("Invalid log level: {}", config.logging.level)),
    }

    // Validate log format
    match config.logging.format.as_str() {
        "json" | "pretty" | "compact" => {}
        _ => return Err(anyhow::anyhow!("Invalid log format: {}", config.logging.format)),
    }

    config.scoring.validate().context("Invalid scoring configuration")?;

    Ok(())
}

/// Save configuration to a TOML file
pub fn save_config(config: &ServiceConfig, path: &Path) -> Result<()> {
    let contents = toml::to_string_pretty(config).context("Failed to serialize configuration")?;
    std::fs::write(path, contents).with_context(|| format!("Failed to write config file: {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn toml_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = toml_file(
            r#"
[logging]
level = "debug"

[scoring.progression]
points_per_level = 500

[scoring.rules]
per_catch = 10
"#,
        );

        let config = load_from_file(file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "compact");
        assert_eq!(config.scoring.progression.points_per_level, 500);
        assert_eq!(config.scoring.rules.per_catch, 10);
        assert_eq!(config.scoring.rules.per_stumping, 12);
        assert_eq!(config.scoring.multipliers.captain, Decimal::from(2));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scoring.toml");

        let mut config = ServiceConfig::default();
        config.logging.format = "json".to_string();
        config.scoring.multipliers.vice_captain = Decimal::new(175, 2);
        config.scoring.rules.duck_penalty = -5;

        save_config(&config, &path).unwrap();
        assert_eq!(load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_from_file(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        let mut config = ServiceConfig::default();
        config.logging.format = "xml".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_rejects_invalid_scoring_values() {
        let mut config = ServiceConfig::default();
        config.scoring.progression.points_per_level = 0;
        assert!(validate_config(&config).is_err());
    }
}
