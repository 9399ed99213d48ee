//! Layered configuration for the `linehaul` binary
//!
//! Settings come from an optional `linehaul.toml` file with `LINEHAUL__*`
//! environment variables layered on top (double underscore separates
//! sections, e.g. `LINEHAUL__DATABASE__URL`). A `.env` file is honored for
//! local development. Every section has working defaults so a bare
//! `linehaul check` needs no configuration at all.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use linehaul_common::logging::LogConfig;
use linehaul_common::{RetryConfig, RetryPolicy};
use linehaul_ingest::decode::RecoveryMode;
use linehaul_ingest::storage::{DatabaseConfig, DEFAULT_BATCH_SIZE};

/// Ingestion behavior defaults, overridable per-run from the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Recovery mode applied when the CLI does not override it.
    pub mode: RecoveryMode,
    /// Skipped-line budget; 0 tolerates any number of bad lines.
    pub error_budget: u32,
    /// Rows per insert transaction.
    pub batch_size: usize,
    /// Use the strict streaming path instead of decode-then-load.
    pub streaming: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            mode: RecoveryMode::Skip,
            error_budget: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            streaming: false,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub ingest: IngestConfig,
    pub retry: RetryConfig,
    pub logging: LogConfig,
}

impl Config {
    /// Load configuration from file + environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        builder = match path {
            Some(path) => builder.add_source(config::File::from(path)),
            None => builder.add_source(config::File::with_name("linehaul").required(false)),
        };

        let settings = builder
            .add_source(config::Environment::with_prefix("LINEHAUL").separator("__"))
            .build()
            .context("Failed to load configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Invalid configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }
        if self.ingest.batch_size == 0 {
            anyhow::bail!("Ingest batch_size must be greater than 0");
        }

        let policy: RetryPolicy = self.retry.clone().into();
        policy.validate()?;

        Ok(())
    }

    /// The in-memory retry policy for this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone().into()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ingest.mode, RecoveryMode::Skip);
        assert_eq!(config.ingest.error_budget, 0);
        assert_eq!(config.ingest.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let mut config = Config::default();
        config.ingest.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_retry_multiplier_is_rejected() {
        let mut config = Config::default();
        config.retry.multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linehaul.toml");
        std::fs::write(
            &path,
            r#"
[database]
url = "postgresql://db.internal/warehouse"

[ingest]
mode = "fail_fast"
error_budget = 25

[retry]
max_retries = 5
initial_delay_ms = 50
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.database.url, "postgresql://db.internal/warehouse");
        assert_eq!(config.ingest.mode, RecoveryMode::FailFast);
        assert_eq!(config.ingest.error_budget, 25);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial_delay_ms, 50);
        // Unspecified sections keep their defaults.
        assert_eq!(config.ingest.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_retry_policy_conversion() {
        let mut config = Config::default();
        config.retry.max_retries = 9;
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 9);
    }
}
