//! Layered configuration.
//!
//! Priority, highest first:
//! 1. Explicit overrides (command-line flags)
//! 2. Environment variables (`ETLFLOW_` prefix, `__` nesting, e.g.
//!    `ETLFLOW_RETRY__MAX_ATTEMPTS`)
//! 3. A TOML file
//! 4. Built-in defaults

use crate::errors::ConfigError;
use crate::load::{LoadMode, DEFAULT_BATCH_SIZE};
use crate::pipeline::RetryConfig;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "ETLFLOW_";

/// Batch loading settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Records per batch.
    pub batch_size: usize,
    /// Append or replace existing rows.
    pub mode: LoadMode,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            mode: LoadMode::Append,
        }
    }
}

impl LoadConfig {
    /// The batch size as a non-zero count.
    pub fn batch_size(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.batch_size)
            .ok_or_else(|| ConfigError::invalid("load", "batch_size must be > 0"))
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for the debug and error log files.
    pub dir: PathBuf,
    /// Default level filter, overridden by `RUST_LOG`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            level: "info".to_string(),
        }
    }
}

/// API extraction settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

impl HttpConfig {
    /// Gets timeout as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    /// Retry policy for batch inserts and truncation.
    pub retry: RetryConfig,
    /// Retry policy for extraction.
    pub extract_retry: RetryConfig,
    /// Batch loading.
    pub load: LoadConfig,
    /// Log output.
    pub logging: LoggingConfig,
    /// API extraction.
    pub http: HttpConfig,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            extract_retry: RetryConfig::default().with_base_delay(Duration::from_secs(2)),
            load: LoadConfig::default(),
            logging: LoggingConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl EtlConfig {
    /// Checks every value is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate("retry")?;
        self.extract_retry.validate("extract_retry")?;
        self.load.batch_size()?;
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::invalid("http", "timeout_secs must be > 0"));
        }
        Ok(())
    }
}

/// Values set on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// `load.batch_size`.
    pub batch_size: Option<usize>,
    /// `load.mode`.
    pub mode: Option<LoadMode>,
    /// `max_attempts` of both retry policies.
    pub max_attempts: Option<u32>,
    /// `logging.level`.
    pub log_level: Option<String>,
}

impl ConfigOverrides {
    fn apply(&self, mut figment: Figment) -> Figment {
        if let Some(size) = self.batch_size {
            figment = figment.merge(Serialized::default("load.batch_size", size));
        }
        if let Some(mode) = self.mode {
            figment = figment.merge(Serialized::default("load.mode", mode));
        }
        if let Some(attempts) = self.max_attempts {
            figment = figment
                .merge(Serialized::default("retry.max_attempts", attempts))
                .merge(Serialized::default("extract_retry.max_attempts", attempts));
        }
        if let Some(level) = &self.log_level {
            figment = figment.merge(Serialized::default("logging.level", level));
        }
        figment
    }
}

/// Builds the figment without extracting it.
pub fn figment(file: Option<&Path>, overrides: &ConfigOverrides) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(EtlConfig::default()));
    if let Some(path) = file {
        figment = figment.merge(Toml::file(path));
    }
    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
    overrides.apply(figment)
}

/// Loads and validates configuration from layered sources.
///
/// An explicitly named file must exist.
pub fn load_config(
    file: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<EtlConfig, ConfigError> {
    if let Some(path) = file {
        if !path.exists() {
            return Err(ConfigError::invalid(
                "config",
                format!("file {} does not exist", path.display()),
            ));
        }
    }
    let config: EtlConfig = figment(file, overrides).extract().map_err(Box::new)?;
    config.validate()?;
    Ok(config)
}
