use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;
use tracing::level_filters::LevelFilter;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub matching: MatchingConfig,
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Extra attempts after an empty first attempt.
    pub retry_budget: usize,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Drop records whose fields all came back empty.
    pub skip_empty_records: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: Option<String>,
}

const MAX_RETRY_BUDGET: usize = 20;

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            retry_budget: 3,
            retry_delay_ms: 500,
        }
    }
}

impl MatchingConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default").required(false))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "REFINDER_"
            .add_source(Environment::with_prefix("REFINDER").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load a single explicit file, still letting the environment override it.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix("REFINDER").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate matching configuration
        if self.matching.retry_delay_ms == 0 {
            return Err(ConfigError::Message("Matching retry_delay_ms must be greater than 0".into()));
        }

        if self.matching.retry_budget > MAX_RETRY_BUDGET {
            return Err(ConfigError::Message(format!(
                "Matching retry_budget cannot exceed {}",
                MAX_RETRY_BUDGET
            )));
        }

        // Validate logging configuration
        if self.logging.level.parse::<LevelFilter>().is_err() {
            return Err(ConfigError::Message(format!(
                "Invalid logging level '{}'",
                self.logging.level
            )));
        }

        if let Some(dir) = &self.logging.directory {
            if dir.trim().is_empty() {
                return Err(ConfigError::Message("Logging directory cannot be blank".into()));
            }
        }

        Ok(())
    }
}
