use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_base_uri")]
    pub base_uri: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Settle with an error after this many back-to-back failed status
    /// queries. Unset means keep polling forever.
    #[serde(default)]
    pub max_consecutive_query_failures: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkspaceConfig {
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_uri: default_base_uri(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_consecutive_query_failures: None,
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
        }
    }
}

fn default_base_uri() -> String {
    "http://localhost:8000/api/workflows/v1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_interval_ms() -> u64 {
    5000
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(".wdl-runner")
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("wdl-runner").required(false));
        }

        // Environment variable overrides with WDL_RUNNER_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("WDL_RUNNER")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.base_uri.trim().is_empty() {
            return Err(AppError::Config("engine.base_uri must not be empty".to_string()));
        }
        if self.polling.interval_ms == 0 {
            return Err(AppError::Config(
                "polling.interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.polling.max_consecutive_query_failures == Some(0) {
            return Err(AppError::Config(
                "polling.max_consecutive_query_failures must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

impl EngineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}
