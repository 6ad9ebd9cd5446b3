//! Sync configuration.
//!
//! Values come from (lowest precedence first) built-in defaults, an optional
//! config file, and `CLINIC_SYNC__*` environment variables.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sync::{BackoffPolicy, ScheduleSettings};

pub const ENV_PREFIX: &str = "CLINIC_SYNC";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Registry base URL; record paths are appended to it
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub periodic_interval_secs: u64,
    pub backoff_base_secs: u64,
    pub backoff_max_secs: u64,
    pub one_shot_max_attempts: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api/".to_string(),
            request_timeout_secs: 30,
            periodic_interval_secs: 15 * 60,
            backoff_base_secs: 5 * 60,
            backoff_max_secs: 5 * 60 * 60,
            one_shot_max_attempts: 5,
        }
    }
}

impl SyncConfig {
    /// Load from an optional file (format from its extension) plus environment.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(false));
        }
        let cfg: SyncConfig = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a JSON document, filling missing fields with defaults.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let cfg: SyncConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("request_timeout_secs must be positive".into()));
        }
        if self.periodic_interval_secs == 0 {
            return Err(ConfigError::Invalid("periodic_interval_secs must be positive".into()));
        }
        if self.backoff_base_secs == 0 || self.backoff_max_secs < self.backoff_base_secs {
            return Err(ConfigError::Invalid(
                "backoff_base_secs must be positive and not exceed backoff_max_secs".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn schedule(&self) -> ScheduleSettings {
        ScheduleSettings {
            periodic_interval: Duration::from_secs(self.periodic_interval_secs),
            backoff: BackoffPolicy {
                base: Duration::from_secs(self.backoff_base_secs),
                max: Duration::from_secs(self.backoff_max_secs),
            },
            one_shot_max_attempts: self.one_shot_max_attempts,
        }
    }
}
