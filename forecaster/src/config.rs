//! Configuration management for the Foresight forecasting service
//!
//! This module handles loading, parsing, and validating configuration
//! from TOML files and environment variables.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Default metrics-source endpoint polled by the ingestion loop
pub const DEFAULT_METRICS_URL: &str = "http://metrics-server:3000/api/metrics";

/// Main configuration structure for the forecasting service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecasterConfig {
    /// Metrics-source configuration
    pub source: SourceConfig,

    /// HTTP API server configuration
    pub server: ServerConfig,

    /// History buffer configuration
    pub history: HistoryConfig,

    /// Sequence model configuration
    pub model: ModelConfig,
}

/// Metrics-source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// URL of the metrics endpoint polled once per tick
    pub url: String,

    /// Seconds between ingestion ticks
    pub poll_interval_secs: u64,

    /// Per-request fetch timeout in seconds
    pub fetch_timeout_secs: u64,
}

/// HTTP API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the API server
    pub bind_address: String,

    /// API server port
    pub port: u16,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

/// History buffer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Shared capacity of the CPU, RAM, and process-feature buffers
    pub capacity: usize,
}

/// Sequence model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Input window length fed to the recurrent regressor
    pub sequence_length: usize,

    /// Maximum forecast horizon in steps
    pub prediction_horizon: usize,

    /// Recurrent hidden state width
    pub hidden_size: usize,

    /// Training epochs per retraining cycle
    pub epochs: usize,

    /// Minibatch size used during fitting
    pub batch_size: usize,

    /// Trailing fraction of pairs held out for validation
    pub validation_fraction: f64,

    /// SGD learning rate
    pub learning_rate: f64,

    /// Samples to accumulate between retraining triggers
    pub retrain_every: usize,
}

impl Default for ForecasterConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            server: ServerConfig::default(),
            history: HistoryConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_METRICS_URL.to_string(),
            poll_interval_secs: 1,
            fetch_timeout_secs: 2,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5000,
            request_timeout_secs: 30,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        // 5 minutes of history at 1 Hz
        Self { capacity: 300 }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            sequence_length: 30,
            prediction_horizon: 120,
            hidden_size: 16,
            epochs: 5,
            batch_size: 8,
            validation_fraction: 0.2,
            learning_rate: 0.05,
            retrain_every: 60,
        }
    }
}

impl ModelConfig {
    /// Minimum history length before a training cycle is attempted
    pub fn train_threshold(&self) -> usize {
        self.sequence_length + 20
    }

    /// Minimum history length required to build any training pairs
    pub fn pair_threshold(&self) -> usize {
        self.sequence_length + 10
    }
}

impl ForecasterConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.to_string_lossy().to_string() })?;

        let config: ForecasterConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError { reason: e.to_string() })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to this configuration
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        if let Ok(url) = std::env::var("FORESIGHT_METRICS_URL") {
            self.source.url = url;
        }

        if let Ok(port) = std::env::var("FORESIGHT_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                field: "FORESIGHT_PORT".to_string(),
                value: port,
            })?;
        }

        if let Ok(capacity) = std::env::var("FORESIGHT_HISTORY_CAPACITY") {
            self.history.capacity = capacity.parse().map_err(|_| ConfigError::InvalidValue {
                field: "FORESIGHT_HISTORY_CAPACITY".to_string(),
                value: capacity,
            })?;
        }

        Ok(())
    }

    /// Load configuration with fallback order: file -> env -> defaults
    pub fn load_with_fallback<P: AsRef<Path>>(config_path: Option<P>) -> ConfigResult<Self> {
        let mut config = match config_path {
            Some(path) if path.as_ref().exists() => ForecasterConfig::from_file(path)?,
            _ => ForecasterConfig::default(),
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.source.url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "source.url".to_string(),
                value: String::new(),
            });
        }

        if self.source.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "source.poll_interval_secs".to_string(),
                value: "0".to_string(),
            });
        }

        if self.history.capacity < self.model.train_threshold() {
            return Err(ConfigError::ValidationFailed {
                reason: format!(
                    "history.capacity {} is below the training threshold {}",
                    self.history.capacity,
                    self.model.train_threshold()
                ),
            });
        }

        if self.model.sequence_length == 0 {
            return Err(ConfigError::InvalidValue {
                field: "model.sequence_length".to_string(),
                value: "0".to_string(),
            });
        }

        if self.model.hidden_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "model.hidden_size".to_string(),
                value: "0".to_string(),
            });
        }

        if self.model.epochs == 0 || self.model.batch_size == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "model.epochs and model.batch_size must be positive".to_string(),
            });
        }

        if !(0.0..1.0).contains(&self.model.validation_fraction) {
            return Err(ConfigError::InvalidValue {
                field: "model.validation_fraction".to_string(),
                value: self.model.validation_fraction.to_string(),
            });
        }

        if self.model.learning_rate <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "model.learning_rate".to_string(),
                value: self.model.learning_rate.to_string(),
            });
        }

        if self.model.retrain_every == 0 {
            return Err(ConfigError::InvalidValue {
                field: "model.retrain_every".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("foresight").join("forecaster.toml"))
            .ok_or_else(|| ConfigError::ValidationFailed {
                reason: "Unable to determine config directory".to_string(),
            })
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|_| ConfigError::ValidationFailed {
                reason: format!("Unable to create config directory: {}", parent.display()),
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ValidationFailed { reason: e.to_string() })?;

        fs::write(path, content)
            .map_err(|_| ConfigError::ValidationFailed { reason: path.to_string_lossy().to_string() })?;

        Ok(())
    }
}
