//! Error handling for the Foresight forecasting service
//!
//! This module provides the error types for all forecaster operations,
//! including configuration loading, metrics-source ingestion, and model
//! training and inference.

use std::io;

use thiserror::Error;

/// The main error type for the forecasting service
#[derive(Error, Debug)]
pub enum ForecastError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Metrics-source related errors
    #[error("Metrics source error: {0}")]
    Source(#[from] SourceError),

    /// Model training and inference errors
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Metrics registry errors
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic errors
    #[error("{0}")]
    Generic(String),
}

/// Configuration related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Configuration parsing error: {reason}")]
    ParseError { reason: String },

    #[error("Invalid configuration value: {field} = {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },
}

/// Metrics-source related errors
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Metrics source request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Metrics source returned status {status}")]
    Status { status: u16 },

    #[error("Metrics source payload could not be decoded: {reason}")]
    Decode { reason: String },
}

/// Model training and inference errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model not trained yet: {data_points}/{required} data points")]
    NotTrained { data_points: usize, required: usize },

    #[error("Not enough history to build training pairs: {data_points}/{required}")]
    InsufficientHistory { data_points: usize, required: usize },

    #[error("Cannot fit a scaler on an empty window")]
    EmptyWindow,

    #[error("Input window length {got} does not match the model window length {expected}")]
    WindowLength { got: usize, expected: usize },

    #[error("Training produced a non-finite loss")]
    Diverged,
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ForecastError>;

/// A specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// A specialized result type for metrics-source operations
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// A specialized result type for model operations
pub type ModelResult<T> = std::result::Result<T, ModelError>;

impl ForecastError {
    /// Check if this error is recoverable by the ingestion loop
    pub fn is_recoverable(&self) -> bool {
        match self {
            ForecastError::Source(_) => true,
            ForecastError::Model(ModelError::Diverged) => true,
            ForecastError::Model(ModelError::NotTrained { .. }) => true,
            ForecastError::Model(ModelError::InsufficientHistory { .. }) => true,
            ForecastError::Config(_) => false,
            ForecastError::Io(io_error) => {
                matches!(io_error.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock)
            }
            _ => true,
        }
    }

    /// Get the error category for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            ForecastError::Config(_) => "config",
            ForecastError::Source(_) => "source",
            ForecastError::Model(_) => "model",
            ForecastError::Metrics(_) => "metrics",
            ForecastError::Io(_) => "io",
            ForecastError::Serialization(_) => "serialization",
            ForecastError::Generic(_) => "generic",
        }
    }
}

impl From<String> for ForecastError {
    fn from(msg: String) -> Self {
        ForecastError::Generic(msg)
    }
}

impl From<&str> for ForecastError {
    fn from(msg: &str) -> Self {
        ForecastError::Generic(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categorization() {
        let model_error = ForecastError::Model(ModelError::NotTrained {
            data_points: 10,
            required: 50,
        });
        assert_eq!(model_error.category(), "model");
        assert!(model_error.is_recoverable());

        let config_error = ForecastError::Config(ConfigError::ValidationFailed {
            reason: "bad".to_string(),
        });
        assert_eq!(config_error.category(), "config");
        assert!(!config_error.is_recoverable());
    }

    #[test]
    fn test_error_conversion() {
        let packed = ForecastError::from("boom".to_string());
        assert!(matches!(packed, ForecastError::Generic(_)));

        let packed = ForecastError::from("boom");
        assert!(matches!(packed, ForecastError::Generic(_)));
    }

    #[test]
    fn test_not_trained_display() {
        let err = ModelError::NotTrained { data_points: 12, required: 50 };
        assert_eq!(err.to_string(), "Model not trained yet: 12/50 data points");
    }
}
