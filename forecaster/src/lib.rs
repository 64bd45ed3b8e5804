//! Foresight forecasting service library
//!
//! This library provides the core functionality for the Foresight
//! forecasting service: rolling utilization history, per-metric sequence
//! models with a bounded retraining lifecycle, an iterative multi-step
//! forecaster, the background ingestion loop, and the HTTP API over them.

pub mod api;
pub mod collector;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod history;
pub mod model;
pub mod scaler;
pub mod service;

// Re-export commonly used types
pub use config::ForecasterConfig;
pub use engine::{Forecast, ForecastEngine, TrainOutcome};
pub use error::{ForecastError, Result};
pub use features::{ProcessFeatures, ProcessUsage};
pub use history::{HistoryStore, Sample};
pub use model::SequenceModel;
pub use scaler::MinMaxScaler;
pub use service::ForecasterService;
