//! Online forecasting engine
//!
//! Owns the rolling history buffers, the two sequence models, and the trained
//! flag behind a single mutex. The lock is held for the duration of each
//! append, each full training cycle, and each prediction call so that
//! training and inference always see a consistent multi-sample window. The
//! coarse grain is intentional: a training cycle is capped to a handful of
//! epochs on a bounded window, so the stall it imposes on ingestion and
//! prediction is short.

use tokio::sync::Mutex;

use crate::config::{ForecasterConfig, ModelConfig};
use crate::error::{ModelError, ModelResult};
use crate::features::{ProcessFeatures, ProcessUsage};
use crate::history::{HistorySnapshot, HistoryStore, Sample};
use crate::model::{FitReport, SequenceModel};
use crate::scaler::MinMaxScaler;

/// Outcome of one training request
#[derive(Debug)]
pub enum TrainOutcome {
    /// Both models completed a fit cycle
    Trained { cpu: FitReport, ram: FitReport },

    /// Not enough history yet; models untouched
    InsufficientData { data_points: usize, required: usize },
}

/// Multi-step forecast over both metrics
#[derive(Debug, Clone)]
pub struct Forecast {
    pub cpu: Vec<f64>,
    pub ram: Vec<f64>,

    /// Relative step offsets `0..n`, not wall-clock times
    pub timestamps: Vec<usize>,
}

/// Point-in-time engine status served by `/health` and `/metrics`
#[derive(Debug, Clone, Copy)]
pub struct EngineStatus {
    pub is_trained: bool,
    pub data_points: usize,
}

struct EngineState {
    history: HistoryStore,
    cpu_model: SequenceModel,
    ram_model: SequenceModel,
    trained: bool,
}

/// The shared forecasting engine.
///
/// Constructed once at startup and handed to the ingestion loop and the API
/// handlers by `Arc`; lives for the process lifetime.
pub struct ForecastEngine {
    model_config: ModelConfig,
    state: Mutex<EngineState>,
}

impl ForecastEngine {
    pub fn new(config: &ForecasterConfig) -> Self {
        Self {
            model_config: config.model.clone(),
            state: Mutex::new(EngineState {
                history: HistoryStore::new(config.history.capacity),
                cpu_model: SequenceModel::new(config.model.clone()),
                ram_model: SequenceModel::new(config.model.clone()),
                trained: false,
            }),
        }
    }

    /// History length required before prediction or training is possible
    pub fn required_data_points(&self) -> usize {
        self.model_config.train_threshold()
    }

    /// Append one observation; returns the new history length.
    pub async fn record_observation(
        &self,
        cpu_percent: f64,
        ram_percent: f64,
        processes: &[ProcessUsage],
    ) -> usize {
        let mut state = self.state.lock().await;
        state.history.push(Sample {
            cpu_percent,
            ram_percent,
            processes: ProcessFeatures::extract(processes),
        });
        state.history.len()
    }

    /// Run one training cycle over the current history.
    ///
    /// Holds the engine lock across the snapshot read, both fits, and the
    /// trained-flag update. A fit error leaves the flag at its prior value.
    pub async fn train(&self) -> ModelResult<TrainOutcome> {
        let mut state = self.state.lock().await;
        let data_points = state.history.len();

        let required = self.model_config.train_threshold();
        if data_points < required {
            return Ok(TrainOutcome::InsufficientData { data_points, required });
        }

        let pair_floor = self.model_config.pair_threshold();
        if data_points < pair_floor {
            return Ok(TrainOutcome::InsufficientData { data_points, required: pair_floor });
        }

        let snapshot = state.history.snapshot();
        let sequence_length = self.model_config.sequence_length;

        let (cpu_windows, cpu_targets) = build_training_pairs(&snapshot.cpu, sequence_length)?;
        let (ram_windows, ram_targets) = build_training_pairs(&snapshot.ram, sequence_length)?;

        let cpu_report = state.cpu_model.fit(&cpu_windows, &cpu_targets)?;
        let ram_report = state.ram_model.fit(&ram_windows, &ram_targets)?;

        state.trained = true;
        Ok(TrainOutcome::Trained { cpu: cpu_report, ram: ram_report })
    }

    /// Produce an iterative multi-step forecast for both metrics.
    ///
    /// Each step feeds the model's own previous output back into the window,
    /// so error compounds across the horizon; that is an accepted
    /// approximation of the autoregressive design, not a defect.
    pub async fn predict(&self, steps: usize) -> ModelResult<Forecast> {
        let state = self.state.lock().await;
        let data_points = state.history.len();
        let sequence_length = self.model_config.sequence_length;

        if !state.trained || data_points < sequence_length {
            return Err(ModelError::NotTrained {
                data_points,
                required: self.model_config.train_threshold(),
            });
        }

        let cpu_recent = state.history.cpu_tail(sequence_length);
        let ram_recent = state.history.ram_tail(sequence_length);

        // Per-call scalers fit on the same last-L slice that seeds the
        // windows; normalization state is never persisted across calls.
        let (cpu_scaler, mut cpu_window) = MinMaxScaler::fit_transform(&cpu_recent)?;
        let (ram_scaler, mut ram_window) = MinMaxScaler::fit_transform(&ram_recent)?;

        let horizon = steps.min(self.model_config.prediction_horizon);
        let mut cpu_out = Vec::with_capacity(horizon);
        let mut ram_out = Vec::with_capacity(horizon);

        for _ in 0..horizon {
            let cpu_pred = state.cpu_model.predict_one(&cpu_window)?;
            cpu_out.push(cpu_pred);
            cpu_window.remove(0);
            cpu_window.push(cpu_pred);

            let ram_pred = state.ram_model.predict_one(&ram_window)?;
            ram_out.push(ram_pred);
            ram_window.remove(0);
            ram_window.push(ram_pred);
        }

        let cpu = clamp_percentages(cpu_scaler.inverse_transform(&cpu_out));
        let ram = clamp_percentages(ram_scaler.inverse_transform(&ram_out));
        let timestamps = (0..cpu.len()).collect();

        Ok(Forecast { cpu, ram, timestamps })
    }

    /// Current trained flag and history length
    pub async fn status(&self) -> EngineStatus {
        let state = self.state.lock().await;
        EngineStatus {
            is_trained: state.trained,
            data_points: state.history.len(),
        }
    }

    /// Most recent raw CPU/RAM sample, if any
    pub async fn latest(&self) -> Option<(f64, f64)> {
        self.state.lock().await.history.latest()
    }

    /// Owned copy of the full current buffers, oldest first
    pub async fn history(&self) -> HistorySnapshot {
        self.state.lock().await.history.snapshot()
    }
}

/// Slide a window of `sequence_length` over the normalized series, producing
/// `len - sequence_length - 1` supervised pairs.
fn build_training_pairs(
    series: &[f64],
    sequence_length: usize,
) -> ModelResult<(Vec<Vec<f64>>, Vec<f64>)> {
    let required = sequence_length + 10;
    if series.len() < required {
        return Err(ModelError::InsufficientHistory {
            data_points: series.len(),
            required,
        });
    }

    let (_, scaled) = MinMaxScaler::fit_transform(series)?;

    let pair_count = scaled.len() - sequence_length - 1;
    let mut windows = Vec::with_capacity(pair_count);
    let mut targets = Vec::with_capacity(pair_count);
    for i in 0..pair_count {
        windows.push(scaled[i..i + sequence_length].to_vec());
        targets.push(scaled[i + sequence_length]);
    }

    Ok((windows, targets))
}

fn clamp_percentages(values: Vec<f64>) -> Vec<f64> {
    values.into_iter().map(|v| v.clamp(0.0, 100.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_engine() -> ForecastEngine {
        let mut config = ForecasterConfig::default();
        config.model.sequence_length = 10;
        config.model.hidden_size = 8;
        config.history.capacity = 100;
        ForecastEngine::new(&config)
    }

    async fn feed(engine: &ForecastEngine, count: usize) {
        for i in 0..count {
            let phase = (i as f64 * 0.3).sin();
            engine
                .record_observation(40.0 + 20.0 * phase, 55.0 + 10.0 * phase, &[])
                .await;
        }
    }

    #[tokio::test]
    async fn test_train_gating_below_threshold() {
        let engine = test_engine();
        feed(&engine, 29).await;

        match engine.train().await.unwrap() {
            TrainOutcome::InsufficientData { data_points, required } => {
                assert_eq!(data_points, 29);
                assert_eq!(required, 30);
            }
            other => panic!("expected InsufficientData, got {other:?}"),
        }
        assert!(!engine.status().await.is_trained);
    }

    #[tokio::test]
    async fn test_train_at_threshold_fits_both_models() {
        let engine = test_engine();
        feed(&engine, 30).await;

        match engine.train().await.unwrap() {
            TrainOutcome::Trained { cpu, ram } => {
                assert!(cpu.train_loss.is_finite());
                assert!(ram.train_loss.is_finite());
            }
            other => panic!("expected Trained, got {other:?}"),
        }
        assert!(engine.status().await.is_trained);
    }

    #[tokio::test]
    async fn test_predict_before_training_is_structured_error() {
        let engine = test_engine();
        feed(&engine, 40).await;

        let err = engine.predict(60).await.unwrap_err();
        assert!(matches!(err, ModelError::NotTrained { data_points: 40, required: 30 }));
    }

    #[tokio::test]
    async fn test_predict_output_bounds_and_length() {
        let engine = test_engine();
        feed(&engine, 60).await;
        engine.train().await.unwrap();

        let forecast = engine.predict(45).await.unwrap();
        assert_eq!(forecast.cpu.len(), 45);
        assert_eq!(forecast.ram.len(), 45);
        assert_eq!(forecast.timestamps, (0..45).collect::<Vec<_>>());

        for v in forecast.cpu.iter().chain(forecast.ram.iter()) {
            assert!((0.0..=100.0).contains(v), "value out of range: {v}");
        }
    }

    #[tokio::test]
    async fn test_predict_horizon_is_capped() {
        let engine = test_engine();
        feed(&engine, 60).await;
        engine.train().await.unwrap();

        let forecast = engine.predict(500).await.unwrap();
        assert_eq!(forecast.cpu.len(), 120);
    }

    #[test]
    fn test_build_training_pairs_count() {
        let series: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let (windows, targets) = build_training_pairs(&series, 10).unwrap();
        assert_eq!(windows.len(), 39);
        assert_eq!(targets.len(), 39);
        assert_eq!(windows[0].len(), 10);
    }

    #[test]
    fn test_build_training_pairs_floor() {
        let series: Vec<f64> = (0..15).map(|i| i as f64).collect();
        let err = build_training_pairs(&series, 10).unwrap_err();
        assert!(matches!(err, ModelError::InsufficientHistory { data_points: 15, required: 20 }));
    }
}
