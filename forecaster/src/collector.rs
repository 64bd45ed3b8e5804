//! Background ingestion loop
//!
//! Polls the metrics source on a fixed-rate ticker, feeds each snapshot into
//! the forecasting engine, and kicks off a training cycle on its own task
//! every `retrain_every` accumulated samples. A failed fetch or decode is
//! logged and the loop moves on to the next tick; nothing short of shutdown
//! stops it.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{ForecasterConfig, SourceConfig};
use crate::engine::{ForecastEngine, TrainOutcome};
use crate::error::{Result, SourceError, SourceResult};
use crate::features::ProcessUsage;

/// Wire format of the metrics source.
///
/// Every section defaults when absent so a sparse payload still yields a
/// usable (zeroed) observation.
#[derive(Debug, Default, Deserialize)]
pub struct MetricsPayload {
    #[serde(default)]
    pub cpu: GaugeSection,

    #[serde(default)]
    pub memory: GaugeSection,

    #[serde(default)]
    pub processes: Vec<ProcessUsage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GaugeSection {
    #[serde(default)]
    pub percentage: f64,
}

/// The ingestion loop task
pub struct MetricsCollector {
    engine: Arc<ForecastEngine>,
    client: reqwest::Client,
    source: SourceConfig,
    retrain_every: usize,
}

impl MetricsCollector {
    pub fn new(engine: Arc<ForecastEngine>, config: &ForecasterConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.source.fetch_timeout_secs))
            .build()
            .map_err(SourceError::from)?;

        Ok(Self {
            engine,
            client,
            source: config.source.clone(),
            retrain_every: config.model.retrain_every,
        })
    }

    /// Run until the shutdown channel flips.
    ///
    /// The fixed-rate ticker keeps ingestion at one sample per interval
    /// without accumulating drift from the cycle body.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting ingestion loop against {}", self.source.url);

        let mut ticker = interval(Duration::from_secs(self.source.poll_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.collect_once().await {
                        warn!("Ingestion cycle failed: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    info!("Ingestion loop shutting down");
                    break;
                }
            }
        }
    }

    /// One ingestion cycle: fetch, record, maybe trigger retraining.
    async fn collect_once(&self) -> SourceResult<()> {
        let payload = self.fetch().await?;

        let data_points = self
            .engine
            .record_observation(
                payload.cpu.percentage,
                payload.memory.percentage,
                &payload.processes,
            )
            .await;

        if data_points % self.retrain_every == 0
            && data_points > self.engine.required_data_points()
        {
            self.spawn_training();
        }

        Ok(())
    }

    /// Kick off one training cycle without blocking the next tick.
    fn spawn_training(&self) {
        let engine = self.engine.clone();
        tokio::spawn(async move {
            match engine.train().await {
                Ok(TrainOutcome::Trained { cpu, ram }) => {
                    info!(
                        cpu_loss = cpu.train_loss,
                        ram_loss = ram.train_loss,
                        "Models retrained"
                    );
                }
                Ok(TrainOutcome::InsufficientData { data_points, required }) => {
                    debug!("Skipping training: {data_points}/{required} data points");
                }
                Err(e) => {
                    // Non-fatal: the trained flag keeps its prior value.
                    warn!("Training cycle failed: {e}");
                }
            }
        });
    }

    async fn fetch(&self) -> SourceResult<MetricsPayload> {
        let response = self.client.get(&self.source.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status { status: status.as_u16() });
        }

        response
            .json::<MetricsPayload>()
            .await
            .map_err(|e| SourceError::Decode { reason: e.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_full() {
        let payload: MetricsPayload = serde_json::from_str(
            r#"{
                "cpu": {"percentage": 42.5},
                "memory": {"percentage": 61.0},
                "processes": [{"cpu": 60.0, "memory": 5.0}, {"memory": 20.0}]
            }"#,
        )
        .unwrap();

        assert_eq!(payload.cpu.percentage, 42.5);
        assert_eq!(payload.memory.percentage, 61.0);
        assert_eq!(payload.processes.len(), 2);
        assert_eq!(payload.processes[1].cpu, None);
    }

    #[test]
    fn test_payload_missing_sections_default() {
        let payload: MetricsPayload = serde_json::from_str(r#"{"cpu": {"percentage": 10.0}}"#).unwrap();
        assert_eq!(payload.cpu.percentage, 10.0);
        assert_eq!(payload.memory.percentage, 0.0);
        assert!(payload.processes.is_empty());
    }

    #[test]
    fn test_payload_empty_object() {
        let payload: MetricsPayload = serde_json::from_str("{}").unwrap();
        assert_eq!(payload.cpu.percentage, 0.0);
        assert_eq!(payload.memory.percentage, 0.0);
    }
}
