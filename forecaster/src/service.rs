//! Service lifecycle wiring
//!
//! Builds the engine, spawns the ingestion loop, serves the HTTP API, and
//! coordinates graceful shutdown: the process signal stops the server, then
//! the watch channel stops the collector, then the task is joined.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use crate::api::{self, ApiMetrics};
use crate::collector::MetricsCollector;
use crate::config::ForecasterConfig;
use crate::engine::ForecastEngine;
use crate::error::Result;

/// The assembled forecasting service
pub struct ForecasterService {
    config: ForecasterConfig,
}

impl ForecasterService {
    pub fn new(config: ForecasterConfig) -> Self {
        Self { config }
    }

    /// Run until a shutdown signal arrives.
    pub async fn run(self) -> Result<()> {
        info!("Starting Foresight forecasting service");

        let engine = Arc::new(ForecastEngine::new(&self.config));
        let metrics = Arc::new(ApiMetrics::new()?);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let collector = MetricsCollector::new(engine.clone(), &self.config)?;
        let collector_handle = tokio::spawn(collector.run(shutdown_rx));

        let bind_addr = format!(
            "{}:{}",
            self.config.server.bind_address, self.config.server.port
        );
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("API server listening on {bind_addr}");

        let app = api::router(
            engine,
            metrics,
            Duration::from_secs(self.config.server.request_timeout_secs),
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Initiating graceful shutdown");
        let _ = shutdown_tx.send(true);
        if let Err(e) = collector_handle.await {
            error!("Ingestion task terminated abnormally: {e}");
        }

        info!("Foresight forecasting service stopped");
        Ok(())
    }
}

/// Resolve when SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to listen for SIGTERM: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
