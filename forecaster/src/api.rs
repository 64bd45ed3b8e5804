//! HTTP API over the forecasting engine
//!
//! Stateless axum handlers for health, prediction, raw history, and
//! Prometheus-style metrics, sharing the engine by `Arc`.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use prometheus::{Encoder, IntGauge, Registry, TextEncoder};
use serde::Deserialize;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::engine::{EngineStatus, ForecastEngine};
use crate::error::{ModelError, Result};

/// Smallest accepted forecast horizon
const MIN_STEPS: i64 = 30;

/// Largest accepted forecast horizon
const MAX_STEPS: i64 = 120;

/// Default horizon when the query omits `steps`
const DEFAULT_STEPS: i64 = 60;

/// Prometheus gauges exposed at `/metrics`
pub struct ApiMetrics {
    registry: Registry,
    model_trained: IntGauge,
    data_points: IntGauge,
}

impl ApiMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let model_trained = IntGauge::new("ml_model_trained", "Model training status")?;
        registry.register(Box::new(model_trained.clone()))?;

        let data_points = IntGauge::new("ml_data_points", "Number of data points collected")?;
        registry.register(Box::new(data_points.clone()))?;

        Ok(Self { registry, model_trained, data_points })
    }

    /// Refresh the gauges from the engine status and encode the registry in
    /// text exposition format.
    fn render(&self, status: EngineStatus) -> Result<String> {
        self.model_trained.set(i64::from(status.is_trained));
        self.data_points.set(status.data_points as i64);

        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ForecastEngine>,
    pub metrics: Arc<ApiMetrics>,
}

/// Build the API router with its middleware stack.
pub fn router(
    engine: Arc<ForecastEngine>,
    metrics: Arc<ApiMetrics>,
    request_timeout: Duration,
) -> Router {
    let state = AppState { engine, metrics };

    Router::new()
        .route("/health", get(health))
        .route("/predict", get(predict))
        .route("/history", get(history))
        .route("/metrics", get(metrics_text))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Response {
    let status = state.engine.status().await;
    Json(json!({
        "status": "healthy",
        "is_trained": status.is_trained,
        "data_points": status.data_points,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct PredictParams {
    pub steps: Option<i64>,
}

/// `GET /predict?steps=N`
///
/// `steps` is clamped server-side to the accepted horizon range. An
/// untrained engine yields 503 with the data-point counts; any other
/// prediction failure yields a generic 500 with no internal detail.
pub async fn predict(
    State(state): State<AppState>,
    Query(params): Query<PredictParams>,
) -> Response {
    let steps = params.steps.unwrap_or(DEFAULT_STEPS).clamp(MIN_STEPS, MAX_STEPS) as usize;

    match state.engine.predict(steps).await {
        Ok(forecast) => {
            let (current_cpu, current_ram) = state.engine.latest().await.unwrap_or((0.0, 0.0));
            Json(json!({
                "predictions": {
                    "cpu": forecast.cpu,
                    "ram": forecast.ram,
                    "timestamps": forecast.timestamps,
                },
                "horizon_seconds": steps,
                "current_cpu": current_cpu,
                "current_ram": current_ram,
            }))
            .into_response()
        }
        Err(ModelError::NotTrained { data_points, required }) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": "Model not trained yet",
                "data_points": data_points,
                "required": required,
            })),
        )
            .into_response(),
        Err(e) => {
            error!("Prediction failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Prediction failed" })),
            )
                .into_response()
        }
    }
}

/// `GET /history` — full current buffer contents, most-recent last
pub async fn history(State(state): State<AppState>) -> Response {
    let snapshot = state.engine.history().await;
    let length = snapshot.cpu.len();
    Json(json!({
        "cpu": snapshot.cpu,
        "ram": snapshot.ram,
        "length": length,
    }))
    .into_response()
}

/// `GET /metrics` — Prometheus text exposition
pub async fn metrics_text(State(state): State<AppState>) -> Response {
    let status = state.engine.status().await;
    match state.metrics.render(status) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Metrics encoding failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
