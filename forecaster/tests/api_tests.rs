//! API integration tests driving the full router

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use foresight_forecaster::api::{self, ApiMetrics};
use foresight_forecaster::config::ForecasterConfig;
use foresight_forecaster::engine::ForecastEngine;

struct TestService {
    engine: Arc<ForecastEngine>,
    app: Router,
}

fn test_service() -> TestService {
    let engine = Arc::new(ForecastEngine::new(&ForecasterConfig::default()));
    let metrics = Arc::new(ApiMetrics::new().unwrap());
    let app = api::router(engine.clone(), metrics, Duration::from_secs(5));
    TestService { engine, app }
}

async fn feed(engine: &ForecastEngine, count: usize) {
    for i in 0..count {
        let phase = (i as f64 * 0.25).sin();
        engine
            .record_observation(45.0 + 20.0 * phase, 62.0 + 8.0 * phase, &[])
            .await;
    }
}

async fn get(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_reports_training_state_and_count() {
    let service = test_service();
    feed(&service.engine, 12).await;

    let (status, body) = get(&service.app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["is_trained"], false);
    assert_eq!(body["data_points"], 12);
}

#[tokio::test]
async fn predict_on_untrained_service_returns_503() {
    let service = test_service();
    feed(&service.engine, 20).await;

    let (status, body) = get(&service.app, "/predict?steps=5").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Model not trained yet");
    assert_eq!(body["data_points"], 20);
    assert_eq!(body["required"], 50);
}

#[tokio::test]
async fn predict_clamps_oversized_horizons() {
    let service = test_service();
    feed(&service.engine, 80).await;
    service.engine.train().await.unwrap();

    let (status, body) = get(&service.app, "/predict?steps=500").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["horizon_seconds"], 120);

    let cpu = body["predictions"]["cpu"].as_array().unwrap();
    let ram = body["predictions"]["ram"].as_array().unwrap();
    assert_eq!(cpu.len(), 120);
    assert_eq!(ram.len(), 120);

    for v in cpu.iter().chain(ram.iter()) {
        let v = v.as_f64().unwrap();
        assert!((0.0..=100.0).contains(&v), "value out of range: {v}");
    }
}

#[tokio::test]
async fn predict_defaults_to_sixty_steps_and_reports_current_values() {
    let service = test_service();
    feed(&service.engine, 80).await;
    service.engine.train().await.unwrap();

    let (status, body) = get(&service.app, "/predict").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["horizon_seconds"], 60);
    assert_eq!(body["predictions"]["timestamps"].as_array().unwrap().len(), 60);

    let (current_cpu, current_ram) = service.engine.latest().await.unwrap();
    assert_eq!(body["current_cpu"].as_f64().unwrap(), current_cpu);
    assert_eq!(body["current_ram"].as_f64().unwrap(), current_ram);
}

#[tokio::test]
async fn history_returns_full_buffers_most_recent_last() {
    let service = test_service();
    service.engine.record_observation(10.0, 20.0, &[]).await;
    service.engine.record_observation(30.0, 40.0, &[]).await;

    let (status, body) = get(&service.app, "/history").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["length"], 2);
    assert_eq!(body["cpu"][1].as_f64().unwrap(), 30.0);
    assert_eq!(body["ram"][1].as_f64().unwrap(), 40.0);
}

#[tokio::test]
async fn metrics_endpoint_exposes_both_gauges() {
    let service = test_service();
    feed(&service.engine, 9).await;

    let response = service
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.contains("# TYPE ml_model_trained gauge"));
    assert!(body.contains("ml_model_trained 0"));
    assert!(body.contains("ml_data_points 9"));
}

#[tokio::test]
async fn unknown_route_is_404() {
    let service = test_service();
    let (status, _) = get(&service.app, "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
