//! Engine-level integration tests against the default configuration

use std::sync::Arc;

use foresight_forecaster::config::ForecasterConfig;
use foresight_forecaster::engine::{ForecastEngine, TrainOutcome};
use foresight_forecaster::error::ModelError;

fn default_engine() -> ForecastEngine {
    ForecastEngine::new(&ForecasterConfig::default())
}

async fn feed_sine(engine: &ForecastEngine, count: usize) {
    for i in 0..count {
        let phase = (i as f64 * 0.25).sin();
        engine
            .record_observation(45.0 + 20.0 * phase, 62.0 + 8.0 * phase, &[])
            .await;
    }
}

#[tokio::test]
async fn training_is_gated_until_fifty_samples() {
    let engine = default_engine();
    feed_sine(&engine, 49).await;

    match engine.train().await.unwrap() {
        TrainOutcome::InsufficientData { data_points, required } => {
            assert_eq!(data_points, 49);
            assert_eq!(required, 50);
        }
        other => panic!("expected InsufficientData, got {other:?}"),
    }
    assert!(!engine.status().await.is_trained);

    feed_sine(&engine, 1).await;
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
async fn untrained_prediction_surfaces_required_count() {
    let engine = default_engine();
    feed_sine(&engine, 10).await;

    match engine.predict(60).await.unwrap_err() {
        ModelError::NotTrained { data_points, required } => {
            assert_eq!(data_points, 10);
            assert_eq!(required, 50);
        }
        other => panic!("expected NotTrained, got {other:?}"),
    }
}

#[tokio::test]
async fn forecasts_stay_within_metric_range() {
    let engine = default_engine();
    feed_sine(&engine, 80).await;
    engine.train().await.unwrap();

    for steps in [30usize, 60, 120] {
        let forecast = engine.predict(steps).await.unwrap();
        assert_eq!(forecast.cpu.len(), steps);
        assert_eq!(forecast.ram.len(), steps);
        assert_eq!(forecast.timestamps.len(), steps);

        for v in forecast.cpu.iter().chain(forecast.ram.iter()) {
            assert!((0.0..=100.0).contains(v), "value out of range: {v}");
        }
    }
}

#[tokio::test]
async fn horizon_is_capped_at_one_hundred_twenty() {
    let engine = default_engine();
    feed_sine(&engine, 80).await;
    engine.train().await.unwrap();

    let forecast = engine.predict(500).await.unwrap();
    assert_eq!(forecast.cpu.len(), 120);
    assert_eq!(forecast.timestamps.last(), Some(&119));
}

#[tokio::test]
async fn trained_flag_is_monotonic_across_refits() {
    let engine = default_engine();
    feed_sine(&engine, 60).await;
    engine.train().await.unwrap();
    assert!(engine.status().await.is_trained);

    // Another cycle over the same data also succeeds and leaves the flag set.
    engine.train().await.unwrap();
    assert!(engine.status().await.is_trained);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_and_training_never_tear_the_buffers() {
    let engine = Arc::new(default_engine());
    feed_sine(&engine, 55).await;

    let mut handles = Vec::new();
    for task in 0..4 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..50 {
                let v = ((task * 50 + i) % 100) as f64;
                engine.record_observation(v, 100.0 - v, &[]).await;
            }
        }));
    }
    for _ in 0..3 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let _ = engine.train().await;
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    let snapshot = engine.history().await;
    let status = engine.status().await;
    assert_eq!(snapshot.cpu.len(), snapshot.ram.len());
    assert_eq!(snapshot.cpu.len(), status.data_points);
    assert_eq!(status.data_points, 255);
}
