use crate::state::AppState;
use oxpulse_common::types::Measurement;
use tokio::sync::watch;
use tokio::time::{interval, Duration};

/// Periodically emit the engine's own vitals as ordinary measurements.
///
/// The points go through the same pipeline as external data, so they are
/// buffered, alertable and subscribable like any other metric.
pub async fn run_emitter(state: AppState, interval_secs: u64, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(Duration::from_secs(interval_secs));
    // The first tick fires immediately; skip it so vitals start one
    // interval after boot.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                emit_vitals(&state).await;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("Health emitter stopped");
                    return;
                }
            }
        }
    }
}

async fn emit_vitals(state: &AppState) {
    let connections = state.registry.connection_count().await as f64;
    let buffer_size = state.buffer.lock().unwrap().len() as f64;
    let alert_rules = state.alert_engine.lock().unwrap().rule_count() as f64;

    let vitals = [
        ("system.connections", connections, "stream"),
        ("system.buffer_size", buffer_size, "buffer"),
        ("system.alert_rules", alert_rules, "alerts"),
    ];

    for (name, value, component) in vitals {
        let mut measurement = Measurement::now(name, value);
        measurement
            .tags
            .insert("component".to_string(), component.to_string());
        state.pipeline.process(measurement).await;
    }
}
