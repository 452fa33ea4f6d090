use anyhow::Result;
use chrono::Utc;
use oxpulse_aggregate::DerivedMetricProcessor;
use oxpulse_alert::engine::{AlertEngine, OngoingPolicy};
use oxpulse_buffer::MetricBuffer;
use oxpulse_stream::pipeline::MetricPipeline;
use oxpulse_stream::registry::SubscriptionRegistry;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use oxpulse_server::state::AppState;
use oxpulse_server::{app, broker, config, health, seed};

#[tokio::main]
async fn main() -> Result<()> {
    oxpulse_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("oxpulse=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("config/oxpulse.toml");

    let config = match config::ServerConfig::load(config_path) {
        Ok(config) => {
            tracing::info!(path = %config_path, "Loaded configuration");
            config
        }
        Err(e) => {
            tracing::warn!(path = %config_path, error = %e, "Config not loaded, using defaults");
            config::ServerConfig::default()
        }
    };

    let ongoing_policy = match config.alert.ongoing_heartbeat_secs {
        Some(secs) => OngoingPolicy::Heartbeat(secs),
        None => OngoingPolicy::EveryMeasurement,
    };

    let buffer = Arc::new(Mutex::new(MetricBuffer::new(
        config.buffer.max_size,
        config.buffer.window_secs,
    )));
    let alert_engine = Arc::new(Mutex::new(AlertEngine::new(ongoing_policy)));
    let derived = Arc::new(Mutex::new(DerivedMetricProcessor::new(
        config.aggregation.recompute_spacing_secs,
    )));
    let registry = Arc::new(SubscriptionRegistry::new());
    let pipeline = Arc::new(MetricPipeline::new(
        buffer.clone(),
        alert_engine.clone(),
        registry.clone(),
        derived.clone(),
    ));

    seed::apply(&config.seed, &alert_engine, &derived);

    let state = AppState {
        buffer,
        alert_engine,
        derived,
        registry: registry.clone(),
        pipeline: pipeline.clone(),
        start_time: Utc::now(),
        config: Arc::new(config),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut background_tasks = Vec::new();
    if state.config.broker.enabled {
        background_tasks.push(tokio::spawn(broker::run_subscriber(
            state.config.broker.clone(),
            pipeline.clone(),
            shutdown_rx.clone(),
        )));
    }
    if state.config.health.enabled {
        background_tasks.push(tokio::spawn(health::run_emitter(
            state.clone(),
            state.config.health.interval_secs,
            shutdown_rx.clone(),
        )));
    }

    let http_addr: SocketAddr = ([0, 0, 0, 0], state.config.http_port).into();
    let http_app = app::build_http_app(state.clone());

    tracing::info!(addr = %http_addr, "HTTP server listening");
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    axum::serve(listener, http_app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down");
    let _ = shutdown_tx.send(true);
    registry.shutdown_all().await;
    for task in background_tasks {
        let _ = task.await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
