use crate::config::BrokerConfig;
use futures::StreamExt;
use oxpulse_common::types::{Measurement, MetricIngest};
use oxpulse_stream::pipeline::MetricPipeline;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Duration;

/// Subscribe to the Redis channel and feed every payload through the
/// pipeline. Runs until the shutdown signal flips; connection failures
/// are retried with a fixed interval and never take the server down.
pub async fn run_subscriber(
    config: BrokerConfig,
    pipeline: Arc<MetricPipeline>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        match subscribe_once(&config, &pipeline, &mut shutdown).await {
            Ok(()) => {
                tracing::info!("Broker subscriber stopped");
                return;
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    retry_secs = config.retry_secs,
                    "Broker connection lost, retrying"
                );
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(config.retry_secs)) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("Broker subscriber stopped");
                    return;
                }
            }
        }
    }
}

/// One connect/subscribe/consume cycle. Returns `Ok(())` only on a clean
/// shutdown; any broker error bubbles up for the retry loop.
async fn subscribe_once(
    config: &BrokerConfig,
    pipeline: &Arc<MetricPipeline>,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), redis::RedisError> {
    let client = redis::Client::open(config.url.as_str())?;
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(&config.channel).await?;
    tracing::info!(url = %config.url, channel = %config.channel, "Subscribed to metric channel");

    {
        let mut stream = pubsub.on_message();
        loop {
            tokio::select! {
                msg = stream.next() => {
                    let Some(msg) = msg else {
                        // Stream ended means the connection dropped.
                        return Err(redis::RedisError::from((
                            redis::ErrorKind::IoError,
                            "pubsub stream closed",
                        )));
                    };
                    handle_payload(pipeline, &msg).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    pubsub.unsubscribe(&config.channel).await?;
    Ok(())
}

/// Parse one channel payload and run it through the pipeline. Malformed
/// payloads are logged and dropped; the subscription stays up.
async fn handle_payload(pipeline: &Arc<MetricPipeline>, msg: &redis::Msg) {
    let payload: String = match msg.get_payload() {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "Dropping non-text broker payload");
            return;
        }
    };

    let ingest: MetricIngest = match serde_json::from_str(&payload) {
        Ok(i) => i,
        Err(e) => {
            tracing::warn!(error = %e, "Dropping unparseable broker payload");
            return;
        }
    };

    match Measurement::try_from(ingest) {
        Ok(measurement) => pipeline.process(measurement).await,
        Err(e) => {
            tracing::warn!(error = %e, "Dropping invalid broker measurement");
        }
    }
}
