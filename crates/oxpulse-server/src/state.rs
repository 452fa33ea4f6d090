use crate::config::ServerConfig;
use chrono::{DateTime, Utc};
use oxpulse_aggregate::DerivedMetricProcessor;
use oxpulse_alert::engine::AlertEngine;
use oxpulse_buffer::MetricBuffer;
use oxpulse_stream::pipeline::MetricPipeline;
use oxpulse_stream::registry::SubscriptionRegistry;
use std::sync::{Arc, Mutex};

/// Shared handles cloned into every handler and background task.
///
/// Each mutable structure sits behind its own lock; handlers take one
/// lock at a time and release it before touching the next.
#[derive(Clone)]
pub struct AppState {
    pub buffer: Arc<Mutex<MetricBuffer>>,
    pub alert_engine: Arc<Mutex<AlertEngine>>,
    pub derived: Arc<Mutex<DerivedMetricProcessor>>,
    pub registry: Arc<SubscriptionRegistry>,
    pub pipeline: Arc<MetricPipeline>,
    pub start_time: DateTime<Utc>,
    pub config: Arc<ServerConfig>,
}
