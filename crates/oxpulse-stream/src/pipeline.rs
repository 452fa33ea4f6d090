use crate::registry::SubscriptionRegistry;
use chrono::Utc;
use oxpulse_aggregate::{derive_measurement, DerivedMetricProcessor};
use oxpulse_alert::engine::AlertEngine;
use oxpulse_buffer::MetricBuffer;
use oxpulse_common::types::{format_tags, Measurement};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// The single entry point for every measurement, whatever its origin.
///
/// Per measurement the stage order is fixed: buffer write, alert
/// evaluation (alert events broadcast to all subscribers), filtered
/// measurement broadcast, then derivation. Derived measurements re-enter
/// the same sequence; the derivation spacing interval bounds how deep one
/// call can recurse.
///
/// Each shared structure sits behind its own lock, taken one at a time
/// and released before the next is acquired, so no lock ordering exists
/// to get wrong.
pub struct MetricPipeline {
    buffer: Arc<Mutex<MetricBuffer>>,
    alert_engine: Arc<Mutex<AlertEngine>>,
    registry: Arc<SubscriptionRegistry>,
    derived: Arc<Mutex<DerivedMetricProcessor>>,
}

impl MetricPipeline {
    pub fn new(
        buffer: Arc<Mutex<MetricBuffer>>,
        alert_engine: Arc<Mutex<AlertEngine>>,
        registry: Arc<SubscriptionRegistry>,
        derived: Arc<Mutex<DerivedMetricProcessor>>,
    ) -> Self {
        Self {
            buffer,
            alert_engine,
            registry,
            derived,
        }
    }

    /// Run a measurement, and everything derived from it, through the
    /// four-stage sequence.
    pub async fn process(&self, measurement: Measurement) {
        let mut queue = VecDeque::from([measurement]);

        while let Some(measurement) = queue.pop_front() {
            tracing::debug!(
                metric = %measurement.metric_name,
                value = measurement.value,
                tags = %format_tags(&measurement.tags),
                "Processing measurement"
            );

            // 1. Store. The raw signal must be queryable before anything
            //    downstream observes it.
            self.buffer.lock().unwrap().add(measurement.clone());

            // 2. Evaluate alert rules; events go to every subscriber.
            let events = self.alert_engine.lock().unwrap().evaluate(&measurement);
            for event in &events {
                self.registry.broadcast_alert(event).await;
            }

            // 3. Fan the raw measurement out to interested subscribers.
            self.registry.broadcast_measurement(&measurement).await;

            // 4. Derive. The processor lock and the buffer lock are taken
            //    in separate scopes; the spacing clock only advances when
            //    the aggregate was actually present.
            let now = Utc::now();
            let due = self
                .derived
                .lock()
                .unwrap()
                .due_rules(&measurement.metric_name, now);
            for rule in due {
                let value = self.buffer.lock().unwrap().aggregate(
                    &rule.source_metric,
                    rule.aggregation,
                    rule.window_secs,
                );
                if let Some(value) = value {
                    self.derived.lock().unwrap().mark_calculated(&rule.name, now);
                    queue.push_back(derive_measurement(&rule, value, now));
                }
            }
        }
    }
}
