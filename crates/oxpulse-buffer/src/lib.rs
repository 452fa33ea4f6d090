//! Bounded, time-windowed store of recent measurements.
//!
//! [`MetricBuffer`] keeps measurements in arrival order inside a
//! `VecDeque`, evicting by age and by capacity independently. Queries and
//! aggregates never error: an empty result is an empty `Vec` or `None`,
//! never zero or NaN. Callers share the buffer as `Arc<Mutex<MetricBuffer>>`
//! and hold the lock only for the duration of a single operation.

use chrono::{DateTime, Duration, Utc};
use oxpulse_common::types::{AggregateFn, Measurement};
use std::collections::VecDeque;


pub struct MetricBuffer {
    max_size: usize,
    window_secs: i64,
    data: VecDeque<Measurement>,
}

impl MetricBuffer {
    pub fn new(max_size: usize, window_secs: u64) -> Self {
        Self {
            max_size,
            window_secs: window_secs as i64,
            data: VecDeque::with_capacity(max_size.min(1024)),
        }
    }

    /// Append a measurement, then evict anything past the time window and
    /// anything past capacity (oldest first). O(1) amortized.
    pub fn add(&mut self, measurement: Measurement) {
        self.data.push_back(measurement);
        self.evict(Utc::now());
        while self.data.len() > self.max_size {
            self.data.pop_front();
        }
    }

    fn evict(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::seconds(self.window_secs);
        while let Some(front) = self.data.front() {
            if front.timestamp < cutoff {
                self.data.pop_front();
            } else {
                break;
            }
        }
    }

    /// Measurements oldest to newest, optionally filtered by name and/or a
    /// lower timestamp bound. Entries older than the retention window
    /// relative to now are excluded even if not yet evicted.
    pub fn query(
        &self,
        metric_name: Option<&str>,
        since: Option<DateTime<Utc>>,
    ) -> Vec<Measurement> {
        let window_cutoff = Utc::now() - Duration::seconds(self.window_secs);
        self.data
            .iter()
            .filter(|m| m.timestamp >= window_cutoff)
            .filter(|m| metric_name.is_none_or(|name| m.metric_name == name))
            .filter(|m| since.is_none_or(|ts| m.timestamp >= ts))
            .cloned()
            .collect()
    }

    /// The most recent measurement for `metric_name` by arrival order,
    /// not by timestamp value.
    pub fn latest(&self, metric_name: &str) -> Option<&Measurement> {
        self.data
            .iter()
            .rev()
            .find(|m| m.metric_name == metric_name)
    }

    pub fn latest_value(&self, metric_name: &str) -> Option<f64> {
        self.latest(metric_name).map(|m| m.value)
    }

    /// Apply `aggregation` over the values of `metric_name` within
    /// `[now - window_secs, now]`. Returns `None` when the window holds no
    /// data; callers must treat absence as "no result", not as zero.
    pub fn aggregate(
        &self,
        metric_name: &str,
        aggregation: AggregateFn,
        window_secs: u64,
    ) -> Option<f64> {
        let since = Utc::now() - Duration::seconds(window_secs as i64);
        let values: Vec<f64> = self
            .data
            .iter()
            .filter(|m| m.metric_name == metric_name && m.timestamp >= since)
            .map(|m| m.value)
            .collect();

        if values.is_empty() {
            return None;
        }

        let result = match aggregation {
            AggregateFn::Avg => values.iter().sum::<f64>() / values.len() as f64,
            AggregateFn::Sum => values.iter().sum(),
            AggregateFn::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            AggregateFn::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            AggregateFn::Count => values.len() as f64,
        };
        Some(result)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
