//! Throttled computation of secondary (derived) metrics.
//!
//! Each [`AggregationRule`] watches a source metric and periodically
//! materializes an aggregate over the buffer window as a new measurement
//! under `output_metric`. Recomputation is spaced by a minimum interval
//! per rule, which is also what bounds recursion depth when derived
//! measurements are fed back through the pipeline.

use chrono::{DateTime, Duration, Utc};
use oxpulse_buffer::MetricBuffer;
use oxpulse_common::types::{AggregateFn, Measurement};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;


/// Configuration for one derived metric. Names are unique; re-registering
/// a name replaces the old rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationRule {
    pub name: String,
    pub source_metric: String,
    pub aggregation: AggregateFn,
    pub window_secs: u64,
    pub output_metric: String,
}

struct RuleEntry {
    rule: AggregationRule,
    last_calculated: DateTime<Utc>,
}

/// Computes derived measurements from buffered data on a throttled cadence.
///
/// Rules are indexed by `source_metric` so dispatch per incoming
/// measurement only touches matching rules. The processor never re-ingests
/// its own output; the pipeline feeds returned measurements back in.
pub struct DerivedMetricProcessor {
    rules_by_source: HashMap<String, Vec<RuleEntry>>,
    recompute_spacing_secs: u64,
}

impl DerivedMetricProcessor {
    pub fn new(recompute_spacing_secs: u64) -> Self {
        Self {
            rules_by_source: HashMap::new(),
            recompute_spacing_secs,
        }
    }

    /// Register a rule, replacing any existing rule with the same name.
    /// The spacing clock starts at registration time, so the first
    /// recompute happens one spacing interval after startup.
    pub fn register(&mut self, rule: AggregationRule) {
        self.remove(&rule.name);
        tracing::info!(
            rule = %rule.name,
            source = %rule.source_metric,
            output = %rule.output_metric,
            "Aggregation rule registered"
        );
        self.rules_by_source
            .entry(rule.source_metric.clone())
            .or_default()
            .push(RuleEntry {
                rule,
                last_calculated: Utc::now(),
            });
    }

    /// Remove a rule by name. Returns true if the rule existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let mut removed = false;
        self.rules_by_source.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|e| e.rule.name != name);
            removed |= entries.len() < before;
            !entries.is_empty()
        });
        if removed {
            tracing::info!(rule = %name, "Aggregation rule removed");
        }
        removed
    }

    pub fn rules(&self) -> Vec<AggregationRule> {
        self.rules_by_source
            .values()
            .flatten()
            .map(|e| e.rule.clone())
            .collect()
    }

    pub fn rule_count(&self) -> usize {
        self.rules_by_source.values().map(Vec::len).sum()
    }

    /// Rules watching `source_metric` whose spacing interval has elapsed.
    /// Does not advance the spacing clock; callers confirm a successful
    /// recompute with [`mark_calculated`](Self::mark_calculated). The
    /// split lets the pipeline hold the processor lock and the buffer
    /// lock at different times instead of nesting them.
    pub fn due_rules(&self, source_metric: &str, now: DateTime<Utc>) -> Vec<AggregationRule> {
        let spacing = Duration::seconds(self.recompute_spacing_secs as i64);
        self.rules_by_source
            .get(source_metric)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| now - e.last_calculated >= spacing)
                    .map(|e| e.rule.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Advance a rule's spacing clock after its aggregate was computed.
    pub fn mark_calculated(&mut self, name: &str, now: DateTime<Utc>) {
        for entries in self.rules_by_source.values_mut() {
            for entry in entries.iter_mut() {
                if entry.rule.name == name {
                    entry.last_calculated = now;
                    return;
                }
            }
        }
    }

    /// Run every due rule for `measurement` against `buffer`, returning
    /// the derived measurements. A rule whose window holds no data is
    /// skipped silently and its spacing clock is left untouched.
    ///
    /// Convenience for callers that own both structures; the pipeline
    /// uses the due/mark split instead.
    pub fn process(
        &mut self,
        measurement: &Measurement,
        buffer: &MetricBuffer,
        now: DateTime<Utc>,
    ) -> Vec<Measurement> {
        let mut derived = Vec::new();
        for rule in self.due_rules(&measurement.metric_name, now) {
            let value = buffer.aggregate(&rule.source_metric, rule.aggregation, rule.window_secs);
            if let Some(value) = value {
                self.mark_calculated(&rule.name, now);
                derived.push(derive_measurement(&rule, value, now));
            }
        }
        derived
    }
}

/// Build the derived measurement for an aggregation result, tagged with
/// the aggregation kind and window and carrying its provenance in
/// metadata.
pub fn derive_measurement(rule: &AggregationRule, value: f64, now: DateTime<Utc>) -> Measurement {
    let mut tags = HashMap::new();
    tags.insert("aggregation".to_string(), rule.aggregation.to_string());
    tags.insert("window".to_string(), rule.window_secs.to_string());

    let mut metadata = HashMap::new();
    metadata.insert(
        "source_metric".to_string(),
        serde_json::Value::String(rule.source_metric.clone()),
    );
    metadata.insert(
        "rule".to_string(),
        serde_json::Value::String(rule.name.clone()),
    );

    Measurement {
        timestamp: now,
        metric_name: rule.output_metric.clone(),
        value,
        tags,
        metadata,
    }
}
