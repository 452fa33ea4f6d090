use crate::config::{SeedAggregationRule, SeedAlertRule, SeedConfig};
use oxpulse_aggregate::{AggregationRule, DerivedMetricProcessor};
use oxpulse_alert::engine::AlertEngine;
use oxpulse_alert::AlertRule;
use std::sync::{Arc, Mutex};

/// Register startup rules into the alert engine and the derived-metric
/// processor. When the config lists nothing for a rule kind, a built-in
/// default set is installed instead; an explicit non-empty list replaces
/// the defaults entirely.
pub fn apply(
    seed: &SeedConfig,
    alert_engine: &Arc<Mutex<AlertEngine>>,
    derived: &Arc<Mutex<DerivedMetricProcessor>>,
) {
    let alert_seeds = if seed.alert_rules.is_empty() {
        default_alert_rules()
    } else {
        seed.alert_rules.clone()
    };
    let aggregation_seeds = if seed.aggregation_rules.is_empty() {
        default_aggregation_rules()
    } else {
        seed.aggregation_rules.clone()
    };

    let mut seeded_alerts = 0usize;
    {
        let mut engine = alert_engine.lock().unwrap();
        for entry in &alert_seeds {
            match build_alert_rule(entry) {
                Ok(rule) => {
                    engine.add_rule(rule);
                    seeded_alerts += 1;
                }
                Err(e) => {
                    tracing::warn!(rule = %entry.name, error = %e, "Skipping invalid alert rule seed");
                }
            }
        }
    }

    let mut seeded_aggregations = 0usize;
    {
        let mut processor = derived.lock().unwrap();
        for entry in &aggregation_seeds {
            match build_aggregation_rule(entry) {
                Ok(rule) => {
                    processor.register(rule);
                    seeded_aggregations += 1;
                }
                Err(e) => {
                    tracing::warn!(rule = %entry.name, error = %e, "Skipping invalid aggregation rule seed");
                }
            }
        }
    }

    tracing::info!(
        alert_rules = seeded_alerts,
        aggregation_rules = seeded_aggregations,
        "Seeded startup rules"
    );
}

fn build_alert_rule(entry: &SeedAlertRule) -> Result<AlertRule, String> {
    Ok(AlertRule {
        name: entry.name.clone(),
        metric_name: entry.metric_name.clone(),
        comparator: entry.condition.parse()?,
        threshold: entry.threshold,
        duration_secs: entry.duration,
        severity: entry.severity.parse()?,
        enabled: entry.enabled,
    })
}

fn build_aggregation_rule(entry: &SeedAggregationRule) -> Result<AggregationRule, String> {
    if entry.window_seconds == 0 {
        return Err("window_seconds must be greater than zero".to_string());
    }
    Ok(AggregationRule {
        name: entry.name.clone(),
        source_metric: entry.source_metric.clone(),
        aggregation: entry.aggregation.parse()?,
        window_secs: entry.window_seconds,
        output_metric: entry.output_metric.clone(),
    })
}

fn seed_alert(
    name: &str,
    metric_name: &str,
    condition: &str,
    threshold: f64,
    duration: u64,
    severity: &str,
) -> SeedAlertRule {
    SeedAlertRule {
        name: name.to_string(),
        metric_name: metric_name.to_string(),
        condition: condition.to_string(),
        threshold,
        duration,
        severity: severity.to_string(),
        enabled: true,
    }
}

fn default_alert_rules() -> Vec<SeedAlertRule> {
    vec![
        seed_alert("high_error_rate", "api.error_rate", "gt", 0.05, 300, "warning"),
        seed_alert(
            "slow_response_time",
            "api.response_time_avg",
            "gt",
            2.0,
            300,
            "warning",
        ),
        seed_alert(
            "low_detection_accuracy",
            "detection.accuracy_avg",
            "lt",
            0.9,
            600,
            "error",
        ),
        seed_alert(
            "high_memory_usage",
            "system.memory_usage",
            "gt",
            0.9,
            300,
            "critical",
        ),
    ]
}

fn default_aggregation_rules() -> Vec<SeedAggregationRule> {
    let defaults = [
        ("response_time_avg", "api.response_time", "avg", 300, "api.response_time_avg"),
        ("error_rate_avg", "api.error_rate", "avg", 300, "api.error_rate_avg"),
        (
            "detection_accuracy_avg",
            "detection.accuracy",
            "avg",
            600,
            "detection.accuracy_avg",
        ),
        ("requests_per_minute", "api.requests", "count", 60, "api.requests_per_minute"),
    ];

    defaults
        .into_iter()
        .map(
            |(name, source_metric, aggregation, window_seconds, output_metric)| {
                SeedAggregationRule {
                    name: name.to_string(),
                    source_metric: source_metric.to_string(),
                    aggregation: aggregation.to_string(),
                    window_seconds,
                    output_metric: output_metric.to_string(),
                }
            },
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxpulse_alert::engine::OngoingPolicy;

    #[test]
    fn empty_seed_installs_defaults() {
        let engine = Arc::new(Mutex::new(AlertEngine::new(OngoingPolicy::EveryMeasurement)));
        let derived = Arc::new(Mutex::new(DerivedMetricProcessor::new(10)));

        apply(&SeedConfig::default(), &engine, &derived);

        assert_eq!(engine.lock().unwrap().rule_count(), 4);
        assert_eq!(derived.lock().unwrap().rule_count(), 4);
    }

    #[test]
    fn explicit_seed_replaces_defaults() {
        let engine = Arc::new(Mutex::new(AlertEngine::new(OngoingPolicy::EveryMeasurement)));
        let derived = Arc::new(Mutex::new(DerivedMetricProcessor::new(10)));

        let seed = SeedConfig {
            alert_rules: vec![seed_alert("cpu_hot", "system.cpu", "gt", 90.0, 0, "critical")],
            aggregation_rules: Vec::new(),
        };
        apply(&seed, &engine, &derived);

        assert_eq!(engine.lock().unwrap().rule_count(), 1);
        // Aggregations fall back to the defaults independently.
        assert_eq!(derived.lock().unwrap().rule_count(), 4);
    }

    #[test]
    fn invalid_seed_entries_are_skipped() {
        let engine = Arc::new(Mutex::new(AlertEngine::new(OngoingPolicy::EveryMeasurement)));
        let derived = Arc::new(Mutex::new(DerivedMetricProcessor::new(10)));

        let seed = SeedConfig {
            alert_rules: vec![
                seed_alert("bad_condition", "system.cpu", "between", 1.0, 0, "warning"),
                seed_alert("good", "system.cpu", "gt", 90.0, 0, "warning"),
            ],
            aggregation_rules: vec![SeedAggregationRule {
                name: "zero_window".to_string(),
                source_metric: "api.requests".to_string(),
                aggregation: "count".to_string(),
                window_seconds: 0,
                output_metric: "api.rpm".to_string(),
            }],
        };
        apply(&seed, &engine, &derived);

        assert_eq!(engine.lock().unwrap().rule_count(), 1);
        assert_eq!(derived.lock().unwrap().rule_count(), 0);
    }
}
