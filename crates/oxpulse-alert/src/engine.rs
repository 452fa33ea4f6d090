use crate::AlertRule;
use chrono::{DateTime, Duration, Utc};
use oxpulse_common::types::{AlertEvent, AlertStatus, Measurement};
use std::collections::HashMap;

/// How the engine emits `ongoing` events while a rule keeps firing.
///
/// The source system re-fired on every qualifying measurement; a heartbeat
/// interval dedupes that down to at most one `ongoing` per interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OngoingPolicy {
    /// Emit `ongoing` on every qualifying measurement while firing.
    EveryMeasurement,
    /// Emit `ongoing` at most once per this many seconds while firing.
    Heartbeat(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Pending,
    Firing,
}

/// Per-rule mutable state, created with the rule and destroyed with it.
#[derive(Debug)]
struct RuleState {
    phase: Phase,
    trigger_time: Option<DateTime<Utc>>,
    last_value: Option<f64>,
    last_ongoing_emit: Option<DateTime<Utc>>,
}

impl RuleState {
    fn new() -> Self {
        Self {
            phase: Phase::Idle,
            trigger_time: None,
            last_value: None,
            last_ongoing_emit: None,
        }
    }
}

/// Evaluates incoming measurements against registered rules.
///
/// All rule and state access happens through `&mut self`; callers share
/// the engine as `Arc<Mutex<AlertEngine>>` so rule removal can never race
/// an in-flight evaluation.
pub struct AlertEngine {
    rules: HashMap<String, AlertRule>,
    states: HashMap<String, RuleState>,
    ongoing_policy: OngoingPolicy,
}

impl AlertEngine {
    pub fn new(ongoing_policy: OngoingPolicy) -> Self {
        Self {
            rules: HashMap::new(),
            states: HashMap::new(),
            ongoing_policy,
        }
    }

    /// Register a rule. A duplicate name silently replaces the previous
    /// rule and resets its state machine to Idle.
    pub fn add_rule(&mut self, rule: AlertRule) {
        let name = rule.name.clone();
        self.states.insert(name.clone(), RuleState::new());
        self.rules.insert(name.clone(), rule);
        tracing::info!(rule = %name, "Alert rule registered");
    }

    /// Remove a rule and its state. Returns true if the rule existed.
    pub fn remove_rule(&mut self, name: &str) -> bool {
        self.states.remove(name);
        let removed = self.rules.remove(name).is_some();
        if removed {
            tracing::info!(rule = %name, "Alert rule removed");
        }
        removed
    }

    pub fn rules(&self) -> Vec<AlertRule> {
        self.rules.values().cloned().collect()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Evaluate a measurement against every rule watching its metric.
    pub fn evaluate(&mut self, measurement: &Measurement) -> Vec<AlertEvent> {
        self.evaluate_at(measurement, Utc::now())
    }

    /// Like [`evaluate`](Self::evaluate) with an explicit clock, so the
    /// duration gate can be exercised deterministically.
    pub fn evaluate_at(
        &mut self,
        measurement: &Measurement,
        now: DateTime<Utc>,
    ) -> Vec<AlertEvent> {
        let mut events = Vec::new();

        for rule in self.rules.values() {
            if rule.metric_name != measurement.metric_name {
                continue;
            }
            let state = self
                .states
                .get_mut(&rule.name)
                .expect("rule state exists for every registered rule");

            let met = rule.condition_met(measurement.value);
            state.last_value = Some(measurement.value);

            match state.phase {
                Phase::Idle if met => {
                    state.trigger_time = Some(now);
                    if rule.duration_secs == 0 {
                        state.phase = Phase::Firing;
                        state.last_ongoing_emit = None;
                        events.push(make_event(rule, measurement, AlertStatus::Triggered, now));
                    } else {
                        state.phase = Phase::Pending;
                    }
                }
                Phase::Pending if met => {
                    let elapsed = state
                        .trigger_time
                        .map(|t| now - t)
                        .unwrap_or_else(Duration::zero);
                    if elapsed >= Duration::seconds(rule.duration_secs as i64) {
                        state.phase = Phase::Firing;
                        state.last_ongoing_emit = None;
                        events.push(make_event(rule, measurement, AlertStatus::Triggered, now));
                    }
                }
                Phase::Firing if met => {
                    let due = match self.ongoing_policy {
                        OngoingPolicy::EveryMeasurement => true,
                        OngoingPolicy::Heartbeat(secs) => state
                            .last_ongoing_emit
                            .is_none_or(|t| now - t >= Duration::seconds(secs as i64)),
                    };
                    if due {
                        state.last_ongoing_emit = Some(now);
                        events.push(make_event(rule, measurement, AlertStatus::Ongoing, now));
                    }
                }
                Phase::Pending | Phase::Firing => {
                    // Condition went false: resolve exactly once on this edge.
                    state.phase = Phase::Idle;
                    state.trigger_time = None;
                    state.last_ongoing_emit = None;
                    events.push(make_event(rule, measurement, AlertStatus::Resolved, now));
                }
                Phase::Idle => {}
            }
        }

        for event in &events {
            tracing::warn!(
                rule = %event.rule_name,
                metric = %event.metric_name,
                status = %event.status,
                value = event.value,
                threshold = event.threshold,
                "Alert fired"
            );
        }

        events
    }
}

fn make_event(
    rule: &AlertRule,
    measurement: &Measurement,
    status: AlertStatus,
    now: DateTime<Utc>,
) -> AlertEvent {
    AlertEvent {
        id: oxpulse_common::id::next_id(),
        rule_name: rule.name.clone(),
        metric_name: rule.metric_name.clone(),
        status,
        severity: rule.severity,
        value: measurement.value,
        threshold: rule.threshold,
        message: format!(
            "Alert {status}: {} - {} is {} (threshold: {})",
            rule.name, rule.metric_name, measurement.value, rule.threshold,
        ),
        timestamp: now,
    }
}
