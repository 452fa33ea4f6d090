use crate::engine::{AlertEngine, OngoingPolicy};
use crate::{AlertRule, Comparator};
use chrono::{Duration, Utc};
use oxpulse_common::types::{AlertStatus, Measurement, Severity};

fn make_rule(name: &str, metric: &str, comparator: Comparator, threshold: f64) -> AlertRule {
    AlertRule {
        name: name.to_string(),
        metric_name: metric.to_string(),
        comparator,
        threshold,
        duration_secs: 0,
        severity: Severity::Warning,
        enabled: true,
    }
}

fn m(metric: &str, value: f64) -> Measurement {
    Measurement::now(metric, value)
}

#[test]
fn zero_duration_rule_triggers_then_resolves_once() {
    let mut engine = AlertEngine::new(OngoingPolicy::EveryMeasurement);
    engine.add_rule(make_rule("high-x", "x", Comparator::Gt, 10.0));

    let events = engine.evaluate(&m("x", 15.0));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, AlertStatus::Triggered);
    assert_eq!(events[0].value, 15.0);
    assert_eq!(events[0].threshold, 10.0);

    let events = engine.evaluate(&m("x", 5.0));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, AlertStatus::Resolved);

    // Back below threshold: nothing further.
    assert!(engine.evaluate(&m("x", 4.0)).is_empty());
}

#[test]
fn firing_rule_emits_ongoing_per_qualifying_measurement() {
    let mut engine = AlertEngine::new(OngoingPolicy::EveryMeasurement);
    engine.add_rule(make_rule("high-x", "x", Comparator::Gt, 10.0));

    let first = engine.evaluate(&m("x", 15.0));
    assert_eq!(first[0].status, AlertStatus::Triggered);

    // Re-fires ongoing on every further qualifying measurement.
    for value in [16.0, 17.0, 18.0] {
        let events = engine.evaluate(&m("x", value));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, AlertStatus::Ongoing);
        assert_eq!(events[0].value, value);
    }
}

#[test]
fn heartbeat_policy_dedupes_ongoing_events() {
    let mut engine = AlertEngine::new(OngoingPolicy::Heartbeat(60));
    engine.add_rule(make_rule("high-x", "x", Comparator::Gt, 10.0));

    let t0 = Utc::now();
    assert_eq!(
        engine.evaluate_at(&m("x", 15.0), t0)[0].status,
        AlertStatus::Triggered
    );

    // Within the heartbeat interval: suppressed.
    let first_ongoing = engine.evaluate_at(&m("x", 16.0), t0 + Duration::seconds(1));
    assert_eq!(first_ongoing.len(), 1);
    assert_eq!(first_ongoing[0].status, AlertStatus::Ongoing);
    assert!(engine
        .evaluate_at(&m("x", 17.0), t0 + Duration::seconds(30))
        .is_empty());

    // Past the interval: one more ongoing.
    let events = engine.evaluate_at(&m("x", 18.0), t0 + Duration::seconds(70));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, AlertStatus::Ongoing);
}

#[test]
fn duration_gate_holds_back_trigger_until_elapsed() {
    let mut engine = AlertEngine::new(OngoingPolicy::EveryMeasurement);
    let mut rule = make_rule("sustained-x", "x", Comparator::Gt, 10.0);
    rule.duration_secs = 60;
    engine.add_rule(rule);

    let t0 = Utc::now();

    // Condition becomes true: Pending, no event yet.
    assert!(engine.evaluate_at(&m("x", 15.0), t0).is_empty());

    // Still pending before the duration elapses.
    assert!(engine
        .evaluate_at(&m("x", 16.0), t0 + Duration::seconds(30))
        .is_empty());

    // Duration elapsed: exactly one triggered on the edge.
    let events = engine.evaluate_at(&m("x", 17.0), t0 + Duration::seconds(61));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, AlertStatus::Triggered);
}

#[test]
fn pending_rule_resolves_on_condition_false() {
    let mut engine = AlertEngine::new(OngoingPolicy::EveryMeasurement);
    let mut rule = make_rule("sustained-x", "x", Comparator::Gt, 10.0);
    rule.duration_secs = 300;
    engine.add_rule(rule);

    let t0 = Utc::now();
    assert!(engine.evaluate_at(&m("x", 15.0), t0).is_empty());

    // Flapped back below threshold while Pending: resolved, never triggered.
    let events = engine.evaluate_at(&m("x", 5.0), t0 + Duration::seconds(10));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, AlertStatus::Resolved);

    // The duration clock restarts on the next excursion.
    assert!(engine
        .evaluate_at(&m("x", 15.0), t0 + Duration::seconds(20))
        .is_empty());
}

#[test]
fn comparators_evaluate_against_raw_value() {
    let mut engine = AlertEngine::new(OngoingPolicy::EveryMeasurement);
    engine.add_rule(make_rule("lt", "a", Comparator::Lt, 1.0));
    engine.add_rule(make_rule("eq", "b", Comparator::Eq, 2.0));
    engine.add_rule(make_rule("ne", "c", Comparator::Ne, 3.0));

    assert_eq!(
        engine.evaluate(&m("a", 0.5))[0].status,
        AlertStatus::Triggered
    );
    assert_eq!(
        engine.evaluate(&m("b", 2.0))[0].status,
        AlertStatus::Triggered
    );
    assert_eq!(
        engine.evaluate(&m("c", 4.0))[0].status,
        AlertStatus::Triggered
    );
    assert!(engine.evaluate(&m("c", 3.0)).len() == 1); // resolved edge
}

#[test]
fn rules_on_the_same_metric_keep_independent_state() {
    let mut engine = AlertEngine::new(OngoingPolicy::EveryMeasurement);
    engine.add_rule(make_rule("above-10", "x", Comparator::Gt, 10.0));
    engine.add_rule(make_rule("above-20", "x", Comparator::Gt, 20.0));

    let events = engine.evaluate(&m("x", 15.0));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].rule_name, "above-10");

    let mut statuses: Vec<(String, AlertStatus)> = engine
        .evaluate(&m("x", 25.0))
        .into_iter()
        .map(|e| (e.rule_name, e.status))
        .collect();
    statuses.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        statuses,
        vec![
            ("above-10".to_string(), AlertStatus::Ongoing),
            ("above-20".to_string(), AlertStatus::Triggered),
        ]
    );
}

#[test]
fn disabled_rule_condition_never_holds() {
    let mut engine = AlertEngine::new(OngoingPolicy::EveryMeasurement);
    let mut rule = make_rule("high-x", "x", Comparator::Gt, 10.0);
    rule.enabled = false;
    engine.add_rule(rule);

    assert!(engine.evaluate(&m("x", 100.0)).is_empty());
}

#[test]
fn duplicate_rule_name_silently_overwrites_and_resets_state() {
    let mut engine = AlertEngine::new(OngoingPolicy::EveryMeasurement);
    engine.add_rule(make_rule("high-x", "x", Comparator::Gt, 10.0));
    assert_eq!(
        engine.evaluate(&m("x", 15.0))[0].status,
        AlertStatus::Triggered
    );

    // Same name, new threshold: replaces the old rule and drops its
    // firing state, so the next breach triggers fresh.
    engine.add_rule(make_rule("high-x", "x", Comparator::Gt, 20.0));
    assert_eq!(engine.rule_count(), 1);
    assert!(engine.evaluate(&m("x", 15.0)).is_empty());
    assert_eq!(
        engine.evaluate(&m("x", 25.0))[0].status,
        AlertStatus::Triggered
    );
}

#[test]
fn remove_rule_drops_rule_and_state() {
    let mut engine = AlertEngine::new(OngoingPolicy::EveryMeasurement);
    engine.add_rule(make_rule("high-x", "x", Comparator::Gt, 10.0));
    engine.evaluate(&m("x", 15.0));

    assert!(engine.remove_rule("high-x"));
    assert!(!engine.remove_rule("high-x"));
    assert_eq!(engine.rule_count(), 0);
    assert!(engine.evaluate(&m("x", 15.0)).is_empty());
}

#[test]
fn non_matching_metric_is_ignored() {
    let mut engine = AlertEngine::new(OngoingPolicy::EveryMeasurement);
    engine.add_rule(make_rule("high-x", "x", Comparator::Gt, 10.0));
    assert!(engine.evaluate(&m("y", 100.0)).is_empty());
}
