//! Threshold alerting with a per-rule hysteresis state machine.
//!
//! Each [`AlertRule`] compares raw incoming measurement values against a
//! scalar threshold. The [`engine::AlertEngine`] tracks one state machine
//! per rule (Idle → Pending → Firing) and emits edge-triggered
//! [`AlertEvent`](oxpulse_common::types::AlertEvent)s, with a duration
//! gate suppressing transient flapping.

pub mod engine;

#[cfg(test)]
mod tests;

use oxpulse_common::types::Severity;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Comparison operator applied to the raw incoming value, never to an
/// aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    Gt,
    Lt,
    Eq,
    Ne,
}

impl FromStr for Comparator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "greater_than" | "gt" => Ok(Self::Gt),
            "less_than" | "lt" => Ok(Self::Lt),
            "equal" | "eq" => Ok(Self::Eq),
            "not_equal" | "ne" => Ok(Self::Ne),
            _ => Err(format!("unknown comparator: {s}")),
        }
    }
}

impl std::fmt::Display for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gt => write!(f, "gt"),
            Self::Lt => write!(f, "lt"),
            Self::Eq => write!(f, "eq"),
            Self::Ne => write!(f, "ne"),
        }
    }
}

impl Comparator {
    pub fn check(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Lt => value < threshold,
            Self::Eq => value == threshold,
            Self::Ne => value != threshold,
        }
    }
}

/// Configuration for one alert rule. Rule names are unique; registering
/// a rule under an existing name replaces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub name: String,
    pub metric_name: String,
    pub comparator: Comparator,
    pub threshold: f64,
    pub duration_secs: u64,
    pub severity: Severity,
    pub enabled: bool,
}

impl AlertRule {
    /// A disabled rule's condition never holds, so disabling a firing
    /// rule resolves it on the next matching measurement.
    pub fn condition_met(&self, value: f64) -> bool {
        self.enabled && self.comparator.check(value, self.threshold)
    }
}
