use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One immutable timestamped named value, the atomic unit flowing through
/// the pipeline. Never persisted beyond the in-memory buffer window.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Measurement {
    pub timestamp: DateTime<Utc>,
    pub metric_name: String,
    pub value: f64,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Measurement {
    /// Build a measurement stamped with the current time and no tags.
    pub fn now(metric_name: impl Into<String>, value: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            metric_name: metric_name.into(),
            value,
            tags: HashMap::new(),
            metadata: HashMap::new(),
        }
    }
}

/// Ingestion envelope accepted by the push endpoint and the broker channel.
/// `timestamp` defaults to the arrival time when omitted.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct MetricIngest {
    pub metric_name: String,
    pub value: f64,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl TryFrom<MetricIngest> for Measurement {
    type Error = String;

    /// Validates and normalizes an ingestion payload. Rejected payloads
    /// never reach the buffer or the alert engine.
    fn try_from(ingest: MetricIngest) -> Result<Self, Self::Error> {
        if ingest.metric_name.trim().is_empty() {
            return Err("metric_name must not be empty".to_string());
        }
        if !ingest.value.is_finite() {
            return Err(format!(
                "value must be a finite number, got {}",
                ingest.value
            ));
        }
        Ok(Measurement {
            timestamp: ingest.timestamp.unwrap_or_else(Utc::now),
            metric_name: ingest.metric_name,
            value: ingest.value,
            tags: ingest.tags,
            metadata: ingest.metadata,
        })
    }
}

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use oxpulse_common::types::Severity;
///
/// let sev: Severity = "warning".parse().unwrap();
/// assert_eq!(sev, Severity::Warning);
/// assert_eq!(sev.to_string(), "warning");
/// assert!(Severity::Critical > Severity::Info);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Aggregation function applied over a time window of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFn {
    Avg,
    Sum,
    Min,
    Max,
    Count,
}

impl std::fmt::Display for AggregateFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateFn::Avg => write!(f, "avg"),
            AggregateFn::Sum => write!(f, "sum"),
            AggregateFn::Min => write!(f, "min"),
            AggregateFn::Max => write!(f, "max"),
            AggregateFn::Count => write!(f, "count"),
        }
    }
}

impl std::str::FromStr for AggregateFn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "avg" => Ok(AggregateFn::Avg),
            "sum" => Ok(AggregateFn::Sum),
            "min" => Ok(AggregateFn::Min),
            "max" => Ok(AggregateFn::Max),
            "count" => Ok(AggregateFn::Count),
            _ => Err(format!("unknown aggregation: {s}")),
        }
    }
}

/// Lifecycle position of an alert event.
///
/// `Triggered` fires exactly once on the Pending → Firing edge,
/// `Ongoing` repeats while the condition keeps holding, and `Resolved`
/// fires exactly once when the condition goes false again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Triggered,
    Ongoing,
    Resolved,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertStatus::Triggered => write!(f, "triggered"),
            AlertStatus::Ongoing => write!(f, "ongoing"),
            AlertStatus::Resolved => write!(f, "resolved"),
        }
    }
}

/// An alert emitted by the engine, broadcast unconditionally to every
/// connected subscriber.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AlertEvent {
    pub id: String,
    pub rule_name: String,
    pub metric_name: String,
    pub status: AlertStatus,
    pub severity: Severity,
    pub value: f64,
    pub threshold: f64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Messages a subscriber sends over its WebSocket connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { metrics: Vec<String> },
    Unsubscribe { metrics: Vec<String> },
    GetLatest { metric_name: String },
}

/// Messages the engine pushes to a subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    MetricUpdate {
        data: Measurement,
    },
    Alert {
        data: AlertEvent,
    },
    LatestValue {
        metric_name: String,
        value: Option<f64>,
    },
}

/// Format a tags map into a human-readable string.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use oxpulse_common::types::format_tags;
///
/// let mut tags = HashMap::new();
/// tags.insert("component".to_string(), "buffer".to_string());
/// tags.insert("window".to_string(), "60".to_string());
/// let s = format_tags(&tags);
/// assert!(s.contains("component=buffer"));
/// assert!(s.contains("window=60"));
/// ```
pub fn format_tags(tags: &HashMap<String, String>) -> String {
    if tags.is_empty() {
        return String::new();
    }
    let mut pairs: Vec<String> = tags.iter().map(|(k, v)| format!("{k}={v}")).collect();
    pairs.sort();
    pairs.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_rejects_empty_metric_name() {
        let ingest = MetricIngest {
            metric_name: "  ".to_string(),
            value: 1.0,
            timestamp: None,
            tags: HashMap::new(),
            metadata: HashMap::new(),
        };
        assert!(Measurement::try_from(ingest).is_err());
    }

    #[test]
    fn ingest_rejects_non_finite_value() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let ingest = MetricIngest {
                metric_name: "cpu.usage".to_string(),
                value: bad,
                timestamp: None,
                tags: HashMap::new(),
                metadata: HashMap::new(),
            };
            assert!(Measurement::try_from(ingest).is_err());
        }
    }

    #[test]
    fn ingest_defaults_timestamp_to_now() {
        let before = Utc::now();
        let ingest = MetricIngest {
            metric_name: "cpu.usage".to_string(),
            value: 42.0,
            timestamp: None,
            tags: HashMap::new(),
            metadata: HashMap::new(),
        };
        let m = Measurement::try_from(ingest).unwrap();
        assert!(m.timestamp >= before && m.timestamp <= Utc::now());
    }

    #[test]
    fn client_message_wire_format() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"subscribe","metrics":["cpu","mem"]}"#).unwrap();
        match msg {
            ClientMessage::Subscribe { metrics } => assert_eq!(metrics, vec!["cpu", "mem"]),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn server_message_wire_format() {
        let msg = ServerMessage::LatestValue {
            metric_name: "cpu".to_string(),
            value: Some(1.5),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "latest_value");
        assert_eq!(json["metric_name"], "cpu");
        assert_eq!(json["value"], 1.5);

        let update = ServerMessage::MetricUpdate {
            data: Measurement::now("cpu", 2.0),
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["type"], "metric_update");
        assert_eq!(json["data"]["metric_name"], "cpu");
    }
}
