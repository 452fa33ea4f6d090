use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// CORS 允许的 origins 列表，为空时允许所有来源（开发模式）
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,

    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub alert: AlertConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            cors_allowed_origins: Vec::new(),
            buffer: BufferConfig::default(),
            alert: AlertConfig::default(),
            aggregation: AggregationConfig::default(),
            broker: BrokerConfig::default(),
            health: HealthConfig::default(),
            seed: SeedConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    /// 缓冲区最大条数，超出时淘汰最旧数据
    #[serde(default = "default_buffer_max_size")]
    pub max_size: usize,
    /// 时间窗口（秒），超龄数据自动淘汰
    #[serde(default = "default_buffer_window_secs")]
    pub window_secs: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_size: default_buffer_max_size(),
            window_secs: default_buffer_window_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AlertConfig {
    /// Firing 状态下 ongoing 事件的最小间隔（秒）。
    /// 不设置时每条满足条件的数据都会触发一次 ongoing。
    #[serde(default)]
    pub ongoing_heartbeat_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// 同一聚合规则两次重算之间的最小间隔（秒）
    #[serde(default = "default_recompute_spacing_secs")]
    pub recompute_spacing_secs: u64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            recompute_spacing_secs: default_recompute_spacing_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// 是否启用 Redis pub/sub 摄取
    #[serde(default = "default_broker_enabled")]
    pub enabled: bool,
    #[serde(default = "default_broker_url")]
    pub url: String,
    /// 订阅的频道名
    #[serde(default = "default_broker_channel")]
    pub channel: String,
    /// 连接失败后的重试间隔（秒）
    #[serde(default = "default_broker_retry_secs")]
    pub retry_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            enabled: default_broker_enabled(),
            url: default_broker_url(),
            channel: default_broker_channel(),
            retry_secs: default_broker_retry_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// 是否启用自身健康指标上报
    #[serde(default = "default_health_enabled")]
    pub enabled: bool,
    /// 上报间隔（秒）
    #[serde(default = "default_health_interval_secs")]
    pub interval_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_health_enabled(),
            interval_secs: default_health_interval_secs(),
        }
    }
}

// ---- Seed tables: rules applied once at startup ----

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SeedConfig {
    #[serde(default)]
    pub alert_rules: Vec<SeedAlertRule>,
    #[serde(default)]
    pub aggregation_rules: Vec<SeedAggregationRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedAlertRule {
    pub name: String,
    pub metric_name: String,
    pub condition: String,
    pub threshold: f64,
    #[serde(default)]
    pub duration: u64,
    #[serde(default = "default_seed_severity")]
    pub severity: String,
    #[serde(default = "default_seed_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedAggregationRule {
    pub name: String,
    pub source_metric: String,
    pub aggregation: String,
    pub window_seconds: u64,
    pub output_metric: String,
}

fn default_http_port() -> u16 {
    8051
}

fn default_buffer_max_size() -> usize {
    1000
}

fn default_buffer_window_secs() -> u64 {
    300
}

fn default_recompute_spacing_secs() -> u64 {
    10
}

fn default_broker_enabled() -> bool {
    true
}

fn default_broker_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_broker_channel() -> String {
    "analytics:metrics".to_string()
}

fn default_broker_retry_secs() -> u64 {
    5
}

fn default_health_enabled() -> bool {
    true
}

fn default_health_interval_secs() -> u64 {
    30
}

fn default_seed_severity() -> String {
    "warning".to_string()
}

fn default_seed_enabled() -> bool {
    true
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let mut config: Self = toml::from_str(content)?;
        // Spacing 0 would let a cyclic aggregation rule rederive without
        // bound inside a single pipeline pass.
        if config.aggregation.recompute_spacing_secs == 0 {
            tracing::warn!("aggregation.recompute_spacing_secs = 0 is not allowed, clamping to 1");
            config.aggregation.recompute_spacing_secs = 1;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = ServerConfig::from_toml("").expect("empty config should parse");
        assert_eq!(config.http_port, 8051);
        assert_eq!(config.buffer.max_size, 1000);
        assert_eq!(config.buffer.window_secs, 300);
        assert_eq!(config.aggregation.recompute_spacing_secs, 10);
        assert_eq!(config.broker.channel, "analytics:metrics");
    }

    #[test]
    fn zero_recompute_spacing_is_clamped_to_one() {
        let config = ServerConfig::from_toml("[aggregation]\nrecompute_spacing_secs = 0\n")
            .expect("config should parse");
        assert_eq!(config.aggregation.recompute_spacing_secs, 1);
    }
}
