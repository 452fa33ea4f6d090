use crate::api::{error_response, success_empty_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use oxpulse_alert::{AlertRule, Comparator};
use oxpulse_common::types::Severity;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// 告警规则信息
#[derive(Serialize, ToSchema)]
pub struct AlertRuleResponse {
    /// 规则名称（唯一）
    pub name: String,
    /// 监控指标名称
    pub metric_name: String,
    /// 比较条件（gt / lt / eq / ne）
    pub condition: String,
    /// 阈值
    pub threshold: f64,
    /// 触发前条件需持续的秒数（0 表示立即触发）
    pub duration: u64,
    /// 告警级别（info / warning / error / critical）
    pub severity: String,
    /// 是否启用
    pub enabled: bool,
}

impl From<AlertRule> for AlertRuleResponse {
    fn from(rule: AlertRule) -> Self {
        Self {
            name: rule.name,
            metric_name: rule.metric_name,
            condition: rule.comparator.to_string(),
            threshold: rule.threshold,
            duration: rule.duration_secs,
            severity: rule.severity.to_string(),
            enabled: rule.enabled,
        }
    }
}

/// 创建告警规则请求
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAlertRuleRequest {
    /// 规则名称（唯一，重名时覆盖旧规则并重置其状态）
    pub name: String,
    /// 监控指标名称
    pub metric_name: String,
    /// 比较条件（gt / lt / eq / ne，兼容 greater_than / less_than 等写法）
    pub condition: String,
    /// 阈值
    pub threshold: f64,
    /// 触发前条件需持续的秒数（默认 0）
    #[serde(default)]
    pub duration: u64,
    /// 告警级别（默认 warning）
    #[serde(default = "default_severity")]
    pub severity: String,
    /// 是否启用（默认 true）
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_severity() -> String {
    "warning".to_string()
}

fn default_enabled() -> bool {
    true
}

/// 查询所有告警规则。
#[utoipa::path(
    get,
    path = "/v1/alerts/rules",
    tag = "Alerts",
    responses(
        (status = 200, description = "告警规则列表", body = Vec<AlertRuleResponse>)
    )
)]
async fn list_alert_rules(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let rules: Vec<AlertRuleResponse> = state
        .alert_engine
        .lock()
        .unwrap()
        .rules()
        .into_iter()
        .map(AlertRuleResponse::from)
        .collect();

    success_response(StatusCode::OK, &trace_id, rules)
}

/// 创建告警规则。重名规则会被覆盖并重置其告警状态。
#[utoipa::path(
    post,
    path = "/v1/alerts/rules",
    tag = "Alerts",
    request_body = CreateAlertRuleRequest,
    responses(
        (status = 201, description = "规则已注册", body = AlertRuleResponse),
        (status = 400, description = "非法的条件或级别", body = crate::api::ApiError)
    )
)]
async fn create_alert_rule(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<CreateAlertRuleRequest>,
) -> impl IntoResponse {
    if req.name.trim().is_empty() || req.metric_name.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "name and metric_name must not be empty",
        );
    }
    let comparator: Comparator = match req.condition.parse() {
        Ok(c) => c,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &trace_id, "invalid_condition", &e);
        }
    };
    let severity: Severity = match req.severity.parse() {
        Ok(s) => s,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &trace_id, "invalid_severity", &e);
        }
    };

    let rule = AlertRule {
        name: req.name,
        metric_name: req.metric_name,
        comparator,
        threshold: req.threshold,
        duration_secs: req.duration,
        severity,
        enabled: req.enabled,
    };
    let response = AlertRuleResponse::from(rule.clone());
    state.alert_engine.lock().unwrap().add_rule(rule);

    success_response(StatusCode::CREATED, &trace_id, response)
}

/// 删除告警规则。
#[utoipa::path(
    delete,
    path = "/v1/alerts/rules/{name}",
    tag = "Alerts",
    params(
        ("name" = String, Path, description = "规则名称")
    ),
    responses(
        (status = 200, description = "规则已删除"),
        (status = 404, description = "规则不存在", body = crate::api::ApiError)
    )
)]
async fn delete_alert_rule(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let removed = state.alert_engine.lock().unwrap().remove_rule(&name);
    if removed {
        success_empty_response(StatusCode::OK, &trace_id, "Alert rule deleted")
    } else {
        error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Alert rule '{name}' not found"),
        )
    }
}

pub fn alert_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_alert_rules, create_alert_rule))
        .routes(routes!(delete_alert_rule))
}
