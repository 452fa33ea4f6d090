use crate::api::{error_response, success_empty_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use oxpulse_aggregate::AggregationRule;
use oxpulse_common::types::AggregateFn;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// 聚合规则信息
#[derive(Serialize, ToSchema)]
pub struct AggregationRuleResponse {
    /// 规则名称（唯一）
    pub name: String,
    /// 源指标名称
    pub source_metric: String,
    /// 聚合函数（avg / sum / min / max / count）
    pub aggregation: String,
    /// 聚合时间窗口（秒）
    pub window_seconds: u64,
    /// 派生指标名称
    pub output_metric: String,
}

impl From<AggregationRule> for AggregationRuleResponse {
    fn from(rule: AggregationRule) -> Self {
        Self {
            name: rule.name,
            source_metric: rule.source_metric,
            aggregation: rule.aggregation.to_string(),
            window_seconds: rule.window_secs,
            output_metric: rule.output_metric,
        }
    }
}

/// 创建聚合规则请求
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAggregationRuleRequest {
    /// 规则名称（唯一，重名时覆盖旧规则）
    pub name: String,
    /// 源指标名称
    pub source_metric: String,
    /// 聚合函数（avg / sum / min / max / count）
    pub aggregation: String,
    /// 聚合时间窗口（秒）
    pub window_seconds: u64,
    /// 派生指标名称
    pub output_metric: String,
}

/// 查询所有聚合规则。
#[utoipa::path(
    get,
    path = "/v1/aggregations/rules",
    tag = "Aggregations",
    responses(
        (status = 200, description = "聚合规则列表", body = Vec<AggregationRuleResponse>)
    )
)]
async fn list_aggregation_rules(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let rules: Vec<AggregationRuleResponse> = state
        .derived
        .lock()
        .unwrap()
        .rules()
        .into_iter()
        .map(AggregationRuleResponse::from)
        .collect();

    success_response(StatusCode::OK, &trace_id, rules)
}

/// 创建聚合规则。重名规则会被覆盖，重算间隔计时从注册时刻开始。
#[utoipa::path(
    post,
    path = "/v1/aggregations/rules",
    tag = "Aggregations",
    request_body = CreateAggregationRuleRequest,
    responses(
        (status = 201, description = "规则已注册", body = AggregationRuleResponse),
        (status = 400, description = "非法的聚合函数或参数", body = crate::api::ApiError)
    )
)]
async fn create_aggregation_rule(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<CreateAggregationRuleRequest>,
) -> impl IntoResponse {
    if req.name.trim().is_empty()
        || req.source_metric.trim().is_empty()
        || req.output_metric.trim().is_empty()
    {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "name, source_metric and output_metric must not be empty",
        );
    }
    if req.window_seconds == 0 {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "window_seconds must be greater than zero",
        );
    }
    let aggregation: AggregateFn = match req.aggregation.parse() {
        Ok(f) => f,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &trace_id, "invalid_aggregation", &e);
        }
    };

    let rule = AggregationRule {
        name: req.name,
        source_metric: req.source_metric,
        aggregation,
        window_secs: req.window_seconds,
        output_metric: req.output_metric,
    };
    let response = AggregationRuleResponse::from(rule.clone());
    state.derived.lock().unwrap().register(rule);

    success_response(StatusCode::CREATED, &trace_id, response)
}

/// 删除聚合规则。
#[utoipa::path(
    delete,
    path = "/v1/aggregations/rules/{name}",
    tag = "Aggregations",
    params(
        ("name" = String, Path, description = "规则名称")
    ),
    responses(
        (status = 200, description = "规则已删除"),
        (status = 404, description = "规则不存在", body = crate::api::ApiError)
    )
)]
async fn delete_aggregation_rule(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let removed = state.derived.lock().unwrap().remove(&name);
    if removed {
        success_empty_response(StatusCode::OK, &trace_id, "Aggregation rule deleted")
    } else {
        error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Aggregation rule '{name}' not found"),
        )
    }
}

pub fn aggregation_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_aggregation_rules, create_aggregation_rule))
        .routes(routes!(delete_aggregation_rule))
}
