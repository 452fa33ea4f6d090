use crate::api::{error_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{Duration, Utc};
use oxpulse_common::types::{Measurement, MetricIngest};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// 指标摄取确认
#[derive(Serialize, ToSchema)]
struct PushAck {
    /// 指标名称
    metric_name: String,
    /// 摄取时间戳
    timestamp: chrono::DateTime<chrono::Utc>,
}

/// 推送一条指标数据。
/// 数据会写入缓冲区、触发告警评估、推送给订阅者并驱动派生指标计算。
#[utoipa::path(
    post,
    path = "/v1/metrics",
    tag = "Metrics",
    request_body = MetricIngest,
    responses(
        (status = 202, description = "数据已进入处理管线", body = PushAck),
        (status = 400, description = "非法数据（指标名为空或数值非有限）", body = crate::api::ApiError)
    )
)]
async fn push_metric(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(ingest): Json<MetricIngest>,
) -> impl IntoResponse {
    let measurement = match Measurement::try_from(ingest) {
        Ok(m) => m,
        Err(msg) => {
            return error_response(StatusCode::BAD_REQUEST, &trace_id, "invalid_metric", &msg);
        }
    };

    let ack = PushAck {
        metric_name: measurement.metric_name.clone(),
        timestamp: measurement.timestamp,
    };
    state.pipeline.process(measurement).await;

    success_response(StatusCode::ACCEPTED, &trace_id, ack)
}

/// 最新值响应
#[derive(Serialize, ToSchema)]
struct LatestResponse {
    /// 指标名称
    metric_name: String,
    /// 最新数值，指标无数据时为 null
    value: Option<f64>,
    /// 最新数据点的时间戳
    timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

/// 查询指标最新值。未知指标返回 value = null 而非 404。
#[utoipa::path(
    get,
    path = "/v1/metrics/{metric_name}/latest",
    tag = "Metrics",
    params(
        ("metric_name" = String, Path, description = "指标名称")
    ),
    responses(
        (status = 200, description = "指标最新值", body = LatestResponse)
    )
)]
async fn latest_metric(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(metric_name): Path<String>,
) -> impl IntoResponse {
    let buffer = state.buffer.lock().unwrap();
    let latest = buffer.latest(&metric_name);
    let response = LatestResponse {
        metric_name: metric_name.clone(),
        value: latest.map(|m| m.value),
        timestamp: latest.map(|m| m.timestamp),
    };
    drop(buffer);

    success_response(StatusCode::OK, &trace_id, response)
}

/// 历史查询参数
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct HistoryParams {
    /// 回溯分钟数（默认 60，受缓冲区保留窗口限制）
    #[param(required = false)]
    minutes: Option<u64>,
}

/// 查询指标的近期历史数据点（按时间升序）。
#[utoipa::path(
    get,
    path = "/v1/metrics/{metric_name}/history",
    tag = "Metrics",
    params(
        ("metric_name" = String, Path, description = "指标名称"),
        HistoryParams
    ),
    responses(
        (status = 200, description = "指标历史数据点列表", body = Vec<Measurement>)
    )
)]
async fn metric_history(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(metric_name): Path<String>,
    Query(params): Query<HistoryParams>,
) -> impl IntoResponse {
    let minutes = params.minutes.unwrap_or(60);
    let since = Utc::now() - Duration::minutes(minutes as i64);
    let points = state
        .buffer
        .lock()
        .unwrap()
        .query(Some(&metric_name), Some(since));

    success_response(StatusCode::OK, &trace_id, points)
}

pub fn metric_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(push_metric))
        .routes(routes!(latest_metric))
        .routes(routes!(metric_history))
}
