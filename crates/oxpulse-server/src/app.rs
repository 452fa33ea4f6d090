use crate::state::AppState;
use crate::{api, logging, ws};
use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "oxpulse API",
        description = "oxpulse 实时指标分析引擎 REST API",
    ),
    tags(
        (name = "Health", description = "服务健康检查"),
        (name = "Metrics", description = "指标摄取与查询"),
        (name = "Alerts", description = "告警规则管理"),
        (name = "Aggregations", description = "聚合规则管理")
    )
)]
struct ApiDoc;

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn build_http_app(state: AppState) -> Router {
    let (api_router, api_spec) = api::routes().split_for_parts();

    let mut spec = ApiDoc::openapi();
    spec.merge(api_spec);

    let cors = cors_layer(&state.config.cors_allowed_origins);

    api_router
        .route("/ws/{client_id}", get(ws::ws_handler))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/v1/openapi.json", spec))
        .layer(cors)
        .layer(middleware::from_fn(logging::request_logging))
}
