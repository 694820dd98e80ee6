use axum::extract::DefaultBodyLimit;
use axum::{routing, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

use super::transform;

pub fn app(metrics: Option<PrometheusHandle>, max_body_size: usize) -> Router {
    let router = Router::new()
        .route("/", routing::get(index))
        .route(
            "/transform",
            routing::post(transform::post).layer(DefaultBodyLimit::max(max_body_size)),
        )
        .layer(TraceLayer::new_for_http());

    common_metrics::setup_metrics_routes(router, metrics)
}

pub async fn index() -> &'static str {
    "ingest transformer"
}
