use axum::{routing, Router};
use metrics_exporter_prometheus::PrometheusHandle;

pub fn app(metrics: Option<PrometheusHandle>) -> Router {
    let router = Router::new().route("/", routing::get(index));

    common_metrics::setup_metrics_routes(router, metrics)
}

pub async fn index() -> &'static str {
    "ingest producer"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt; // for `collect`
    use tower::ServiceExt; // for `call`, `oneshot`, and `ready`

    #[tokio::test]
    async fn index() {
        let app = app(None);

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ingest producer");
    }

    #[tokio::test]
    async fn metrics_without_recorder() {
        let app = app(None);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"no metrics recorder installed");
    }
}
