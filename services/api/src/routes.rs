use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use kost_core::lifecycle::{
    lifecycle_router, LifecycleServices, LifecycleStore, NotificationSink,
};
use serde_json::json;

use crate::infra::AppState;

pub(crate) fn with_lifecycle_routes<S, N>(services: Arc<LifecycleServices<S, N>>) -> axum::Router
where
    S: LifecycleStore + 'static,
    N: NotificationSink + 'static,
{
    lifecycle_router(services)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use kost_core::config::BillingConfig;
    use kost_core::lifecycle::{InMemoryStore, RecordingSink};
    use tower::ServiceExt;

    fn test_services() -> Arc<LifecycleServices<InMemoryStore, RecordingSink>> {
        Arc::new(LifecycleServices::new(
            Arc::new(InMemoryStore::default()),
            Arc::new(RecordingSink::default()),
            BillingConfig::default(),
        ))
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn lifecycle_routes_are_mounted() {
        let app = with_lifecycle_routes(test_services());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/rooms")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("request completes");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
