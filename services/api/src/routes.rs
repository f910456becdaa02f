use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use placement_portal::workflows::placement::{
    placement_router, DocumentStore, IdentityProvider, PlacementRepository, PlacementService,
};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Placement API plus the operational probes.
pub(crate) fn with_placement_routes<R>(
    service: Arc<PlacementService<R>>,
    identity: Arc<dyn IdentityProvider>,
    documents: Arc<dyn DocumentStore>,
) -> Router
where
    R: PlacementRepository + 'static,
{
    placement_router(service, identity, documents)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck(Extension(state): Extension<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "storage": state.storage }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    if state.readiness.load(Ordering::Acquire) {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "initializing" })),
        )
    }
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
