use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use syncwave_orchestrator::Scheduler;
use syncwave_store::ContentStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ContentStore>,
    pub scheduler: Arc<Scheduler>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(health_ready))
        .route("/health/live", get(health_live))
        .route("/debug/content/{id}", get(debug_content))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Aggregate critical check: the store must be reachable.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({"status": "ok"}))),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed: store unreachable");
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"status": "unavailable", "error": e.to_string()})))
        }
    }
}

/// Store reachable AND the scheduler has completed its first tick.
async fn health_ready(State(state): State<AppState>) -> impl IntoResponse {
    if !state.scheduler.has_completed_first_tick() {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"status": "starting"})));
    }
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({"status": "ready"}))),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"status": "not_ready", "error": e.to_string()}))),
    }
}

/// Process-up check with no downstream dependency.
async fn health_live() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "live"})))
}

/// Read-only canonical JSON export of one stored record, for operational
/// debugging. No auth — deployment-time reverse-proxy concern.
async fn debug_content(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.store.get_by_ids(&[id.clone()]).await {
        Ok(mut records) => match records.pop() {
            Some(record) => (StatusCode::OK, Json(json!(record))).into_response(),
            None => (StatusCode::NOT_FOUND, Json(json!({"error": "not found", "id": id}))).into_response(),
        },
        Err(e) => {
            tracing::error!(error = %e, content_id = %id, "debug content lookup failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": e.to_string()}))).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use syncwave_events::testing::FakePublisher;
    use syncwave_gateway::ProviderGateway;
    use syncwave_model::content::{VideoContent, VideoMetrics};
    use syncwave_model::{CanonicalContent, ContentRecord};
    use syncwave_orchestrator::{FreshnessJob, SyncOrchestrator};
    use syncwave_store::testing::FakeStore;
    use tower::ServiceExt;

    fn test_state() -> (Arc<FakeStore>, AppState) {
        let fake = Arc::new(FakeStore::new());
        let store: Arc<dyn ContentStore> = fake.clone();
        let gateway = Arc::new(ProviderGateway::new(vec![]));
        let publisher = Arc::new(FakePublisher::new());
        let orchestrator = Arc::new(SyncOrchestrator::new(gateway, store.clone(), publisher.clone(), 500));
        let freshness = Arc::new(FreshnessJob::new(store.clone(), publisher));
        let scheduler = Arc::new(Scheduler::new("*/5 * * * *", "0 2 * * *", orchestrator, freshness, store.clone()).unwrap());
        (fake, AppState { store, scheduler })
    }

    #[tokio::test]
    async fn health_live_never_touches_the_store() {
        let (_fake, state) = test_state();
        let app = build_router(state);
        let response = app
            .oneshot(Request::builder().uri("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_ready_is_unavailable_before_the_first_tick() {
        let (_fake, state) = test_state();
        let app = build_router(state);
        let response = app
            .oneshot(Request::builder().uri("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn debug_content_round_trips_a_seeded_record() {
        let (fake, state) = test_state();
        let content = CanonicalContent::Video(VideoContent {
            id: "p1_a".into(),
            title: "A".into(),
            published_at: chrono::Utc::now(),
            categories: vec!["x".into()],
            source_provider: "p1".into(),
            metrics: VideoMetrics {
                views: 10,
                likes: 1,
                duration: std::time::Duration::from_secs(60),
            },
        });
        fake.seed(ContentRecord::new_unscored(content, chrono::Utc::now()));

        let app = build_router(state);
        let response = app
            .oneshot(Request::builder().uri("/debug/content/p1_a").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn debug_content_is_not_found_for_an_unknown_id() {
        let (_fake, state) = test_state();
        let app = build_router(state);
        let response = app
            .oneshot(Request::builder().uri("/debug/content/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
