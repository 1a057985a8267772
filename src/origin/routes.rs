use crate::origin::server::OriginState;
use crate::origin::store::ClickRecord;

use axum::{
    body::Bytes,
    extract::{Json, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

/// Build all routes for the origin.
pub fn build_routes(state: OriginState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/api/health", get(health_handler))
        // Widget
        .route("/whatsapp/config", get(config_handler))
        .route("/whatsapp/track", post(track_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime: u64,
}

async fn health_handler(State(state): State<OriginState>) -> Json<HealthResponse> {
    let uptime = state.start_time.elapsed().as_secs();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: state.version.clone(),
        uptime,
    })
}

// ============================================================================
// Config
// ============================================================================

async fn config_handler(State(state): State<OriginState>) -> Response {
    match state.store.current().await {
        Ok(Some(payload)) => (
            [(header::CACHE_CONTROL, state.cache_control.clone())],
            Json(payload),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "widget is not configured" })),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to load widget config: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "widget config unavailable" })),
            )
                .into_response()
        }
    }
}

// ============================================================================
// Track
// ============================================================================

/// Everything optional: presence of `configId` is checked by hand so a
/// missing id is a 400 rather than an extractor rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TrackRequest {
    config_id: Option<String>,
    agent_id: Option<String>,
    page_url: Option<String>,
    referrer: Option<String>,
    device_class: Option<String>,
    session_id: Option<String>,
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "success": false, "error": message })),
    )
        .into_response()
}

/// Beacons arrive as `text/plain`, so the body is parsed from raw bytes
/// whatever the content type.
async fn track_handler(
    State(state): State<OriginState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let req: TrackRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            debug!("Rejected track request: {}", e);
            return bad_request("invalid JSON body");
        }
    };

    let config_id = match req.config_id {
        Some(id) if !id.trim().is_empty() => id,
        _ => return bad_request("configId is required"),
    };

    let click = ClickRecord {
        config_id,
        agent_id: req.agent_id.filter(|id| !id.is_empty()),
        page_url: req.page_url.unwrap_or_default(),
        referrer: req.referrer.unwrap_or_default(),
        device_class: req.device_class.unwrap_or_default(),
        session_id: req.session_id.unwrap_or_default(),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        received_at: chrono::Utc::now(),
    };

    let sink = state.sink.clone();
    tokio::spawn(async move {
        let config_id = click.config_id.clone();
        if let Err(e) = sink.record(click).await {
            error!(config_id = %config_id, "Failed to persist click: {}", e);
        }
    });

    Json(json!({ "success": true })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::origin::store::{ConfigStore, SqliteStore, StoreError, TrackingSink};
    use crate::widget::defaults::default_payload;
    use crate::widget::ConfigPayload;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct BrokenStore;

    #[async_trait]
    impl ConfigStore for BrokenStore {
        async fn current(&self) -> Result<Option<ConfigPayload>, StoreError> {
            Err(StoreError::Invalid("disk on fire".into()))
        }
    }

    #[async_trait]
    impl TrackingSink for BrokenStore {
        async fn record(&self, _click: ClickRecord) -> Result<(), StoreError> {
            Err(StoreError::Invalid("disk on fire".into()))
        }
    }

    const CACHE_CONTROL: &str = "public, max-age=60, s-maxage=60, stale-while-revalidate=300";

    fn sqlite_app() -> (TempDir, SqliteStore, Router) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(&dir.path().join("origin.db")).unwrap();
        let shared = Arc::new(store.clone());
        let app = build_routes(OriginState::new(shared.clone(), shared, CACHE_CONTROL.into()));
        (dir, store, app)
    }

    fn broken_app() -> Router {
        let broken = Arc::new(BrokenStore);
        build_routes(OriginState::new(broken.clone(), broken, CACHE_CONTROL.into()))
    }

    fn track(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/whatsapp/track")
            .header(header::CONTENT_TYPE, "text/plain;charset=UTF-8")
            .header(header::USER_AGENT, "test-browser/1.0")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn config_is_served_with_cache_directive() {
        let (_dir, store, app) = sqlite_app();
        store.seed_default().await.unwrap();

        let response = app
            .oneshot(Request::get("/whatsapp/config").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], CACHE_CONTROL);
        let payload: ConfigPayload = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(payload, default_payload());
    }

    #[tokio::test]
    async fn unprovisioned_config_is_not_found() {
        let (_dir, _store, app) = sqlite_app();
        let response = app
            .oneshot(Request::get("/whatsapp/config").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn store_failure_is_a_server_error() {
        let response = broken_app()
            .oneshot(Request::get("/whatsapp/config").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn track_without_config_id_is_rejected() {
        for body in [r#"{"pageUrl": "https://example.com/"}"#, r#"{"configId": ""}"#, "nope"] {
            let response = broken_app().oneshot(track(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
            assert_eq!(body_json(response).await["success"], false);
        }
    }

    #[tokio::test]
    async fn track_succeeds_even_when_persistence_fails() {
        let response = broken_app()
            .oneshot(track(r#"{"configId": "cfg-1", "agentId": "a1"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "success": true }));
    }

    #[tokio::test]
    async fn track_persists_click_with_user_agent() {
        let (_dir, store, app) = sqlite_app();
        let response = app
            .oneshot(track(
                r#"{"configId": "cfg-1", "pageUrl": "https://example.com/a", "deviceClass": "tablet", "sessionId": "wa_1"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Persistence runs detached from the response.
        let mut stats = store.recent_stats(1).await.unwrap();
        for _ in 0..50 {
            if stats.total > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            stats = store.recent_stats(1).await.unwrap();
        }
        assert_eq!(stats.total, 1);
        assert_eq!(stats.by_device, vec![("tablet".to_string(), 1)]);
        assert_eq!(stats.by_agent, vec![(None, 1)]);
    }

    #[tokio::test]
    async fn health_reports_version() {
        let (_dir, _store, app) = sqlite_app();
        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}
