//! ==============================================================================
//! api.rs - http surface: dashboard, snapshot api, websocket upgrade
//! ==============================================================================
//!
//! routes:
//!     GET /            embedded dashboard page
//!     GET /ws          push channel (see ws.rs)
//!     GET /api/status  cached reading in a success/data envelope
//!     GET /api/health  running flag, device link state, subscriber count
//!     GET /api/ports   serial ports the platform can see
//!
//! everything here only reads from the hub; nothing waits on the serial
//! read loop.
//!
//! ==============================================================================

use crate::domain::{iso_millis, Reading};
use crate::hub::BroadcastHub;
use crate::serial::{self, LinkState, PortInfo};
use axum::{
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;

const DASHBOARD_HTML: &str = include_str!("../static/index.html");

// ==============================================================================
// shared state
// ==============================================================================

#[derive(Clone)]
pub struct ApiState {
    pub hub: Arc<BroadcastHub>,
    pub link: LinkState,
    pub heartbeat: Duration,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub data: Reading,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub success: bool,
    pub status: &'static str,
    /// "connected" or "disconnected"
    pub serial_port: &'static str,
    pub subscribers: usize,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct PortsResponse {
    pub success: bool,
    pub ports: Vec<PortInfo>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// current reading snapshot
pub fn status(hub: &BroadcastHub) -> StatusResponse {
    StatusResponse {
        success: true,
        data: hub.snapshot().as_ref().clone(),
    }
}

/// liveness summary
pub fn health(hub: &BroadcastHub, link: &LinkState) -> HealthResponse {
    HealthResponse {
        success: true,
        status: "running",
        serial_port: if link.is_open() { "connected" } else { "disconnected" },
        subscribers: hub.subscriber_count(),
        timestamp: iso_millis(&chrono::Utc::now()),
    }
}

// ==============================================================================
// router
// ==============================================================================

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/ws", get(ws_handler))
        .route("/api/status", get(status_handler))
        .route("/api/health", get(health_handler))
        .route("/api/ports", get(ports_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn dashboard_handler() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(move |socket| crate::ws::serve_client(socket, state.hub, state.heartbeat))
}

async fn status_handler(State(state): State<ApiState>) -> Json<StatusResponse> {
    Json(status(&state.hub))
}

async fn health_handler(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(health(&state.hub, &state.link))
}

/// port enumeration can touch sysfs / the registry, so it runs off the reactor
async fn ports_handler() -> Response {
    let result = tokio::task::spawn_blocking(serial::list_ports)
        .await
        .map_err(|e| format!("task join error: {}", e))
        .and_then(|r| r.map_err(|e| e.to_string()));

    match result {
        Ok(ports) => Json(PortsResponse { success: true, ports }).into_response(),
        Err(error) => {
            tracing::warn!(error = %error, "port listing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse { success: false, error }),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StateCache;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn state() -> ApiState {
        ApiState {
            hub: Arc::new(BroadcastHub::new(StateCache::new(), 8)),
            link: LinkState::new(),
            heartbeat: Duration::from_secs(30),
        }
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn status_serves_default_before_any_reading() {
        let (code, body) = get_json(router(state()), "/api/status").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["distance"], 0);
        assert_eq!(body["data"]["state"], "GREEN");
        assert!(body["data"]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn status_reflects_latest_reading() {
        let state = state();
        state.hub.publish(Reading::stamp(serde_json::Number::from_f64(12.5).unwrap(), "RED".into()));
        let (_, body) = get_json(router(state), "/api/status").await;
        assert_eq!(body["data"]["distance"], 12.5);
        assert_eq!(body["data"]["state"], "RED");
    }

    #[tokio::test]
    async fn health_reports_link_and_subscribers() {
        let state = state();
        let (_, body) = get_json(router(state.clone()), "/api/health").await;
        assert_eq!(body["status"], "running");
        assert_eq!(body["serialPort"], "disconnected");
        assert_eq!(body["subscribers"], 0);

        state.link.set_open(true);
        let _sub = state.hub.subscribe();
        let (_, body) = get_json(router(state), "/api/health").await;
        assert_eq!(body["serialPort"], "connected");
        assert_eq!(body["subscribers"], 1);
    }

    #[tokio::test]
    async fn health_has_no_side_effects() {
        let state = state();
        let before = state.hub.snapshot();
        let _ = get_json(router(state.clone()), "/api/health").await;
        let _ = get_json(router(state.clone()), "/api/status").await;
        assert!(Arc::ptr_eq(&before, &state.hub.snapshot()));
    }

    #[tokio::test]
    async fn ports_returns_envelope() {
        let (code, body) = get_json(router(state()), "/api/ports").await;
        if code == StatusCode::OK {
            assert_eq!(body["success"], true);
            assert!(body["ports"].is_array());
        } else {
            assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body["success"], false);
            assert!(body["error"].is_string());
        }
    }

    #[tokio::test]
    async fn dashboard_is_html() {
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let resp = router(state()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), 256 * 1024).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("sensor-data"));
    }

    #[tokio::test]
    async fn ws_requires_upgrade() {
        let req = Request::builder().uri("/ws").body(Body::empty()).unwrap();
        let resp = router(state()).oneshot(req).await.unwrap();
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let req = Request::builder().uri("/nope").body(Body::empty()).unwrap();
        let resp = router(state()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
