//! # Ops HTTP Surface
//!
//! A thin axum router exposing `/health`, `/status`, and `/metrics` for
//! operators (liveness probes, dashboards, Prometheus scraping). This is
//! deliberately not a presentation layer — no chat submission, no SSE/WS
//! fan-out of gossip events, no static assets. That surface is an explicit
//! non-goal; local subscribers read the Event Bus directly from `core`.
//!
//! ## Endpoints
//!
//! | Method | Path       | Description                      |
//! |--------|------------|----------------------------------|
//! | GET    | `/health`  | Liveness probe                   |
//! | GET    | `/status`  | Node id, membership, diagnostics |
//! | GET    | `/metrics` | Prometheus text exposition       |

use axum::{
    http::Method,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use meshgossip_core::gossip::DiagnosticsSnapshot;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::metrics::{metrics_handler, SharedMetrics};

/// Point-in-time membership view the engine loop publishes after every
/// tick and every membership change, for the ops surface to read without
/// touching the engine itself (which is single-writer, owned by the
/// engine-loop task).
#[derive(Debug, Clone, Default)]
pub struct StatusSnapshot {
    pub node_id: String,
    pub peer_count: usize,
    pub direct_connections: usize,
    pub diagnostics: DiagnosticsSnapshot,
}

pub type SharedStatus = Arc<RwLock<StatusSnapshot>>;

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Latest membership/diagnostics snapshot, refreshed by the engine loop.
    pub status: SharedStatus,
    /// Reference to Prometheus metrics for `/metrics`.
    pub metrics: SharedMetrics,
}

/// Builds the axum [`Router`] with the ops routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Response payload for `GET /status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub node_id: String,
    pub peer_count: usize,
    pub direct_connections: usize,
    pub diagnostics: DiagnosticsSnapshot,
}

/// `GET /health` — returns 200 if the node is alive.
///
/// This is the liveness probe for orchestrators (k8s, systemd, etc.). It
/// intentionally does not check membership health — that belongs in `/status`.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `GET /status` — node id, membership count, and diagnostics snapshot.
async fn status_handler(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl IntoResponse {
    let snapshot = state.status.read().clone();
    Json(StatusResponse {
        version: state.version,
        node_id: snapshot.node_id,
        peer_count: snapshot.peer_count,
        direct_connections: snapshot.direct_connections,
        diagnostics: snapshot.diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::NodeMetrics;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn state() -> AppState {
        AppState {
            version: "0.1.0".to_string(),
            status: Arc::new(RwLock::new(StatusSnapshot {
                node_id: "abc123".to_string(),
                peer_count: 2,
                direct_connections: 2,
                diagnostics: DiagnosticsSnapshot::default(),
            })),
            metrics: Arc::new(NodeMetrics::new()),
        }
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let app = create_router(state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn status_reflects_the_latest_snapshot() {
        let app = create_router(state());
        let response = app
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["node_id"], "abc123");
        assert_eq!(json["peer_count"], 2);
    }

    #[tokio::test]
    async fn metrics_endpoint_serves_prometheus_text() {
        let app = create_router(state());
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
