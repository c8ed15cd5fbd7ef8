//! REST adapter over the market pipeline
//!
//! Thin shim: every endpoint delegates to run_cycle or the session
//! handle. No transport is intrinsic to the core.

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::error::ReaderError;
use crate::models::MarketSnapshot;
use crate::pipeline::MarketPipeline;

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<MarketPipeline>,
}

/// =============================
/// Endpoints
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn run_cycle(
    State(state): State<ApiState>,
    Json(snapshot): Json<MarketSnapshot>,
) -> (StatusCode, Json<ApiResponse>) {
    info!(market = %snapshot.market_ticker, "Received cycle request");

    match state.pipeline.run_cycle(&snapshot).await {
        Ok(report) => (StatusCode::OK, Json(ApiResponse::success(report))),
        Err(ReaderError::CycleInProgress) => (
            StatusCode::CONFLICT,
            Json(ApiResponse::error("cycle already in progress".to_string())),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Cycle failed: {}", e))),
        ),
    }
}

async fn session_state(State(state): State<ApiState>) -> Json<ApiResponse> {
    let snapshot = state.pipeline.session_state().await;
    Json(ApiResponse::success(snapshot))
}

#[derive(Debug, Deserialize)]
pub struct SettlementRequest {
    pub pnl: f64,
}

async fn record_settlement(
    State(state): State<ApiState>,
    Json(req): Json<SettlementRequest>,
) -> Json<ApiResponse> {
    state.pipeline.record_trade_result(req.pnl).await;
    let snapshot = state.pipeline.session_state().await;
    Json(ApiResponse::success(snapshot))
}

/// =============================
/// Router / Server Startup
/// =============================

pub fn create_router(pipeline: Arc<MarketPipeline>) -> Router {
    let state = ApiState { pipeline };

    Router::new()
        .route("/health", get(health))
        .route("/api/cycle", post(run_cycle))
        .route("/api/session", get(session_state))
        .route("/api/settlement", post(record_settlement))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

pub async fn start_server(
    pipeline: Arc<MarketPipeline>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(pipeline);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response_wraps_data() {
        let response = ApiResponse::success(serde_json::json!({"ok": true}));
        assert!(response.success);
        assert!(response.error.is_none());

        let failure = ApiResponse::error("boom".to_string());
        assert!(!failure.success);
        assert_eq!(failure.error.as_deref(), Some("boom"));
    }
}
