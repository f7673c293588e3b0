//! Health check endpoint
//!
//! Always answers 200 so load balancers keep routing reads that need no RPC;
//! `status` turns `degraded` when the cluster endpoint cannot be reached.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use tracing::warn;

use crate::{routes::AppState, types::HealthResponse};

/// Create health check router
pub fn health_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (status, rpc) = match state.offers.ping().await {
        Ok(()) => ("healthy", "reachable"),
        Err(err) => {
            warn!(error = %err, "RPC endpoint unreachable");
            ("degraded", "unreachable")
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        program_id: escrow::ID.to_string(),
        rpc: rpc.to_string(),
        timestamp: Utc::now().timestamp(),
    })
}
