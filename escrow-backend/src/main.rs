//! Escrow Backend
//!
//! REST companion for the token escrow program. Derives offer and vault
//! addresses, reads open offers from the cluster and returns unsigned
//! make/take/cancel instructions for wallets to sign.

mod error;
mod routes;
mod services;
mod types;

use anyhow::Context;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    middleware::{self, Next},
    response::Response,
    Router,
};
use constant_time_eq::constant_time_eq;
use std::{sync::Arc, time::Duration};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use routes::{health_router, offers_router, AppState};
use services::{OfferReader, RpcAccountReader};
use types::Config;

const API_KEY_HEADER: &str = "x-api-key";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "escrow_backend=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env());

    info!(port = config.port, program_id = %escrow::ID, "Starting escrow backend");
    info!(
        cors_origins = ?config.cors_origins,
        rpc_url = %config.rpc_url,
        api_keys_configured = !config.api_keys.is_empty(),
        "Configuration loaded"
    );

    let reader = RpcAccountReader::new(
        config.rpc_url.clone(),
        Duration::from_secs(config.rpc_timeout_secs),
    )
    .context("building RPC client")?;
    let state = AppState {
        offers: OfferReader::new(Arc::new(reader)),
    };

    let app = build_app(config.clone(), state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    info!(address = %addr, "Server listening");

    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}

fn build_app(config: Arc<Config>, state: AppState) -> Router {
    let cors = build_cors_layer(&config);

    Router::new()
        .merge(health_router(state.clone()))
        .merge(offers_router(state))
        .layer(middleware::from_fn_with_state(config, api_key_middleware))
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(16 * 1024))
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static(API_KEY_HEADER),
        ])
}

/// Rejects requests without a configured `x-api-key`. Health checks and
/// deployments without keys pass through.
async fn api_key_middleware(
    State(config): State<Arc<Config>>,
    headers: HeaderMap,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if request.uri().path() == "/health" || config.api_keys.is_empty() {
        return Ok(next.run(request).await);
    }

    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            warn!(path = %request.uri().path(), "Request missing API key");
            StatusCode::UNAUTHORIZED
        })?;

    // Never log the key itself
    let known = config
        .api_keys
        .iter()
        .any(|key| constant_time_eq(key.as_bytes(), api_key.as_bytes()));
    if !known {
        warn!(path = %request.uri().path(), "Invalid API key provided");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}
