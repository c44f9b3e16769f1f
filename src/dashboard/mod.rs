//! Control API — Axum web server for monitoring and operating the session.
//!
//! Serves a small JSON API: read endpoints render the session view, POST
//! endpoints forward commands (start, stop, force-restart, default entry
//! price, market URL). CORS enabled for local development.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info};

use routes::AppState;

/// Bind the control server and serve it on a background task.
pub async fn spawn_dashboard(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind control port {port}"))?;
    info!(port, "Control API listening on http://localhost:{port}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Control API server error");
        }
    });

    Ok(())
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::exact(HeaderValue::from_static("*")))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        // Read
        .route("/api/status", get(routes::get_status))
        .route("/api/ladder", get(routes::get_ladder))
        .route("/api/trades", get(routes::get_trades))
        .route("/health", get(routes::health))
        // Control
        .route("/api/start", post(routes::post_start))
        .route("/api/stop", post(routes::post_stop))
        .route("/api/restart", post(routes::post_restart))
        .route("/api/default-price", post(routes::post_default_price))
        .route("/api/market", post(routes::post_market))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
