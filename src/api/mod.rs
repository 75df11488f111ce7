//! Control API — Axum web server over the orchestrator.
//!
//! Serves a REST API for engine lifecycle, miner control, and status
//! queries. CORS enabled for local development.

pub mod routes;

use anyhow::Result;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use routes::{ApiState, AppState};

use crate::engine::Orchestrator;

/// Start the API web server.
///
/// This spawns a background task — it doesn't block.
pub fn spawn_api(orchestrator: Arc<Orchestrator>, port: u16) -> Result<()> {
    let state: AppState = Arc::new(ApiState { orchestrator });
    let app = build_router(state);

    tokio::spawn(async move {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        info!(port, "API server starting on http://localhost:{port}");

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .expect("Failed to bind API port");

        axum::serve(listener, app).await.expect("API server error");
    });

    Ok(())
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin("*".parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        // Engine lifecycle
        .route("/api/engine/start", post(routes::start_operations))
        .route("/api/engine/stop", post(routes::stop_operations))
        .route("/api/engine/emergency-stop", post(routes::emergency_stop))
        .route("/api/engine/optimize", post(routes::optimize))
        .route("/api/engine/status", get(routes::get_status))
        .route("/api/engine/profit-report", get(routes::get_profit_report))
        // Opportunities
        .route("/api/opportunities", get(routes::get_opportunities))
        // Miners
        .route("/api/miners", get(routes::get_miners))
        .route("/api/miners/:coin/start", post(routes::start_miner))
        .route("/api/miners/:coin/stop", post(routes::stop_miner))
        // Wallet and contracts
        .route("/api/wallet", get(routes::get_wallet))
        .route(
            "/api/contracts",
            get(routes::get_contracts).post(routes::add_contract),
        )
        // Logs and health
        .route("/api/logs", get(routes::get_logs))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}
