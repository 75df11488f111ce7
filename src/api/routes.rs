//! API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<ApiState>`.
//! Command endpoints answer with an `ActionResponse` envelope; a
//! rejected command (unknown coin, duplicate contract) comes back as
//! 400 with the reason, never a 500.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::WatchedContractConfig;
use crate::engine::Orchestrator;
use crate::types::{
    ContractDetail, EngineStatus, LogLevel, OpportunityCandidate, ProfitReport, SystemLogEntry,
    WalletDetail, WorkerOperation,
};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

pub type AppState = Arc<ApiState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }

    fn rejected(message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            StatusCode::BAD_REQUEST,
            Json(Self {
                success: false,
                message: message.into(),
            }),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<i64>,
    /// "INFO" | "WARNING" | "ERROR"
    pub level: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: bool,
    pub engine_running: bool,
}

// ---------------------------------------------------------------------------
// Engine lifecycle
// ---------------------------------------------------------------------------

/// POST /api/engine/start
pub async fn start_operations(State(state): State<AppState>) -> Json<ActionResponse> {
    state.orchestrator.start_all_operations().await;
    ActionResponse::ok("All operations started")
}

/// POST /api/engine/stop
pub async fn stop_operations(State(state): State<AppState>) -> Json<ActionResponse> {
    state.orchestrator.stop_all_operations().await;
    ActionResponse::ok("All operations stopped")
}

/// POST /api/engine/emergency-stop
pub async fn emergency_stop(State(state): State<AppState>) -> Json<ActionResponse> {
    state.orchestrator.emergency_stop().await;
    ActionResponse::ok("Emergency stop executed")
}

/// POST /api/engine/optimize
pub async fn optimize(State(state): State<AppState>) -> Json<ActionResponse> {
    state.orchestrator.optimize_operations().await;
    ActionResponse::ok("Optimization pass complete")
}

/// GET /api/engine/status
pub async fn get_status(State(state): State<AppState>) -> Json<EngineStatus> {
    Json(state.orchestrator.get_status().await)
}

/// GET /api/engine/profit-report
pub async fn get_profit_report(State(state): State<AppState>) -> Json<ProfitReport> {
    Json(state.orchestrator.get_profit_report().await)
}

// ---------------------------------------------------------------------------
// Opportunities
// ---------------------------------------------------------------------------

/// GET /api/opportunities?limit=N
pub async fn get_opportunities(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<OpportunityCandidate>>, (StatusCode, Json<ActionResponse>)> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    match state.orchestrator.store().top_opportunities(limit).await {
        Ok(rows) => Ok(Json(rows)),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ActionResponse {
                success: false,
                message: e.to_string(),
            }),
        )),
    }
}

// ---------------------------------------------------------------------------
// Miners
// ---------------------------------------------------------------------------

/// GET /api/miners
pub async fn get_miners(
    State(state): State<AppState>,
) -> Result<Json<Vec<WorkerOperation>>, (StatusCode, Json<ActionResponse>)> {
    match state.orchestrator.pool().operations().await {
        Ok(rows) => Ok(Json(rows)),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ActionResponse {
                success: false,
                message: e.to_string(),
            }),
        )),
    }
}

/// POST /api/miners/:coin/start
pub async fn start_miner(
    State(state): State<AppState>,
    Path(coin): Path<String>,
) -> Result<Json<ActionResponse>, (StatusCode, Json<ActionResponse>)> {
    if state.orchestrator.pool().start_one(&coin).await {
        Ok(ActionResponse::ok(format!("Miner for {coin} started")))
    } else {
        Err(ActionResponse::rejected(format!(
            "Could not start a miner for {coin}"
        )))
    }
}

/// POST /api/miners/:coin/stop
pub async fn stop_miner(
    State(state): State<AppState>,
    Path(coin): Path<String>,
) -> Result<Json<ActionResponse>, (StatusCode, Json<ActionResponse>)> {
    if state.orchestrator.pool().stop_one(&coin).await {
        Ok(ActionResponse::ok(format!("Miner for {coin} stopped")))
    } else {
        Err(ActionResponse::rejected(format!(
            "No active miner for {coin}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Wallet and contracts
// ---------------------------------------------------------------------------

/// GET /api/wallet
pub async fn get_wallet(State(state): State<AppState>) -> Json<WalletDetail> {
    Json(state.orchestrator.wallet().detail().await)
}

/// GET /api/contracts
pub async fn get_contracts(State(state): State<AppState>) -> Json<ContractDetail> {
    Json(state.orchestrator.contracts().detail().await)
}

/// POST /api/contracts
pub async fn add_contract(
    State(state): State<AppState>,
    Json(contract): Json<WatchedContractConfig>,
) -> Result<Json<ActionResponse>, (StatusCode, Json<ActionResponse>)> {
    let name = contract.name.clone();
    match state.orchestrator.contracts().add_contract(contract).await {
        Ok(()) => Ok(ActionResponse::ok(format!("Now watching {name}"))),
        Err(e) => Err(ActionResponse::rejected(e.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Logs and health
// ---------------------------------------------------------------------------

/// GET /api/logs?limit=N&level=WARNING
pub async fn get_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<SystemLogEntry>>, (StatusCode, Json<ActionResponse>)> {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let level = match query.level.as_deref() {
        None => None,
        Some(raw) => match raw.to_ascii_uppercase().as_str() {
            "INFO" => Some(LogLevel::Info),
            "WARNING" => Some(LogLevel::Warning),
            "ERROR" => Some(LogLevel::Error),
            _ => {
                return Err(ActionResponse::rejected(format!(
                    "Unknown log level: {raw}"
                )))
            }
        },
    };

    match state.orchestrator.store().recent_logs(limit, level).await {
        Ok(rows) => Ok(Json(rows)),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ActionResponse {
                success: false,
                message: e.to_string(),
            }),
        )),
    }
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = state
        .orchestrator
        .store()
        .health_check()
        .await
        .unwrap_or(false);
    let code = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        code,
        Json(HealthResponse {
            status: if database { "ok" } else { "degraded" }.to_string(),
            database,
            engine_running: state.orchestrator.is_running(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
