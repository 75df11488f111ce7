//! Shared types for the PROSPECTOR engine.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that source, worker, chain,
//! and engine modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Raw listings (pre-normalization)
// ---------------------------------------------------------------------------

/// A raw marketplace listing as returned by a source, before the
/// free/cheap filter and scoring have been applied.
#[derive(Debug, Clone)]
pub struct RawListing {
    /// Source identifier: "opensea" | "rarible" | ...
    pub source: String,
    pub contract_address: String,
    pub token_id: String,
    pub name: Option<String>,
    pub collection_name: Option<String>,
    /// Lowest active sell-order price in minor units (wei).
    /// `None` means no active sell order — potentially free.
    pub best_sell_order_wei: Option<f64>,
    pub marketplace_url: Option<String>,
    pub image_url: Option<String>,
    /// The full source record, preserved for later inspection.
    pub raw: serde_json::Value,
}

/// Conversion factor between wei and native-currency units.
pub const WEI_PER_NATIVE: f64 = 1e18;

impl RawListing {
    /// Lowest sell-order price in native currency, if one exists.
    pub fn best_sell_order_native(&self) -> Option<f64> {
        self.best_sell_order_wei.map(|w| w / WEI_PER_NATIVE)
    }
}

// ---------------------------------------------------------------------------
// Opportunities
// ---------------------------------------------------------------------------

/// Lifecycle status of a persisted opportunity.
///
/// The hunting loop only ever creates rows in `Discovered`; transitions
/// to `Purchased` / `Passed` are made by an external actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpportunityStatus {
    Discovered,
    Purchased,
    Passed,
}

impl fmt::Display for OpportunityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpportunityStatus::Discovered => write!(f, "discovered"),
            OpportunityStatus::Purchased => write!(f, "purchased"),
            OpportunityStatus::Passed => write!(f, "passed"),
        }
    }
}

impl OpportunityStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "purchased" => OpportunityStatus::Purchased,
            "passed" => OpportunityStatus::Passed,
            _ => OpportunityStatus::Discovered,
        }
    }
}

/// A normalized opportunity record.
///
/// (source, contract_address, token_id) is the natural key. The score
/// is assigned exactly once at discovery time and is immutable —
/// re-discovery never rescores an existing row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityCandidate {
    pub source: String,
    pub contract_address: String,
    pub token_id: String,
    pub name: Option<String>,
    pub collection_name: Option<String>,
    /// Price in native currency (ETH-equivalent), ≥ 0.
    pub price_native: f64,
    /// Heuristic score in [0, 10].
    pub score: f64,
    pub marketplace_url: Option<String>,
    pub image_url: Option<String>,
    pub metadata: serde_json::Value,
    pub discovered_at: DateTime<Utc>,
    pub status: OpportunityStatus,
}

impl fmt::Display for OpportunityCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}:{} ({} | {:.2} native | score {:.1})",
            self.source,
            self.contract_address,
            self.token_id,
            self.name.as_deref().unwrap_or("unnamed"),
            self.price_native,
            self.score,
        )
    }
}

impl OpportunityCandidate {
    /// Helper to build a test candidate with sensible defaults.
    #[cfg(test)]
    pub fn sample() -> Self {
        OpportunityCandidate {
            source: "opensea".to_string(),
            contract_address: "0xabc0000000000000000000000000000000000001".to_string(),
            token_id: "42".to_string(),
            name: Some("Pixel Cat #42".to_string()),
            collection_name: Some("Pixel Cats".to_string()),
            price_native: 0.0,
            score: 9.5,
            marketplace_url: Some("https://example.com/asset/42".to_string()),
            image_url: Some("https://example.com/img/42.png".to_string()),
            metadata: serde_json::json!({"token_id": "42"}),
            discovered_at: Utc::now(),
            status: OpportunityStatus::Discovered,
        }
    }
}

// ---------------------------------------------------------------------------
// Worker operations (mining)
// ---------------------------------------------------------------------------

/// Status of a per-coin worker operation.
///
/// `Error` is entered only via detected process death, never via a
/// user-initiated stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Inactive,
    Active,
    Error,
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerStatus::Inactive => write!(f, "inactive"),
            WorkerStatus::Active => write!(f, "active"),
            WorkerStatus::Error => write!(f, "error"),
        }
    }
}

impl WorkerStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => WorkerStatus::Active,
            "error" => WorkerStatus::Error,
            _ => WorkerStatus::Inactive,
        }
    }
}

/// Point-in-time statistics pulled from a worker's own status query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerStats {
    /// Hashrate in MH/s.
    pub hashrate: f64,
    pub shares_accepted: i64,
    pub shares_rejected: i64,
    pub earnings_today: f64,
    pub earnings_total: f64,
}

/// Persisted state of one mining operation, keyed by coin symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerOperation {
    pub coin: String,
    pub pool_endpoint: String,
    pub wallet_address: String,
    pub hashrate: f64,
    pub shares_accepted: i64,
    pub shares_rejected: i64,
    pub earnings_today: f64,
    pub earnings_total: f64,
    pub status: WorkerStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub last_update: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// System logs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    #[serde(rename = "INFO")]
    Info,
    #[serde(rename = "WARNING")]
    Warning,
    #[serde(rename = "ERROR")]
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARNING"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl LogLevel {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "WARNING" => LogLevel::Warning,
            "ERROR" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

/// Append-only audit trail entry. Created by any component reporting a
/// notable event or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemLogEntry {
    pub level: LogLevel,
    pub module: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl SystemLogEntry {
    pub fn new(level: LogLevel, module: &str, message: &str) -> Self {
        Self {
            level,
            module: module.to_string(),
            message: message.to_string(),
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

// ---------------------------------------------------------------------------
// Operation status
// ---------------------------------------------------------------------------

/// In-memory map of which subsystems are currently active.
///
/// Owned exclusively by the Orchestrator; reset to all-false on stop.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OperationStatusSet {
    pub nft_hunting: bool,
    pub crypto_mining: bool,
    pub wallet_monitoring: bool,
    pub smart_contracts: bool,
    pub system_monitoring: bool,
}

impl OperationStatusSet {
    pub fn reset(&mut self) {
        *self = OperationStatusSet::default();
    }

    pub fn any_active(&self) -> bool {
        self.nft_hunting
            || self.crypto_mining
            || self.wallet_monitoring
            || self.smart_contracts
            || self.system_monitoring
    }
}

// ---------------------------------------------------------------------------
// Aggregated status payloads
// ---------------------------------------------------------------------------

/// Headline numbers derived from live + persisted state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusSummary {
    pub total_earnings: f64,
    pub nft_opportunities: usize,
    pub mining_active: bool,
    pub wallet_connected: bool,
    pub contracts_managed: usize,
    pub system_healthy: bool,
}

/// Per-service detail block inside the aggregated status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceDetail {
    pub nft_hunter: HunterDetail,
    pub crypto_miner: MinerDetail,
    pub wallet_manager: WalletDetail,
    pub smart_contracts: ContractDetail,
    pub system_monitor: MonitorDetail,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HunterDetail {
    pub active: bool,
    pub top_opportunities: Vec<OpportunityCandidate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinerDetail {
    pub active: bool,
    pub operations: Vec<WorkerOperation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletDetail {
    pub active: bool,
    pub wallet_address: Option<String>,
    pub connected: bool,
    pub networks: Vec<String>,
    /// Native balance per network.
    pub balances: Vec<NetworkBalance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkBalance {
    pub network: String,
    pub token_symbol: String,
    pub balance: f64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractDetail {
    pub active: bool,
    pub total_contracts: usize,
    pub contracts: Vec<WatchedContractStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchedContractStatus {
    pub name: String,
    pub address: String,
    pub network: String,
    pub deployed: bool,
    pub balance_native: f64,
    pub last_checked: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorDetail {
    pub active: bool,
    pub stats: Option<SystemStats>,
    pub healthy: bool,
}

/// Point-in-time host statistics collected by the system monitor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemStats {
    pub cpu_percent: f64,
    pub cpu_count: usize,
    pub memory_percent: f64,
    pub memory_available_gb: f64,
    pub memory_total_gb: f64,
    pub disk_percent: f64,
    pub disk_free_gb: f64,
    pub disk_total_gb: f64,
    pub process_count: usize,
    pub collected_at: Option<DateTime<Utc>>,
}

/// The composed status view returned by `Orchestrator::get_status`.
///
/// Never absent: on internal failure the orchestrator still returns a
/// well-formed snapshot with `error` populated and best-effort fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStatus {
    pub engine_running: bool,
    pub operation_status: OperationStatusSet,
    pub summary: StatusSummary,
    pub services: ServiceDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub last_update: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Profit report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfitBreakdown {
    pub mining: f64,
    pub nft_opportunities: f64,
    pub smart_contracts: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfitReport {
    pub total_profits: f64,
    pub breakdown: ProfitBreakdown,
    pub nft_count: usize,
    pub mining_active: bool,
    pub contracts_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub generated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
