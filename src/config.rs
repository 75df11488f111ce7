//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys) are referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`. Wallet configuration carries
//! addresses only — private keys are deliberately not representable here.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub hunting: HuntingConfig,
    pub mining: MiningConfig,
    pub wallet: WalletConfig,
    pub contracts: ContractsConfig,
    pub monitor: MonitorConfig,
    pub storage: StorageConfig,
    pub api: ApiConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    pub name: String,
    /// Start the optional operations (hunting, mining) immediately after
    /// the engine comes up, without waiting for an API command.
    #[serde(default)]
    pub auto_start_operations: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HuntingConfig {
    /// Seconds between hunting cycles.
    pub interval_secs: u64,
    /// Per-source fetch timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    /// Minimum score for a candidate to be persisted.
    pub min_score: f64,
    /// Maximum sell-order price (native currency) still considered cheap.
    pub max_price_native: f64,
    pub sources: SourcesConfig,
    pub scoring: ScoringConfig,
}

fn default_fetch_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    pub opensea: OpenSeaConfig,
    pub rarible: RaribleConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenSeaConfig {
    pub enabled: bool,
    /// Env var holding the optional OpenSea API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RaribleConfig {
    pub enabled: bool,
}

/// Scoring weights. These are calibration knobs, not business rules —
/// defaults mirror the established heuristic.
#[derive(Debug, Deserialize, Clone)]
pub struct ScoringConfig {
    #[serde(default = "default_base_score")]
    pub base: f64,
    #[serde(default = "default_keyword_bonus")]
    pub keyword_bonus: f64,
    #[serde(default = "default_image_bonus")]
    pub image_bonus: f64,
    #[serde(default = "default_discovery_bonus")]
    pub discovery_bonus: f64,
    #[serde(default = "default_free_bonus")]
    pub free_bonus: f64,
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
    /// Per-source reliability bonus; sources not listed get the default.
    #[serde(default)]
    pub source_reliability: HashMap<String, f64>,
    #[serde(default = "default_reliability")]
    pub default_reliability: f64,
}

fn default_base_score() -> f64 {
    5.0
}
fn default_keyword_bonus() -> f64 {
    2.0
}
fn default_image_bonus() -> f64 {
    1.0
}
fn default_discovery_bonus() -> f64 {
    1.0
}
fn default_free_bonus() -> f64 {
    3.0
}
fn default_reliability() -> f64 {
    0.5
}
fn default_keywords() -> Vec<String> {
    ["art", "pixel", "punk", "ape", "cat"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base: default_base_score(),
            keyword_bonus: default_keyword_bonus(),
            image_bonus: default_image_bonus(),
            discovery_bonus: default_discovery_bonus(),
            free_bonus: default_free_bonus(),
            keywords: default_keywords(),
            source_reliability: HashMap::new(),
            default_reliability: default_reliability(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MiningConfig {
    pub enabled: bool,
    /// Coins to mine, e.g. ["ETH", "BTC"].
    pub coins: Vec<String>,
    /// Payout wallet address (never a key).
    pub wallet_address: String,
    pub worker_name: String,
    /// Seconds between stats refresh passes.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Bounded wait for graceful process termination, in seconds.
    #[serde(default = "default_terminate_timeout")]
    pub terminate_timeout_secs: u64,
    /// Per-coin miner launch settings.
    pub miners: HashMap<String, MinerConfig>,
}

fn default_refresh_interval() -> u64 {
    60
}
fn default_terminate_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct MinerConfig {
    pub executable: String,
    pub algorithm: String,
    pub pool_endpoint: String,
    /// Local HTTP endpoint the miner exposes for stats queries.
    pub api_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WalletConfig {
    pub enabled: bool,
    pub address: String,
    /// Network name → JSON-RPC endpoint.
    pub networks: HashMap<String, String>,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContractsConfig {
    pub enabled: bool,
    #[serde(default = "default_contract_interval")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub watched: Vec<WatchedContractConfig>,
}

fn default_contract_interval() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct WatchedContractConfig {
    pub name: String,
    pub address: String,
    pub network: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default = "default_monitor_interval")]
    pub interval_secs: u64,
}

fn default_monitor_interval() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// SQLite database path, e.g. "prospector.db".
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    /// Rows returned by the top-opportunities query in status payloads.
    #[serde(default = "default_top_n")]
    pub top_opportunities: i64,
    /// Estimated native value per discovered opportunity — a calibration
    /// knob with no derivation, kept configurable on purpose.
    #[serde(default = "default_estimated_value")]
    pub estimated_value_per_opportunity: f64,
}

fn default_top_n() -> i64 {
    10
}
fn default_estimated_value() -> f64 {
    0.01
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
