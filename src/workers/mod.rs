//! External worker process management.
//!
//! Defines the `WorkerHandle` / `WorkerSpawner` seam the pool operates
//! through, and the production implementation that launches miner
//! binaries as child processes and reads their stats from the miner's
//! local HTTP status endpoint.
//!
//! Nothing in here ever holds keys or moves funds — launch configs
//! carry a payout address only.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::{MinerConfig, MiningConfig};
use crate::types::WorkerStats;

/// Worker process failures, separated so callers can distinguish a bad
/// config (synchronous rejection) from a runtime fault (logged, skipped).
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("no miner configuration for coin {0}")]
    UnknownCoin(String),
    #[error("miner process failed to launch: {0}")]
    SpawnFailed(String),
    #[error("miner process exited during startup")]
    DiedOnStartup,
    #[error("miner status query failed: {0}")]
    StatsUnavailable(String),
}

/// Fully resolved launch settings for one coin's worker.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub coin: String,
    pub executable: String,
    pub algorithm: String,
    pub pool_endpoint: String,
    pub wallet_address: String,
    pub worker_name: String,
    pub api_url: String,
}

impl LaunchConfig {
    /// Resolve the static per-coin launch configuration from the mining
    /// config, or fail with `UnknownCoin`.
    pub fn resolve(cfg: &MiningConfig, coin: &str) -> Result<Self, WorkerError> {
        let miner: &MinerConfig = cfg
            .miners
            .get(coin)
            .ok_or_else(|| WorkerError::UnknownCoin(coin.to_string()))?;
        Ok(Self {
            coin: coin.to_string(),
            executable: miner.executable.clone(),
            algorithm: miner.algorithm.clone(),
            pool_endpoint: miner.pool_endpoint.clone(),
            wallet_address: cfg.wallet_address.clone(),
            worker_name: cfg.worker_name.clone(),
            api_url: miner.api_url.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Opaque reference to an externally spawned compute process.
#[async_trait]
pub trait WorkerHandle: Send + Sync {
    /// Whether the underlying process is still running.
    async fn is_alive(&self) -> bool;

    /// Graceful stop with a bounded wait, then force-kill.
    async fn terminate(&self, timeout: Duration) -> Result<()>;

    /// Pull current stats from the worker's own status query.
    async fn poll_stats(&self) -> Result<WorkerStats>;
}

/// Spawns worker handles from launch configs.
#[async_trait]
pub trait WorkerSpawner: Send + Sync {
    async fn spawn(&self, config: &LaunchConfig) -> Result<Box<dyn WorkerHandle>, WorkerError>;
}

// ---------------------------------------------------------------------------
// Miner process implementation
// ---------------------------------------------------------------------------

/// Shape of the miner's local `/summary` status response.
#[derive(Debug, Deserialize)]
struct MinerSummary {
    /// Hashrate in H/s.
    #[serde(default)]
    hashrate: f64,
    #[serde(default)]
    accepted_count: i64,
    #[serde(default)]
    rejected_count: i64,
}

/// A live miner child process plus its stats endpoint.
pub struct MinerProcess {
    child: Mutex<Child>,
    http: Client,
    api_url: String,
}

#[async_trait]
impl WorkerHandle for MinerProcess {
    async fn is_alive(&self) -> bool {
        let mut child = self.child.lock().await;
        matches!(child.try_wait(), Ok(None))
    }

    async fn terminate(&self, timeout: Duration) -> Result<()> {
        let mut child = self.child.lock().await;
        if matches!(child.try_wait(), Ok(Some(_))) {
            return Ok(());
        }

        child.start_kill().ok();
        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(?status, "Miner process exited");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Wait on miner process failed, force-killing");
                child.kill().await.ok();
                Ok(())
            }
            Err(_) => {
                warn!("Miner did not exit within the timeout, force-killing");
                child.kill().await.ok();
                Ok(())
            }
        }
    }

    async fn poll_stats(&self) -> Result<WorkerStats> {
        let url = format!("{}/summary", self.api_url.trim_end_matches('/'));
        let summary: MinerSummary = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| WorkerError::StatsUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| WorkerError::StatsUnavailable(e.to_string()))?;

        Ok(WorkerStats {
            hashrate: summary.hashrate / 1e6, // H/s → MH/s
            shares_accepted: summary.accepted_count,
            shares_rejected: summary.rejected_count,
            earnings_today: 0.0,
            earnings_total: 0.0,
        })
    }
}

/// Production spawner: launches the configured miner binary.
pub struct ProcessSpawner;

#[async_trait]
impl WorkerSpawner for ProcessSpawner {
    async fn spawn(&self, config: &LaunchConfig) -> Result<Box<dyn WorkerHandle>, WorkerError> {
        let user = format!("{}.{}", config.wallet_address, config.worker_name);
        let api_bind = config
            .api_url
            .trim_start_matches("http://")
            .trim_end_matches('/');

        let mut child = Command::new(&config.executable)
            .arg("-a")
            .arg(&config.algorithm)
            .arg("-o")
            .arg(&config.pool_endpoint)
            .arg("-u")
            .arg(&user)
            .arg("-w")
            .arg(&config.worker_name)
            .arg("--api-bind-http")
            .arg(api_bind)
            .arg("--no-watchdog")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

        // Give the process a moment; a miner that dies immediately
        // (bad pool, missing GPU) must not be recorded as active.
        tokio::time::sleep(Duration::from_secs(2)).await;
        if let Ok(Some(status)) = child.try_wait() {
            warn!(coin = %config.coin, ?status, "Miner exited during startup");
            return Err(WorkerError::DiedOnStartup);
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

        Ok(Box::new(MinerProcess {
            child: Mutex::new(child),
            http,
            api_url: config.api_url.clone(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
