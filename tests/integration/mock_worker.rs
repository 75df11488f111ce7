//! Mock worker spawner for integration testing.
//!
//! Provides a deterministic `WorkerSpawner` whose handles can be
//! killed, fed stats, or made to fail from test code — no real miner
//! binaries involved.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use prospector::types::WorkerStats;
use prospector::workers::{LaunchConfig, WorkerError, WorkerHandle, WorkerSpawner};

/// Shared handle state, kept outside the pool so tests can reach it
/// after the handle is boxed away.
pub struct MockWorker {
    pub id: String,
    pub coin: String,
    alive: Arc<AtomicBool>,
    stats: Arc<Mutex<WorkerStats>>,
}

impl MockWorker {
    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn set_stats(&self, stats: WorkerStats) {
        *self.stats.lock().unwrap() = stats;
    }
}

struct MockHandle {
    alive: Arc<AtomicBool>,
    stats: Arc<Mutex<WorkerStats>>,
    stats_fail: bool,
}

#[async_trait]
impl WorkerHandle for MockHandle {
    async fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn terminate(&self, _timeout: Duration) -> Result<()> {
        self.alive.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn poll_stats(&self) -> Result<WorkerStats> {
        if self.stats_fail {
            anyhow::bail!("stats endpoint unreachable");
        }
        Ok(self.stats.lock().unwrap().clone())
    }
}

/// A mock spawner that records every spawned worker.
pub struct MockSpawner {
    /// Coins whose spawn attempts must fail.
    fail_coins: Mutex<Vec<String>>,
    /// Whether handles report stats or error.
    stats_fail: AtomicBool,
    /// Every worker ever spawned, newest last.
    spawned: Mutex<Vec<Arc<MockWorker>>>,
}

impl MockSpawner {
    pub fn new() -> Self {
        Self {
            fail_coins: Mutex::new(Vec::new()),
            stats_fail: AtomicBool::new(false),
            spawned: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_spawns_for(&self, coin: &str) {
        self.fail_coins.lock().unwrap().push(coin.to_string());
    }

    pub fn set_stats_fail(&self, fail: bool) {
        self.stats_fail.store(fail, Ordering::SeqCst);
    }

    pub fn spawned_workers(&self) -> Vec<Arc<MockWorker>> {
        self.spawned.lock().unwrap().clone()
    }

    pub fn spawn_count(&self) -> usize {
        self.spawned.lock().unwrap().len()
    }

    /// The most recent worker for a coin, if any.
    pub fn worker_for(&self, coin: &str) -> Option<Arc<MockWorker>> {
        self.spawned
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|w| w.coin == coin)
            .cloned()
    }
}

impl Default for MockSpawner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkerSpawner for MockSpawner {
    async fn spawn(&self, config: &LaunchConfig) -> Result<Box<dyn WorkerHandle>, WorkerError> {
        if self.fail_coins.lock().unwrap().contains(&config.coin) {
            return Err(WorkerError::DiedOnStartup);
        }

        let alive = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(Mutex::new(WorkerStats::default()));
        let worker = Arc::new(MockWorker {
            id: format!("MOCK-{}", Uuid::new_v4()),
            coin: config.coin.clone(),
            alive: Arc::clone(&alive),
            stats: Arc::clone(&stats),
        });
        self.spawned.lock().unwrap().push(worker);

        Ok(Box::new(MockHandle {
            alive,
            stats,
            stats_fail: self.stats_fail.load(Ordering::SeqCst),
        }))
    }
}

/// Standard mining config used across the scenarios.
pub fn mining_config(coins: &[&str]) -> prospector::config::MiningConfig {
    let miners: HashMap<_, _> = coins
        .iter()
        .map(|c| {
            (
                c.to_string(),
                prospector::config::MinerConfig {
                    executable: "mock-miner".to_string(),
                    algorithm: "mockhash".to_string(),
                    pool_endpoint: format!("stratum+tcp://{}.pool.example:4444", c.to_lowercase()),
                    api_url: "http://127.0.0.1:4067".to_string(),
                },
            )
        })
        .collect();

    prospector::config::MiningConfig {
        enabled: true,
        coins: coins.iter().map(|c| c.to_string()).collect(),
        wallet_address: "0x0000000000000000000000000000000000000001".to_string(),
        worker_name: "test-rig".to_string(),
        refresh_interval_secs: 60,
        terminate_timeout_secs: 1,
        miners,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_spawner_records_workers() {
        let spawner = MockSpawner::new();
        let cfg = mining_config(&["ETH"]);
        let launch = LaunchConfig::resolve(&cfg, "ETH").unwrap();

        let handle = spawner.spawn(&launch).await.unwrap();
        assert!(handle.is_alive().await);
        assert_eq!(spawner.spawn_count(), 1);

        let worker = spawner.worker_for("ETH").unwrap();
        assert!(worker.id.starts_with("MOCK-"));
        worker.kill();
        assert!(!handle.is_alive().await);
    }

    #[tokio::test]
    async fn test_mock_spawner_forced_failure() {
        let spawner = MockSpawner::new();
        spawner.fail_spawns_for("ETH");
        let cfg = mining_config(&["ETH"]);
        let launch = LaunchConfig::resolve(&cfg, "ETH").unwrap();

        let result = spawner.spawn(&launch).await;
        assert!(matches!(result, Err(WorkerError::DiedOnStartup)));
        assert_eq!(spawner.spawn_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_handle_stats() {
        let spawner = MockSpawner::new();
        let cfg = mining_config(&["ETH"]);
        let launch = LaunchConfig::resolve(&cfg, "ETH").unwrap();
        let handle = spawner.spawn(&launch).await.unwrap();

        spawner.worker_for("ETH").unwrap().set_stats(WorkerStats {
            hashrate: 99.0,
            shares_accepted: 7,
            shares_rejected: 0,
            earnings_today: 0.001,
            earnings_total: 0.01,
        });

        let stats = handle.poll_stats().await.unwrap();
        assert!((stats.hashrate - 99.0).abs() < 1e-12);
        assert_eq!(stats.shares_accepted, 7);
    }
}
