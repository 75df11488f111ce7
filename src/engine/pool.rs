//! The worker pool.
//!
//! Owns one external worker handle per coin, keeps their persisted
//! operation rows in sync, and runs a periodic refresh pass that polls
//! stats and reaps dead processes. Spawning goes through the
//! `WorkerSpawner` seam so tests never launch real binaries.

use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::MiningConfig;
use crate::storage::Store;
use crate::types::{WorkerOperation, WorkerStats, WorkerStatus};
use crate::workers::{LaunchConfig, WorkerHandle, WorkerSpawner};

type HandleMap = Arc<Mutex<HashMap<String, Box<dyn WorkerHandle>>>>;

/// Manages the set of active worker processes, keyed by coin.
pub struct WorkerPool {
    spawner: Arc<dyn WorkerSpawner>,
    store: Arc<dyn Store>,
    config: MiningConfig,
    active: HandleMap,
    running: Arc<AtomicBool>,
    /// Bumped on every start and stop; a refresh loop exits once its
    /// generation goes stale, so a restart never stacks a second loop.
    generation: Arc<AtomicU64>,
}

impl WorkerPool {
    pub fn new(
        spawner: Arc<dyn WorkerSpawner>,
        store: Arc<dyn Store>,
        config: MiningConfig,
    ) -> Self {
        Self {
            spawner,
            store,
            config,
            active: Arc::new(Mutex::new(HashMap::new())),
            running: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn active_coins(&self) -> Vec<String> {
        let mut coins: Vec<String> = self.active.lock().await.keys().cloned().collect();
        coins.sort();
        coins
    }

    /// Start all configured workers and the refresh loop. Idempotent.
    pub async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("Worker pool already running");
            return Ok(());
        }
        info!(coins = ?self.config.coins, "Starting worker pool");

        // Operation rows exist for every configured coin before any
        // process comes up, so status queries see the full set.
        for coin in &self.config.coins {
            if let Ok(launch) = LaunchConfig::resolve(&self.config, coin) {
                self.store
                    .ensure_worker_operation(coin, &launch.pool_endpoint, &launch.wallet_address)
                    .await?;
            } else {
                warn!(coin = %coin, "Coin listed for mining but has no miner config");
            }
        }

        self.start_all().await;
        self.spawn_refresh_loop();
        Ok(())
    }

    /// Stop the refresh loop and terminate every worker.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        info!("Stopping worker pool");
        self.stop_all().await;
    }

    /// Launch every configured coin that isn't already active.
    pub async fn start_all(&self) {
        for coin in self.config.coins.clone() {
            if !self.start_one(&coin).await {
                warn!(coin = %coin, "Worker failed to start");
            }
        }
    }

    /// Terminate every active worker, marking each inactive.
    pub async fn stop_all(&self) {
        let coins: Vec<String> = self.active.lock().await.keys().cloned().collect();
        for coin in coins {
            self.stop_one(&coin).await;
        }
    }

    /// Start one coin's worker. Returns whether a worker is active for
    /// the coin afterwards. Already-active is success, not an error.
    pub async fn start_one(&self, coin: &str) -> bool {
        {
            let active = self.active.lock().await;
            if active.contains_key(coin) {
                debug!(coin = %coin, "Worker already active");
                return true;
            }
        }

        let launch = match LaunchConfig::resolve(&self.config, coin) {
            Ok(l) => l,
            Err(e) => {
                warn!(coin = %coin, error = %e, "Cannot start worker");
                return false;
            }
        };

        if let Err(e) = self
            .store
            .ensure_worker_operation(coin, &launch.pool_endpoint, &launch.wallet_address)
            .await
        {
            warn!(coin = %coin, error = %e, "Failed to ensure worker operation row");
            return false;
        }

        match self.spawner.spawn(&launch).await {
            Ok(handle) => {
                info!(coin = %coin, "Worker started");
                self.active.lock().await.insert(coin.to_string(), handle);
                if let Err(e) = self
                    .store
                    .update_worker_status(coin, WorkerStatus::Active, Some(Utc::now()))
                    .await
                {
                    warn!(coin = %coin, error = %e, "Failed to persist worker status");
                }
                true
            }
            Err(e) => {
                // A worker that never came up is not a detected death;
                // the row stays inactive and the coin stays absent.
                warn!(coin = %coin, error = %e, "Worker spawn failed");
                false
            }
        }
    }

    /// Stop one coin's worker with a bounded termination wait. Returns
    /// whether a worker was actually stopped. A deliberate stop always
    /// lands on Inactive, never Error.
    pub async fn stop_one(&self, coin: &str) -> bool {
        let handle = self.active.lock().await.remove(coin);
        let Some(handle) = handle else {
            debug!(coin = %coin, "No active worker to stop");
            return false;
        };

        let timeout = Duration::from_secs(self.config.terminate_timeout_secs);
        if let Err(e) = handle.terminate(timeout).await {
            warn!(coin = %coin, error = %e, "Worker termination reported an error");
        }
        info!(coin = %coin, "Worker stopped");

        if let Err(e) = self
            .store
            .update_worker_status(coin, WorkerStatus::Inactive, None)
            .await
        {
            warn!(coin = %coin, error = %e, "Failed to persist worker status");
        }
        true
    }

    /// Persisted operation rows for status aggregation.
    pub async fn operations(&self) -> Result<Vec<WorkerOperation>> {
        self.store.list_worker_operations().await
    }

    /// One refresh pass: reap dead workers, poll stats on live ones.
    /// Public for tests and the startup path; the loop calls it on the
    /// configured interval.
    pub async fn refresh(&self) {
        refresh_pass(&self.active, &self.store).await;
    }

    fn spawn_refresh_loop(&self) {
        let active = Arc::clone(&self.active);
        let store = Arc::clone(&self.store);
        let interval = Duration::from_secs(self.config.refresh_interval_secs);
        let generation = Arc::clone(&self.generation);
        let my_gen = generation.fetch_add(1, Ordering::SeqCst) + 1;

        tokio::spawn(async move {
            while generation.load(Ordering::SeqCst) == my_gen {
                tokio::time::sleep(interval).await;
                if generation.load(Ordering::SeqCst) != my_gen {
                    break;
                }
                refresh_pass(&active, &store).await;
            }
            debug!("Worker refresh loop exited");
        });
    }
}

/// Walk the active set once. Dead processes are removed and marked
/// Error; a failed stats poll on a live process keeps the previous
/// persisted stats.
async fn refresh_pass(active: &HandleMap, store: &Arc<dyn Store>) {
    let coins: Vec<String> = active.lock().await.keys().cloned().collect();

    for coin in coins {
        let alive = {
            let map = active.lock().await;
            match map.get(&coin) {
                Some(handle) => handle.is_alive().await,
                None => continue,
            }
        };

        if !alive {
            warn!(coin = %coin, "Worker process died, removing from pool");
            active.lock().await.remove(&coin);
            if let Err(e) = store
                .update_worker_status(&coin, WorkerStatus::Error, None)
                .await
            {
                warn!(coin = %coin, error = %e, "Failed to persist dead-worker status");
            }
            continue;
        }

        let stats: Option<WorkerStats> = {
            let map = active.lock().await;
            match map.get(&coin) {
                Some(handle) => match handle.poll_stats().await {
                    Ok(s) => Some(s),
                    Err(e) => {
                        debug!(coin = %coin, error = %e, "Stats poll failed, keeping previous");
                        None
                    }
                },
                None => None,
            }
        };

        if let Some(stats) = stats {
            if let Err(e) = store.update_worker_stats(&coin, &stats).await {
                warn!(coin = %coin, error = %e, "Failed to persist worker stats");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
