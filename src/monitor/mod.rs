//! Host system monitor.
//!
//! Collects CPU, memory, disk, and process statistics on an interval,
//! keeps the latest snapshot for status aggregation, persists a status
//! row on every pass, and writes a warning to the system log whenever
//! a resource threshold is crossed.

use anyhow::Result;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Disks, System, MINIMUM_CPU_UPDATE_INTERVAL};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::storage::Store;
use crate::types::{LogLevel, SystemLogEntry, SystemStats};

const CPU_ALERT_PERCENT: f64 = 90.0;
const MEMORY_ALERT_PERCENT: f64 = 90.0;
const DISK_ALERT_PERCENT: f64 = 95.0;

const BYTES_PER_GB: f64 = 1_073_741_824.0;

/// Periodic host statistics collector.
pub struct SystemMonitor {
    store: Arc<dyn Store>,
    interval: Duration,
    latest: Arc<RwLock<Option<SystemStats>>>,
    running: Arc<AtomicBool>,
    /// Bumped on every start and stop; a collection loop exits once its
    /// generation goes stale, so a restart never stacks a second loop.
    generation: Arc<AtomicU64>,
}

impl SystemMonitor {
    pub fn new(store: Arc<dyn Store>, interval_secs: u64) -> Self {
        Self {
            store,
            interval: Duration::from_secs(interval_secs),
            latest: Arc::new(RwLock::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the collection loop. Idempotent.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("System monitor already running");
            return;
        }
        info!(interval_secs = self.interval.as_secs(), "Starting system monitor");

        let store = Arc::clone(&self.store);
        let latest = Arc::clone(&self.latest);
        let interval = self.interval;
        let generation = Arc::clone(&self.generation);
        let my_gen = generation.fetch_add(1, Ordering::SeqCst) + 1;

        tokio::spawn(async move {
            while generation.load(Ordering::SeqCst) == my_gen {
                match collect_stats().await {
                    Ok(stats) => {
                        alert_on_thresholds(&store, &stats).await;
                        record_status(&store, &stats).await;
                        *latest.write().await = Some(stats);
                    }
                    Err(e) => warn!(error = %e, "System stats collection failed"),
                }
                tokio::time::sleep(interval).await;
            }
            debug!("System monitor loop exited");
        });
    }

    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.generation.fetch_add(1, Ordering::SeqCst);
            info!("Stopping system monitor");
        }
    }

    /// One immediate collection pass, outside the loop.
    pub async fn collect_now(&self) -> Result<SystemStats> {
        let stats = collect_stats().await?;
        alert_on_thresholds(&self.store, &stats).await;
        record_status(&self.store, &stats).await;
        *self.latest.write().await = Some(stats.clone());
        Ok(stats)
    }

    /// Latest snapshot, if any collection has completed.
    pub async fn latest(&self) -> Option<SystemStats> {
        self.latest.read().await.clone()
    }

    /// Health verdict over the latest snapshot. No snapshot yet counts
    /// as healthy rather than alarming on startup.
    pub async fn healthy(&self) -> bool {
        match self.latest.read().await.as_ref() {
            Some(stats) => is_healthy(stats),
            None => true,
        }
    }
}

/// Whether every resource is under its alert threshold.
pub fn is_healthy(stats: &SystemStats) -> bool {
    stats.cpu_percent <= CPU_ALERT_PERCENT
        && stats.memory_percent <= MEMORY_ALERT_PERCENT
        && stats.disk_percent <= DISK_ALERT_PERCENT
}

/// Gather a full snapshot. sysinfo is synchronous, and CPU usage needs
/// two samples spaced apart, so the work runs on the blocking pool.
async fn collect_stats() -> Result<SystemStats> {
    tokio::task::spawn_blocking(|| {
        let mut sys = System::new_all();
        // Second CPU refresh after the minimum interval gives a real
        // usage figure instead of zero.
        std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu_usage();

        let total_mem = sys.total_memory() as f64;
        let avail_mem = sys.available_memory() as f64;
        let memory_percent = if total_mem > 0.0 {
            (total_mem - avail_mem) / total_mem * 100.0
        } else {
            0.0
        };

        let disks = Disks::new_with_refreshed_list();
        let (disk_total, disk_free) = disks
            .iter()
            .fold((0u64, 0u64), |(total, free), disk| {
                (total + disk.total_space(), free + disk.available_space())
            });
        let disk_percent = if disk_total > 0 {
            (disk_total - disk_free) as f64 / disk_total as f64 * 100.0
        } else {
            0.0
        };

        SystemStats {
            cpu_percent: sys.global_cpu_usage() as f64,
            cpu_count: sys.cpus().len(),
            memory_percent,
            memory_available_gb: avail_mem / BYTES_PER_GB,
            memory_total_gb: total_mem / BYTES_PER_GB,
            disk_percent,
            disk_free_gb: disk_free as f64 / BYTES_PER_GB,
            disk_total_gb: disk_total as f64 / BYTES_PER_GB,
            process_count: sys.processes().len(),
            collected_at: Some(Utc::now()),
        }
    })
    .await
    .map_err(|e| anyhow::anyhow!("stats collection task panicked: {e}"))
}

/// Persist the periodic status row every collection pass, so the audit
/// trail carries a resource history even when nothing is on fire.
async fn record_status(store: &Arc<dyn Store>, stats: &SystemStats) {
    let entry = SystemLogEntry::new(LogLevel::Info, "system_monitor", "System status update")
        .with_details(serde_json::json!({
            "cpu_percent": stats.cpu_percent,
            "memory_percent": stats.memory_percent,
            "disk_percent": stats.disk_percent,
            "process_count": stats.process_count,
        }));
    if let Err(e) = store.append_log(&entry).await {
        warn!(error = %e, "Failed to persist status entry");
    }
}

/// Persist a warning for each threshold crossed. Log failures are
/// swallowed with a trace warning; monitoring must not fall over
/// because the log table is unavailable.
async fn alert_on_thresholds(store: &Arc<dyn Store>, stats: &SystemStats) {
    let mut alerts = Vec::new();
    if stats.cpu_percent > CPU_ALERT_PERCENT {
        alerts.push(format!("High CPU usage: {:.1}%", stats.cpu_percent));
    }
    if stats.memory_percent > MEMORY_ALERT_PERCENT {
        alerts.push(format!("High memory usage: {:.1}%", stats.memory_percent));
    }
    if stats.disk_percent > DISK_ALERT_PERCENT {
        alerts.push(format!("High disk usage: {:.1}%", stats.disk_percent));
    }

    for message in alerts {
        warn!(%message, "Resource threshold crossed");
        let entry = SystemLogEntry::new(LogLevel::Warning, "system_monitor", &message);
        if let Err(e) = store.append_log(&entry).await {
            warn!(error = %e, "Failed to persist resource alert");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
