//! The orchestrator.
//!
//! Composes the hunting loop, worker pool, wallet monitor, contract
//! monitor, and system monitor behind a single lifecycle and status
//! surface. The outward-facing operations (`get_status`,
//! `get_profit_report`, `emergency_stop`) never return an error — on
//! internal failure they degrade to a well-formed payload with the
//! error recorded.

use anyhow::Result;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use super::{HuntingLoop, WorkerPool};
use crate::chain::contracts::ContractMonitor;
use crate::chain::wallet::WalletMonitor;
use crate::config::ReportConfig;
use crate::monitor::SystemMonitor;
use crate::storage::Store;
use crate::types::{
    ContractDetail, EngineStatus, HunterDetail, LogLevel, MinerDetail, MonitorDetail,
    OperationStatusSet, ProfitBreakdown, ProfitReport, ServiceDetail, StatusSummary,
    SystemLogEntry, WalletDetail, WorkerStatus,
};

const MODULE: &str = "orchestrator";

/// Top-level engine composition. All collaborators are injected.
pub struct Orchestrator {
    hunter: Arc<HuntingLoop>,
    pool: Arc<WorkerPool>,
    wallet: Arc<WalletMonitor>,
    contracts: Arc<ContractMonitor>,
    monitor: Arc<SystemMonitor>,
    store: Arc<dyn Store>,
    report: ReportConfig,
    running: Arc<AtomicBool>,
    ops: Arc<RwLock<OperationStatusSet>>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        hunter: Arc<HuntingLoop>,
        pool: Arc<WorkerPool>,
        wallet: Arc<WalletMonitor>,
        contracts: Arc<ContractMonitor>,
        monitor: Arc<SystemMonitor>,
        store: Arc<dyn Store>,
        report: ReportConfig,
    ) -> Self {
        Self {
            hunter,
            pool,
            wallet,
            contracts,
            monitor,
            store,
            report,
            running: Arc::new(AtomicBool::new(false)),
            ops: Arc::new(RwLock::new(OperationStatusSet::default())),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Bring the engine up: background monitors start immediately, the
    /// optional operations (hunting, mining) wait for an explicit
    /// command. One monitor failing to start does not stop the others.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            info!("Engine already running");
            return;
        }
        info!("Starting engine");

        self.monitor.start().await;
        self.ops.write().await.system_monitoring = true;

        self.wallet.start().await;
        self.wallet.refresh_now().await;
        self.ops.write().await.wallet_monitoring = true;

        self.contracts.start().await;
        self.ops.write().await.smart_contracts = true;

        self.audit(LogLevel::Info, "Engine started").await;
    }

    /// Bring everything down in reverse order and clear every
    /// operation flag unconditionally.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("Stopping engine");

        self.hunter.stop();
        self.pool.stop().await;
        self.contracts.stop();
        self.wallet.stop();
        self.monitor.stop();

        self.ops.write().await.reset();
        self.audit(LogLevel::Info, "Engine stopped").await;
    }

    /// Start the revenue operations: hunting and mining. Idempotent.
    /// A child failing to start is logged and does not stop the other.
    pub async fn start_all_operations(&self) {
        info!("Starting all operations");

        self.hunter.start().await;
        self.ops.write().await.nft_hunting = true;

        match self.pool.start().await {
            Ok(()) => {
                self.ops.write().await.crypto_mining = true;
                self.audit(LogLevel::Info, "All operations started successfully")
                    .await;
            }
            Err(e) => {
                error!(error = %e, "Worker pool failed to start");
                self.audit(LogLevel::Error, &format!("Mining startup failed: {e}"))
                    .await;
            }
        }
    }

    /// Stop the revenue operations, leaving the monitors up.
    pub async fn stop_all_operations(&self) {
        info!("Stopping all operations");
        self.hunter.stop();
        self.pool.stop().await;

        let mut ops = self.ops.write().await;
        ops.nft_hunting = false;
        ops.crypto_mining = false;
    }

    /// Halt everything immediately and leave a warning in the audit
    /// log. Never raises: failures during the shutdown are logged and
    /// swallowed so the caller always gets an answer.
    pub async fn emergency_stop(&self) {
        warn!("EMERGENCY STOP triggered");
        self.stop_all_operations().await;
        self.stop().await;

        let entry = SystemLogEntry::new(
            LogLevel::Warning,
            MODULE,
            "Emergency stop: all operations halted",
        )
        .with_details(serde_json::json!({ "triggered_at": Utc::now() }));
        if let Err(e) = self.store.append_log(&entry).await {
            error!(error = %e, "Failed to persist emergency stop record");
        }
    }

    /// Aggregated engine status. Never fails: any collaborator error
    /// degrades that section and is surfaced via the `error` field.
    pub async fn get_status(&self) -> EngineStatus {
        let ops = self.ops.read().await.clone();
        let mut first_error: Option<String> = None;

        // Each child reports only while its operation flag is up; a
        // child that never started this run shows a default shape, not
        // rows persisted by some earlier run.
        let top = if ops.nft_hunting {
            match self.store.top_opportunities(self.report.top_opportunities).await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(error = %e, "Status: opportunity query failed");
                    first_error.get_or_insert(e.to_string());
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let operations = if ops.crypto_mining {
            match self.pool.operations().await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(error = %e, "Status: worker query failed");
                    first_error.get_or_insert(e.to_string());
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let wallet = if ops.wallet_monitoring {
            self.wallet.detail().await
        } else {
            WalletDetail::default()
        };
        let contracts = if ops.smart_contracts {
            self.contracts.detail().await
        } else {
            ContractDetail::default()
        };
        let (stats, healthy) = if ops.system_monitoring {
            (self.monitor.latest().await, self.monitor.healthy().await)
        } else {
            (None, true)
        };

        let mining_active = operations
            .iter()
            .any(|op| op.status == WorkerStatus::Active);
        let total_earnings: f64 = operations.iter().map(|op| op.earnings_total).sum();

        EngineStatus {
            engine_running: self.is_running(),
            summary: StatusSummary {
                total_earnings,
                nft_opportunities: top.len(),
                mining_active,
                wallet_connected: wallet.connected,
                contracts_managed: contracts.total_contracts,
                system_healthy: healthy,
            },
            services: ServiceDetail {
                nft_hunter: HunterDetail {
                    active: self.hunter.is_running(),
                    top_opportunities: top,
                },
                crypto_miner: MinerDetail {
                    active: self.pool.is_running(),
                    operations,
                },
                wallet_manager: wallet,
                smart_contracts: contracts,
                system_monitor: MonitorDetail {
                    active: self.monitor.is_running(),
                    stats,
                    healthy,
                },
            },
            operation_status: ops,
            error: first_error,
            last_update: Utc::now(),
        }
    }

    /// Profit summary across all operations. Never fails; degraded
    /// sections report zero with the error recorded.
    ///
    /// NFT profits are an estimate: the top-listed count times a
    /// configured per-item value, mirroring what the status view
    /// reports. Contract profits stay at zero until there is a real
    /// revenue signal to read.
    pub async fn get_profit_report(&self) -> ProfitReport {
        let mut first_error: Option<String> = None;

        let operations = match self.pool.operations().await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Profit report: worker query failed");
                first_error.get_or_insert(e.to_string());
                Vec::new()
            }
        };
        let mining: f64 = operations.iter().map(|op| op.earnings_total).sum();
        let mining_active = operations
            .iter()
            .any(|op| op.status == WorkerStatus::Active);

        let nft_count = match self.store.top_opportunities(self.report.top_opportunities).await {
            Ok(rows) => rows.len(),
            Err(e) => {
                warn!(error = %e, "Profit report: opportunity query failed");
                first_error.get_or_insert(e.to_string());
                0
            }
        };
        let nft_estimate = nft_count as f64 * self.report.estimated_value_per_opportunity;

        let contracts_active = self.contracts.is_running();
        let smart_contracts = 0.0;

        ProfitReport {
            total_profits: mining + nft_estimate + smart_contracts,
            breakdown: ProfitBreakdown {
                mining,
                nft_opportunities: nft_estimate,
                smart_contracts,
            },
            nft_count,
            mining_active,
            contracts_active,
            error: first_error,
            generated_at: Utc::now(),
        }
    }

    /// Nudge the running operations: restart anything flagged active
    /// whose underlying loop has gone quiet, and reap dead workers.
    pub async fn optimize_operations(&self) {
        info!("Optimizing operations");

        let ops = self.ops.read().await.clone();
        if ops.nft_hunting && !self.hunter.is_running() {
            warn!("Hunting flagged active but loop is down, restarting");
            self.hunter.start().await;
        }
        if ops.crypto_mining {
            self.pool.refresh().await;
            self.pool.start_all().await;
        }
    }

    /// Direct handles for the API layer.
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn contracts(&self) -> &Arc<ContractMonitor> {
        &self.contracts
    }

    pub fn wallet(&self) -> &Arc<WalletMonitor> {
        &self.wallet
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    async fn audit(&self, level: LogLevel, message: &str) {
        let entry = SystemLogEntry::new(level, MODULE, message);
        if let Err(e) = self.store.append_log(&entry).await {
            warn!(error = %e, "Failed to persist audit log entry");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
