//! PROSPECTOR — Autonomous opportunity aggregation and operations engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! opens the SQLite store, wires the engine components together, and
//! runs until a shutdown signal arrives.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use prospector::api;
use prospector::chain::contracts::ContractMonitor;
use prospector::chain::wallet::WalletMonitor;
use prospector::config::AppConfig;
use prospector::engine::{HuntingLoop, Orchestrator, WorkerPool};
use prospector::monitor::SystemMonitor;
use prospector::sources;
use prospector::storage::{SqliteStore, Store};
use prospector::workers::ProcessSpawner;

const BANNER: &str = r#"
 ____  ____   ___  ____  ____  _____ ____ _____ ___  ____
|  _ \|  _ \ / _ \/ ___||  _ \| ____/ ___|_   _/ _ \|  _ \
| |_) | |_) | | | \___ \| |_) |  _|| |     | || | | | |_) |
|  __/|  _ <| |_| |___) |  __/| |__| |___  | || |_| |  _ <
|_|   |_| \_\\___/|____/|_|   |_____\____| |_| \___/|_| \_\

  Opportunity Aggregation & Operations Engine
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        engine_name = %cfg.engine.name,
        hunt_interval_secs = cfg.hunting.interval_secs,
        mining_enabled = cfg.mining.enabled,
        "PROSPECTOR starting up"
    );

    // -- Storage -----------------------------------------------------------

    let store: Arc<dyn Store> = Arc::new(SqliteStore::connect(&cfg.storage.db_path).await?);
    info!(db_path = %cfg.storage.db_path, "Database ready");

    // -- Components --------------------------------------------------------

    let registry = sources::build_registry(&cfg.hunting.sources)?;
    if registry.is_empty() {
        warn!("No opportunity sources enabled — hunting cycles will be empty");
    }
    let hunter = Arc::new(HuntingLoop::new(
        registry,
        Arc::clone(&store),
        cfg.hunting.clone(),
    ));

    let pool = Arc::new(WorkerPool::new(
        Arc::new(ProcessSpawner),
        Arc::clone(&store),
        cfg.mining.clone(),
    ));

    let wallet = Arc::new(WalletMonitor::new(cfg.wallet.clone())?);
    let contracts = Arc::new(ContractMonitor::new(cfg.contracts.clone(), &cfg.wallet.networks)?);
    let monitor = Arc::new(SystemMonitor::new(
        Arc::clone(&store),
        cfg.monitor.interval_secs,
    ));

    let orchestrator = Arc::new(Orchestrator::new(
        hunter,
        pool,
        wallet,
        contracts,
        monitor,
        Arc::clone(&store),
        cfg.report.clone(),
    ));

    // -- API ---------------------------------------------------------------

    if cfg.api.enabled {
        api::spawn_api(Arc::clone(&orchestrator), cfg.api.port)?;
    }

    // -- Run ---------------------------------------------------------------

    orchestrator.start().await;
    if cfg.engine.auto_start_operations {
        info!("Auto-starting operations");
        orchestrator.start_all_operations().await;
    }

    info!("Engine up. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received.");

    orchestrator.stop().await;
    info!("PROSPECTOR shut down cleanly.");

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("prospector=info"));

    let json_logging = std::env::var("PROSPECTOR_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
