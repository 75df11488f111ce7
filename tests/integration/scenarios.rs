//! End-to-end engine scenarios against an in-memory store, mock
//! sources, and a mock worker spawner.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use prospector::chain::contracts::ContractMonitor;
use prospector::chain::wallet::WalletMonitor;
use prospector::config::{
    ContractsConfig, HuntingConfig, OpenSeaConfig, RaribleConfig, ReportConfig, ScoringConfig,
    SourcesConfig, WalletConfig,
};
use prospector::engine::{HuntingLoop, Orchestrator, WorkerPool};
use prospector::monitor::SystemMonitor;
use prospector::sources::OpportunitySource;
use prospector::storage::{SqliteStore, Store};
use prospector::types::{LogLevel, RawListing, WorkerStats, WorkerStatus};

use crate::mock_source::MockSource;
use crate::mock_worker::{mining_config, MockSpawner};

fn hunting_config() -> HuntingConfig {
    HuntingConfig {
        interval_secs: 300,
        fetch_timeout_secs: 5,
        min_score: 7.0,
        max_price_native: 0.001,
        sources: SourcesConfig {
            opensea: OpenSeaConfig {
                enabled: false,
                api_key_env: None,
            },
            rarible: RaribleConfig { enabled: false },
        },
        scoring: ScoringConfig {
            source_reliability: HashMap::from([("mock-a".to_string(), 2.0)]),
            ..ScoringConfig::default()
        },
    }
}

struct Harness {
    orchestrator: Orchestrator,
    store: Arc<dyn Store>,
    spawner: Arc<MockSpawner>,
    hunter: Arc<HuntingLoop>,
    pool: Arc<WorkerPool>,
}

async fn harness(sources: Vec<Arc<dyn OpportunitySource>>, coins: &[&str]) -> Harness {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::connect_in_memory().await.unwrap());
    let spawner = Arc::new(MockSpawner::new());

    let hunter = Arc::new(HuntingLoop::new(
        sources,
        Arc::clone(&store),
        hunting_config(),
    ));
    let pool = Arc::new(WorkerPool::new(
        Arc::clone(&spawner) as _,
        Arc::clone(&store),
        mining_config(coins),
    ));
    let wallet = Arc::new(WalletMonitor::with_clients(
        WalletConfig {
            enabled: true,
            address: "0x0000000000000000000000000000000000000001".to_string(),
            networks: HashMap::new(),
            refresh_interval_secs: 60,
        },
        vec![],
    ));
    let contracts = Arc::new(ContractMonitor::with_clients(
        ContractsConfig {
            enabled: true,
            poll_interval_secs: 300,
            watched: vec![],
        },
        HashMap::new(),
    ));
    let monitor = Arc::new(SystemMonitor::new(Arc::clone(&store), 30));

    let orchestrator = Orchestrator::new(
        Arc::clone(&hunter),
        Arc::clone(&pool),
        wallet,
        contracts,
        monitor,
        Arc::clone(&store),
        ReportConfig {
            top_opportunities: 10,
            estimated_value_per_opportunity: 0.01,
        },
    );

    Harness {
        orchestrator,
        store,
        spawner,
        hunter,
        pool,
    }
}

// ---------------------------------------------------------------------------
// Hunting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn hunting_survives_a_failing_source() {
    let healthy = Arc::new(MockSource::with_listings(
        "mock-a",
        vec![MockSource::listing("mock-a", "1", "Pixel Punks", None)],
    ));
    let broken = Arc::new(MockSource::new("mock-b"));
    broken.set_error("simulated marketplace outage");

    let h = harness(
        vec![Arc::clone(&healthy) as _, Arc::clone(&broken) as _],
        &[],
    )
    .await;

    let inserted = h.hunter.run_once().await.unwrap();
    assert_eq!(inserted, 1, "healthy source still contributes");

    let top = h.store.top_opportunities(10).await.unwrap();
    assert_eq!(top.len(), 1);
    assert!(top[0].score >= 9.0, "free keyword item scores near the top");
    assert_eq!(top[0].source, "mock-a");

    // The outage clears; the next cycle picks up both sources.
    broken.clear_error();
    h.hunter.run_once().await.unwrap();
    assert_eq!(broken.fetch_count(), 2, "broken source is retried, not dropped");
}

#[tokio::test]
async fn hunting_applies_price_and_score_gates() {
    let source = Arc::new(MockSource::new("mock-a"));
    let h = harness(vec![Arc::clone(&source) as _], &[]).await;

    h.hunter.run_once().await.unwrap();

    let top = h.store.top_opportunities(10).await.unwrap();
    // Default spread: the free keyword item and the cheap item qualify,
    // the 5 ETH item fails the price cap.
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].token_id, "1", "free keyword item ranks first");
    assert!(top.iter().all(|c| c.token_id != "3"));
}

#[tokio::test]
async fn rediscovery_never_duplicates_or_rescores() {
    let source = Arc::new(MockSource::with_listings(
        "mock-a",
        vec![MockSource::listing("mock-a", "1", "Pixel Punks", None)],
    ));
    let h = harness(vec![Arc::clone(&source) as _], &[]).await;

    assert_eq!(h.hunter.run_once().await.unwrap(), 1);
    let first = h.store.top_opportunities(10).await.unwrap();

    assert_eq!(h.hunter.run_once().await.unwrap(), 0);
    let second = h.store.top_opportunities(10).await.unwrap();

    assert_eq!(second.len(), 1);
    assert_eq!(first[0].score, second[0].score);
    assert_eq!(first[0].discovered_at, second[0].discovered_at);
}

// ---------------------------------------------------------------------------
// Mining
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deliberate_stop_is_inactive_not_error() {
    let h = harness(vec![], &["ETH"]).await;

    assert!(h.pool.start_one("ETH").await);
    assert_eq!(h.pool.active_coins().await, vec!["ETH"]);

    assert!(h.pool.stop_one("ETH").await);
    assert!(h.pool.active_coins().await.is_empty());

    let ops = h.store.list_worker_operations().await.unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].status, WorkerStatus::Inactive);

    let worker = h.spawner.worker_for("ETH").unwrap();
    assert!(!worker.is_alive(), "process actually terminated");
}

#[tokio::test]
async fn dead_worker_is_reaped_as_error() {
    let h = harness(vec![], &["ETH"]).await;

    assert!(h.pool.start_one("ETH").await);
    h.spawner.worker_for("ETH").unwrap().kill();
    h.pool.refresh().await;

    assert!(h.pool.active_coins().await.is_empty());
    let ops = h.store.list_worker_operations().await.unwrap();
    assert_eq!(ops[0].status, WorkerStatus::Error);
}

#[tokio::test]
async fn refresh_persists_worker_stats() {
    let h = harness(vec![], &["ETH"]).await;
    assert!(h.pool.start_one("ETH").await);

    h.spawner.worker_for("ETH").unwrap().set_stats(WorkerStats {
        hashrate: 52.0,
        shares_accepted: 120,
        shares_rejected: 2,
        earnings_today: 0.002,
        earnings_total: 0.04,
    });
    h.pool.refresh().await;

    let ops = h.store.list_worker_operations().await.unwrap();
    assert!((ops[0].hashrate - 52.0).abs() < 1e-12);
    assert_eq!(ops[0].shares_accepted, 120);
    assert!((ops[0].earnings_total - 0.04).abs() < 1e-12);
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_before_anything_starts_is_well_formed() {
    let h = harness(vec![], &[]).await;
    let status = h.orchestrator.get_status().await;

    assert!(!status.engine_running);
    assert!(!status.operation_status.any_active());
    assert_eq!(status.summary.nft_opportunities, 0);
    assert_eq!(status.summary.total_earnings, 0.0);
    assert!(!status.summary.mining_active);
    assert!(status.summary.system_healthy);
    assert!(status.error.is_none());
}

#[tokio::test]
async fn start_all_operations_is_idempotent() {
    let h = harness(vec![], &["ETH"]).await;
    h.orchestrator.start().await;

    h.orchestrator.start_all_operations().await;
    h.orchestrator.start_all_operations().await;

    assert_eq!(h.spawner.spawn_count(), 1, "second start spawns nothing new");
    let status = h.orchestrator.get_status().await;
    assert!(status.operation_status.nft_hunting);
    assert!(status.operation_status.crypto_mining);

    h.orchestrator.stop().await;
}

#[tokio::test]
async fn emergency_stop_halts_everything_and_is_audited() {
    let source = Arc::new(MockSource::new("mock-a"));
    let h = harness(vec![Arc::clone(&source) as _], &["ETH"]).await;

    h.orchestrator.start().await;
    h.orchestrator.start_all_operations().await;
    assert!(h.orchestrator.get_status().await.operation_status.any_active());

    h.orchestrator.emergency_stop().await;

    assert!(!h.orchestrator.is_running());
    let status = h.orchestrator.get_status().await;
    assert!(!status.operation_status.any_active());
    assert!(h.pool.active_coins().await.is_empty());

    let warnings = h
        .store
        .recent_logs(50, Some(LogLevel::Warning))
        .await
        .unwrap();
    assert!(
        warnings.iter().any(|l| l.message.contains("Emergency stop")),
        "emergency stop must leave an audit record"
    );
}

#[tokio::test]
async fn profit_report_combines_mining_and_discoveries() {
    let source = Arc::new(MockSource::with_listings(
        "mock-a",
        vec![
            MockSource::listing("mock-a", "1", "Pixel Punks", None),
            MockSource::listing("mock-a", "2", "Ape Yard", None),
        ],
    ));
    let h = harness(vec![Arc::clone(&source) as _], &["ETH"]).await;

    h.hunter.run_once().await.unwrap();
    assert!(h.pool.start_one("ETH").await);
    h.spawner.worker_for("ETH").unwrap().set_stats(WorkerStats {
        hashrate: 52.0,
        shares_accepted: 10,
        shares_rejected: 0,
        earnings_today: 0.001,
        earnings_total: 0.05,
    });
    h.pool.refresh().await;

    let report = h.orchestrator.get_profit_report().await;
    assert_eq!(report.nft_count, 2);
    assert!((report.breakdown.nft_opportunities - 0.02).abs() < 1e-12);
    assert!((report.breakdown.mining - 0.05).abs() < 1e-12);
    assert_eq!(report.breakdown.smart_contracts, 0.0);
    assert!((report.total_profits - 0.07).abs() < 1e-12);
    assert!(report.mining_active);
    assert!(report.error.is_none());
}

#[tokio::test]
async fn optimize_restarts_spawned_workers() {
    let h = harness(vec![], &["ETH"]).await;
    h.orchestrator.start().await;
    h.orchestrator.start_all_operations().await;

    // Worker dies behind the pool's back.
    h.spawner.worker_for("ETH").unwrap().kill();
    h.orchestrator.optimize_operations().await;

    assert_eq!(h.pool.active_coins().await, vec!["ETH"]);
    assert_eq!(h.spawner.spawn_count(), 2, "dead worker replaced");

    h.orchestrator.stop().await;
}

// ---------------------------------------------------------------------------
// mockall-based source behaviour
// ---------------------------------------------------------------------------

mockall::mock! {
    pub Marketplace {}

    #[async_trait]
    impl OpportunitySource for Marketplace {
        async fn fetch(&self) -> Result<Vec<RawListing>>;
        fn name(&self) -> &str;
    }
}

#[tokio::test]
async fn every_source_is_queried_each_cycle() {
    let mut mock = MockMarketplace::new();
    mock.expect_name().return_const("mocked".to_string());
    mock.expect_fetch()
        .times(2)
        .returning(|| Ok(vec![MockSource::listing("mocked", "9", "Pixel Cats", None)]));

    let h = harness(vec![Arc::new(mock) as _], &[]).await;
    h.hunter.run_once().await.unwrap();
    h.hunter.run_once().await.unwrap();

    let top = h.store.top_opportunities(10).await.unwrap();
    assert_eq!(top.len(), 1);
}
