//! Wallet monitor.
//!
//! Periodically refreshes native balances for one address across the
//! configured networks and exposes the latest snapshot for status
//! aggregation. Observation only — no keys, no transactions.

use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{native_token_symbol, ChainClient, JsonRpcClient};
use crate::config::WalletConfig;
use crate::types::{NetworkBalance, WalletDetail};

/// Watches one wallet address across several networks.
pub struct WalletMonitor {
    config: WalletConfig,
    clients: Vec<Arc<dyn ChainClient>>,
    balances: Arc<RwLock<HashMap<String, NetworkBalance>>>,
    connected: Arc<RwLock<bool>>,
    running: Arc<AtomicBool>,
    /// Bumped on every start and stop; a refresh loop exits once its
    /// generation goes stale, so a restart never stacks a second loop.
    generation: Arc<AtomicU64>,
}

impl WalletMonitor {
    /// Build a monitor with one JSON-RPC client per configured network.
    pub fn new(config: WalletConfig) -> Result<Self> {
        let mut clients: Vec<Arc<dyn ChainClient>> = Vec::new();
        for (network, rpc_url) in &config.networks {
            clients.push(Arc::new(JsonRpcClient::new(network, rpc_url)?));
        }
        Ok(Self::with_clients(config, clients))
    }

    /// Dependency-injected constructor, used by tests with fake clients.
    pub fn with_clients(config: WalletConfig, clients: Vec<Arc<dyn ChainClient>>) -> Self {
        Self {
            config,
            clients,
            balances: Arc::new(RwLock::new(HashMap::new())),
            connected: Arc::new(RwLock::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the refresh loop. Idempotent: a second call while running
    /// is a no-op.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("Wallet monitor already running");
            return;
        }
        info!(
            address = %self.config.address,
            networks = self.clients.len(),
            "Starting wallet monitor"
        );

        let clients = self.clients.clone();
        let address = self.config.address.clone();
        let balances = Arc::clone(&self.balances);
        let connected = Arc::clone(&self.connected);
        let interval = Duration::from_secs(self.config.refresh_interval_secs);
        let generation = Arc::clone(&self.generation);
        let my_gen = generation.fetch_add(1, Ordering::SeqCst) + 1;

        tokio::spawn(async move {
            while generation.load(Ordering::SeqCst) == my_gen {
                refresh_once(&clients, &address, &balances, &connected).await;
                tokio::time::sleep(interval).await;
            }
            debug!("Wallet monitor loop exited");
        });
    }

    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.generation.fetch_add(1, Ordering::SeqCst);
            info!("Stopping wallet monitor");
        }
    }

    /// One immediate refresh pass, outside the loop. Used at startup so
    /// status payloads are populated before the first interval elapses.
    pub async fn refresh_now(&self) {
        refresh_once(
            &self.clients,
            &self.config.address,
            &self.balances,
            &self.connected,
        )
        .await;
    }

    /// Current wallet status block for the aggregated view.
    pub async fn detail(&self) -> WalletDetail {
        let balances = self.balances.read().await;
        let mut list: Vec<NetworkBalance> = balances.values().cloned().collect();
        list.sort_by(|a, b| a.network.cmp(&b.network));

        WalletDetail {
            active: self.is_running(),
            wallet_address: Some(self.config.address.clone()),
            connected: *self.connected.read().await,
            networks: self.config.networks.keys().cloned().collect(),
            balances: list,
        }
    }

    /// Sum of native balances across all networks, in native units.
    pub async fn total_balance(&self) -> f64 {
        self.balances.read().await.values().map(|b| b.balance).sum()
    }
}

/// Query every network once; a failing network keeps its previous
/// snapshot rather than clearing it.
async fn refresh_once(
    clients: &[Arc<dyn ChainClient>],
    address: &str,
    balances: &Arc<RwLock<HashMap<String, NetworkBalance>>>,
    connected: &Arc<RwLock<bool>>,
) {
    let mut any_ok = false;
    for client in clients {
        match client.native_balance(address).await {
            Ok(balance) => {
                any_ok = true;
                let network = client.network().to_string();
                debug!(network = %network, balance, "Wallet balance refreshed");
                balances.write().await.insert(
                    network.clone(),
                    NetworkBalance {
                        network,
                        token_symbol: native_token_symbol(client.network()).to_string(),
                        balance,
                        last_updated: Utc::now(),
                    },
                );
            }
            Err(e) => {
                warn!(network = %client.network(), error = %e, "Balance query failed");
            }
        }
    }
    *connected.write().await = any_ok;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FakeChain {
        network: String,
        balance: Result<f64, String>,
    }

    #[async_trait]
    impl ChainClient for FakeChain {
        async fn block_number(&self) -> Result<u64> {
            Ok(1)
        }

        async fn native_balance(&self, _address: &str) -> Result<f64> {
            self.balance
                .clone()
                .map_err(|e| anyhow::anyhow!(e))
        }

        async fn is_deployed(&self, _address: &str) -> Result<bool> {
            Ok(true)
        }

        fn network(&self) -> &str {
            &self.network
        }
    }

    fn wallet_cfg() -> WalletConfig {
        WalletConfig {
            enabled: true,
            address: "0xwallet".to_string(),
            networks: HashMap::from([
                ("ethereum".to_string(), "http://localhost:8545".to_string()),
                ("polygon".to_string(), "http://localhost:8546".to_string()),
            ]),
            refresh_interval_secs: 60,
        }
    }

    #[tokio::test]
    async fn test_refresh_populates_balances() {
        let clients: Vec<Arc<dyn ChainClient>> = vec![
            Arc::new(FakeChain {
                network: "ethereum".into(),
                balance: Ok(1.5),
            }),
            Arc::new(FakeChain {
                network: "polygon".into(),
                balance: Ok(10.0),
            }),
        ];
        let monitor = WalletMonitor::with_clients(wallet_cfg(), clients);
        monitor.refresh_now().await;

        let detail = monitor.detail().await;
        assert!(detail.connected);
        assert_eq!(detail.balances.len(), 2);
        assert_eq!(detail.balances[0].network, "ethereum");
        assert_eq!(detail.balances[0].token_symbol, "ETH");
        assert_eq!(detail.balances[1].token_symbol, "MATIC");
        assert!((monitor.total_balance().await - 11.5).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_other_networks() {
        let clients: Vec<Arc<dyn ChainClient>> = vec![
            Arc::new(FakeChain {
                network: "ethereum".into(),
                balance: Ok(2.0),
            }),
            Arc::new(FakeChain {
                network: "polygon".into(),
                balance: Err("rpc down".into()),
            }),
        ];
        let monitor = WalletMonitor::with_clients(wallet_cfg(), clients);
        monitor.refresh_now().await;

        let detail = monitor.detail().await;
        assert!(detail.connected, "one healthy network counts as connected");
        assert_eq!(detail.balances.len(), 1);
        assert_eq!(detail.balances[0].network, "ethereum");
    }

    #[tokio::test]
    async fn test_all_failures_marks_disconnected() {
        let clients: Vec<Arc<dyn ChainClient>> = vec![Arc::new(FakeChain {
            network: "ethereum".into(),
            balance: Err("down".into()),
        })];
        let monitor = WalletMonitor::with_clients(wallet_cfg(), clients);
        monitor.refresh_now().await;

        let detail = monitor.detail().await;
        assert!(!detail.connected);
        assert!(detail.balances.is_empty());
    }

    #[tokio::test]
    async fn test_start_stop_flag() {
        let monitor = WalletMonitor::with_clients(wallet_cfg(), vec![]);
        assert!(!monitor.is_running());
        monitor.start().await;
        assert!(monitor.is_running());
        monitor.start().await; // idempotent
        assert!(monitor.is_running());
        monitor.stop();
        assert!(!monitor.is_running());
    }

    #[tokio::test]
    async fn test_restart_replaces_previous_loop() {
        use std::sync::atomic::AtomicUsize;

        struct CountingChain {
            calls: Arc<AtomicUsize>,
        }

        #[async_trait]
        impl ChainClient for CountingChain {
            async fn block_number(&self) -> Result<u64> {
                Ok(1)
            }

            async fn native_balance(&self, _address: &str) -> Result<f64> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(1.0)
            }

            async fn is_deployed(&self, _address: &str) -> Result<bool> {
                Ok(true)
            }

            fn network(&self) -> &str {
                "ethereum"
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let clients: Vec<Arc<dyn ChainClient>> = vec![Arc::new(CountingChain {
            calls: Arc::clone(&calls),
        })];
        let mut cfg = wallet_cfg();
        cfg.refresh_interval_secs = 1;
        let monitor = WalletMonitor::with_clients(cfg, clients);

        monitor.start().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        monitor.stop();
        monitor.start().await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        monitor.stop();

        let n = calls.load(Ordering::SeqCst);
        assert!(n <= 6, "restart must replace the loop, not stack one: {n} refreshes");
    }
}
