//! Watched-contract monitor.
//!
//! Tracks a registry of contracts across networks, polling each for
//! deployment status and native balance. Contracts come from config at
//! startup and can be added at runtime through the API.

use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{ChainClient, JsonRpcClient};
use crate::config::{ContractsConfig, WatchedContractConfig};
use crate::types::{ContractDetail, WatchedContractStatus};

/// Periodically checks every watched contract on its network.
pub struct ContractMonitor {
    config: ContractsConfig,
    /// Network name → chain client.
    clients: HashMap<String, Arc<dyn ChainClient>>,
    /// Contract address → latest status.
    watched: Arc<RwLock<HashMap<String, WatchedContractStatus>>>,
    running: Arc<AtomicBool>,
    /// Bumped on every start and stop; a polling loop exits once its
    /// generation goes stale, so a restart never stacks a second loop.
    generation: Arc<AtomicU64>,
}

impl ContractMonitor {
    /// Build a monitor with JSON-RPC clients for every network named by
    /// a watched contract.
    pub fn new(config: ContractsConfig, rpc_urls: &HashMap<String, String>) -> Result<Self> {
        let mut clients: HashMap<String, Arc<dyn ChainClient>> = HashMap::new();
        for contract in &config.watched {
            if clients.contains_key(&contract.network) {
                continue;
            }
            match rpc_urls.get(&contract.network) {
                Some(url) => {
                    clients.insert(
                        contract.network.clone(),
                        Arc::new(JsonRpcClient::new(&contract.network, url)?),
                    );
                }
                None => {
                    warn!(
                        network = %contract.network,
                        contract = %contract.name,
                        "No RPC endpoint configured for watched contract's network"
                    );
                }
            }
        }
        Ok(Self::with_clients(config, clients))
    }

    pub fn with_clients(
        config: ContractsConfig,
        clients: HashMap<String, Arc<dyn ChainClient>>,
    ) -> Self {
        let mut initial = HashMap::new();
        for c in &config.watched {
            initial.insert(c.address.clone(), unchecked_status(c));
        }
        Self {
            config,
            clients,
            watched: Arc::new(RwLock::new(initial)),
            running: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the polling loop. Idempotent.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("Contract monitor already running");
            return;
        }
        info!(
            contracts = self.config.watched.len(),
            "Starting contract monitor"
        );

        let clients = self.clients.clone();
        let watched = Arc::clone(&self.watched);
        let interval = Duration::from_secs(self.config.poll_interval_secs);
        let generation = Arc::clone(&self.generation);
        let my_gen = generation.fetch_add(1, Ordering::SeqCst) + 1;

        tokio::spawn(async move {
            while generation.load(Ordering::SeqCst) == my_gen {
                poll_once(&clients, &watched).await;
                tokio::time::sleep(interval).await;
            }
            debug!("Contract monitor loop exited");
        });
    }

    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.generation.fetch_add(1, Ordering::SeqCst);
            info!("Stopping contract monitor");
        }
    }

    /// One immediate poll pass.
    pub async fn poll_now(&self) {
        poll_once(&self.clients, &self.watched).await;
    }

    /// Register an additional contract at runtime. Rejects duplicates
    /// and networks with no configured client.
    pub async fn add_contract(&self, contract: WatchedContractConfig) -> Result<()> {
        if !self.clients.contains_key(&contract.network) {
            anyhow::bail!("no RPC client for network {}", contract.network);
        }
        let mut watched = self.watched.write().await;
        if watched.contains_key(&contract.address) {
            anyhow::bail!("contract {} is already watched", contract.address);
        }
        info!(name = %contract.name, address = %contract.address, "Watching new contract");
        watched.insert(contract.address.clone(), unchecked_status(&contract));
        Ok(())
    }

    /// Current contract status block for the aggregated view.
    pub async fn detail(&self) -> ContractDetail {
        let watched = self.watched.read().await;
        let mut contracts: Vec<WatchedContractStatus> = watched.values().cloned().collect();
        contracts.sort_by(|a, b| a.name.cmp(&b.name));
        ContractDetail {
            active: self.is_running(),
            total_contracts: contracts.len(),
            contracts,
        }
    }

    pub async fn total_contracts(&self) -> usize {
        self.watched.read().await.len()
    }
}

fn unchecked_status(c: &WatchedContractConfig) -> WatchedContractStatus {
    WatchedContractStatus {
        name: c.name.clone(),
        address: c.address.clone(),
        network: c.network.clone(),
        deployed: false,
        balance_native: 0.0,
        last_checked: None,
    }
}

/// Refresh every watched contract; a failing query leaves the previous
/// snapshot in place.
async fn poll_once(
    clients: &HashMap<String, Arc<dyn ChainClient>>,
    watched: &Arc<RwLock<HashMap<String, WatchedContractStatus>>>,
) {
    let snapshot: Vec<(String, String)> = watched
        .read()
        .await
        .values()
        .map(|c| (c.address.clone(), c.network.clone()))
        .collect();

    for (address, network) in snapshot {
        let Some(client) = clients.get(&network) else {
            continue;
        };

        let deployed = match client.is_deployed(&address).await {
            Ok(v) => v,
            Err(e) => {
                warn!(address = %address, network = %network, error = %e, "Code check failed");
                continue;
            }
        };
        let balance = match client.native_balance(&address).await {
            Ok(v) => v,
            Err(e) => {
                warn!(address = %address, network = %network, error = %e, "Balance check failed");
                continue;
            }
        };

        let mut map = watched.write().await;
        if let Some(status) = map.get_mut(&address) {
            status.deployed = deployed;
            status.balance_native = balance;
            status.last_checked = Some(Utc::now());
            debug!(address = %address, deployed, balance, "Contract refreshed");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
