//! The hunting loop.
//!
//! Fans out to every registered opportunity source, normalizes and
//! scores what came back, and persists qualifying candidates. One
//! source failing, timing out, or returning garbage never aborts the
//! cycle — its contribution is simply empty.

use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::scorer::score_candidate;
use crate::config::HuntingConfig;
use crate::sources::OpportunitySource;
use crate::storage::Store;
use crate::types::{OpportunityCandidate, OpportunityStatus, RawListing};

/// Periodic opportunity discovery over a set of sources.
pub struct HuntingLoop {
    sources: Vec<Arc<dyn OpportunitySource>>,
    store: Arc<dyn Store>,
    config: HuntingConfig,
    running: Arc<AtomicBool>,
    /// Bumped on every start and stop; a spawned task exits once its
    /// generation goes stale, so a restart never stacks a second loop.
    generation: Arc<AtomicU64>,
}

impl HuntingLoop {
    pub fn new(
        sources: Vec<Arc<dyn OpportunitySource>>,
        store: Arc<dyn Store>,
        config: HuntingConfig,
    ) -> Self {
        Self {
            sources,
            store,
            config,
            running: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the hunting loop. Idempotent: returns immediately if a
    /// loop is already active.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("Hunting loop already running");
            return;
        }
        info!(
            sources = self.sources.len(),
            interval_secs = self.config.interval_secs,
            "Starting hunting loop"
        );

        let sources = self.sources.clone();
        let store = Arc::clone(&self.store);
        let config = self.config.clone();
        let generation = Arc::clone(&self.generation);
        let my_gen = generation.fetch_add(1, Ordering::SeqCst) + 1;

        tokio::spawn(async move {
            while generation.load(Ordering::SeqCst) == my_gen {
                if let Err(e) = run_cycle(&sources, &store, &config).await {
                    warn!(error = %e, "Hunting cycle failed");
                }
                tokio::time::sleep(Duration::from_secs(config.interval_secs)).await;
            }
            debug!("Hunting loop exited");
        });
    }

    /// Request a cooperative stop. The current cycle finishes; the loop
    /// exits before the next one.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.generation.fetch_add(1, Ordering::SeqCst);
            info!("Stopping hunting loop");
        }
    }

    /// One full cycle, outside the loop. Used at startup and by tests.
    pub async fn run_once(&self) -> Result<usize> {
        run_cycle(&self.sources, &self.store, &self.config).await
    }
}

/// One fan-out / normalize / score / persist pass. Returns the number
/// of candidates actually inserted.
async fn run_cycle(
    sources: &[Arc<dyn OpportunitySource>],
    store: &Arc<dyn Store>,
    config: &HuntingConfig,
) -> Result<usize> {
    let timeout = Duration::from_secs(config.fetch_timeout_secs);

    let fetches = sources.iter().map(|source| {
        let source = Arc::clone(source);
        async move {
            let name = source.name().to_string();
            match tokio::time::timeout(timeout, source.fetch()).await {
                Ok(Ok(listings)) => {
                    debug!(source = %name, count = listings.len(), "Source fetch succeeded");
                    listings
                }
                Ok(Err(e)) => {
                    warn!(source = %name, error = %e, "Source fetch failed");
                    Vec::new()
                }
                Err(_) => {
                    warn!(source = %name, timeout_secs = timeout.as_secs(), "Source fetch timed out");
                    Vec::new()
                }
            }
        }
    });

    let listings: Vec<RawListing> = join_all(fetches).await.into_iter().flatten().collect();
    let fetched = listings.len();

    let mut inserted = 0usize;
    let mut qualifying = 0usize;
    for listing in listings {
        let Some(mut candidate) = normalize(listing, config) else {
            continue;
        };
        candidate.score = score_candidate(&candidate, &config.scoring);
        if candidate.score < config.min_score {
            continue;
        }
        qualifying += 1;
        if store.upsert_opportunity(&candidate).await? {
            inserted += 1;
            info!(
                source = %candidate.source,
                contract = %candidate.contract_address,
                token = %candidate.token_id,
                score = candidate.score,
                price = candidate.price_native,
                "New opportunity"
            );
        }
    }

    debug!(fetched, qualifying, inserted, "Hunting cycle complete");
    Ok(inserted)
}

/// Apply the free/cheap filter and shape a listing into a candidate.
/// Listings with no sell order count as free.
fn normalize(listing: RawListing, config: &HuntingConfig) -> Option<OpportunityCandidate> {
    let price_native = listing.best_sell_order_native().unwrap_or(0.0);
    if price_native > config.max_price_native {
        return None;
    }

    Some(OpportunityCandidate {
        source: listing.source,
        contract_address: listing.contract_address,
        token_id: listing.token_id,
        name: listing.name,
        collection_name: listing.collection_name,
        price_native,
        score: 0.0,
        marketplace_url: listing.marketplace_url,
        image_url: listing.image_url,
        metadata: listing.raw,
        discovered_at: Utc::now(),
        status: OpportunityStatus::Discovered,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
