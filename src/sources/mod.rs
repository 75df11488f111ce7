//! Marketplace source integrations.
//!
//! Defines the `OpportunitySource` trait and provides implementations for:
//! - OpenSea — primary marketplace, highest reliability weighting
//! - Rarible — secondary marketplace
//!
//! New sources register by implementing the trait and being added to the
//! registry at wiring time — orchestration code never names a source.

pub mod opensea;
pub mod rarible;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::SourcesConfig;
use crate::types::RawListing;

/// Abstraction over external opportunity sources.
///
/// Implementors are stateless and restartable: `fetch` may fail, and a
/// failure is always treated by callers as an empty result for that
/// cycle, never as a reason to abort the cycle.
#[async_trait]
pub trait OpportunitySource: Send + Sync {
    /// Fetch the current batch of raw listings from this source.
    async fn fetch(&self) -> Result<Vec<RawListing>>;

    /// Source name for logging, scoring, and the natural key.
    fn name(&self) -> &str;
}

/// Build the source registry from config.
///
/// Disabled sources are simply absent from the returned set.
pub fn build_registry(cfg: &SourcesConfig) -> Result<Vec<Arc<dyn OpportunitySource>>> {
    let mut sources: Vec<Arc<dyn OpportunitySource>> = Vec::new();

    if cfg.opensea.enabled {
        let api_key = cfg
            .opensea
            .api_key_env
            .as_deref()
            .and_then(|env| std::env::var(env).ok());
        sources.push(Arc::new(opensea::OpenSeaClient::new(api_key)?));
    }

    if cfg.rarible.enabled {
        sources.push(Arc::new(rarible::RaribleClient::new()?));
    }

    Ok(sources)
}
