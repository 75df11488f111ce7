//! OpenSea marketplace integration.
//!
//! Scans recent assets for listings with no active sell order (potentially
//! free mints) or very low asking prices.
//!
//! Base URL: https://api.opensea.io/api/v1
//! Auth: optional `X-API-KEY` header; public reads work unauthenticated
//! at a lower rate limit.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::OpportunitySource;
use crate::types::RawListing;

const BASE_URL: &str = "https://api.opensea.io/api/v1";
const SOURCE_NAME: &str = "opensea";

/// Assets fetched per scan (API max is 50 unauthenticated).
const FETCH_LIMIT: u32 = 50;

// ---------------------------------------------------------------------------
// API response types (OpenSea JSON → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AssetsResponse {
    #[serde(default)]
    assets: Vec<Asset>,
}

/// We only deserialize the fields we need.
#[derive(Debug, Deserialize)]
struct Asset {
    #[serde(default)]
    token_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    asset_contract: Option<AssetContract>,
    #[serde(default)]
    collection: Option<Collection>,
    #[serde(default)]
    sell_orders: Option<Vec<SellOrder>>,
}

#[derive(Debug, Deserialize)]
struct AssetContract {
    #[serde(default)]
    address: String,
}

#[derive(Debug, Deserialize)]
struct Collection {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SellOrder {
    /// Current asking price in wei, serialized as a decimal string.
    #[serde(default)]
    current_price: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// OpenSea source client.
pub struct OpenSeaClient {
    http: Client,
    api_key: Option<String>,
}

impl OpenSeaClient {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("prospector/0.1")
            .build()
            .context("Failed to build OpenSea HTTP client")?;
        Ok(Self { http, api_key })
    }

    fn listing_from_asset(asset: &Asset) -> Option<RawListing> {
        let contract_address = asset
            .asset_contract
            .as_ref()
            .map(|c| c.address.clone())
            .unwrap_or_default();
        if contract_address.is_empty() || asset.token_id.is_empty() {
            return None;
        }

        // Lowest active sell order, in wei. Absent orders mean the asset
        // has no asking price at all.
        let best_sell_order_wei = asset
            .sell_orders
            .as_ref()
            .and_then(|orders| {
                orders
                    .iter()
                    .filter_map(|o| o.current_price.as_deref())
                    .filter_map(|p| p.parse::<f64>().ok())
                    .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            });

        Some(RawListing {
            source: SOURCE_NAME.to_string(),
            contract_address,
            token_id: asset.token_id.clone(),
            name: asset.name.clone(),
            collection_name: asset.collection.as_ref().and_then(|c| c.name.clone()),
            best_sell_order_wei,
            marketplace_url: asset.permalink.clone(),
            image_url: asset.image_url.clone(),
            raw: serde_json::json!({
                "token_id": asset.token_id,
                "name": asset.name,
                "permalink": asset.permalink,
            }),
        })
    }
}

#[async_trait]
impl OpportunitySource for OpenSeaClient {
    async fn fetch(&self) -> Result<Vec<RawListing>> {
        let url = format!("{BASE_URL}/assets");
        let mut req = self.http.get(&url).query(&[
            ("order_direction", "desc"),
            ("limit", &FETCH_LIMIT.to_string()),
            ("include_orders", "true"),
        ]);
        if let Some(ref key) = self.api_key {
            req = req.header("X-API-KEY", key);
        }

        let resp = req.send().await.context("OpenSea request failed")?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("OpenSea returned HTTP {status}");
        }

        let body: AssetsResponse = resp
            .json()
            .await
            .context("Failed to parse OpenSea assets response")?;

        let listings: Vec<RawListing> = body
            .assets
            .iter()
            .filter_map(Self::listing_from_asset)
            .collect();

        debug!(count = listings.len(), "OpenSea assets fetched");
        Ok(listings)
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
