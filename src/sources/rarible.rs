//! Rarible marketplace integration.
//!
//! Pulls the latest items from the public multichain API and extracts
//! the best active sell order per item.
//!
//! Base URL: https://api.rarible.org/v0.1
//! Auth: not required for reads.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::OpportunitySource;
use crate::types::{RawListing, WEI_PER_NATIVE};

const BASE_URL: &str = "https://api.rarible.org/v0.1";
const SOURCE_NAME: &str = "rarible";

const FETCH_LIMIT: u32 = 50;

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ItemsResponse {
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Item {
    /// "ETHEREUM:0xabc..." style multichain contract identifier.
    #[serde(default)]
    contract: String,
    #[serde(default)]
    token_id: String,
    #[serde(default)]
    collection: Option<String>,
    #[serde(default)]
    meta: Option<ItemMeta>,
    #[serde(default)]
    best_sell_order: Option<BestSellOrder>,
}

#[derive(Debug, Deserialize)]
struct ItemMeta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BestSellOrder {
    /// Price in native currency units, serialized as a decimal string.
    #[serde(default)]
    make_price: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Rarible source client.
pub struct RaribleClient {
    http: Client,
}

impl RaribleClient {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("prospector/0.1")
            .build()
            .context("Failed to build Rarible HTTP client")?;
        Ok(Self { http })
    }

    fn listing_from_item(item: &Item) -> Option<RawListing> {
        if item.contract.is_empty() || item.token_id.is_empty() {
            return None;
        }

        // Strip the chain prefix to keep the natural key a plain address.
        let contract_address = item
            .contract
            .rsplit(':')
            .next()
            .unwrap_or(&item.contract)
            .to_string();

        // makePrice is already in native units; normalize to wei so the
        // listing shape is uniform across sources.
        let best_sell_order_wei = item
            .best_sell_order
            .as_ref()
            .and_then(|o| o.make_price.as_deref())
            .and_then(|p| p.parse::<f64>().ok())
            .map(|native| native * WEI_PER_NATIVE);

        Some(RawListing {
            source: SOURCE_NAME.to_string(),
            contract_address: contract_address.clone(),
            token_id: item.token_id.clone(),
            name: item.meta.as_ref().and_then(|m| m.name.clone()),
            collection_name: item.collection.clone(),
            best_sell_order_wei,
            marketplace_url: Some(format!(
                "https://rarible.com/token/{}:{}",
                contract_address, item.token_id
            )),
            image_url: item.meta.as_ref().and_then(|m| m.image.clone()),
            raw: serde_json::json!({
                "contract": item.contract,
                "tokenId": item.token_id,
                "collection": item.collection,
            }),
        })
    }
}

#[async_trait]
impl OpportunitySource for RaribleClient {
    async fn fetch(&self) -> Result<Vec<RawListing>> {
        let url = format!("{BASE_URL}/items/all");
        let resp = self
            .http
            .get(&url)
            .query(&[("size", FETCH_LIMIT.to_string()), ("sort", "LATEST".into())])
            .send()
            .await
            .context("Rarible request failed")?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("Rarible returned HTTP {status}");
        }

        let body: ItemsResponse = resp
            .json()
            .await
            .context("Failed to parse Rarible items response")?;

        let listings: Vec<RawListing> = body
            .items
            .iter()
            .filter_map(Self::listing_from_item)
            .collect();

        debug!(count = listings.len(), "Rarible items fetched");
        Ok(listings)
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
