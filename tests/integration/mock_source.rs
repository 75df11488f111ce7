//! Mock opportunity source for integration testing.
//!
//! Provides a deterministic `OpportunitySource` implementation that
//! returns known listings — all in-memory with no external
//! dependencies.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use prospector::sources::OpportunitySource;
use prospector::types::{RawListing, WEI_PER_NATIVE};

/// A mock marketplace source for deterministic testing.
///
/// Listings and failure behaviour are fully controllable from test
/// code.
pub struct MockSource {
    name: String,
    listings: Arc<Mutex<Vec<RawListing>>>,
    /// If set, fetches return this error.
    force_error: Arc<Mutex<Option<String>>>,
    fetch_count: Arc<Mutex<usize>>,
}

impl MockSource {
    /// Create a mock with a default spread of listings.
    pub fn new(name: &str) -> Self {
        Self::with_listings(name, Self::default_listings(name))
    }

    pub fn with_listings(name: &str, listings: Vec<RawListing>) -> Self {
        Self {
            name: name.to_string(),
            listings: Arc::new(Mutex::new(listings)),
            force_error: Arc::new(Mutex::new(None)),
            fetch_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Force all subsequent fetches to return an error.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    pub fn fetch_count(&self) -> usize {
        *self.fetch_count.lock().unwrap()
    }

    pub fn listing(
        source: &str,
        token_id: &str,
        collection: &str,
        price_native: Option<f64>,
    ) -> RawListing {
        RawListing {
            source: source.to_string(),
            contract_address: "0xmock0000000000000000000000000000000001".to_string(),
            token_id: token_id.to_string(),
            name: Some(format!("{collection} #{token_id}")),
            collection_name: Some(collection.to_string()),
            best_sell_order_wei: price_native.map(|p| p * WEI_PER_NATIVE),
            marketplace_url: Some(format!("https://mock.example.com/{token_id}")),
            image_url: Some(format!("https://mock.example.com/{token_id}.png")),
            raw: serde_json::json!({"token_id": token_id}),
        }
    }

    /// A default spread: one free item with a scoring keyword, one
    /// cheap item, one priced well above any sane cap.
    fn default_listings(source: &str) -> Vec<RawListing> {
        vec![
            Self::listing(source, "1", "Pixel Punks", None),
            Self::listing(source, "2", "Quiet Landscapes", Some(0.0005)),
            Self::listing(source, "3", "Blue Chips", Some(5.0)),
        ]
    }
}

#[async_trait]
impl OpportunitySource for MockSource {
    async fn fetch(&self) -> Result<Vec<RawListing>> {
        *self.fetch_count.lock().unwrap() += 1;
        if let Some(err) = self.force_error.lock().unwrap().as_ref() {
            return Err(anyhow!("{}", err));
        }
        Ok(self.listings.lock().unwrap().clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_fetch_listings() {
        let source = MockSource::new("mock-market");
        let listings = source.fetch().await.unwrap();
        assert_eq!(listings.len(), 3);
        assert!(listings.iter().any(|l| l.best_sell_order_wei.is_none()));
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_forced_error() {
        let source = MockSource::new("mock-market");
        source.set_error("simulated marketplace outage");
        assert!(source.fetch().await.is_err());

        source.clear_error();
        assert!(source.fetch().await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_custom_listings() {
        let listings = vec![MockSource::listing("custom", "7", "Grumpy Cats", None)];
        let source = MockSource::with_listings("custom", listings);
        let fetched = source.fetch().await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].token_id, "7");
        assert_eq!(fetched[0].collection_name.as_deref(), Some("Grumpy Cats"));
    }
}
