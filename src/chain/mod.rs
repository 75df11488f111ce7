//! Chain access — read-only JSON-RPC clients plus the wallet and
//! contract monitors built on them.
//!
//! This layer is strictly observational: balance, block, and code
//! queries only. Transaction signing and fund movement are a separate
//! trust boundary and have no representation here.

pub mod contracts;
pub mod wallet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::types::WEI_PER_NATIVE;

/// Opaque read-only chain query capability.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current head block number. Doubles as a connectivity probe.
    async fn block_number(&self) -> Result<u64>;

    /// Native-currency balance of an address, in native units.
    async fn native_balance(&self, address: &str) -> Result<f64>;

    /// Whether any bytecode is deployed at the address.
    async fn is_deployed(&self, address: &str) -> Result<bool>;

    /// Network name for logging and status payloads.
    fn network(&self) -> &str;
}

// ---------------------------------------------------------------------------
// JSON-RPC implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// Ethereum-style JSON-RPC client over HTTP.
pub struct JsonRpcClient {
    http: Client,
    rpc_url: String,
    network: String,
}

impl JsonRpcClient {
    pub fn new(network: &str, rpc_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build chain HTTP client")?;
        Ok(Self {
            http,
            rpc_url: rpc_url.to_string(),
            network: network.to_string(),
        })
    }

    async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let resp: RpcResponse = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("RPC request to {} failed", self.network))?
            .json()
            .await
            .with_context(|| format!("Malformed RPC response from {}", self.network))?;

        if let Some(err) = resp.error {
            anyhow::bail!("RPC error from {}: {err}", self.network);
        }
        resp.result
            .ok_or_else(|| anyhow::anyhow!("Empty RPC result from {}", self.network))
    }
}

/// Parse a "0x..." hex quantity into u128.
fn parse_hex_quantity(value: &serde_json::Value) -> Result<u128> {
    let s = value
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("RPC quantity is not a string"))?;
    let trimmed = s.trim_start_matches("0x");
    u128::from_str_radix(trimmed, 16).context("Invalid hex quantity in RPC response")
}

#[async_trait]
impl ChainClient for JsonRpcClient {
    async fn block_number(&self) -> Result<u64> {
        let result = self.call("eth_blockNumber", json!([])).await?;
        Ok(parse_hex_quantity(&result)? as u64)
    }

    async fn native_balance(&self, address: &str) -> Result<f64> {
        let result = self
            .call("eth_getBalance", json!([address, "latest"]))
            .await?;
        let wei = parse_hex_quantity(&result)?;
        Ok(wei as f64 / WEI_PER_NATIVE)
    }

    async fn is_deployed(&self, address: &str) -> Result<bool> {
        let result = self.call("eth_getCode", json!([address, "latest"])).await?;
        let code = result.as_str().unwrap_or("0x");
        Ok(code != "0x" && !code.is_empty())
    }

    fn network(&self) -> &str {
        &self.network
    }
}

/// Native token symbol per well-known network name.
pub fn native_token_symbol(network: &str) -> &'static str {
    match network {
        "polygon" => "MATIC",
        "bsc" => "BNB",
        _ => "ETH", // ethereum, arbitrum, and anything unrecognized
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
