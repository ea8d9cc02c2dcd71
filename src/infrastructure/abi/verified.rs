//! Verified contract ABIs from Sourcify

use std::time::Duration;

use alloy_json_abi::JsonAbi;
use alloy_primitives::Address;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

/// Per-address verified ABI lookup capability
#[async_trait]
pub trait VerifiedAbiSource: Send + Sync {
    /// `Ok(None)` when the contract is not verified
    async fn fetch_abi(&self, chain_id: u64, address: Address) -> Result<Option<JsonAbi>>;
}

#[derive(Debug, Deserialize)]
struct SourcifyResponse {
    abi: Option<serde_json::Value>,
}

/// Sourcify v2 API client
pub struct SourcifyClient {
    http: reqwest::Client,
    base_url: String,
}

impl SourcifyClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .context("Failed to create HTTP client")?,
            base_url: "https://sourcify.dev/server/v2/contract".to_string(),
        })
    }
}

#[async_trait]
impl VerifiedAbiSource for SourcifyClient {
    async fn fetch_abi(&self, chain_id: u64, address: Address) -> Result<Option<JsonAbi>> {
        let url = format!(
            "{}/{}/0x{}?fields=abi",
            self.base_url,
            chain_id,
            hex::encode(address)
        );

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to query Sourcify API")?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            anyhow::bail!("Sourcify API returned status {}", response.status());
        }

        let data: SourcifyResponse = response
            .json()
            .await
            .context("Failed to parse Sourcify response")?;

        match data.abi {
            Some(abi) => Ok(Some(
                serde_json::from_value(abi).context("Sourcify returned an unreadable ABI")?,
            )),
            None => Ok(None),
        }
    }
}
