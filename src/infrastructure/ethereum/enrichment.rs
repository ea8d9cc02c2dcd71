//! Token metadata enrichment
//!
//! Enrichment only improves generated names. Every failure, timeout included,
//! is logged and treated as "nothing known".

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::eips::BlockId;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, Bytes, TxKind};
use alloy_sol_types::{sol, SolCall};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{TokenSpec, WellKnown, WellKnownKind};

sol! {
    function symbol() external view returns (string);
    function name() external view returns (string);
    function decimals() external view returns (uint8);
    function token0() external view returns (address);
    function token1() external view returns (address);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Erc20,
    Pair,
    Unknown,
}

/// What enrichment learned about one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenDescription {
    pub kind: TokenKind,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub decimals: Option<u8>,
    pub paired_tokens: Option<(Address, Address)>,
}

impl TokenDescription {
    pub fn token(symbol: &str, name: Option<&str>, decimals: Option<u8>) -> Self {
        Self {
            kind: TokenKind::Erc20,
            symbol: Some(symbol.to_string()),
            name: name.map(str::to_string),
            decimals,
            paired_tokens: None,
        }
    }

    /// A named contract that is not a token
    pub fn labelled(name: &str) -> Self {
        Self {
            kind: TokenKind::Unknown,
            symbol: None,
            name: Some(name.to_string()),
            decimals: None,
            paired_tokens: None,
        }
    }
}

/// Address metadata lookup capability
#[async_trait]
pub trait TokenEnrichment: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` when nothing is known about the address
    async fn describe(&self, address: Address) -> Result<Option<TokenDescription>>;
}

/// Fixed table: well-known addresses plus configured tokens
#[derive(Debug, Clone, Default)]
pub struct StaticEnrichment {
    entries: HashMap<Address, TokenDescription>,
}

impl StaticEnrichment {
    pub fn new<'a>(well_known: impl IntoIterator<Item = &'a WellKnown>, tokens: &[TokenSpec]) -> Self {
        let mut entries = HashMap::new();
        for entry in well_known {
            let description = match entry.kind {
                WellKnownKind::Token { symbol, decimals } => {
                    TokenDescription::token(symbol, Some(entry.name), Some(decimals))
                }
                WellKnownKind::Protocol => TokenDescription::labelled(entry.name),
            };
            entries.insert(entry.address, description);
        }
        // configured tokens shadow the built-in table
        for token in tokens {
            match token.parsed_address() {
                Ok(address) => {
                    entries.insert(
                        address,
                        TokenDescription::token(&token.display_symbol(), token.name.as_deref(), token.decimals),
                    );
                }
                Err(err) => warn!(error = %err, "ignoring configured token"),
            }
        }
        Self { entries }
    }

    pub fn insert(&mut self, address: Address, description: TokenDescription) {
        self.entries.insert(address, description);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl TokenEnrichment for StaticEnrichment {
    fn name(&self) -> &str {
        "static"
    }

    async fn describe(&self, address: Address) -> Result<Option<TokenDescription>> {
        Ok(self.entries.get(&address).cloned())
    }
}

/// `eth_call`-backed token metadata
pub struct RpcEnrichment {
    provider: DynProvider,
    block: Option<u64>,
}

impl RpcEnrichment {
    pub fn connect(rpc_url: &str, block: Option<u64>) -> Result<Self> {
        let url = rpc_url.parse().context("Invalid HTTP URL")?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self { provider, block })
    }

    async fn call(&self, address: Address, data: Vec<u8>) -> Result<Bytes> {
        let request = TransactionRequest {
            to: Some(TxKind::Call(address)),
            input: TransactionInput::new(Bytes::from(data)),
            ..Default::default()
        };
        let call = self.provider.call(request);
        let out = match self.block {
            Some(block) => call.block(BlockId::number(block)).await?,
            None => call.await?,
        };
        Ok(out)
    }

    /// Call a view function and decode its single return value
    async fn view(&self, address: Address, data: Vec<u8>, ty: &DynSolType) -> Option<DynSolValue> {
        let out = self.call(address, data).await.ok()?;
        if out.is_empty() {
            return None;
        }
        ty.abi_decode(&out).ok()
    }

    async fn text(&self, address: Address, data: Vec<u8>) -> Option<String> {
        match self.view(address, data.clone(), &DynSolType::String).await {
            Some(DynSolValue::String(s)) => Some(s),
            // some older tokens return bytes32
            _ => match self.view(address, data, &DynSolType::FixedBytes(32)).await {
                Some(DynSolValue::FixedBytes(word, _)) => {
                    let trimmed: Vec<u8> = word.iter().copied().take_while(|b| *b != 0).collect();
                    String::from_utf8(trimmed).ok()
                }
                _ => None,
            },
        }
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
    }

    async fn address_of(&self, address: Address, data: Vec<u8>) -> Option<Address> {
        match self.view(address, data, &DynSolType::Address).await {
            Some(DynSolValue::Address(a)) => Some(a),
            _ => None,
        }
    }
}

#[async_trait]
impl TokenEnrichment for RpcEnrichment {
    fn name(&self) -> &str {
        "rpc"
    }

    async fn describe(&self, address: Address) -> Result<Option<TokenDescription>> {
        let token0 = self.address_of(address, token0Call {}.abi_encode()).await;
        let token1 = self.address_of(address, token1Call {}.abi_encode()).await;
        let symbol = self.text(address, symbolCall {}.abi_encode()).await;
        let name = self.text(address, nameCall {}.abi_encode()).await;
        let decimals = match self.view(address, decimalsCall {}.abi_encode(), &DynSolType::Uint(8)).await {
            Some(DynSolValue::Uint(v, _)) => u8::try_from(v).ok(),
            _ => None,
        };

        if let (Some(a), Some(b)) = (token0, token1) {
            return Ok(Some(TokenDescription {
                kind: TokenKind::Pair,
                symbol,
                name,
                decimals,
                paired_tokens: Some((a, b)),
            }));
        }
        if symbol.is_none() && decimals.is_none() {
            return Ok(None);
        }
        Ok(Some(TokenDescription {
            kind: TokenKind::Erc20,
            symbol,
            name,
            decimals,
            paired_tokens: None,
        }))
    }
}

/// Layers tried in order; the first that knows an address wins
pub struct ChainedEnrichment {
    layers: Vec<Arc<dyn TokenEnrichment>>,
}

impl ChainedEnrichment {
    pub fn new(layers: Vec<Arc<dyn TokenEnrichment>>) -> Self {
        Self { layers }
    }
}

#[async_trait]
impl TokenEnrichment for ChainedEnrichment {
    fn name(&self) -> &str {
        "chained"
    }

    async fn describe(&self, address: Address) -> Result<Option<TokenDescription>> {
        for layer in &self.layers {
            match layer.describe(address).await {
                Ok(Some(found)) => return Ok(Some(found)),
                Ok(None) => {}
                Err(err) => {
                    warn!(source = layer.name(), address = %address, error = %format!("{err:#}"), "enrichment lookup failed");
                }
            }
        }
        Ok(None)
    }
}

/// Describe every address with bounded concurrency
///
/// Output order is input order regardless of completion order. Errors and
/// timeouts become `None`.
pub async fn enrich_all(
    source: &dyn TokenEnrichment,
    addresses: &[Address],
    width: usize,
    timeout: Duration,
) -> Vec<(Address, Option<TokenDescription>)> {
    stream::iter(addresses.iter().copied())
        .map(|address| async move {
            let found = match tokio::time::timeout(timeout, source.describe(address)).await {
                Ok(Ok(found)) => found,
                Ok(Err(err)) => {
                    warn!(source = source.name(), address = %address, error = %format!("{err:#}"), "enrichment lookup failed");
                    None
                }
                Err(_) => {
                    warn!(source = source.name(), address = %address, "enrichment lookup timed out");
                    None
                }
            };
            debug!(address = %address, known = found.is_some(), "enriched");
            (address, found)
        })
        .buffered(width.max(1))
        .collect()
        .await
}
