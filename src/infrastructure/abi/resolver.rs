//! Selector resolution via OpenChain and 4byte registries
//!
//! The [`SignatureResolver`] sits in front of two injected registry
//! capabilities (primary, secondary) and memoizes every outcome, misses
//! included, so each selector costs at most one round of external lookups
//! per run.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Selector;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::domain::abi::{parse_selector_hex, parse_signature, selector_of};

/// A signature as reported by a registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySignature {
    pub function_name: String,
    pub text_signature: String,
    pub parameter_types: Vec<String>,
}

impl RegistrySignature {
    /// Build from a text signature, splitting out name and parameter types
    pub fn from_text(text: &str) -> Option<Self> {
        let (name, types) = parse_signature(text)?;
        Some(Self {
            text_signature: format!("{}({})", name, types.join(",")),
            function_name: name,
            parameter_types: types,
        })
    }
}

/// External selector → signature lookup capability
#[async_trait]
pub trait SignatureRegistry: Send + Sync {
    /// Short name used in diagnostics
    fn name(&self) -> &str;

    /// `Ok(None)` means the registry does not know the selector
    async fn lookup(&self, selector: Selector) -> Result<Option<RegistrySignature>>;
}

/// Where a resolved signature came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureOrigin {
    /// Already decoded by the trace service
    Trace,
    Primary,
    Secondary,
}

/// Resolved function signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSignature {
    pub selector: Selector,
    /// e.g., "transfer"
    pub name: String,
    /// e.g., "transfer(address,uint256)"
    pub signature: String,
    /// Parameter types in declaration order
    pub inputs: Vec<String>,
    pub origin: SignatureOrigin,
}

/// Tiered, memoizing selector resolver
pub struct SignatureResolver {
    primary: Option<Arc<dyn SignatureRegistry>>,
    secondary: Option<Arc<dyn SignatureRegistry>>,
    timeout: Duration,
    /// Cache: selector -> outcome, misses stored as `None`
    cache: RwLock<HashMap<Selector, Option<ResolvedSignature>>>,
    external_lookups: AtomicUsize,
}

impl SignatureResolver {
    pub fn new(
        primary: Option<Arc<dyn SignatureRegistry>>,
        secondary: Option<Arc<dyn SignatureRegistry>>,
        timeout: Duration,
    ) -> Self {
        Self {
            primary,
            secondary,
            timeout,
            cache: RwLock::new(HashMap::new()),
            external_lookups: AtomicUsize::new(0),
        }
    }

    /// A resolver that never leaves the process
    pub fn offline() -> Self {
        Self::new(None, None, Duration::from_secs(1))
    }

    /// Resolve a selector given as hex text; malformed input resolves to `None`
    pub async fn resolve_hex(&self, selector: &str) -> Option<ResolvedSignature> {
        match parse_selector_hex(selector) {
            Some(selector) => self.resolve(selector).await,
            None => None,
        }
    }

    /// Resolve a selector through the cache, then primary, then secondary
    pub async fn resolve(&self, selector: Selector) -> Option<ResolvedSignature> {
        // Check cache first
        {
            let cache = self.cache.read().await;
            if let Some(hit) = cache.get(&selector) {
                return hit.clone();
            }
        }

        let result = self.query_registries(selector).await;

        {
            let mut cache = self.cache.write().await;
            cache.insert(selector, result.clone());
        }

        result
    }

    async fn query_registries(&self, selector: Selector) -> Option<ResolvedSignature> {
        let tiers = [
            (self.primary.as_ref(), SignatureOrigin::Primary),
            (self.secondary.as_ref(), SignatureOrigin::Secondary),
        ];

        for (registry, origin) in tiers {
            let Some(registry) = registry else { continue };
            self.external_lookups.fetch_add(1, Ordering::Relaxed);

            match tokio::time::timeout(self.timeout, registry.lookup(selector)).await {
                Ok(Ok(Some(found))) => {
                    if let Some(resolved) = Self::accept(selector, found, origin, registry.name()) {
                        return Some(resolved);
                    }
                }
                Ok(Ok(None)) => {
                    debug!(registry = registry.name(), selector = %selector, "selector not found");
                }
                Ok(Err(err)) => {
                    warn!(registry = registry.name(), selector = %selector, error = %format!("{err:#}"), "signature lookup failed");
                }
                Err(_) => {
                    warn!(registry = registry.name(), selector = %selector, timeout_ms = self.timeout.as_millis() as u64, "signature lookup timed out");
                }
            }
        }

        None
    }

    /// Keep a registry answer only if it really hashes to the selector
    fn accept(
        selector: Selector,
        found: RegistrySignature,
        origin: SignatureOrigin,
        registry: &str,
    ) -> Option<ResolvedSignature> {
        let canonical = format!("{}({})", found.function_name, found.parameter_types.join(","));
        if selector_of(&canonical) != selector {
            warn!(registry, selector = %selector, signature = %canonical, "registry signature does not hash to selector, ignoring");
            return None;
        }
        Some(ResolvedSignature {
            selector,
            name: found.function_name,
            signature: canonical,
            inputs: found.parameter_types,
            origin,
        })
    }

    /// Seed the cache with a signature the trace already decoded
    ///
    /// Ignored when the text does not hash to the selector or the selector
    /// is already cached.
    pub async fn seed(&self, selector: Selector, signature: &str) -> bool {
        let Some(found) = RegistrySignature::from_text(signature) else {
            return false;
        };
        if selector_of(&found.text_signature) != selector {
            return false;
        }
        let mut cache = self.cache.write().await;
        if cache.get(&selector).is_some_and(Option::is_some) {
            return false;
        }
        cache.insert(
            selector,
            Some(ResolvedSignature {
                selector,
                name: found.function_name,
                signature: found.text_signature,
                inputs: found.parameter_types,
                origin: SignatureOrigin::Trace,
            }),
        );
        true
    }

    /// Resolve many selectors with bounded concurrency, filling the cache
    pub async fn prefetch(&self, selectors: impl IntoIterator<Item = Selector>, width: usize) {
        let mut seen = HashSet::new();
        let pending: Vec<Selector> = {
            let cache = self.cache.read().await;
            selectors
                .into_iter()
                .filter(|s| !cache.contains_key(s) && seen.insert(*s))
                .collect()
        };
        if pending.is_empty() {
            return;
        }
        debug!(count = pending.len(), width, "prefetching selectors");

        stream::iter(pending)
            .map(|selector| self.resolve(selector))
            .buffer_unordered(width.max(1))
            .collect::<Vec<_>>()
            .await;
    }

    /// Get cached selector resolution without any lookup
    ///
    /// Outer `None`: never looked up. Inner `None`: looked up, unknown.
    pub async fn cached(&self, selector: Selector) -> Option<Option<ResolvedSignature>> {
        self.cache.read().await.get(&selector).cloned()
    }

    /// Number of external registry queries made so far
    pub fn external_lookups(&self) -> usize {
        self.external_lookups.load(Ordering::Relaxed)
    }
}

/// OpenChain API response structures
#[derive(Debug, Deserialize)]
struct OpenChainResponse {
    ok: bool,
    result: OpenChainResult,
}

#[derive(Debug, Deserialize)]
struct OpenChainResult {
    #[serde(default)]
    function: HashMap<String, Option<Vec<OpenChainSignature>>>,
}

#[derive(Debug, Deserialize)]
struct OpenChainSignature {
    name: String,
}

/// OpenChain signature database (the one `cast 4byte` uses)
pub struct OpenChainRegistry {
    http: reqwest::Client,
    base_url: String,
}

impl OpenChainRegistry {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .context("Failed to create HTTP client")?,
            base_url: "https://api.openchain.xyz/signature-database/v1/lookup".to_string(),
        })
    }
}

#[async_trait]
impl SignatureRegistry for OpenChainRegistry {
    fn name(&self) -> &str {
        "openchain"
    }

    async fn lookup(&self, selector: Selector) -> Result<Option<RegistrySignature>> {
        let selector_hex = format!("0x{}", hex::encode(selector));
        let url = format!("{}?function={}&filter=true", self.base_url, selector_hex);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to query OpenChain API")?;

        if !response.status().is_success() {
            anyhow::bail!("OpenChain API returned status {}", response.status());
        }

        let data: OpenChainResponse = response
            .json()
            .await
            .context("Failed to parse OpenChain response")?;

        if !data.ok {
            anyhow::bail!("OpenChain API returned ok=false");
        }

        Ok(data
            .result
            .function
            .get(&selector_hex)
            .and_then(|sigs| sigs.as_ref())
            .and_then(|sigs| sigs.iter().find_map(|s| RegistrySignature::from_text(&s.name))))
    }
}

/// 4byte.directory API response structures
#[derive(Debug, Deserialize)]
struct FourByteResponse {
    #[serde(default)]
    results: Vec<FourByteSignature>,
}

#[derive(Debug, Deserialize)]
struct FourByteSignature {
    id: u64,
    text_signature: String,
}

/// 4byte.directory signature registry
pub struct FourByteRegistry {
    http: reqwest::Client,
    base_url: String,
}

impl FourByteRegistry {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .context("Failed to create HTTP client")?,
            base_url: "https://www.4byte.directory/api/v1/signatures/".to_string(),
        })
    }
}

#[async_trait]
impl SignatureRegistry for FourByteRegistry {
    fn name(&self) -> &str {
        "4byte"
    }

    async fn lookup(&self, selector: Selector) -> Result<Option<RegistrySignature>> {
        let url = format!("{}?hex_signature=0x{}", self.base_url, hex::encode(selector));

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to query 4byte API")?;

        if !response.status().is_success() {
            anyhow::bail!("4byte API returned status {}", response.status());
        }

        let data: FourByteResponse = response
            .json()
            .await
            .context("Failed to parse 4byte response")?;

        // Oldest submission is the least likely to be a collision squatter
        let mut results = data.results;
        results.sort_by_key(|r| r.id);
        Ok(results
            .iter()
            .find_map(|r| RegistrySignature::from_text(&r.text_signature)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRegistry {
        name: &'static str,
        answer: Option<&'static str>,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SignatureRegistry for FixedRegistry {
        fn name(&self) -> &str {
            self.name
        }

        async fn lookup(&self, _selector: Selector) -> Result<Option<RegistrySignature>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("boom");
            }
            Ok(self.answer.and_then(RegistrySignature::from_text))
        }
    }

    fn registry(
        name: &'static str,
        answer: Option<&'static str>,
        fail: bool,
    ) -> (Arc<dyn SignatureRegistry>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let reg = FixedRegistry {
            name,
            answer,
            fail,
            calls: calls.clone(),
        };
        (Arc::new(reg), calls)
    }

    fn transfer_selector() -> Selector {
        selector_of("transfer(address,uint256)")
    }

    #[tokio::test]
    async fn test_primary_hit_skips_secondary() {
        let (primary, p_calls) = registry("p", Some("transfer(address,uint256)"), false);
        let (secondary, s_calls) = registry("s", Some("transfer(address,uint256)"), false);
        let resolver = SignatureResolver::new(Some(primary), Some(secondary), Duration::from_secs(1));

        let sig = resolver.resolve(transfer_selector()).await.unwrap();
        assert_eq!(sig.name, "transfer");
        assert_eq!(sig.inputs, vec!["address", "uint256"]);
        assert_eq!(sig.origin, SignatureOrigin::Primary);
        assert_eq!(p_calls.load(Ordering::SeqCst), 1);
        assert_eq!(s_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_primary_falls_back_to_secondary() {
        let (primary, _) = registry("p", None, true);
        let (secondary, s_calls) = registry("s", Some("transfer(address,uint256)"), false);
        let resolver = SignatureResolver::new(Some(primary), Some(secondary), Duration::from_secs(1));

        let sig = resolver.resolve_hex("0xA9059CBB").await.unwrap();
        assert_eq!(sig.origin, SignatureOrigin::Secondary);
        assert_eq!(s_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_negative_results_are_cached() {
        let (primary, p_calls) = registry("p", None, false);
        let (secondary, s_calls) = registry("s", None, false);
        let resolver = SignatureResolver::new(Some(primary), Some(secondary), Duration::from_secs(1));

        assert!(resolver.resolve_hex("deadbeef").await.is_none());
        assert!(resolver.resolve_hex("0xdeadbeef").await.is_none());
        assert_eq!(p_calls.load(Ordering::SeqCst), 1);
        assert_eq!(s_calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.external_lookups(), 2);
        assert_eq!(resolver.cached(parse_selector_hex("deadbeef").unwrap()).await, Some(None));
    }

    #[tokio::test]
    async fn test_mismatched_registry_answer_is_ignored() {
        let (primary, _) = registry("p", Some("approve(address,uint256)"), false);
        let resolver = SignatureResolver::new(Some(primary), None, Duration::from_secs(1));
        assert!(resolver.resolve(transfer_selector()).await.is_none());
    }

    #[tokio::test]
    async fn test_seed_and_malformed_input() {
        let resolver = SignatureResolver::offline();
        assert!(resolver.seed(transfer_selector(), "transfer(address to, uint256 amount)").await);
        assert!(!resolver.seed(transfer_selector(), "approve(address,uint256)").await);

        let sig = resolver.resolve(transfer_selector()).await.unwrap();
        assert_eq!(sig.origin, SignatureOrigin::Trace);
        assert!(resolver.resolve_hex("0x1234").await.is_none());
        assert!(resolver.resolve_hex("zzzzzzzz").await.is_none());
        assert_eq!(resolver.external_lookups(), 0);
    }

    #[tokio::test]
    async fn test_prefetch_deduplicates() {
        let (primary, p_calls) = registry("p", Some("transfer(address,uint256)"), false);
        let resolver = SignatureResolver::new(Some(primary), None, Duration::from_secs(1));
        let sel = transfer_selector();
        resolver.prefetch(vec![sel, sel, sel], 4).await;
        assert_eq!(p_calls.load(Ordering::SeqCst), 1);
        assert!(resolver.cached(sel).await.unwrap().is_some());
    }
}
