//! One replay reconstruction run
//!
//! `ReplayPipeline` owns every capability a run needs and threads fresh
//! per-run state (address registry, interface set) through the phases:
//! ingest, resolve the main actor, seed and prefetch selectors, load local
//! ABIs, walk, enrich, name, render. Everything after the walk only reads
//! the model the walk built.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Selector};
use tracing::{debug, info, warn};

use crate::config::{well_known, ChainConfig, Config};
use crate::domain::abi::{AbiRegistry, AbiSource};
use crate::domain::model::{AddressRegistry, ContractInterfaceSet};
use crate::domain::trace::{parse_address, parse_trace, Trace};
use crate::error::{Result, RewindError};
use crate::infrastructure::abi::{
    AbiScanner, CallDecoder, FourByteRegistry, OpenChainRegistry, SignatureRegistry, SignatureResolver,
    SourcifyClient, VerifiedAbiSource,
};
use crate::infrastructure::ethereum::{
    enrich_all, ChainedEnrichment, RpcEnrichment, StaticEnrichment, TokenDescription, TokenEnrichment,
};
use crate::modules::codegen::{render, RenderContext};
use crate::modules::export::{build_model, ExportedModel};
use crate::modules::naming::{synthesize, NamingResult};
use crate::modules::walker::{TraceWalker, WalkResult};

const DEFAULT_CHAIN: &str = "mainnet";

/// Per-run inputs that do not come from the trace
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Overrides the trace's own main actor
    pub main: Option<Address>,
    /// Chain name, alias or id; overrides the trace's chain
    pub chain: Option<String>,
    /// Fork block; overrides the trace's block number
    pub block: Option<u64>,
    /// Overrides `walker.lookahead_window`
    pub window: Option<u64>,
    /// Extra directories scanned for ABI artifacts
    pub abi_dirs: Vec<PathBuf>,
    /// Look up verified ABIs for every called contract
    pub fetch_abis: bool,
}

/// Everything a run produced
#[derive(Debug)]
pub struct ReplayOutput {
    /// Rendered Foundry test source
    pub source: String,
    pub model: ExportedModel,
    pub chain: ChainConfig,
    pub main: Address,
    pub fork_block: Option<u64>,
    pub stats: RunStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub nodes: usize,
    pub top_level_calls: usize,
    pub regions: usize,
    pub addresses: usize,
    pub interfaces: usize,
    pub seeded_selectors: usize,
    pub external_lookups: usize,
}

pub struct ReplayPipeline {
    config: Config,
    resolver: Arc<SignatureResolver>,
    /// Replaces the chain-derived enrichment stack when set
    enrichment: Option<Arc<dyn TokenEnrichment>>,
    verified: Option<Arc<dyn VerifiedAbiSource>>,
    offline: bool,
}

impl ReplayPipeline {
    /// A pipeline that never touches the network
    ///
    /// Static enrichment still applies; capabilities can be swapped in with
    /// the `with_*` builders.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            resolver: Arc::new(SignatureResolver::offline()),
            enrichment: None,
            verified: None,
            offline: true,
        }
    }

    /// A pipeline wired to the public signature registries and Sourcify,
    /// unless the config says offline
    pub fn from_config(config: Config) -> Result<Self> {
        if config.resolver.offline {
            return Ok(Self::new(config));
        }
        let timeout = Duration::from_millis(config.resolver.timeout_ms);
        let network = |err: anyhow::Error| RewindError::Config(format!("{err:#}"));

        let primary: Arc<dyn SignatureRegistry> = Arc::new(OpenChainRegistry::new(timeout).map_err(network)?);
        let secondary: Arc<dyn SignatureRegistry> = Arc::new(FourByteRegistry::new(timeout).map_err(network)?);
        let verified: Arc<dyn VerifiedAbiSource> = Arc::new(SourcifyClient::new(timeout).map_err(network)?);

        Ok(Self {
            resolver: Arc::new(SignatureResolver::new(Some(primary), Some(secondary), timeout)),
            enrichment: None,
            verified: Some(verified),
            offline: false,
            config,
        })
    }

    pub fn with_resolver(mut self, resolver: Arc<SignatureResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_enrichment(mut self, enrichment: Arc<dyn TokenEnrichment>) -> Self {
        self.enrichment = Some(enrichment);
        self
    }

    pub fn with_verified_abis(mut self, source: Arc<dyn VerifiedAbiSource>) -> Self {
        self.verified = Some(source);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn resolver(&self) -> &Arc<SignatureResolver> {
        &self.resolver
    }

    /// Parse a trace document and run on it
    pub async fn run_json(&self, text: &str, options: &RunOptions) -> Result<ReplayOutput> {
        let trace = parse_trace(text)?;
        self.run(&trace, options).await
    }

    pub async fn run(&self, trace: &Trace, options: &RunOptions) -> Result<ReplayOutput> {
        let main = resolve_main_actor(trace, options)?;
        let chain = self.resolve_chain(trace, options)?;
        let fork_block = options.block.or(trace.block_number);
        info!(nodes = trace.len(), main = %main, chain = %chain.name, block = ?fork_block, "trace ingested");

        // Selectors the trace service already decoded cost no lookups
        let seeded_selectors = self.seed_from_trace(trace).await;

        let (global_abi, per_address) = self.load_local_abis(trace, main, &chain, options).await;

        let pending: BTreeSet<Selector> = trace
            .invocations()
            .filter(|(_, inv)| inv.from == main || inv.to == main)
            .filter_map(|(_, inv)| inv.selector.map(|s| (inv.to, s)))
            .filter(|(to, selector)| {
                global_abi.lookup(*selector).is_none()
                    && per_address.get(to).map_or(true, |abi| abi.lookup(*selector).is_none())
            })
            .map(|(_, selector)| selector)
            .collect();
        debug!(selectors = pending.len(), "prefetching selectors");
        self.resolver
            .prefetch(pending, self.config.resolver.prefetch_width)
            .await;

        let decoder = CallDecoder::new(
            Arc::clone(&self.resolver),
            self.config.type_override_registry(),
            global_abi,
        );
        let window = options.window.unwrap_or(self.config.walker.lookahead_window);
        let mut addresses = AddressRegistry::new();
        let mut interfaces = ContractInterfaceSet::new();
        let walk = TraceWalker::new(&decoder, window, &per_address)
            .walk(trace, main, &mut addresses, &mut interfaces)
            .await;
        info!(
            top_level = walk.top_level.len(),
            regions = walk.regions.len(),
            addresses = addresses.len(),
            "walk complete"
        );

        let enrichment = self.enrich(&addresses, &chain, fork_block).await;
        let naming = synthesize(&interfaces, &mut addresses, &enrichment);

        let source = render(&RenderContext {
            walk: &walk,
            naming: &naming,
            main,
            tx_origin: trace.tx_origin,
            rpc_env_var: &chain.rpc_env_var,
            fork_block,
            header: header_lines(trace, &chain, fork_block),
        });
        let model = build_model(&walk, &naming, main, Some(&chain.name), fork_block);
        let stats = stats(trace, &walk, &naming, seeded_selectors, self.resolver.external_lookups());
        info!(
            interfaces = stats.interfaces,
            lookups = stats.external_lookups,
            "replay rendered"
        );

        Ok(ReplayOutput {
            source,
            model,
            chain,
            main,
            fork_block,
            stats,
        })
    }

    /// An explicit chain must exist; one named by the trace falls back to mainnet
    fn resolve_chain(&self, trace: &Trace, options: &RunOptions) -> Result<ChainConfig> {
        if let Some(name) = &options.chain {
            return self.config.chain(name);
        }
        match &trace.chain {
            Some(name) => self.config.chain(name).or_else(|err| {
                warn!(chain = %name, error = %err, "trace names an unknown chain, using {DEFAULT_CHAIN}");
                self.config.chain(DEFAULT_CHAIN)
            }),
            None => self.config.chain(DEFAULT_CHAIN),
        }
    }

    async fn seed_from_trace(&self, trace: &Trace) -> usize {
        let mut seeded = 0;
        for (_, inv) in trace.invocations() {
            let (Some(selector), Some(signature)) = (
                inv.selector,
                inv.decoded_method.as_ref().and_then(|m| m.signature.as_deref()),
            ) else {
                continue;
            };
            if self.resolver.seed(selector, signature).await {
                seeded += 1;
            }
        }
        debug!(seeded, "seeded resolver from trace");
        seeded
    }

    /// Scanned artifacts plus per-address ABI files and verified ABIs
    async fn load_local_abis(
        &self,
        trace: &Trace,
        main: Address,
        chain: &ChainConfig,
        options: &RunOptions,
    ) -> (AbiRegistry, HashMap<Address, AbiRegistry>) {
        let mut roots = self.config.abi_roots();
        roots.extend(options.abi_dirs.iter().cloned());
        let global = if roots.is_empty() {
            AbiRegistry::new()
        } else {
            match tokio::task::spawn_blocking(move || AbiScanner::scan_roots(&roots)).await {
                Ok(registry) => registry,
                Err(err) => {
                    warn!(error = %err, "ABI scan task failed");
                    AbiRegistry::new()
                }
            }
        };

        let mut per_address: HashMap<Address, AbiRegistry> = HashMap::new();
        for contract in &self.config.contracts {
            let Some(address) = parse_address(&contract.address) else {
                warn!(address = %contract.address, "ignoring contract ABI with invalid address");
                continue;
            };
            match AbiScanner::load_abi_file(&contract.abi) {
                Ok(Some(registry)) => per_address.entry(address).or_default().merge(registry),
                Ok(None) => warn!(path = %contract.abi.display(), "contract ABI file has no functions"),
                Err(err) => warn!(path = %contract.abi.display(), error = %format!("{err:#}"), "failed to load contract ABI"),
            }
        }

        if options.fetch_abis {
            match &self.verified {
                Some(source) => {
                    self.fetch_verified(source.as_ref(), trace, main, chain, &mut per_address)
                        .await
                }
                None => warn!("verified ABI lookup requested but no source is configured"),
            }
        }

        info!(
            global = global.len(),
            contracts = per_address.len(),
            "local ABIs loaded"
        );
        (global, per_address)
    }

    async fn fetch_verified(
        &self,
        source: &dyn VerifiedAbiSource,
        trace: &Trace,
        main: Address,
        chain: &ChainConfig,
        per_address: &mut HashMap<Address, AbiRegistry>,
    ) {
        let timeout = Duration::from_millis(self.config.resolver.timeout_ms);
        let targets: BTreeSet<Address> = trace
            .invocations()
            .filter(|(_, inv)| inv.from == main && inv.selector.is_some())
            .map(|(_, inv)| inv.to)
            .filter(|to| !per_address.contains_key(to))
            .collect();

        for address in targets {
            match tokio::time::timeout(timeout, source.fetch_abi(chain.chain_id, address)).await {
                Ok(Ok(Some(abi))) => {
                    let registry = AbiRegistry::from_json_abi(
                        &abi,
                        AbiSource::Verified {
                            chain_id: chain.chain_id,
                            address: format!("{address:#x}"),
                        },
                    );
                    debug!(address = %address, functions = registry.len(), "verified ABI loaded");
                    per_address.insert(address, registry);
                }
                Ok(Ok(None)) => debug!(address = %address, "contract not verified"),
                Ok(Err(err)) => warn!(address = %address, error = %format!("{err:#}"), "verified ABI lookup failed"),
                Err(_) => warn!(address = %address, "verified ABI lookup timed out"),
            }
        }
    }

    fn enrichment_source(&self, chain: &ChainConfig, block: Option<u64>) -> Option<Arc<dyn TokenEnrichment>> {
        if let Some(source) = &self.enrichment {
            return Some(Arc::clone(source));
        }
        if !self.config.enrichment.enabled {
            return None;
        }
        let mut layers: Vec<Arc<dyn TokenEnrichment>> = vec![Arc::new(StaticEnrichment::new(
            well_known(chain.chain_id),
            &self.config.tokens,
        ))];
        if !self.offline {
            match chain.rpc_url() {
                Some(url) => match RpcEnrichment::connect(&url, block) {
                    Ok(rpc) => layers.push(Arc::new(rpc)),
                    Err(err) => warn!(chain = %chain.name, error = %format!("{err:#}"), "RPC enrichment unavailable"),
                },
                None => debug!(chain = %chain.name, "no RPC URL, static enrichment only"),
            }
        }
        Some(Arc::new(ChainedEnrichment::new(layers)))
    }

    /// Describe registered addresses, then the tokens of any pairs found
    async fn enrich(
        &self,
        addresses: &AddressRegistry,
        chain: &ChainConfig,
        block: Option<u64>,
    ) -> HashMap<Address, TokenDescription> {
        let Some(source) = self.enrichment_source(chain, block) else {
            return HashMap::new();
        };
        let width = self.config.enrichment.batch_width;
        let timeout = Duration::from_millis(self.config.enrichment.timeout_ms);

        let mut found: HashMap<Address, TokenDescription> = HashMap::new();
        for (address, description) in enrich_all(source.as_ref(), &addresses.addresses(), width, timeout).await {
            if let Some(description) = description {
                found.insert(address, description);
            }
        }

        // pair names need their tokens' symbols
        let mut paired: Vec<Address> = Vec::new();
        for address in addresses.addresses() {
            if let Some((a, b)) = found.get(&address).and_then(|d| d.paired_tokens) {
                for token in [a, b] {
                    if !found.contains_key(&token) && !paired.contains(&token) {
                        paired.push(token);
                    }
                }
            }
        }
        if !paired.is_empty() {
            for (address, description) in enrich_all(source.as_ref(), &paired, width, timeout).await {
                if let Some(description) = description {
                    found.insert(address, description);
                }
            }
        }

        info!(described = found.len(), "enrichment complete");
        found
    }
}

/// `--main` wins, then the trace root, then the first sender
pub fn resolve_main_actor(trace: &Trace, options: &RunOptions) -> Result<Address> {
    options
        .main
        .or(trace.main_actor)
        .or_else(|| trace.first_sender())
        .ok_or(RewindError::NoMainActor)
}

fn header_lines(trace: &Trace, chain: &ChainConfig, block: Option<u64>) -> Vec<String> {
    let mut lines = vec![format!("Replay reconstructed by rewind for {} (chain id {})", chain.name, chain.chain_id)];
    if let Some(hash) = &trace.tx_hash {
        lines.push(format!("transaction {hash}"));
    }
    if let Some(block) = block {
        lines.push(format!("fork block {block}"));
    }
    lines
}

fn stats(
    trace: &Trace,
    walk: &WalkResult,
    naming: &NamingResult,
    seeded_selectors: usize,
    external_lookups: usize,
) -> RunStats {
    RunStats {
        nodes: trace.len(),
        top_level_calls: walk.top_level.len(),
        regions: walk.regions.len(),
        addresses: naming.addresses.len(),
        interfaces: naming.interfaces.len(),
        seeded_selectors,
        external_lookups,
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;

    use super::*;

    #[test]
    fn test_main_actor_precedence() {
        let explicit = address!("00000000000000000000000000000000000000aa");
        let root = address!("00000000000000000000000000000000000000bb");
        let mut trace = Trace {
            main_actor: Some(root),
            ..Trace::default()
        };

        let options = RunOptions {
            main: Some(explicit),
            ..RunOptions::default()
        };
        assert_eq!(resolve_main_actor(&trace, &options).unwrap(), explicit);
        assert_eq!(resolve_main_actor(&trace, &RunOptions::default()).unwrap(), root);

        trace.main_actor = None;
        assert!(matches!(
            resolve_main_actor(&trace, &RunOptions::default()),
            Err(RewindError::NoMainActor)
        ));
    }

    #[test]
    fn test_unknown_trace_chain_falls_back() {
        let pipeline = ReplayPipeline::new(Config::default());
        let trace = Trace {
            chain: Some("not-a-chain".into()),
            ..Trace::default()
        };
        let chain = pipeline.resolve_chain(&trace, &RunOptions::default()).unwrap();
        assert_eq!(chain.chain_id, 1);

        let options = RunOptions {
            chain: Some("not-a-chain".into()),
            ..RunOptions::default()
        };
        assert!(pipeline.resolve_chain(&trace, &options).is_err());
    }
}
