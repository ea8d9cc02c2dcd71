//! Trace walker and callback detector
//!
//! Walks nodes in ordering-key order, decodes every main-actor call, and
//! splits them into top-level calls and callback regions. Registration into
//! the address registry happens in the same order, which is what keeps
//! `addrN` assignment deterministic.

use std::collections::HashMap;

use alloy_primitives::Address;
use tracing::{debug, warn};

use crate::domain::abi::signature::build_signature;
use crate::domain::abi::{parse_signature, AbiRegistry, DecodedCall};
use crate::domain::model::{classify, trigger_for, AddressRegistry, CallbackRegion, ContractInterfaceSet};
use crate::domain::trace::{Invocation, NodeKey, Trace, TraceNode};
use crate::infrastructure::abi::CallDecoder;

/// Output of a walk: everything the main actor replays
#[derive(Debug, Clone, Default)]
pub struct WalkResult {
    pub top_level: Vec<DecodedCall>,
    pub regions: Vec<CallbackRegion>,
}

/// One entry of the main replay routine
#[derive(Debug, Clone, Copy)]
pub enum ReplayStep<'a> {
    Call(&'a DecodedCall),
    /// The call that opens a region; its body replays from the handler
    Trigger(&'a CallbackRegion),
}

impl ReplayStep<'_> {
    pub fn key(&self) -> NodeKey {
        match self {
            Self::Call(call) => call.key,
            Self::Trigger(region) => region.trigger_key,
        }
    }
}

impl WalkResult {
    /// Top-level calls and region triggers merged by node key
    pub fn steps(&self) -> Vec<ReplayStep<'_>> {
        let mut steps: Vec<ReplayStep<'_>> = self
            .top_level
            .iter()
            .map(ReplayStep::Call)
            .chain(self.regions.iter().map(ReplayStep::Trigger))
            .collect();
        // stable: within one node, calls keep trace order
        steps.sort_by_key(ReplayStep::key);
        steps
    }

    /// Every replayed call: top-level calls, then each region trigger and its calls
    pub fn all_calls(&self) -> impl Iterator<Item = &DecodedCall> {
        self.top_level
            .iter()
            .chain(self.regions.iter().flat_map(|r| std::iter::once(&r.trigger).chain(r.calls.iter())))
    }
}

struct OpenRegion {
    region: CallbackRegion,
    /// A callback entry was seen and named the region's kind
    observed: bool,
}

pub struct TraceWalker<'a> {
    decoder: &'a CallDecoder,
    window: u64,
    local_abis: &'a HashMap<Address, AbiRegistry>,
}

impl<'a> TraceWalker<'a> {
    pub fn new(decoder: &'a CallDecoder, window: u64, local_abis: &'a HashMap<Address, AbiRegistry>) -> Self {
        Self {
            decoder,
            window: window.max(1),
            local_abis,
        }
    }

    /// Walk the trace on behalf of `main`
    pub async fn walk(
        &self,
        trace: &Trace,
        main: Address,
        addresses: &mut AddressRegistry,
        interfaces: &mut ContractInterfaceSet,
    ) -> WalkResult {
        let mut result = WalkResult::default();
        let mut active: Option<OpenRegion> = None;

        for node in trace.iter() {
            let key = node.key;

            if let Some(open) = active.take() {
                if key >= open.region.end {
                    result.regions.push(self.close(open, node, main));
                } else {
                    active = Some(open);
                }
            }

            for inv in &node.invocations {
                if inv.to == main && inv.from != main {
                    if let Some(open) = active.as_mut() {
                        self.observe_callback(open, inv).await;
                    }
                    continue;
                }
                if inv.from != main {
                    continue;
                }

                let call = self.decode(key, inv).await;
                addresses.register(call.target);
                interfaces.touch(call.target);
                if call.tier.has_signature() && !call.is_native_transfer() {
                    interfaces.record(call.target, &call.signature);
                }

                if let Some(open) = active.as_mut() {
                    debug!(%key, call = %call.name, kind = %open.region.kind, "call inside callback region");
                    open.region.calls.push(call);
                    continue;
                }

                let trigger_name = if call.tier.has_signature() {
                    Some(call.name.as_str())
                } else {
                    inv.reported_name()
                };
                match trigger_name.and_then(|name| trigger_for(name, &call.signature)) {
                    Some(rule) => {
                        let start = key.offset(1);
                        debug!(%key, trigger = %call.name, callback = rule.callback, "opening callback region");
                        active = Some(OpenRegion {
                            region: CallbackRegion {
                                kind: classify(rule.callback),
                                trigger_key: key,
                                trigger: call,
                                start,
                                end: start.offset(self.window),
                                callback_name: rule.callback.to_string(),
                                callback_signature: None,
                                calls: Vec::new(),
                                suspect_truncation: false,
                            },
                            observed: false,
                        });
                    }
                    None => result.top_level.push(call),
                }
            }
        }

        if let Some(open) = active {
            result.regions.push(open.region);
        }

        debug!(
            top_level = result.top_level.len(),
            regions = result.regions.len(),
            addresses = addresses.len(),
            "walk complete"
        );
        result
    }

    async fn decode(&self, key: NodeKey, inv: &Invocation) -> DecodedCall {
        let local = self.local_abis.get(&inv.to);
        self.decoder
            .decode(inv.to, &inv.calldata, local)
            .await
            .unwrap_or_else(|| DecodedCall::native_transfer(inv.to, inv.calldata.clone()))
            .at(key, inv.value)
    }

    /// Name the region after the first callback entry whose method is known
    async fn observe_callback(&self, open: &mut OpenRegion, inv: &Invocation) {
        if open.observed {
            return;
        }
        let reported = inv.decoded_method.as_ref().filter(|m| !m.name.is_empty());
        let (name, signature) = match reported {
            Some(method) => (
                method.name.clone(),
                method
                    .signature
                    .as_deref()
                    .and_then(parse_signature)
                    .map(|(n, types)| build_signature(&n, &types)),
            ),
            None => match inv.selector {
                Some(selector) => match self.decoder.resolver().resolve(selector).await {
                    Some(resolved) => (resolved.name, Some(resolved.signature)),
                    None => return,
                },
                None => return,
            },
        };

        debug!(callback = %name, trigger_key = %open.region.trigger_key, "observed callback entry");
        open.region.kind = classify(&name);
        open.region.callback_name = name;
        open.region.callback_signature = signature;
        open.observed = true;
    }

    /// `node` is the first node at or past the window end
    fn close(&self, open: OpenRegion, node: &TraceNode, main: Address) -> CallbackRegion {
        let mut region = open.region;
        if node.invocations.iter().any(|inv| inv.from == main) {
            warn!(
                trigger_key = %region.trigger_key,
                end = %region.end,
                window = self.window,
                "main actor resumes on the first node past the callback window, region may be truncated"
            );
            region.suspect_truncation = true;
        }
        region
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use alloy_dyn_abi::DynSolValue;
    use alloy_primitives::{address, Bytes, Selector, U256};

    use super::*;
    use crate::domain::abi::{selector_of, AbiSource, FunctionSignature, ParamSpec};
    use crate::domain::model::CallbackKind;
    use crate::domain::trace::TraceMethod;
    use crate::infrastructure::abi::{SignatureResolver, TypeOverrideRegistry};

    const MAIN: Address = address!("1111111111111111111111111111111111111111");
    const LENDER: Address = address!("2222222222222222222222222222222222222222");
    const TOKEN: Address = address!("3333333333333333333333333333333333333333");
    const DEX: Address = address!("4444444444444444444444444444444444444444");

    fn param(kind: &str) -> ParamSpec {
        ParamSpec {
            name: String::new(),
            kind: kind.to_string(),
        }
    }

    fn local_abi() -> AbiRegistry {
        let mut abi = AbiRegistry::new();
        for (name, kinds) in [
            ("transfer", vec!["address", "uint256"]),
            ("flashLoan", vec!["address", "uint256", "bytes"]),
            ("approve", vec!["address", "uint256"]),
        ] {
            abi.insert(FunctionSignature::from_parts(
                name,
                kinds.into_iter().map(param).collect(),
                AbiSource::Inline,
            ));
        }
        abi
    }

    fn decoder() -> CallDecoder {
        CallDecoder::new(
            Arc::new(SignatureResolver::offline()),
            TypeOverrideRegistry::builtin(),
            local_abi(),
        )
    }

    fn calldata(signature: &str, args: Vec<DynSolValue>) -> Bytes {
        let mut data = selector_of(signature).to_vec();
        data.extend(DynSolValue::Tuple(args).abi_encode_params());
        Bytes::from(data)
    }

    fn transfer_data() -> Bytes {
        calldata(
            "transfer(address,uint256)",
            vec![DynSolValue::Address(DEX), DynSolValue::Uint(U256::from(5u8), 256)],
        )
    }

    fn flash_data() -> Bytes {
        calldata(
            "flashLoan(address,uint256,bytes)",
            vec![
                DynSolValue::Address(TOKEN),
                DynSolValue::Uint(U256::from(1u8), 256),
                DynSolValue::Bytes(vec![]),
            ],
        )
    }

    fn inv(from: Address, to: Address, data: Bytes) -> Invocation {
        Invocation {
            from,
            to,
            selector: (data.len() >= 4).then(|| Selector::from_slice(&data[..4])),
            calldata: data,
            value: U256::ZERO,
            gas_used: None,
            decoded_method: None,
        }
    }

    fn trace(nodes: Vec<(u64, Invocation)>) -> Trace {
        let mut map = BTreeMap::new();
        for (key, invocation) in nodes {
            map.entry(NodeKey(key))
                .or_insert_with(|| TraceNode {
                    key: NodeKey(key),
                    invocations: Vec::new(),
                })
                .invocations
                .push(invocation);
        }
        Trace {
            nodes: map,
            ..Default::default()
        }
    }

    async fn walk(trace: &Trace, window: u64) -> (WalkResult, AddressRegistry, ContractInterfaceSet) {
        let decoder = decoder();
        let abis = HashMap::new();
        let walker = TraceWalker::new(&decoder, window, &abis);
        let mut addresses = AddressRegistry::new();
        let mut interfaces = ContractInterfaceSet::new();
        let result = walker.walk(trace, MAIN, &mut addresses, &mut interfaces).await;
        (result, addresses, interfaces)
    }

    #[tokio::test]
    async fn test_plain_call_is_top_level() {
        let t = trace(vec![(0, inv(MAIN, TOKEN, transfer_data()))]);
        let (result, addresses, interfaces) = walk(&t, 50).await;

        assert_eq!(result.top_level.len(), 1);
        assert_eq!(result.top_level[0].name, "transfer");
        assert_eq!(result.top_level[0].params.len(), 2);
        assert!(result.regions.is_empty());
        assert_eq!(addresses.name_of(&TOKEN), Some("addr1"));
        assert!(interfaces.signatures(&TOKEN).unwrap().contains("transfer(address,uint256)"));
    }

    #[tokio::test]
    async fn test_flash_loan_brackets_following_calls() {
        let t = trace(vec![
            (10, inv(MAIN, LENDER, flash_data())),
            (11, inv(LENDER, TOKEN, transfer_data())),
            (12, inv(MAIN, TOKEN, transfer_data())),
            (13, inv(MAIN, DEX, transfer_data())),
            (14, inv(MAIN, TOKEN, transfer_data())),
        ]);
        let (result, addresses, _) = walk(&t, 50).await;

        assert!(result.top_level.is_empty());
        assert_eq!(result.regions.len(), 1);
        let region = &result.regions[0];
        assert_eq!(region.kind, CallbackKind::Morpho);
        assert_eq!(region.trigger_key, NodeKey(10));
        assert_eq!(region.calls.iter().map(|c| c.key.0).collect::<Vec<_>>(), vec![12, 13, 14]);
        assert_eq!(addresses.addresses(), vec![LENDER, TOKEN, DEX]);
    }

    #[tokio::test]
    async fn test_observed_callback_names_the_region() {
        let mut entry = inv(LENDER, MAIN, Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]));
        entry.decoded_method = Some(TraceMethod {
            name: "executeOperation".to_string(),
            signature: Some("executeOperation(address[] assets,uint256[],uint256[],address,bytes)".to_string()),
        });
        let t = trace(vec![
            (1, inv(MAIN, LENDER, flash_data())),
            (2, entry),
            (3, inv(MAIN, TOKEN, transfer_data())),
        ]);
        let (result, _, _) = walk(&t, 50).await;

        let region = &result.regions[0];
        assert_eq!(region.kind, CallbackKind::FlashLoan);
        assert_eq!(region.callback_name, "executeOperation");
        assert_eq!(
            region.callback_signature.as_deref(),
            Some("executeOperation(address[],uint256[],uint256[],address,bytes)")
        );
    }

    #[tokio::test]
    async fn test_calls_past_window_are_top_level_and_flagged() {
        let t = trace(vec![
            (0, inv(MAIN, LENDER, flash_data())),
            (1, inv(MAIN, TOKEN, transfer_data())),
            (3, inv(MAIN, DEX, transfer_data())),
            (9, inv(MAIN, TOKEN, transfer_data())),
        ]);
        let (result, _, _) = walk(&t, 2).await;

        let region = &result.regions[0];
        assert_eq!(region.end, NodeKey(3));
        assert_eq!(region.calls.len(), 1);
        assert!(region.suspect_truncation);
        assert_eq!(result.top_level.iter().map(|c| c.key.0).collect::<Vec<_>>(), vec![3, 9]);

        let keys: Vec<u64> = result.steps().iter().map(|s| s.key().0).collect();
        assert_eq!(keys, vec![0, 3, 9]);
    }

    #[tokio::test]
    async fn test_sparse_keys_flag_first_node_past_window() {
        let t = trace(vec![
            (10, inv(MAIN, LENDER, flash_data())),
            (20, inv(MAIN, TOKEN, transfer_data())),
            (30, inv(MAIN, DEX, transfer_data())),
        ]);
        let (result, _, _) = walk(&t, 15).await;

        let region = &result.regions[0];
        assert_eq!(region.end, NodeKey(26));
        assert_eq!(region.calls.len(), 1);
        assert!(region.suspect_truncation);
        assert_eq!(result.top_level.iter().map(|c| c.key.0).collect::<Vec<_>>(), vec![30]);
    }

    #[tokio::test]
    async fn test_quiet_node_past_window_is_not_flagged() {
        let t = trace(vec![
            (10, inv(MAIN, LENDER, flash_data())),
            (20, inv(MAIN, TOKEN, transfer_data())),
            (30, inv(DEX, TOKEN, transfer_data())),
            (40, inv(MAIN, DEX, transfer_data())),
        ]);
        let (result, _, _) = walk(&t, 15).await;
        assert!(!result.regions[0].suspect_truncation);
        assert_eq!(result.top_level.len(), 1);
    }

    #[tokio::test]
    async fn test_other_actors_and_plain_transfers() {
        let mut value_transfer = inv(MAIN, DEX, Bytes::new());
        value_transfer.value = U256::from(7u8);
        let t = trace(vec![
            (0, inv(DEX, TOKEN, transfer_data())),
            (1, value_transfer),
            (2, inv(MAIN, TOKEN, Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]))),
        ]);
        let (result, addresses, interfaces) = walk(&t, 50).await;

        assert_eq!(result.top_level.len(), 2);
        assert!(result.top_level[0].is_native_transfer());
        assert_eq!(result.top_level[0].value, U256::from(7u8));
        assert!(result.top_level[1].requires_raw());
        assert_eq!(addresses.len(), 2);
        assert!(interfaces.signatures(&TOKEN).unwrap().is_empty());
    }
}
