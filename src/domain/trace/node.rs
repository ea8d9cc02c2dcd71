//! Canonical trace model produced by the ingestion boundary

use std::collections::BTreeMap;
use std::fmt;

use alloy_primitives::{Address, Bytes, Selector, U256};
use serde::{Deserialize, Serialize};

/// Ordering key of a trace node; defines happens-before between nodes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeKey(pub u64);

impl NodeKey {
    /// Key `n` positions later, saturating at the top of the key space
    pub fn offset(self, n: u64) -> Self {
        Self(self.0.saturating_add(n))
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Method information the trace service already decoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceMethod {
    pub name: String,
    pub signature: Option<String>,
}

/// A single call captured within a node
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub from: Address,
    pub to: Address,
    pub selector: Option<Selector>,
    pub calldata: Bytes,
    pub value: U256,
    pub gas_used: Option<u64>,
    pub decoded_method: Option<TraceMethod>,
}

impl Invocation {
    /// Method name as reported by the trace, if any
    pub fn reported_name(&self) -> Option<&str> {
        self.decoded_method
            .as_ref()
            .map(|m| m.name.as_str())
            .filter(|name| !name.is_empty())
    }
}

/// One entry of the trace's node map
#[derive(Debug, Clone, PartialEq)]
pub struct TraceNode {
    pub key: NodeKey,
    pub invocations: Vec<Invocation>,
}

/// A fully ingested trace: nodes in ordering-key order plus root metadata
#[derive(Debug, Clone, Default)]
pub struct Trace {
    pub nodes: BTreeMap<NodeKey, TraceNode>,
    /// Main actor named by the trace document itself
    pub main_actor: Option<Address>,
    /// Transaction origin, when the trace reports one
    pub tx_origin: Option<Address>,
    pub block_number: Option<u64>,
    pub chain: Option<String>,
    pub tx_hash: Option<String>,
}

impl Trace {
    /// Iterate nodes in ordering-key order
    pub fn iter(&self) -> impl Iterator<Item = &TraceNode> {
        self.nodes.values()
    }

    /// Iterate all invocations with their node key, in ordering-key order
    pub fn invocations(&self) -> impl Iterator<Item = (NodeKey, &Invocation)> {
        self.nodes
            .values()
            .flat_map(|node| node.invocations.iter().map(move |inv| (node.key, inv)))
    }

    /// Source address of the earliest invocation
    pub fn first_sender(&self) -> Option<Address> {
        self.invocations().next().map(|(_, inv)| inv.from)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
