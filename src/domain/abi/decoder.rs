//! Decoded call model

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, Bytes, Selector, U256};
use serde::{Deserialize, Serialize};

use crate::domain::trace::NodeKey;

/// Which lookup tier produced a decoded call
///
/// Ordered from most to least trustworthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeTier {
    /// Selector matched a local ABI and the payload decoded cleanly
    TypedAbi,
    /// Selector resolved through a signature registry and the payload decoded cleanly
    ResolverTyped,
    /// Selector resolved but the payload did not fit; parameters are best-effort word guesses
    ResolverRaw,
    /// Nothing resolved; only the verbatim payload is known
    Opaque,
}

impl DecodeTier {
    /// Whether the call can be replayed through a typed interface call
    pub fn is_typed(self) -> bool {
        matches!(self, Self::TypedAbi | Self::ResolverTyped)
    }

    /// Whether the call has a trustworthy function signature at all
    pub fn has_signature(self) -> bool {
        !matches!(self, Self::Opaque)
    }
}

/// A decoded function argument
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedParam {
    /// Parameter name (or "arg{n}" if unnamed)
    pub name: String,
    /// Canonical Solidity type (e.g., "address", "uint256", "(uint256,address)")
    pub kind: String,
    /// Decoded value
    pub value: DynSolValue,
}

/// Result of decoding a function call
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCall {
    /// Ordering key of the trace node that carried this call
    pub key: NodeKey,
    /// Call target (lower-case normalized by construction)
    pub target: Address,
    /// Function name; `unknownFunction_<selector>` when unresolved
    pub name: String,
    /// Canonical signature, always `name(type,...)`
    pub signature: String,
    /// Leading 4 payload bytes, absent for plain transfers
    pub selector: Option<Selector>,
    /// Decoded arguments in declaration order
    pub params: Vec<DecodedParam>,
    /// Verbatim call payload
    pub calldata: Bytes,
    /// Native value attached to the call
    pub value: U256,
    /// Decoding tier that produced this call
    pub tier: DecodeTier,
}

impl DecodedCall {
    /// Synthetic name for a selector nothing could resolve
    pub fn unknown_name(selector: Selector) -> String {
        format!("unknownFunction_{}", hex::encode(selector))
    }

    /// A call carrying no payload at all, replayed as a native transfer
    pub fn native_transfer(target: Address, calldata: Bytes) -> Self {
        Self {
            key: NodeKey::default(),
            target,
            name: "transfer_native".to_string(),
            signature: "transfer_native()".to_string(),
            selector: None,
            params: Vec::new(),
            calldata,
            value: U256::ZERO,
            tier: DecodeTier::Opaque,
        }
    }

    /// Stamp the node key and attached value taken from the invocation
    pub fn at(mut self, key: NodeKey, value: U256) -> Self {
        self.key = key;
        self.value = value;
        self
    }

    /// Whether the call must be replayed from its verbatim payload
    pub fn requires_raw(&self) -> bool {
        !self.tier.is_typed()
    }

    /// Whether this is a plain native transfer without payload
    pub fn is_native_transfer(&self) -> bool {
        self.selector.is_none()
    }

    /// Parameter types in declaration order
    pub fn param_types(&self) -> Vec<String> {
        self.params.iter().map(|p| p.kind.clone()).collect()
    }

    /// Selector as `0x`-prefixed hex, empty for plain transfers
    pub fn selector_hex(&self) -> String {
        self.selector
            .map(|s| format!("0x{}", hex::encode(s)))
            .unwrap_or_default()
    }
}
