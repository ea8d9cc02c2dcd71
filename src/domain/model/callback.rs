//! Callback regions and their classification tables

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::abi::DecodedCall;
use crate::domain::trace::NodeKey;

/// Reentrancy pattern a callback region belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackKind {
    /// Aave-style `executeOperation` and other plain flash-loan callbacks
    FlashLoan,
    /// Balancer vault `receiveFlashLoan`
    Balancer,
    /// dYdX solo margin `callFunction`
    Dydx,
    /// Morpho `onMorphoFlashLoan`
    Morpho,
    /// Uniswap V3 pool `uniswapV3SwapCallback`
    UniswapV3Swap,
    /// Uniswap V3 pool `uniswapV3FlashCallback`
    UniswapV3Flash,
    /// Any other callback name mentioning flash or loan
    GenericFlashLoan,
    /// Nothing in the vocabulary matched
    Unknown,
}

impl CallbackKind {
    pub fn tag(self) -> &'static str {
        match self {
            Self::FlashLoan => "flash_loan",
            Self::Balancer => "balancer",
            Self::Dydx => "dydx",
            Self::Morpho => "morpho",
            Self::UniswapV3Swap => "uniswap_v3_swap",
            Self::UniswapV3Flash => "uniswap_v3_flash",
            Self::GenericFlashLoan => "generic_flash_loan",
            Self::Unknown => "unknown_callback",
        }
    }
}

impl fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One row of the classification table
///
/// Matches when the lower-cased method name contains every `all` fragment
/// and, if `any` is non-empty, at least one `any` fragment.
struct ClassifyRule {
    all: &'static [&'static str],
    any: &'static [&'static str],
    kind: CallbackKind,
}

impl ClassifyRule {
    fn matches(&self, lowered: &str) -> bool {
        self.all.iter().all(|frag| lowered.contains(frag))
            && (self.any.is_empty() || self.any.iter().any(|frag| lowered.contains(frag)))
    }
}

/// Evaluated top to bottom; names that contain a more generic fragment
/// (`receiveFlashLoan` contains `flashloan`) must sit above it.
const CLASSIFY_TABLE: &[ClassifyRule] = &[
    ClassifyRule { all: &["receiveflashloan"], any: &[], kind: CallbackKind::Balancer },
    ClassifyRule { all: &["onmorphoflashloan"], any: &[], kind: CallbackKind::Morpho },
    ClassifyRule { all: &["morpho"], any: &[], kind: CallbackKind::Morpho },
    ClassifyRule { all: &["uniswapv3swapcallback"], any: &[], kind: CallbackKind::UniswapV3Swap },
    ClassifyRule { all: &["uniswapv3flashcallback"], any: &[], kind: CallbackKind::UniswapV3Flash },
    ClassifyRule { all: &["callfunction"], any: &[], kind: CallbackKind::Dydx },
    ClassifyRule { all: &["flashloan"], any: &[], kind: CallbackKind::FlashLoan },
    ClassifyRule { all: &["executeoperation"], any: &[], kind: CallbackKind::FlashLoan },
    ClassifyRule { all: &["callback"], any: &["flash", "loan"], kind: CallbackKind::GenericFlashLoan },
];

/// Classify the callback method invoked back into the main actor
pub fn classify(callback_name: &str) -> CallbackKind {
    let lowered = callback_name.to_ascii_lowercase();
    CLASSIFY_TABLE
        .iter()
        .find(|rule| rule.matches(&lowered))
        .map(|rule| rule.kind)
        .unwrap_or(CallbackKind::Unknown)
}

/// A main-actor method known to call back into its caller
pub struct TriggerRule {
    /// Lower-cased method name
    pub name: &'static str,
    /// Restrict the rule to one canonical signature
    pub signature: Option<&'static str>,
    /// Callback the provider invokes on the caller
    pub callback: &'static str,
}

/// Signature-specific rows precede the name-only row for the same method.
pub const TRIGGER_TABLE: &[TriggerRule] = &[
    TriggerRule {
        name: "flashloan",
        signature: Some("flashLoan(address,address[],uint256[],bytes)"),
        callback: "receiveFlashLoan",
    },
    TriggerRule {
        name: "flashloan",
        signature: Some("flashLoan(address,uint256,bytes)"),
        callback: "onMorphoFlashLoan",
    },
    TriggerRule {
        name: "flashloan",
        signature: Some("flashLoan(address,address,uint256,bytes)"),
        callback: "onFlashLoan",
    },
    TriggerRule { name: "flashloan", signature: None, callback: "executeOperation" },
    TriggerRule { name: "flashloansimple", signature: None, callback: "executeOperation" },
    TriggerRule { name: "flash", signature: None, callback: "uniswapV3FlashCallback" },
    TriggerRule {
        name: "swap",
        signature: Some("swap(address,bool,int256,uint160,bytes)"),
        callback: "uniswapV3SwapCallback",
    },
    TriggerRule { name: "operate", signature: None, callback: "callFunction" },
];

/// Find the trigger rule for a main-actor call, if its method opens a callback region
pub fn trigger_for(name: &str, signature: &str) -> Option<&'static TriggerRule> {
    let lowered = name.to_ascii_lowercase();
    TRIGGER_TABLE.iter().find(|rule| {
        rule.name == lowered && rule.signature.map_or(true, |sig| sig == signature)
    })
}

/// A span of trace nodes presumed to run inside a reentrant callback
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackRegion {
    pub kind: CallbackKind,
    /// Node key of the triggering main-actor call
    pub trigger_key: NodeKey,
    /// The triggering call itself; replayed from the main routine
    pub trigger: DecodedCall,
    /// Inclusive start of the region
    pub start: NodeKey,
    /// Exclusive end of the region
    pub end: NodeKey,
    /// Callback method name the kind was classified from
    pub callback_name: String,
    /// Full callback signature, when the callback entry was decoded
    pub callback_signature: Option<String>,
    /// Main-actor calls made inside the region, in trace order
    pub calls: Vec<DecodedCall>,
    /// Set when the main actor calls again on the first node past the window
    pub suspect_truncation: bool,
}
