//! Callback handler declarations for reentrant regions

use alloy_dyn_abi::DynSolType;

use super::structs::has_empty_tuple;
use crate::domain::abi::parse_signature;
use crate::domain::model::CallbackRegion;
use crate::modules::toolkit::sanitize_identifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerReturn {
    Nothing,
    /// Aave-style `executeOperation`
    True,
    /// ERC-3156 `onFlashLoan` magic value
    Erc3156Magic,
}

/// Which function a region's calls replay from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerSpec {
    Function {
        name: String,
        /// Canonical parameter types
        params: Vec<String>,
        returns: HandlerReturn,
    },
    Fallback,
}

struct KnownHandler {
    name: &'static str,
    params: &'static [&'static str],
    returns: HandlerReturn,
}

const KNOWN_HANDLERS: &[KnownHandler] = &[
    KnownHandler {
        name: "executeOperation",
        params: &["address[]", "uint256[]", "uint256[]", "address", "bytes"],
        returns: HandlerReturn::True,
    },
    KnownHandler {
        name: "executeOperation",
        params: &["address", "uint256", "uint256", "address", "bytes"],
        returns: HandlerReturn::True,
    },
    KnownHandler {
        name: "onFlashLoan",
        params: &["address", "address", "uint256", "uint256", "bytes"],
        returns: HandlerReturn::Erc3156Magic,
    },
    KnownHandler {
        name: "receiveFlashLoan",
        params: &["address[]", "uint256[]", "uint256[]", "bytes"],
        returns: HandlerReturn::Nothing,
    },
    KnownHandler {
        name: "callFunction",
        params: &["address", "(address,uint256)", "bytes"],
        returns: HandlerReturn::Nothing,
    },
    KnownHandler {
        name: "onMorphoFlashLoan",
        params: &["uint256", "bytes"],
        returns: HandlerReturn::Nothing,
    },
    KnownHandler {
        name: "uniswapV3SwapCallback",
        params: &["int256", "int256", "bytes"],
        returns: HandlerReturn::Nothing,
    },
    KnownHandler {
        name: "uniswapV3FlashCallback",
        params: &["uint256", "uint256", "bytes"],
        returns: HandlerReturn::Nothing,
    },
];

impl KnownHandler {
    fn spec(&self) -> HandlerSpec {
        HandlerSpec::Function {
            name: self.name.to_string(),
            params: self.params.iter().map(|p| p.to_string()).collect(),
            returns: self.returns,
        }
    }
}

/// dYdX `Account.Info`
pub const ACCOUNT_INFO_SHAPE: &str = "(address,uint256)";

fn declarable(name: &str, params: &[String]) -> bool {
    sanitize_identifier(name) == name
        && params
            .iter()
            .all(|p| DynSolType::parse(p).is_ok_and(|ty| !has_empty_tuple(&ty)))
}

/// Pick the handler declaration for a region
///
/// An observed callback signature wins; otherwise the callback name picks a
/// known declaration; anything else replays from `fallback`.
pub fn handler_for(region: &CallbackRegion) -> HandlerSpec {
    if let Some((name, params)) = region.callback_signature.as_deref().and_then(parse_signature) {
        let known = KNOWN_HANDLERS
            .iter()
            .find(|h| h.name == name && h.params.iter().copied().eq(params.iter().map(String::as_str)));
        if let Some(known) = known {
            return known.spec();
        }
        if declarable(&name, &params) {
            return HandlerSpec::Function {
                name,
                params,
                returns: HandlerReturn::Nothing,
            };
        }
    }

    let wanted = region.callback_name.to_ascii_lowercase();
    let simple = region.trigger.name.eq_ignore_ascii_case("flashLoanSimple");
    let mut candidates = KNOWN_HANDLERS
        .iter()
        .filter(|h| h.name.to_ascii_lowercase() == wanted);
    let known = if simple && wanted == "executeoperation" {
        candidates.nth(1)
    } else {
        candidates.next()
    };
    known.map(KnownHandler::spec).unwrap_or(HandlerSpec::Fallback)
}

impl HandlerSpec {
    pub fn uses_account_info(&self) -> bool {
        matches!(self, Self::Function { params, .. } if params.iter().any(|p| p == ACCOUNT_INFO_SHAPE))
    }
}
