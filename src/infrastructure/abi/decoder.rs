//! Tiered call decoder using alloy-dyn-abi
//!
//! Tier 1 is the local ABI table, tier 2 the signature resolver (with type
//! overrides and raw-word reconstruction as fallbacks), tier 3 an opaque
//! call carrying only its verbatim payload. Decoding never fails; every
//! error moves the call down a tier.

use std::sync::Arc;

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, Bytes, Selector, U256};
use tracing::debug;

use super::overrides::TypeOverrideRegistry;
use super::raw;
use super::resolver::SignatureResolver;
use crate::domain::abi::signature::{build_signature, parse_types};
use crate::domain::abi::{AbiRegistry, DecodeTier, DecodedCall, DecodedParam, FunctionSignature};
use crate::domain::trace::NodeKey;

/// Call decoder backed by local ABIs, a resolver and a type-override table
pub struct CallDecoder {
    resolver: Arc<SignatureResolver>,
    overrides: TypeOverrideRegistry,
    /// ABI entries valid for every target (scanned artifacts)
    local: AbiRegistry,
}

impl CallDecoder {
    pub fn new(resolver: Arc<SignatureResolver>, overrides: TypeOverrideRegistry, local: AbiRegistry) -> Self {
        Self {
            resolver,
            overrides,
            local,
        }
    }

    pub fn resolver(&self) -> &Arc<SignatureResolver> {
        &self.resolver
    }

    /// Decode a call payload against `target`
    ///
    /// `local_abi` is the target's own ABI, checked before the shared table.
    /// Returns `None` for payloads too short to carry a selector; exactly four
    /// bytes still decodes, so zero-argument calls keep their selector.
    pub async fn decode(&self, target: Address, data: &[u8], local_abi: Option<&AbiRegistry>) -> Option<DecodedCall> {
        if data.len() < 4 {
            return None;
        }
        let selector = Selector::from_slice(&data[..4]);

        let local_hit = local_abi
            .and_then(|abi| abi.lookup(selector))
            .or_else(|| self.local.lookup(selector));
        if let Some(function) = local_hit {
            return Some(self.decode_local(target, selector, function, data));
        }

        if let Some(resolved) = self.resolver.resolve(selector).await {
            return Some(self.decode_resolved(target, selector, &resolved.name, &resolved.inputs, data));
        }

        debug!(target = %target, selector = %selector, "selector unresolved, replaying opaque");
        Some(Self::opaque(target, selector, data))
    }

    fn decode_local(&self, target: Address, selector: Selector, function: &FunctionSignature, data: &[u8]) -> DecodedCall {
        let types = function.input_types();
        let names: Vec<String> = function.inputs.iter().map(|p| p.name.clone()).collect();

        match decode_params(&types, &data[4..], false) {
            Some(values) => Self::typed(
                target,
                selector,
                &function.name,
                &types,
                &names,
                values,
                data,
                DecodeTier::TypedAbi,
            ),
            None => {
                debug!(target = %target, signature = %function.signature, "local ABI did not fit payload");
                Self::reconstructed(target, selector, &function.name, &function.signature, &types, data)
            }
        }
    }

    fn decode_resolved(&self, target: Address, selector: Selector, name: &str, inputs: &[String], data: &[u8]) -> DecodedCall {
        let payload = &data[4..];
        if let Some(values) = decode_params(inputs, payload, true) {
            return Self::typed(target, selector, name, inputs, &[], values, data, DecodeTier::ResolverTyped);
        }

        for entry in self.overrides.matching(name) {
            if let Some(values) = decode_params(&entry.types, payload, true) {
                debug!(target = %target, name, types = ?entry.types, "decoded with type override");
                return Self::typed(target, selector, name, &entry.types, &[], values, data, DecodeTier::ResolverTyped);
            }
        }

        let hints = self
            .overrides
            .matching(name)
            .next()
            .map(|entry| entry.types.clone())
            .unwrap_or_else(|| inputs.to_vec());
        let signature = build_signature(name, inputs);
        debug!(target = %target, signature = %signature, "resolved types did not fit payload, reconstructing words");
        Self::reconstructed(target, selector, name, &signature, &hints, data)
    }

    #[allow(clippy::too_many_arguments)]
    fn typed(
        target: Address,
        selector: Selector,
        name: &str,
        types: &[String],
        names: &[String],
        values: Vec<DynSolValue>,
        data: &[u8],
        tier: DecodeTier,
    ) -> DecodedCall {
        let params = types
            .iter()
            .zip(values)
            .enumerate()
            .map(|(idx, (kind, value))| DecodedParam {
                name: names
                    .get(idx)
                    .filter(|n| !n.trim().is_empty())
                    .cloned()
                    .unwrap_or_else(|| format!("arg{idx}")),
                kind: kind.clone(),
                value,
            })
            .collect();

        DecodedCall {
            key: NodeKey::default(),
            target,
            name: name.to_string(),
            signature: build_signature(name, types),
            selector: Some(selector),
            params,
            calldata: Bytes::copy_from_slice(data),
            value: U256::ZERO,
            tier,
        }
    }

    fn reconstructed(
        target: Address,
        selector: Selector,
        name: &str,
        signature: &str,
        hints: &[String],
        data: &[u8],
    ) -> DecodedCall {
        DecodedCall {
            key: NodeKey::default(),
            target,
            name: name.to_string(),
            signature: signature.to_string(),
            selector: Some(selector),
            params: raw::reconstruct(&data[4..], hints),
            calldata: Bytes::copy_from_slice(data),
            value: U256::ZERO,
            tier: DecodeTier::ResolverRaw,
        }
    }

    fn opaque(target: Address, selector: Selector, data: &[u8]) -> DecodedCall {
        let name = DecodedCall::unknown_name(selector);
        DecodedCall {
            key: NodeKey::default(),
            target,
            signature: format!("{name}()"),
            name,
            selector: Some(selector),
            params: Vec::new(),
            calldata: Bytes::copy_from_slice(data),
            value: U256::ZERO,
            tier: DecodeTier::Opaque,
        }
    }
}

/// ABI-decode a parameter list
///
/// With `strict`, the values must re-encode to exactly the payload; this
/// rejects guessed type lists that only happen to decode.
fn decode_params(types: &[String], payload: &[u8], strict: bool) -> Option<Vec<DynSolValue>> {
    let parsed = parse_types(types)?;
    let decoded = DynSolType::Tuple(parsed).abi_decode_params(payload).ok()?;
    if strict && decoded.abi_encode_params() != payload {
        return None;
    }
    match decoded {
        DynSolValue::Tuple(values) if values.len() == types.len() => Some(values),
        _ => None,
    }
}
