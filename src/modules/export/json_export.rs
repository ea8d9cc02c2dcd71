//! JSON Export
//!
//! Serializes the reconstructed call model. Numeric values are written as
//! decimal strings so 256-bit amounts survive JSON consumers.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::Address;
use anyhow::{Context, Result};
use serde::Serialize;

use crate::domain::abi::{DecodeTier, DecodedCall};
use crate::domain::model::{CallbackKind, CallbackRegion, NameOrigin};
use crate::modules::naming::NamingResult;
use crate::modules::toolkit::checksum;
use crate::modules::walker::WalkResult;

#[derive(Debug, Serialize)]
pub struct ExportedModel {
    pub main_actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<u64>,
    pub top_level: Vec<ExportedCall>,
    pub regions: Vec<ExportedRegion>,
    pub addresses: Vec<ExportedAddress>,
    pub interfaces: Vec<ExportedInterface>,
}

#[derive(Debug, Serialize)]
pub struct ExportedCall {
    key: u64,
    target: String,
    name: String,
    signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    selector: Option<String>,
    tier: DecodeTier,
    value: String,
    calldata: String,
    args: Vec<ExportedArg>,
}

#[derive(Debug, Serialize)]
struct ExportedArg {
    name: String,
    kind: String,
    value: String,
}

#[derive(Debug, Serialize)]
pub struct ExportedRegion {
    kind: CallbackKind,
    trigger: ExportedCall,
    start: u64,
    end: u64,
    callback: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_signature: Option<String>,
    suspect_truncation: bool,
    calls: Vec<ExportedCall>,
}

#[derive(Debug, Serialize)]
pub struct ExportedAddress {
    address: String,
    name: String,
    origin: NameOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    interface: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExportedInterface {
    name: String,
    signatures: Vec<String>,
    addresses: Vec<String>,
}

impl From<&DecodedCall> for ExportedCall {
    fn from(call: &DecodedCall) -> Self {
        Self {
            key: call.key.0,
            target: checksum(&call.target),
            name: call.name.clone(),
            signature: call.signature.clone(),
            selector: call.selector.map(|s| format!("0x{}", hex::encode(s))),
            tier: call.tier,
            value: call.value.to_string(),
            calldata: format!("0x{}", hex::encode(&call.calldata)),
            args: call
                .params
                .iter()
                .map(|p| ExportedArg {
                    name: p.name.clone(),
                    kind: p.kind.clone(),
                    value: value_to_string(&p.value),
                })
                .collect(),
        }
    }
}

impl From<&CallbackRegion> for ExportedRegion {
    fn from(region: &CallbackRegion) -> Self {
        Self {
            kind: region.kind,
            trigger: ExportedCall::from(&region.trigger),
            start: region.start.0,
            end: region.end.0,
            callback: region.callback_name.clone(),
            callback_signature: region.callback_signature.clone(),
            suspect_truncation: region.suspect_truncation,
            calls: region.calls.iter().map(ExportedCall::from).collect(),
        }
    }
}

/// Human-readable rendering of a decoded value
pub fn value_to_string(value: &DynSolValue) -> String {
    let join = |items: &[DynSolValue]| items.iter().map(value_to_string).collect::<Vec<_>>().join(", ");
    match value {
        DynSolValue::Address(a) => checksum(a),
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Uint(v, _) => v.to_string(),
        DynSolValue::Int(v, _) => v.to_string(),
        DynSolValue::FixedBytes(word, size) => format!("0x{}", hex::encode(&word[..(*size).min(32)])),
        DynSolValue::Function(f) => format!("0x{}", hex::encode(f.as_slice())),
        DynSolValue::Bytes(b) => format!("0x{}", hex::encode(b)),
        DynSolValue::String(s) => s.clone(),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) => format!("[{}]", join(items)),
        DynSolValue::Tuple(items) => format!("({})", join(items)),
        #[allow(unreachable_patterns)]
        _ => String::new(),
    }
}

/// Build the exportable model from a finished walk and naming pass
pub fn build_model(
    walk: &WalkResult,
    naming: &NamingResult,
    main: Address,
    chain: Option<&str>,
    block: Option<u64>,
) -> ExportedModel {
    ExportedModel {
        main_actor: checksum(&main),
        chain: chain.map(str::to_string),
        block,
        top_level: walk.top_level.iter().map(ExportedCall::from).collect(),
        regions: walk.regions.iter().map(ExportedRegion::from).collect(),
        addresses: naming
            .addresses
            .iter()
            .map(|d| ExportedAddress {
                address: checksum(&d.address),
                name: d.name.clone(),
                origin: d.origin,
                interface: d.interface.clone(),
            })
            .collect(),
        interfaces: naming
            .interfaces
            .iter()
            .map(|i| ExportedInterface {
                name: i.name.clone(),
                signatures: i.signatures.iter().cloned().collect(),
                addresses: i.addresses.iter().map(checksum).collect(),
            })
            .collect(),
    }
}

/// Write the model as pretty JSON, returning the number of replayed calls
pub fn write_model(path: &Path, model: &ExportedModel) -> Result<usize> {
    let json = serde_json::to_string_pretty(model).context("serialize call model")?;

    let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    file.write_all(json.as_bytes())
        .with_context(|| format!("write {}", path.display()))?;

    Ok(model.top_level.len() + model.regions.iter().map(|r| r.calls.len() + 1).sum::<usize>())
}
