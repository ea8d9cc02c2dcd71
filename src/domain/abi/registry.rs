//! Local ABI table keyed by selector

use std::collections::HashMap;
use std::path::PathBuf;

use alloy_json_abi::JsonAbi;
use alloy_primitives::Selector;
use serde::{Deserialize, Serialize};

use super::signature::{parse_selector_hex, selector_of};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Declared name, empty when the ABI omits it
    pub name: String,
    /// Canonical type; tuples are spelled out (`(uint256,address)`)
    pub kind: String,
}

/// Where a local ABI entry came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbiSource {
    /// Artifact or ABI file on disk
    File(PathBuf),
    /// Verified contract metadata fetched for one address
    Verified { chain_id: u64, address: String },
    /// Built in code
    Inline,
}

/// One function known from a local ABI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub selector: Selector,
    pub name: String,
    /// Canonical text, e.g. `transfer(address,uint256)`
    pub signature: String,
    pub inputs: Vec<ParamSpec>,
    pub source: AbiSource,
}

impl FunctionSignature {
    /// Entry for `name(inputs...)`; the selector is derived from the canonical text
    pub fn from_parts(name: &str, inputs: Vec<ParamSpec>, source: AbiSource) -> Self {
        let types: Vec<&str> = inputs.iter().map(|p| p.kind.as_str()).collect();
        let signature = format!("{name}({})", types.join(","));
        Self {
            selector: selector_of(&signature),
            name: name.to_string(),
            signature,
            inputs,
            source,
        }
    }

    pub fn input_types(&self) -> Vec<String> {
        self.inputs.iter().map(|p| p.kind.clone()).collect()
    }
}

/// Functions indexed by selector
///
/// Insertion never overwrites: the first ABI to define a selector keeps it.
#[derive(Debug, Default, Clone)]
pub struct AbiRegistry {
    functions: HashMap<Selector, FunctionSignature>,
    /// Artifact files read while building this registry
    pub scanned_files: usize,
    /// Files that could not be read or parsed
    pub errors: Vec<String>,
}

impl AbiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_abi(abi: &JsonAbi, source: AbiSource) -> Self {
        let mut registry = Self::new();
        for function in abi.functions() {
            let inputs = function
                .inputs
                .iter()
                .map(|param| ParamSpec {
                    name: param.name.clone(),
                    kind: param.selector_type().into_owned(),
                })
                .collect();
            registry.insert(FunctionSignature::from_parts(&function.name, inputs, source.clone()));
        }
        registry
    }

    pub fn insert(&mut self, function: FunctionSignature) {
        self.functions.entry(function.selector).or_insert(function);
    }

    pub fn lookup(&self, selector: Selector) -> Option<&FunctionSignature> {
        self.functions.get(&selector)
    }

    /// Lookup by hex text (`0xa9059cbb` or `a9059cbb`)
    pub fn lookup_hex(&self, selector: &str) -> Option<&FunctionSignature> {
        parse_selector_hex(selector).and_then(|s| self.lookup(s))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Fold `other` in, keeping existing entries on selector clashes
    pub fn merge(&mut self, other: Self) {
        self.scanned_files = self.scanned_files.saturating_add(other.scanned_files);
        self.errors.extend(other.errors);
        for (selector, function) in other.functions {
            self.functions.entry(selector).or_insert(function);
        }
    }
}
