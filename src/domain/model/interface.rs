//! Per-address set of observed call signatures

use std::collections::{BTreeSet, HashMap};

use alloy_primitives::Address;

/// Mapping from address to the distinct canonical signatures called on it
#[derive(Debug, Clone, Default)]
pub struct ContractInterfaceSet {
    signatures: HashMap<Address, BTreeSet<String>>,
}

impl ContractInterfaceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure an address has an (initially empty) entry
    pub fn touch(&mut self, address: Address) {
        self.signatures.entry(address).or_default();
    }

    /// Record a signature observed against an address
    pub fn record(&mut self, address: Address, signature: &str) {
        self.signatures
            .entry(address)
            .or_default()
            .insert(signature.to_string());
    }

    /// Signatures called on an address, sorted
    pub fn signatures(&self, address: &Address) -> Option<&BTreeSet<String>> {
        self.signatures.get(address)
    }

    /// Lower-cased function names called on an address
    pub fn function_names(&self, address: &Address) -> BTreeSet<String> {
        self.signatures
            .get(address)
            .map(|sigs| {
                sigs.iter()
                    .map(|sig| sig.split('(').next().unwrap_or(sig).to_ascii_lowercase())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}
