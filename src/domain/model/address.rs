//! Address registry: one stable variable name per unique address

use std::collections::HashMap;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::domain::trace::parse_address;
use crate::error::{Result, RewindError};

/// How an entry's name was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameOrigin {
    /// `addrN`, assigned in first-seen order
    Synthetic,
    /// Derived from called-signature keyword patterns
    Pattern,
    /// From token metadata or the well-known address table
    Enriched,
}

impl NameOrigin {
    /// Whether the name carries information beyond first-seen order
    pub fn is_known(self) -> bool {
        matches!(self, Self::Enriched)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressEntry {
    pub address: Address,
    pub name: String,
    pub origin: NameOrigin,
}

/// Bijective map from address to variable name, in first-seen order
#[derive(Debug, Clone, Default)]
pub struct AddressRegistry {
    entries: Vec<AddressEntry>,
    index: HashMap<Address, usize>,
    counter: usize,
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an address, returning its name; repeat registrations are no-ops
    pub fn register(&mut self, address: Address) -> &str {
        let idx = match self.index.get(&address).copied() {
            Some(idx) => idx,
            None => {
                self.counter += 1;
                let name = self.unique_name(format!("addr{}", self.counter));
                self.entries.push(AddressEntry {
                    address,
                    name,
                    origin: NameOrigin::Synthetic,
                });
                self.index.insert(address, self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &self.entries[idx].name
    }

    /// Register an address given as text, in any letter case
    pub fn register_hex(&mut self, address: &str) -> Result<String> {
        let parsed = parse_address(address).ok_or_else(|| RewindError::InvalidAddress(address.to_string()))?;
        Ok(self.register(parsed).to_string())
    }

    /// Replace an entry's name with a richer one, keeping names unique
    ///
    /// Returns the name actually assigned, or `None` for unregistered addresses.
    pub fn rename(&mut self, address: Address, name: &str, origin: NameOrigin) -> Option<String> {
        let idx = *self.index.get(&address)?;
        if self.entries[idx].name == name {
            self.entries[idx].origin = origin;
            return Some(name.to_string());
        }
        let unique = self.unique_name(name.to_string());
        let entry = &mut self.entries[idx];
        entry.name = unique.clone();
        entry.origin = origin;
        Some(unique)
    }

    fn unique_name(&self, base: String) -> String {
        if !self.name_taken(&base) {
            return base;
        }
        (2..)
            .map(|n| format!("{base}_{n}"))
            .find(|candidate| !self.name_taken(candidate))
            .unwrap_or(base)
    }

    fn name_taken(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn name_of(&self, address: &Address) -> Option<&str> {
        self.index
            .get(address)
            .map(|idx| self.entries[*idx].name.as_str())
    }

    pub fn entry(&self, address: &Address) -> Option<&AddressEntry> {
        self.index.get(address).map(|idx| &self.entries[*idx])
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.index.contains_key(address)
    }

    /// Number of synthetic names handed out so far
    pub fn counter(&self) -> usize {
        self.counter
    }

    /// Entries in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = &AddressEntry> {
        self.entries.iter()
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.entries.iter().map(|e| e.address).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent_across_case() {
        let mut registry = AddressRegistry::new();
        let first = registry
            .register_hex("0xABCDEFabcdefABCDEFabcdefABCDEFabcdefABCD")
            .unwrap();
        let second = registry
            .register_hex("0xabcdefabcdefabcdefabcdefabcdefabcdefabcd")
            .unwrap();

        assert_eq!(first, "addr1");
        assert_eq!(first, second);
        assert_eq!(registry.counter(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_names_follow_first_seen_order() {
        let mut registry = AddressRegistry::new();
        let a = Address::repeat_byte(0x0a);
        let b = Address::repeat_byte(0x0b);
        assert_eq!(registry.register(b), "addr1");
        assert_eq!(registry.register(a), "addr2");
        assert_eq!(registry.addresses(), vec![b, a]);
    }

    #[test]
    fn test_rename_keeps_names_unique() {
        let mut registry = AddressRegistry::new();
        let a = Address::repeat_byte(0x0a);
        let b = Address::repeat_byte(0x0b);
        registry.register(a);
        registry.register(b);

        assert_eq!(registry.rename(a, "WETH", NameOrigin::Enriched).as_deref(), Some("WETH"));
        assert_eq!(registry.rename(b, "WETH", NameOrigin::Enriched).as_deref(), Some("WETH_2"));
        assert_eq!(registry.name_of(&b), Some("WETH_2"));
        assert!(registry.rename(Address::ZERO, "x", NameOrigin::Pattern).is_none());
    }

    #[test]
    fn test_invalid_address_is_rejected() {
        let mut registry = AddressRegistry::new();
        assert!(registry.register_hex("0x1234").is_err());
        assert_eq!(registry.counter(), 0);
    }
}
