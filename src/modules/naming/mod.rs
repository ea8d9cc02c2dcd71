//! Naming and interface synthesis
//!
//! Turns the walk's address registry and per-address signature sets into
//! address constant names and deduplicated interface declarations.

mod patterns;

use std::collections::{BTreeSet, HashMap};

use alloy_primitives::Address;
use tracing::debug;

use crate::domain::model::{AddressRegistry, ContractInterfaceSet, NameOrigin};
use crate::infrastructure::ethereum::{TokenDescription, TokenKind};
use crate::modules::toolkit::{capitalize, sanitize_identifier};

pub use patterns::{categorize, ContractPattern, MIN_SCORE, PATTERN_TABLE};

/// One synthesized interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDecl {
    pub name: String,
    /// Canonical signatures, sorted
    pub signatures: BTreeSet<String>,
    /// Addresses typed through this interface, in registry order
    pub addresses: Vec<Address>,
}

/// One address constant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressDecl {
    pub address: Address,
    pub name: String,
    pub origin: NameOrigin,
    /// Interface this address is called through, if it has typed calls
    pub interface: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NamingResult {
    pub interfaces: Vec<InterfaceDecl>,
    /// In address-registry order; the renderer decides emission order
    pub addresses: Vec<AddressDecl>,
}

impl NamingResult {
    pub fn interface_of(&self, address: &Address) -> Option<&str> {
        self.addresses
            .iter()
            .find(|d| d.address == *address)
            .and_then(|d| d.interface.as_deref())
    }
}

/// Last four hex digits of an address
fn suffix(address: &Address) -> String {
    let hex = hex::encode(address);
    hex[hex.len() - 4..].to_string()
}

/// Name derived from enrichment data, if it says anything usable
fn enriched_name(
    description: &TokenDescription,
    enrichment: &HashMap<Address, TokenDescription>,
) -> Option<String> {
    if description.kind == TokenKind::Pair {
        if let Some((a, b)) = description.paired_tokens {
            let symbol_of = |addr: &Address| enrichment.get(addr).and_then(|d| d.symbol.clone());
            if let (Some(sa), Some(sb)) = (symbol_of(&a), symbol_of(&b)) {
                return Some(format!("{sa}_{sb}_pair"));
            }
        }
    }
    description
        .symbol
        .clone()
        .or_else(|| description.name.clone())
        .filter(|s| !s.trim().is_empty())
}

/// Category hint from enrichment when keyword scoring is inconclusive
fn enriched_category(description: Option<&TokenDescription>) -> Option<&'static str> {
    match description.map(|d| d.kind) {
        Some(TokenKind::Erc20) => Some("token"),
        Some(TokenKind::Pair) => Some("pool"),
        _ => None,
    }
}

/// Rename registry entries and build interface declarations
///
/// Mutates `addresses` in place: enriched names first, then pattern names;
/// anything else keeps its `addrN` name.
pub fn synthesize(
    interfaces: &ContractInterfaceSet,
    addresses: &mut AddressRegistry,
    enrichment: &HashMap<Address, TokenDescription>,
) -> NamingResult {
    let order = addresses.addresses();

    // Address constants
    for address in &order {
        let description = enrichment.get(address);
        if let Some(name) = description.and_then(|d| enriched_name(d, enrichment)) {
            addresses.rename(*address, &sanitize_identifier(&name), NameOrigin::Enriched);
            continue;
        }
        if let Some(category) = categorize(&interfaces.function_names(address)) {
            let name = format!("{}_{}", category, suffix(address));
            addresses.rename(*address, &sanitize_identifier(&name), NameOrigin::Pattern);
        }
    }

    // Interfaces
    let mut decls: Vec<InterfaceDecl> = Vec::new();
    let mut assigned: HashMap<Address, String> = HashMap::new();
    for address in &order {
        let Some(signatures) = interfaces.signatures(address).filter(|s| !s.is_empty()) else {
            continue;
        };

        let category = categorize(&interfaces.function_names(address))
            .or_else(|| enriched_category(enrichment.get(address)));

        let index = match category {
            Some(category) => {
                let name = format!("I{}", capitalize(category));
                match decls.iter().position(|d| d.name == name) {
                    Some(idx) => {
                        decls[idx].signatures.extend(signatures.iter().cloned());
                        Some(idx)
                    }
                    None => {
                        decls.push(InterfaceDecl {
                            name,
                            signatures: signatures.clone(),
                            addresses: Vec::new(),
                        });
                        Some(decls.len() - 1)
                    }
                }
            }
            None => decls
                .iter()
                .position(|d| d.name.starts_with("IContract_") && d.signatures == *signatures),
        };

        let idx = match index {
            Some(idx) => idx,
            None => {
                let base = format!("IContract_{}", suffix(address));
                let name = unique(&decls, base);
                decls.push(InterfaceDecl {
                    name,
                    signatures: signatures.clone(),
                    addresses: Vec::new(),
                });
                decls.len() - 1
            }
        };
        decls[idx].addresses.push(*address);
        assigned.insert(*address, decls[idx].name.clone());
    }

    let address_decls: Vec<AddressDecl> = addresses
        .iter()
        .map(|entry| AddressDecl {
            address: entry.address,
            name: entry.name.clone(),
            origin: entry.origin,
            interface: assigned.get(&entry.address).cloned(),
        })
        .collect();

    debug!(
        interfaces = decls.len(),
        addresses = address_decls.len(),
        "naming complete"
    );
    NamingResult {
        interfaces: decls,
        addresses: address_decls,
    }
}

fn unique(decls: &[InterfaceDecl], base: String) -> String {
    let taken = |name: &str| decls.iter().any(|d| d.name == name);
    if !taken(&base) {
        return base;
    }
    (2..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;

    use super::*;

    const TOKEN_A: Address = address!("000000000000000000000000000000000000aaaa");
    const TOKEN_B: Address = address!("000000000000000000000000000000000000bbbb");
    const PAIR: Address = address!("000000000000000000000000000000000000cccc");
    const ODD_1: Address = address!("000000000000000000000000000000000000d001");
    const ODD_2: Address = address!("000000000000000000000000000000000000d002");

    fn setup() -> (ContractInterfaceSet, AddressRegistry) {
        let mut set = ContractInterfaceSet::new();
        let mut registry = AddressRegistry::new();
        for (addr, sigs) in [
            (TOKEN_A, vec!["transfer(address,uint256)", "approve(address,uint256)"]),
            (TOKEN_B, vec!["balanceOf(address)", "transfer(address,uint256)"]),
            (PAIR, vec!["swap(uint256,uint256,address,bytes)", "sync()"]),
            (ODD_1, vec!["nudge(uint256)"]),
            (ODD_2, vec!["nudge(uint256)"]),
        ] {
            registry.register(addr);
            for sig in sigs {
                set.record(addr, sig);
            }
        }
        (set, registry)
    }

    #[test]
    fn test_pattern_names_and_shared_interfaces() {
        let (set, mut registry) = setup();
        let result = synthesize(&set, &mut registry, &HashMap::new());

        assert_eq!(registry.name_of(&TOKEN_A), Some("token_aaaa"));
        assert_eq!(registry.name_of(&PAIR), Some("pool_cccc"));
        assert_eq!(registry.name_of(&ODD_1), Some("addr4"));

        let names: Vec<&str> = result.interfaces.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["IToken", "IPool", "IContract_d001"]);
        assert_eq!(result.interfaces[0].signatures.len(), 3);
        assert_eq!(result.interfaces[0].addresses, vec![TOKEN_A, TOKEN_B]);
        assert_eq!(result.interface_of(&ODD_2), Some("IContract_d001"));
    }

    #[test]
    fn test_enrichment_wins() {
        let (set, mut registry) = setup();
        let mut enrichment = HashMap::new();
        enrichment.insert(TOKEN_A, TokenDescription::token("WETH", None, Some(18)));
        enrichment.insert(TOKEN_B, TokenDescription::token("USDC.e", None, Some(6)));
        enrichment.insert(
            PAIR,
            TokenDescription {
                kind: TokenKind::Pair,
                symbol: Some("UNI-V2".into()),
                name: None,
                decimals: Some(18),
                paired_tokens: Some((TOKEN_A, TOKEN_B)),
            },
        );
        enrichment.insert(ODD_1, TokenDescription::token("WETH", None, None));

        let result = synthesize(&set, &mut registry, &enrichment);
        assert_eq!(registry.name_of(&TOKEN_A), Some("WETH"));
        assert_eq!(registry.name_of(&TOKEN_B), Some("USDC_e"));
        assert_eq!(registry.name_of(&PAIR), Some("WETH_USDC_e_pair"));
        assert_eq!(registry.name_of(&ODD_1), Some("WETH_2"));
        assert_eq!(result.addresses[0].origin, NameOrigin::Enriched);
        // enrichment hints the category when keywords are inconclusive
        assert_eq!(result.interface_of(&ODD_1), Some("IToken"));
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let run = || {
            let (set, mut registry) = setup();
            let result = synthesize(&set, &mut registry, &HashMap::new());
            (result.interfaces, result.addresses)
        };
        assert_eq!(run(), run());
    }
}
