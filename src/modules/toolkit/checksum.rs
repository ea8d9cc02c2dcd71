//! Ethereum address checksum (EIP-55)

use alloy_primitives::{keccak256, Address};

/// Checksummed `0x` form of an address
pub fn checksum(address: &Address) -> String {
    to_checksum_address(&hex::encode(address))
}

/// Checksum 40 hex characters, given with or without `0x`, in any case
///
/// Returns `None` for anything that is not a 20-byte hex address.
pub fn checksum_str(input: &str) -> Option<String> {
    let addr = input.trim().to_ascii_lowercase();
    let addr = addr.strip_prefix("0x").unwrap_or(&addr);
    if addr.len() != 40 || !addr.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(to_checksum_address(addr))
}

fn to_checksum_address(addr: &str) -> String {
    let hash = keccak256(addr.as_bytes());
    let hash_hex = hex::encode(hash.as_slice());

    let mut result = String::with_capacity(42);
    result.push_str("0x");

    for (c, h) in addr.chars().zip(hash_hex.chars()) {
        if h.to_digit(16).unwrap_or(0) >= 8 {
            result.push(c.to_ascii_uppercase());
        } else {
            result.push(c);
        }
    }

    result
}
