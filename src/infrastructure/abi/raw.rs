//! Best-effort parameter reconstruction from raw 32-byte words
//!
//! Used when a signature is known but its parameter types do not fit the
//! payload. Every word becomes one parameter. A declared type is honored
//! only when it is a single-word static type; everything else is guessed
//! from the word's shape, so small integers can come out as booleans.

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, B256, I256, U256};

use crate::domain::abi::DecodedParam;

/// Split a payload (selector already stripped) into words and type each one
///
/// A trailing partial word is right-padded with zeros.
pub fn reconstruct(payload: &[u8], hints: &[String]) -> Vec<DecodedParam> {
    payload
        .chunks(32)
        .enumerate()
        .map(|(idx, chunk)| {
            let mut word = [0u8; 32];
            word[..chunk.len()].copy_from_slice(chunk);
            let word = B256::from(word);

            let value = hints
                .get(idx)
                .and_then(|hint| DynSolType::parse(hint).ok())
                .and_then(|ty| word_as(&ty, word))
                .unwrap_or_else(|| infer(word));

            DecodedParam {
                name: format!("arg{idx}"),
                kind: type_name(&value),
                value,
            }
        })
        .collect()
}

/// Interpret a word as a single-word static type
fn word_as(ty: &DynSolType, word: B256) -> Option<DynSolValue> {
    let raw = U256::from_be_bytes(word.0);
    match ty {
        DynSolType::Address => Some(DynSolValue::Address(Address::from_word(word))),
        DynSolType::Bool => Some(DynSolValue::Bool(!raw.is_zero())),
        DynSolType::Uint(bits) => Some(DynSolValue::Uint(raw, *bits)),
        DynSolType::Int(bits) => Some(DynSolValue::Int(I256::from_raw(raw), *bits)),
        DynSolType::FixedBytes(size) => Some(DynSolValue::FixedBytes(word, *size)),
        _ => None,
    }
}

/// Guess a word's type from its shape
fn infer(word: B256) -> DynSolValue {
    let raw = U256::from_be_bytes(word.0);
    if raw <= U256::from(1u8) {
        return DynSolValue::Bool(!raw.is_zero());
    }
    let high_clear = word.0[..12].iter().all(|b| *b == 0);
    if high_clear && (129..=160).contains(&raw.bit_len()) {
        return DynSolValue::Address(Address::from_word(word));
    }
    DynSolValue::Uint(raw, 256)
}

fn type_name(value: &DynSolValue) -> String {
    value
        .as_type()
        .map(|ty| ty.sol_type_name().into_owned())
        .unwrap_or_else(|| "uint256".to_string())
}
