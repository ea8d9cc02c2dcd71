//! Function signature text handling and selector computation

use alloy_dyn_abi::DynSolType;
use alloy_primitives::{keccak256, Selector};

/// Compute the 4-byte selector of a canonical signature
pub fn selector_of(signature: &str) -> Selector {
    let hash = keccak256(signature.as_bytes());
    Selector::from([hash[0], hash[1], hash[2], hash[3]])
}

/// Parse a selector written as hex, with or without `0x`
pub fn parse_selector_hex(text: &str) -> Option<Selector> {
    let trimmed = text.trim();
    let payload = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if payload.len() != 8 {
        return None;
    }
    let bytes: [u8; 4] = hex::decode(payload).ok()?.try_into().ok()?;
    Some(Selector::from(bytes))
}

/// Normalize a human-written signature into its canonical form
///
/// Strips whitespace, a trailing `returns (...)` clause, parameter names and
/// the `memory`/`calldata`/`storage` data locations.
pub fn normalize_signature(sig: &str) -> String {
    let sig = match sig.find("returns") {
        Some(pos) => sig[..pos].trim(),
        None => sig.trim(),
    };
    let sig = sig.strip_prefix("function ").unwrap_or(sig).trim();

    let Some(open) = sig.find('(') else {
        return sig.replace(' ', "");
    };
    let name = sig[..open].trim();
    let Some(close) = sig.rfind(')') else {
        return sig.replace(' ', "");
    };
    if close < open {
        return sig.replace(' ', "");
    }

    let types: Vec<String> = split_types(&sig[open + 1..close])
        .into_iter()
        .map(|param| canonical_param(&param))
        .collect();
    format!("{}({})", name, types.join(","))
}

/// Reduce one parameter declaration (`address to`, `(uint a, bool b) memory p`) to its type
fn canonical_param(param: &str) -> String {
    let param = param.trim();
    if param.starts_with('(') {
        // tuple: canonicalize members, keep array suffix, drop the rest
        let Some(close) = matching_paren(param) else {
            return param.replace(' ', "");
        };
        let inner: Vec<String> = split_types(&param[1..close])
            .into_iter()
            .map(|p| canonical_param(&p))
            .collect();
        let suffix: String = param[close + 1..]
            .chars()
            .take_while(|c| *c == '[' || *c == ']' || c.is_ascii_digit() || c.is_whitespace())
            .filter(|c| !c.is_whitespace())
            .collect();
        return format!("({}){}", inner.join(","), suffix);
    }

    let ty = param.split_whitespace().next().unwrap_or_default();
    match ty {
        "uint" => "uint256".to_string(),
        "int" => "int256".to_string(),
        "byte" => "bytes1".to_string(),
        other if other.starts_with("uint[") => other.replacen("uint", "uint256", 1),
        other if other.starts_with("int[") => other.replacen("int", "int256", 1),
        other => other.to_string(),
    }
}

fn matching_paren(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split a comma-separated parameter list at depth zero
pub fn split_types(params: &str) -> Vec<String> {
    let params = params.trim();
    if params.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in params.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                out.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    out.push(current.trim().to_string());
    out
}

/// Split a canonical signature into its function name and parameter types
///
/// Returns `None` when the text is not of the form `name(types)`.
pub fn parse_signature(signature: &str) -> Option<(String, Vec<String>)> {
    let normalized = normalize_signature(signature);
    let open = normalized.find('(')?;
    let close = normalized.rfind(')')?;
    if close < open || close != normalized.len() - 1 {
        return None;
    }
    let name = normalized[..open].to_string();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
        return None;
    }
    Some((name, split_types(&normalized[open + 1..close])))
}

/// Parse every type string, failing if any of them is not a valid ABI type
pub fn parse_types(types: &[String]) -> Option<Vec<DynSolType>> {
    types.iter().map(|ty| DynSolType::parse(ty).ok()).collect()
}

/// Build a canonical signature from a name and type list
pub fn build_signature(name: &str, types: &[String]) -> String {
    format!("{}({})", name, types.join(","))
}
