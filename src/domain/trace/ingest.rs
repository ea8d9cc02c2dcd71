//! Trace ingestion boundary
//!
//! The recorded trace format is loosely structured: node maps come as
//! objects or arrays, a node carries `invocation` or `invocations`, and
//! address fields are spelled `from`/`fromAddress` and `to`/`address`.
//! Every variant is folded into one canonical [`Invocation`] here so that
//! nothing downstream sees the raw shapes.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::str::FromStr;

use alloy_primitives::{Address, Bytes, Selector, U256};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::node::{Invocation, NodeKey, Trace, TraceMethod, TraceNode};
use crate::error::{Result, RewindError};

const NODE_MAP_FIELDS: &[&str] = &["nodes", "nodeMap", "dataMap", "trace"];
const MAIN_ACTOR_FIELDS: &[&str] = &["mainAddress", "mainActor", "sender", "from"];
const ORIGIN_FIELDS: &[&str] = &["txOrigin", "origin"];
const BLOCK_FIELDS: &[&str] = &["blockNumber", "block"];
const CHAIN_FIELDS: &[&str] = &["chain", "network", "chainId"];
const TX_HASH_FIELDS: &[&str] = &["txHash", "transactionHash", "hash"];

const FROM_FIELDS: &[&str] = &["from", "fromAddress"];
const TO_FIELDS: &[&str] = &["to", "address", "toAddress"];
const CALLDATA_FIELDS: &[&str] = &["callData", "calldata", "input"];
const METHOD_FIELDS: &[&str] = &["decodedMethod", "decoded"];

/// Parse a trace document into the canonical model
pub fn parse_trace(text: &str) -> Result<Trace> {
    let root: Value = serde_json::from_str(text)?;
    ingest(&root)
}

/// Normalize an already-parsed trace document
pub fn ingest(root: &Value) -> Result<Trace> {
    let expected = "nodes, nodeMap, dataMap, trace";
    let obj = root
        .as_object()
        .ok_or(RewindError::MissingNodeMap { expected })?;
    let node_map = first_field(obj, NODE_MAP_FIELDS).ok_or(RewindError::MissingNodeMap { expected })?;

    let entries: Vec<(NodeKey, &Value)> = match node_map {
        Value::Object(map) => map
            .iter()
            .map(|(key, node)| parse_key(key).map(|k| (k, node)))
            .collect::<Result<_>>()?,
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(idx, node)| {
                let key = node
                    .get("key")
                    .or_else(|| node.get("id"))
                    .map(key_from_value)
                    .transpose()?
                    .unwrap_or(NodeKey(idx as u64));
                Ok((key, node))
            })
            .collect::<Result<_>>()?,
        _ => return Err(RewindError::MissingNodeMap { expected }),
    };

    let mut nodes = BTreeMap::new();
    for (key, node) in entries {
        let invocations = parse_node(key, node)?;
        match nodes.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(TraceNode { key, invocations });
            }
            Entry::Occupied(mut slot) => {
                // `node_7` and `7` name the same node
                warn!(%key, "duplicate node key, merging invocations");
                slot.get_mut().invocations.extend(invocations);
            }
        }
    }

    Ok(Trace {
        nodes,
        main_actor: first_field(obj, MAIN_ACTOR_FIELDS).and_then(value_as_address),
        tx_origin: first_field(obj, ORIGIN_FIELDS).and_then(value_as_address),
        block_number: first_field(obj, BLOCK_FIELDS).and_then(value_as_u64),
        chain: first_field(obj, CHAIN_FIELDS).and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }),
        tx_hash: first_field(obj, TX_HASH_FIELDS)
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn parse_node(key: NodeKey, node: &Value) -> Result<Vec<Invocation>> {
    let Some(obj) = node.as_object() else {
        return Err(RewindError::MalformedNode {
            key: key.to_string(),
            reason: "node is not an object".to_string(),
        });
    };

    let raw: Vec<&Map<String, Value>> = match (obj.get("invocations"), obj.get("invocation")) {
        (Some(Value::Array(items)), _) => items.iter().filter_map(Value::as_object).collect(),
        (Some(Value::Object(single)), _) => vec![single],
        (_, Some(Value::Object(single))) => vec![single],
        (_, Some(Value::Array(items))) => items.iter().filter_map(Value::as_object).collect(),
        // a node may also be a bare invocation
        _ if first_field(obj, FROM_FIELDS).is_some() => vec![obj],
        _ => Vec::new(),
    };

    Ok(raw
        .into_iter()
        .filter_map(|inv| {
            let parsed = parse_invocation(inv);
            if parsed.is_none() {
                debug!(%key, "skipping invocation without usable from/to addresses");
            }
            parsed
        })
        .collect())
}

fn parse_invocation(obj: &Map<String, Value>) -> Option<Invocation> {
    let from = first_field(obj, FROM_FIELDS).and_then(value_as_address)?;
    let to = first_field(obj, TO_FIELDS).and_then(value_as_address)?;

    let explicit_selector = obj
        .get("selector")
        .and_then(Value::as_str)
        .and_then(parse_selector);

    let mut calldata = first_field(obj, CALLDATA_FIELDS)
        .and_then(Value::as_str)
        .and_then(|s| parse_hex_bytes(s))
        .unwrap_or_default();
    if calldata.is_empty() {
        if let Some(selector) = explicit_selector {
            calldata = Bytes::copy_from_slice(selector.as_slice());
        }
    }

    let selector = if calldata.len() >= 4 {
        Some(Selector::from_slice(&calldata[..4]))
    } else {
        explicit_selector
    };

    let value = obj.get("value").map(value_as_u256).unwrap_or_default();
    let gas_used = obj.get("gasUsed").and_then(value_as_u64);

    let decoded_method = first_field(obj, METHOD_FIELDS)
        .and_then(Value::as_object)
        .and_then(|method| {
            let name = method.get("name").and_then(Value::as_str)?.to_string();
            let signature = method
                .get("signature")
                .and_then(Value::as_str)
                .map(str::to_string);
            Some(TraceMethod { name, signature })
        });

    Some(Invocation {
        from,
        to,
        selector,
        calldata,
        value,
        gas_used,
        decoded_method,
    })
}

fn first_field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .find_map(|name| obj.get(*name).filter(|v| !v.is_null()))
}

/// Parse a node map key: integer, or an identifier ending in digits (`node_12`)
pub fn parse_key(key: &str) -> Result<NodeKey> {
    let trimmed = key.trim();
    if let Ok(n) = trimmed.parse::<u64>() {
        return Ok(NodeKey(n));
    }
    let digits: String = trimmed
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits
        .parse::<u64>()
        .map(NodeKey)
        .map_err(|_| RewindError::UnorderableKey(key.to_string()))
}

fn key_from_value(value: &Value) -> Result<NodeKey> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(NodeKey)
            .ok_or_else(|| RewindError::UnorderableKey(n.to_string())),
        Value::String(s) => parse_key(s),
        other => Err(RewindError::UnorderableKey(other.to_string())),
    }
}

/// Parse an address string, tolerating case and a missing `0x` prefix
pub fn parse_address(text: &str) -> Option<Address> {
    let trimmed = text.trim();
    let payload = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if payload.len() != 40 {
        return None;
    }
    Address::from_str(&payload.to_lowercase()).ok()
}

fn value_as_address(value: &Value) -> Option<Address> {
    value.as_str().and_then(parse_address)
}

fn parse_selector(text: &str) -> Option<Selector> {
    let bytes = parse_hex_bytes(text)?;
    (bytes.len() == 4).then(|| Selector::from_slice(&bytes))
}

fn parse_hex_bytes(text: &str) -> Option<Bytes> {
    let trimmed = text.trim();
    let payload = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(payload).ok().map(Bytes::from)
}

/// Parse a native amount: decimal string (separators allowed), hex string or number
fn value_as_u256(value: &Value) -> U256 {
    let parsed = match value {
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .or_else(|| U256::from_str(&n.to_string()).ok()),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| !matches!(c, ',' | '_' | ' '))
                .collect();
            if cleaned.is_empty() {
                Some(U256::ZERO)
            } else {
                U256::from_str(&cleaned).ok()
            }
        }
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        warn!(%value, "unparseable native value, treating as zero");
        U256::ZERO
    })
}

fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x") {
                Some(hex) => u64::from_str_radix(hex, 16).ok(),
                None => s.parse().ok(),
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAIN: &str = "0x1111111111111111111111111111111111111111";

    #[test]
    fn test_accepts_field_name_variants() {
        let trace = parse_trace(&format!(
            r#"{{"nodes": {{
                "1": {{"invocation": {{"fromAddress": "{MAIN}", "address": "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA", "callData": "0xd0e30db0", "value": "1,000"}}}},
                "0": {{"invocations": [{{"from": "{MAIN}", "to": "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb", "callData": "0x"}}]}}
            }}}}"#
        ))
        .unwrap();

        assert_eq!(trace.len(), 2);
        let keys: Vec<u64> = trace.iter().map(|n| n.key.0).collect();
        assert_eq!(keys, vec![0, 1]);

        let (_, deposit) = trace.invocations().nth(1).unwrap();
        assert_eq!(deposit.from, parse_address(MAIN).unwrap());
        assert_eq!(hex::encode(deposit.selector.unwrap()), "d0e30db0");
        assert_eq!(deposit.value, U256::from(1000));

        let (_, transfer) = trace.invocations().next().unwrap();
        assert!(transfer.selector.is_none());
        assert!(transfer.calldata.is_empty());
    }

    #[test]
    fn test_equivalent_keys_merge_into_one_node() {
        let trace = parse_trace(&format!(
            r#"{{"nodes": [
                {{"key": "node_7", "invocation": {{"from": "{MAIN}", "to": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "callData": "0xd0e30db0"}}}},
                {{"key": 7, "invocation": {{"from": "{MAIN}", "to": "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb", "callData": "0x"}}}}
            ]}}"#
        ))
        .unwrap();

        assert_eq!(trace.len(), 1);
        let targets: Vec<String> = trace
            .invocations()
            .map(|(key, inv)| {
                assert_eq!(key.0, 7);
                format!("{:#x}", inv.to)
            })
            .collect();
        assert_eq!(
            targets,
            vec![
                "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
                "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"
            ]
        );
    }

    #[test]
    fn test_missing_node_map_is_fatal() {
        let err = parse_trace(r#"{"foo": 1}"#).unwrap_err();
        assert!(matches!(err, RewindError::MissingNodeMap { .. }));

        let err = parse_trace("not json").unwrap_err();
        assert!(matches!(err, RewindError::InvalidJson(_)));
    }

    #[test]
    fn test_key_parsing() {
        assert_eq!(parse_key("42").unwrap(), NodeKey(42));
        assert_eq!(parse_key("node_7").unwrap(), NodeKey(7));
        assert!(matches!(parse_key("root"), Err(RewindError::UnorderableKey(_))));
    }

    #[test]
    fn test_root_metadata() {
        let trace = parse_trace(&format!(
            r#"{{"mainAddress": "{MAIN}", "blockNumber": "0x10", "chain": "mainnet", "nodes": []}}"#
        ))
        .unwrap();
        assert_eq!(trace.main_actor, parse_address(MAIN));
        assert_eq!(trace.block_number, Some(16));
        assert_eq!(trace.chain.as_deref(), Some("mainnet"));
        assert!(trace.is_empty());
    }

    #[test]
    fn test_selector_only_invocation_keeps_selector_as_payload() {
        let trace = parse_trace(&format!(
            r#"{{"nodes": {{"0": {{"invocation": {{"from": "{MAIN}", "to": "{MAIN}", "selector": "0x23e30c8b"}}}}}}}}"#
        ))
        .unwrap();
        let (_, inv) = trace.invocations().next().unwrap();
        assert_eq!(inv.calldata.len(), 4);
        assert_eq!(hex::encode(inv.selector.unwrap()), "23e30c8b");
    }
}
