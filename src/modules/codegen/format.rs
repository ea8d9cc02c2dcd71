//! Solidity expressions for decoded values
//!
//! Arrays cannot be written inline for every element type, so they are
//! materialized as `memory` locals; the statements that build them land in
//! a prelude emitted before the call that uses them.

use std::collections::HashMap;

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::Address;

use super::structs::StructRegistry;
use crate::modules::toolkit::checksum;

pub struct ValueFormatter<'a> {
    main: Address,
    names: &'a HashMap<Address, String>,
    structs: &'a StructRegistry,
    next_var: usize,
}

impl<'a> ValueFormatter<'a> {
    pub fn new(main: Address, names: &'a HashMap<Address, String>, structs: &'a StructRegistry) -> Self {
        Self {
            main,
            names,
            structs,
            next_var: 0,
        }
    }

    pub fn address(&self, address: &Address) -> String {
        if *address == self.main {
            return "address(this)".to_string();
        }
        if let Some(name) = self.names.get(address) {
            return name.clone();
        }
        if address.is_zero() {
            return "address(0)".to_string();
        }
        checksum(address)
    }

    /// Format a value; `cast` wraps bare literals in their type so that
    /// overloaded functions resolve
    pub fn value(&mut self, value: &DynSolValue, ty: &DynSolType, cast: bool, prelude: &mut Vec<String>) -> String {
        match (value, ty) {
            (DynSolValue::Address(a), _) => self.address(a),
            (DynSolValue::Bool(b), _) => b.to_string(),
            (DynSolValue::Uint(v, bits), _) => {
                if cast {
                    format!("uint{bits}({v})")
                } else {
                    v.to_string()
                }
            }
            (DynSolValue::Int(v, bits), _) => {
                if cast {
                    format!("int{bits}({v})")
                } else {
                    v.to_string()
                }
            }
            (DynSolValue::FixedBytes(word, size), _) => {
                format!("bytes{}(hex\"{}\")", size, hex::encode(&word[..(*size).min(32)]))
            }
            (DynSolValue::Function(f), _) => format!("bytes24(hex\"{}\")", hex::encode(f.as_slice())),
            (DynSolValue::Bytes(bytes), _) => {
                let literal = hex_literal(bytes);
                if cast {
                    format!("bytes({literal})")
                } else {
                    literal
                }
            }
            (DynSolValue::String(s), _) => {
                let literal = string_literal(s);
                if cast {
                    format!("string({literal})")
                } else {
                    literal
                }
            }
            (DynSolValue::Array(items), DynSolType::Array(inner)) => {
                let elem = self.structs.type_name(inner);
                let var = self.fresh();
                let values: Vec<String> = items
                    .iter()
                    .map(|item| self.value(item, inner, false, prelude))
                    .collect();
                prelude.push(format!("{elem}[] memory {var} = new {elem}[]({});", values.len()));
                for (idx, v) in values.into_iter().enumerate() {
                    prelude.push(format!("{var}[{idx}] = {v};"));
                }
                var
            }
            (DynSolValue::FixedArray(items), DynSolType::FixedArray(inner, len)) => {
                let elem = self.structs.type_name(inner);
                let var = self.fresh();
                let values: Vec<String> = items
                    .iter()
                    .map(|item| self.value(item, inner, false, prelude))
                    .collect();
                prelude.push(format!("{elem}[{len}] memory {var};"));
                for (idx, v) in values.into_iter().enumerate() {
                    prelude.push(format!("{var}[{idx}] = {v};"));
                }
                var
            }
            (DynSolValue::Tuple(fields), DynSolType::Tuple(types)) => {
                let name = self.structs.type_name(ty);
                let args: Vec<String> = fields
                    .iter()
                    .zip(types)
                    .map(|(f, t)| self.value(f, t, false, prelude))
                    .collect();
                format!("{}({})", name, args.join(", "))
            }
            // shape mismatch: fall back to the value's own type
            (other, _) => match other.as_type() {
                Some(own) if own != *ty => self.value(other, &own, cast, prelude),
                _ => "0".to_string(),
            },
        }
    }

    fn fresh(&mut self) -> String {
        let var = format!("v{}", self.next_var);
        self.next_var += 1;
        var
    }
}

/// `hex"..."`, or `""` when empty
pub fn hex_literal(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        "\"\"".to_string()
    } else {
        format!("hex\"{}\"", hex::encode(bytes))
    }
}

/// Quoted string literal; non-printable and non-ASCII bytes become `\xNN`
pub fn string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for b in s.bytes() {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            0x20..=0x7e => out.push(b as char),
            other => out.push_str(&format!("\\x{other:02x}")),
        }
    }
    out.push('"');
    out
}

/// Solidity parameter declaration with data location where required
pub fn param_decl(solidity_type: &str, ty: &DynSolType, location: &str) -> String {
    let needs_location = matches!(
        ty,
        DynSolType::Bytes
            | DynSolType::String
            | DynSolType::Array(_)
            | DynSolType::FixedArray(..)
            | DynSolType::Tuple(_)
    );
    if needs_location {
        format!("{solidity_type} {location}")
    } else {
        solidity_type.to_string()
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, B256, I256, U256};

    use super::*;

    const MAIN: Address = address!("1111111111111111111111111111111111111111");
    const WETH: Address = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");

    fn formatter_parts() -> (HashMap<Address, String>, StructRegistry) {
        let mut names = HashMap::new();
        names.insert(WETH, "WETH".to_string());
        (names, StructRegistry::new())
    }

    #[test]
    fn test_addresses() {
        let (names, structs) = formatter_parts();
        let f = ValueFormatter::new(MAIN, &names, &structs);
        assert_eq!(f.address(&MAIN), "address(this)");
        assert_eq!(f.address(&WETH), "WETH");
        assert_eq!(f.address(&Address::ZERO), "address(0)");
        assert_eq!(
            f.address(&address!("fb6916095ca1df60bb79ce92ce3ea74c37c5d359")),
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359"
        );
    }

    #[test]
    fn test_scalars() {
        let (names, structs) = formatter_parts();
        let mut f = ValueFormatter::new(MAIN, &names, &structs);
        let mut prelude = Vec::new();
        let uint = DynSolType::Uint(256);
        assert_eq!(
            f.value(&DynSolValue::Uint(U256::from(1_000_000u64), 256), &uint, false, &mut prelude),
            "1000000"
        );
        assert_eq!(
            f.value(&DynSolValue::Uint(U256::from(5u8), 8), &DynSolType::Uint(8), true, &mut prelude),
            "uint8(5)"
        );
        assert_eq!(
            f.value(&DynSolValue::Int(-I256::from_raw(U256::from(3u8)), 256), &DynSolType::Int(256), false, &mut prelude),
            "-3"
        );
        assert_eq!(f.value(&DynSolValue::Bool(false), &DynSolType::Bool, false, &mut prelude), "false");
        let mut word = B256::ZERO;
        word[0] = 0xde;
        word[1] = 0xad;
        assert_eq!(
            f.value(&DynSolValue::FixedBytes(word, 2), &DynSolType::FixedBytes(2), false, &mut prelude),
            "bytes2(hex\"dead\")"
        );
        assert_eq!(
            f.value(&DynSolValue::Bytes(vec![0xca, 0xfe]), &DynSolType::Bytes, false, &mut prelude),
            "hex\"cafe\""
        );
        assert_eq!(
            f.value(&DynSolValue::String("a\"b".into()), &DynSolType::String, false, &mut prelude),
            "\"a\\\"b\""
        );
        assert!(prelude.is_empty());
    }

    #[test]
    fn test_arrays_become_locals() {
        let (names, structs) = formatter_parts();
        let mut f = ValueFormatter::new(MAIN, &names, &structs);
        let mut prelude = Vec::new();
        let ty = DynSolType::parse("address[]").unwrap();
        let value = DynSolValue::Array(vec![DynSolValue::Address(WETH), DynSolValue::Address(MAIN)]);

        assert_eq!(f.value(&value, &ty, false, &mut prelude), "v0");
        assert_eq!(
            prelude,
            vec![
                "address[] memory v0 = new address[](2);",
                "v0[0] = WETH;",
                "v0[1] = address(this);",
            ]
        );

        let empty = DynSolValue::Array(vec![]);
        let mut prelude = Vec::new();
        assert_eq!(f.value(&empty, &DynSolType::parse("uint256[]").unwrap(), false, &mut prelude), "v1");
        assert_eq!(prelude, vec!["uint256[] memory v1 = new uint256[](0);"]);
    }

    #[test]
    fn test_tuple_uses_struct_name() {
        let names = HashMap::new();
        let mut structs = StructRegistry::new();
        let ty = DynSolType::parse("(address,uint24)").unwrap();
        structs.register(&ty, "exactInputSingleParam0");
        let mut f = ValueFormatter::new(MAIN, &names, &structs);
        let value = DynSolValue::Tuple(vec![
            DynSolValue::Address(MAIN),
            DynSolValue::Uint(U256::from(3000u64), 24),
        ]);
        let mut prelude = Vec::new();
        assert_eq!(
            f.value(&value, &ty, false, &mut prelude),
            "ExactInputSingleParam0(address(this), 3000)"
        );
    }

    #[test]
    fn test_string_escaping_and_param_decl() {
        assert_eq!(string_literal("é\n"), "\"\\xc3\\xa9\\n\"");
        assert_eq!(hex_literal(&[]), "\"\"");
        assert_eq!(param_decl("bytes", &DynSolType::Bytes, "calldata"), "bytes calldata");
        assert_eq!(param_decl("uint256", &DynSolType::Uint(256), "calldata"), "uint256");
    }
}
