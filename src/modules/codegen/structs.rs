//! Struct synthesis for tuple-typed parameters
//!
//! Every distinct tuple shape gets one file-level struct, named after the
//! first function parameter it was seen on and reused for identical shapes.

use std::collections::HashMap;

use alloy_dyn_abi::DynSolType;

use crate::modules::toolkit::{capitalize, sanitize_identifier};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDef {
    pub name: String,
    /// Solidity field types, positionally named `field0..`
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StructRegistry {
    /// Canonical tuple type -> struct name
    by_shape: HashMap<String, String>,
    defs: Vec<StructDef>,
}

impl StructRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register a struct under a fixed name
    pub fn declare(&mut self, shape: &str, name: &str, fields: &[&str]) {
        if self.by_shape.contains_key(shape) {
            return;
        }
        self.by_shape.insert(shape.to_string(), name.to_string());
        self.defs.push(StructDef {
            name: name.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        });
    }

    /// Register every tuple inside `ty` and return its Solidity spelling
    ///
    /// `hint` names new structs (`swap`, 0 -> `SwapParam0`).
    pub fn register(&mut self, ty: &DynSolType, hint: &str) -> String {
        match ty {
            DynSolType::Tuple(inner) => {
                let shape = ty.sol_type_name().into_owned();
                if let Some(name) = self.by_shape.get(&shape) {
                    return name.clone();
                }
                let fields = inner
                    .iter()
                    .enumerate()
                    .map(|(idx, field)| self.register(field, &format!("{hint}Field{idx}")))
                    .collect();
                let name = self.unique(sanitize_identifier(&capitalize(hint)));
                self.by_shape.insert(shape, name.clone());
                self.defs.push(StructDef { name: name.clone(), fields });
                name
            }
            DynSolType::Array(inner) => format!("{}[]", self.register(inner, hint)),
            DynSolType::FixedArray(inner, len) => format!("{}[{}]", self.register(inner, hint), len),
            other => other.sol_type_name().into_owned(),
        }
    }

    /// Solidity spelling of an already registered type
    pub fn type_name(&self, ty: &DynSolType) -> String {
        match ty {
            DynSolType::Tuple(_) => {
                let shape = ty.sol_type_name();
                self.by_shape
                    .get(shape.as_ref())
                    .cloned()
                    .unwrap_or_else(|| shape.into_owned())
            }
            DynSolType::Array(inner) => format!("{}[]", self.type_name(inner)),
            DynSolType::FixedArray(inner, len) => format!("{}[{}]", self.type_name(inner), len),
            other => other.sol_type_name().into_owned(),
        }
    }

    pub fn defs(&self) -> &[StructDef] {
        &self.defs
    }

    fn unique(&self, base: String) -> String {
        let taken = |name: &str| self.defs.iter().any(|d| d.name == name);
        if !taken(&base) {
            return base;
        }
        (2..)
            .map(|n| format!("{base}_{n}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or(base)
    }
}

/// Whether a type contains a zero-field tuple, which Solidity cannot declare
pub fn has_empty_tuple(ty: &DynSolType) -> bool {
    match ty {
        DynSolType::Tuple(inner) => inner.is_empty() || inner.iter().any(has_empty_tuple),
        DynSolType::Array(inner) | DynSolType::FixedArray(inner, _) => has_empty_tuple(inner),
        _ => false,
    }
}
