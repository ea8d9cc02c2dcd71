//! ABI domain models
//!
//! Types for local ABI tables, canonical signatures and decoded calls,
//! independent of how signatures are resolved or payloads decoded.

mod decoder;
mod registry;
pub mod signature;

pub use decoder::{DecodeTier, DecodedCall, DecodedParam};
pub use registry::{AbiRegistry, AbiSource, FunctionSignature, ParamSpec};
pub use signature::{normalize_signature, parse_selector_hex, parse_signature, selector_of};
