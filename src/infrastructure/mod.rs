//! Infrastructure layer - External service integrations
//!
//! This layer contains:
//! - Signature registries, the selector resolver and the tiered call decoder
//! - Local and verified ABI sources
//! - Token metadata enrichment over JSON-RPC

pub mod abi;
pub mod ethereum;
