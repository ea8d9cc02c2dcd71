//! Domain layer - pure data models and tables, no I/O
//!
//! - `abi`: local ABI tables, signatures, decoded calls
//! - `trace`: canonical trace nodes and the ingestion boundary
//! - `model`: callback regions, address registry, interface sets

pub mod abi;
pub mod model;
pub mod trace;
