//! Pipeline stages
//!
//! - walker: trace walk, main-actor call decoding and callback regions
//! - naming: address constant names and interface synthesis
//! - codegen: Foundry test rendering
//! - toolkit: checksums and identifier helpers shared by the stages
//! - export: JSON export of the call model

pub mod codegen;
pub mod export;
pub mod naming;
pub mod toolkit;
pub mod walker;
