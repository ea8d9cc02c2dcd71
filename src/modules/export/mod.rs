//! Export Module
//!
//! JSON export of the reconstructed call model (`--model-json`).

pub mod json_export;

pub use json_export::{build_model, value_to_string, write_model, ExportedModel};
