//! Rebuild a replayable Foundry test from a recorded transaction call trace

pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod logging;
pub mod modules;
pub mod store;

pub use crate::core::{ReplayOutput, ReplayPipeline, RunOptions};
pub use crate::error::{Result, RewindError};
