//! Pipeline orchestration

pub mod pipeline;

pub use pipeline::{resolve_main_actor, ReplayOutput, ReplayPipeline, RunOptions, RunStats};
