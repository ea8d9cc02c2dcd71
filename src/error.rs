//! Error types for a replay reconstruction run
//!
//! Only structural problems with the input abort a run. Everything that can
//! go wrong per call, per selector or per address degrades to a documented
//! fallback instead and never surfaces here.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors of a single pipeline run
#[derive(Debug, Error)]
pub enum RewindError {
    /// The trace document is not valid JSON
    #[error("trace is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The trace has no node map under any accepted field name
    #[error("trace has no node map (expected one of: {expected})")]
    MissingNodeMap { expected: &'static str },

    /// A node map key cannot be turned into an ordering key
    #[error("node key {0:?} is not orderable (expected an integer-like key)")]
    UnorderableKey(String),

    /// A node entry has a shape the ingestion boundary cannot read
    #[error("node {key} is malformed: {reason}")]
    MalformedNode { key: String, reason: String },

    /// No main actor was given and none could be derived from the trace
    #[error("no main actor address could be resolved from the trace or arguments")]
    NoMainActor,

    /// An address literal could not be parsed
    #[error("invalid address {0:?}")]
    InvalidAddress(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("configuration error: {0}")]
    Config(String),

    /// Reading or writing a file failed
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RewindError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = RewindError> = std::result::Result<T, E>;
