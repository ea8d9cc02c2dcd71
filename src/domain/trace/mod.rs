//! Trace domain: the canonical node/invocation model and its ingestion boundary

mod ingest;
mod node;

pub use ingest::{ingest, parse_address, parse_key, parse_trace};
pub use node::{Invocation, NodeKey, Trace, TraceMethod, TraceNode};
