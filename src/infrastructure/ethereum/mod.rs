//! Ethereum-facing capabilities

mod enrichment;

pub use enrichment::{
    enrich_all, ChainedEnrichment, RpcEnrichment, StaticEnrichment, TokenDescription, TokenEnrichment, TokenKind,
};
