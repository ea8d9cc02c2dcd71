//! ABI infrastructure - selector resolution, call decoding and ABI sources

mod decoder;
mod overrides;
pub mod raw;
mod resolver;
mod scanner;
mod verified;

pub use decoder::CallDecoder;
pub use overrides::{NamePattern, TypeOverride, TypeOverrideRegistry};
pub use resolver::{
    FourByteRegistry, OpenChainRegistry, RegistrySignature, ResolvedSignature,
    SignatureOrigin, SignatureRegistry, SignatureResolver,
};
pub use scanner::AbiScanner;
pub use verified::{SourcifyClient, VerifiedAbiSource};
