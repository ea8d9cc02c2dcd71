//! Small helpers shared by naming and code generation

mod checksum;
mod ident;

pub use checksum::{checksum, checksum_str};
pub use ident::{capitalize, sanitize_identifier};
