//! Output sink: the generated Foundry project on disk

mod project;

pub use project::{ProjectWriter, WrittenFile, TEST_FILE};
