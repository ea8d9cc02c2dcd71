//! Foundry project writer
//!
//! The test file is rewritten on every run. Boilerplate files are only
//! created when missing unless overwriting is requested, so local edits to
//! `foundry.toml` and friends survive regeneration.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::ChainConfig;
use crate::core::ReplayOutput;
use crate::modules::codegen::CONTRACT_NAME;

/// Test file path relative to the project root
pub const TEST_FILE: &str = "test/Replay.t.sol";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: PathBuf,
    /// False when an existing boilerplate file was left alone
    pub written: bool,
}

#[derive(Debug, Clone)]
pub struct ProjectWriter {
    root: PathBuf,
    overwrite: bool,
}

impl ProjectWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            overwrite: false,
        }
    }

    /// Also replace existing boilerplate files
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write the test file and any missing boilerplate
    pub fn write(&self, output: &ReplayOutput) -> Result<Vec<WrittenFile>> {
        fs::create_dir_all(self.root.join("test"))
            .with_context(|| format!("create {}", self.root.join("test").display()))?;

        let mut files = vec![self.put(TEST_FILE, &output.source, true)?];
        files.push(self.put("foundry.toml", &foundry_toml(&output.chain), false)?);
        files.push(self.put("remappings.txt", "forge-std/=lib/forge-std/src/\n", false)?);
        files.push(self.put(".env.example", &env_example(&output.chain), false)?);
        files.push(self.put("README.md", &readme(output), false)?);

        info!(
            root = %self.root.display(),
            written = files.iter().filter(|f| f.written).count(),
            "project written"
        );
        Ok(files)
    }

    fn put(&self, relative: &str, content: &str, always: bool) -> Result<WrittenFile> {
        let path = self.root.join(relative);
        if !always && !self.overwrite && path.exists() {
            debug!(path = %path.display(), "keeping existing file");
            return Ok(WrittenFile { path, written: false });
        }
        fs::write(&path, content).with_context(|| format!("write {}", path.display()))?;
        Ok(WrittenFile { path, written: true })
    }
}

fn foundry_toml(chain: &ChainConfig) -> String {
    format!(
        "[profile.default]\n\
         src = \"src\"\n\
         out = \"out\"\n\
         libs = [\"lib\"]\n\
         test = \"test\"\n\
         \n\
         [rpc_endpoints]\n\
         {} = \"${{{}}}\"\n",
        chain.name, chain.rpc_env_var
    )
}

fn env_example(chain: &ChainConfig) -> String {
    let example = chain.rpc_urls.first().map(String::as_str).unwrap_or("");
    format!("# archive RPC for {} (chain id {})\n{}={}\n", chain.name, chain.chain_id, chain.rpc_env_var, example)
}

fn readme(output: &ReplayOutput) -> String {
    let stats = &output.stats;
    let block = output
        .fork_block
        .map(|b| format!("block {b}"))
        .unwrap_or_else(|| "the latest block".to_string());
    format!(
        "# Transaction replay\n\
         \n\
         `{TEST_FILE}` replays the calls made by `{main:#x}` on {chain}, forked at {block}.\n\
         \n\
         - {top} top-level calls, {regions} callback regions\n\
         - {addresses} addresses, {interfaces} interfaces\n\
         \n\
         ## Running\n\
         \n\
         ```sh\n\
         forge install foundry-rs/forge-std\n\
         cp .env.example .env   # point {env} at an archive node\n\
         source .env\n\
         forge test --match-contract {CONTRACT_NAME} -vvvv\n\
         ```\n",
        main = output.main,
        chain = output.chain.name,
        top = stats.top_level_calls,
        regions = stats.regions,
        addresses = stats.addresses,
        interfaces = stats.interfaces,
        env = output.chain.rpc_env_var,
    )
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Address;

    use super::*;
    use crate::config::builtin_chains;
    use crate::core::RunStats;
    use crate::modules::export::ExportedModel;

    fn output(source: &str) -> ReplayOutput {
        ReplayOutput {
            source: source.to_string(),
            model: ExportedModel {
                main_actor: String::new(),
                chain: None,
                block: None,
                top_level: vec![],
                regions: vec![],
                addresses: vec![],
                interfaces: vec![],
            },
            chain: builtin_chains().remove(0),
            main: Address::repeat_byte(0x11),
            fork_block: Some(42),
            stats: RunStats::default(),
        }
    }

    #[test]
    fn test_writes_project_layout() {
        let dir = tempfile::tempdir().unwrap();
        let files = ProjectWriter::new(dir.path()).write(&output("contract A {}")).unwrap();

        assert_eq!(files.len(), 5);
        assert!(files.iter().all(|f| f.written));
        assert_eq!(
            fs::read_to_string(dir.path().join(TEST_FILE)).unwrap(),
            "contract A {}"
        );
        let foundry = fs::read_to_string(dir.path().join("foundry.toml")).unwrap();
        assert!(foundry.contains("mainnet = \"${ETH_RPC_URL}\""));
        let env = fs::read_to_string(dir.path().join(".env.example")).unwrap();
        assert!(env.contains("ETH_RPC_URL="));
        let readme = fs::read_to_string(dir.path().join("README.md")).unwrap();
        assert!(readme.contains("block 42"));
    }

    #[test]
    fn test_existing_boilerplate_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("foundry.toml"), "# mine\n").unwrap();

        let files = ProjectWriter::new(dir.path()).write(&output("v1")).unwrap();
        assert!(!files.iter().find(|f| f.path.ends_with("foundry.toml")).unwrap().written);
        assert_eq!(fs::read_to_string(dir.path().join("foundry.toml")).unwrap(), "# mine\n");

        ProjectWriter::new(dir.path()).write(&output("v2")).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join(TEST_FILE)).unwrap(), "v2");

        ProjectWriter::new(dir.path())
            .overwrite(true)
            .write(&output("v3"))
            .unwrap();
        assert!(fs::read_to_string(dir.path().join("foundry.toml"))
            .unwrap()
            .contains("[profile.default]"));
    }
}
