//! Local artifact discovery
//!
//! Walks project directories for Foundry (`out/`) and Hardhat (`artifacts/`)
//! build output and folds every ABI found into one registry.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use alloy_json_abi::JsonAbi;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::domain::abi::{AbiRegistry, AbiSource};

/// Largest artifact we bother parsing
const MAX_ARTIFACT_BYTES: u64 = 5 * 1024 * 1024;

/// Directories never descended into
const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules", ".next", "dist", "build", "cache", "build-info"];

/// Path components that mark build output
const OUTPUT_DIRS: &[&str] = &["out", "artifacts"];

pub struct AbiScanner;

impl AbiScanner {
    /// Registry of every artifact ABI below `root`
    pub fn scan(root: impl AsRef<Path>) -> AbiRegistry {
        let started = Instant::now();
        let root = root.as_ref();
        let (candidates, mut errors) = Self::artifact_paths(root);

        let mut registry = AbiRegistry::new();
        for path in &candidates {
            match Self::load_abi_file(path) {
                Ok(Some(found)) => registry.merge(found),
                Ok(None) => {}
                Err(err) => errors.push(format!("{}: {err:#}", path.display())),
            }
        }
        registry.scanned_files = candidates.len();
        registry.errors = errors;

        debug!(
            root = %root.display(),
            files = registry.scanned_files,
            functions = registry.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scanned ABI root"
        );
        registry
    }

    /// Candidate artifact files plus walk errors
    fn artifact_paths(root: &Path) -> (Vec<PathBuf>, Vec<String>) {
        let mut paths = Vec::new();
        let mut errors = Vec::new();
        let walk = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !Self::skipped(e));
        for entry in walk {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    errors.push(err.to_string());
                    continue;
                }
            };
            if !entry.file_type().is_file() || !Self::is_artifact(entry.path()) {
                continue;
            }
            match entry.metadata() {
                Ok(meta) if meta.len() > MAX_ARTIFACT_BYTES => {
                    debug!(path = %entry.path().display(), bytes = meta.len(), "artifact too large, skipped");
                }
                Ok(_) => paths.push(entry.into_path()),
                Err(err) => errors.push(format!("{}: {err}", entry.path().display())),
            }
        }
        (paths, errors)
    }

    /// Union of several roots; unreadable files are logged, not fatal
    pub fn scan_roots(roots: &[PathBuf]) -> AbiRegistry {
        let mut registry = AbiRegistry::new();
        for root in roots {
            registry.merge(Self::scan(root));
        }
        for err in &registry.errors {
            warn!(error = %err, "skipped ABI file");
        }
        registry
    }

    /// Load one ABI file: a bare ABI array or an artifact with an `abi` field
    ///
    /// `Ok(None)` when the JSON carries no ABI at all.
    pub fn load_abi_file(path: &Path) -> anyhow::Result<Option<AbiRegistry>> {
        let content = fs::read_to_string(path)?;
        let mut value: serde_json::Value = serde_json::from_str(&content)?;

        let abi_value = if value.is_array() {
            value
        } else if let Some(abi) = value.get_mut("abi") {
            abi.take()
        } else {
            return Ok(None);
        };

        let abi: JsonAbi = serde_json::from_value(abi_value)?;
        Ok(Some(AbiRegistry::from_json_abi(&abi, AbiSource::File(path.to_path_buf()))))
    }

    fn skipped(entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| SKIPPED_DIRS.contains(&name))
    }

    /// JSON below a build output directory; Hardhat debug files excluded
    fn is_artifact(path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        name.ends_with(".json")
            && !name.ends_with(".dbg.json")
            && path.components().any(|c| match c {
                Component::Normal(part) => part.to_str().is_some_and(|p| OUTPUT_DIRS.contains(&p)),
                _ => false,
            })
    }
}
