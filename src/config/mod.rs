//! TOML configuration, chain table and well-known addresses

mod chains;
mod tokens;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use alloy_primitives::Address;
use serde::Deserialize;
use tracing::debug;

use crate::domain::trace::parse_address;
use crate::error::{Result, RewindError};
use crate::infrastructure::abi::{NamePattern, TypeOverride, TypeOverrideRegistry};

pub use chains::{builtin_chains, ChainConfig};
pub use tokens::{well_known, WellKnown, WellKnownKind};

#[derive(Debug, Clone, Deserialize)]
pub struct TokenSpec {
    pub address: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub decimals: Option<u8>,
}

impl TokenSpec {
    pub fn parsed_address(&self) -> Result<Address> {
        parse_address(&self.address).ok_or_else(|| RewindError::InvalidAddress(self.address.clone()))
    }

    /// Symbol if set, else a shortened address
    pub fn display_symbol(&self) -> String {
        self.symbol
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| short_addr(&self.address))
    }
}

/// Per-address ABI file
#[derive(Debug, Clone, Deserialize)]
pub struct ContractAbiSpec {
    pub address: String,
    pub abi: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Exact,
    Prefix,
    Contains,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypeOverrideSpec {
    pub pattern: String,
    #[serde(default)]
    pub mode: MatchMode,
    pub types: Vec<String>,
}

impl TypeOverrideSpec {
    pub fn to_override(&self) -> TypeOverride {
        let pattern = match self.mode {
            MatchMode::Exact => NamePattern::Exact(self.pattern.clone()),
            MatchMode::Prefix => NamePattern::Prefix(self.pattern.clone()),
            MatchMode::Contains => NamePattern::Contains(self.pattern.clone()),
        };
        TypeOverride {
            pattern,
            types: self.types.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WalkerConfig {
    /// Node keys after a trigger that count as inside its callback
    pub lookahead_window: u64,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self { lookahead_window: 50 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub enabled: bool,
    pub batch_width: usize,
    pub timeout_ms: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_width: 8,
            timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub timeout_ms: u64,
    pub offline: bool,
    pub prefetch_width: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            offline: false,
            prefetch_width: 8,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub walker: WalkerConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub tokens: Vec<TokenSpec>,

    #[serde(default)]
    pub chains: Vec<ChainConfig>,

    #[serde(default)]
    pub abi_paths: Vec<String>,

    #[serde(default)]
    pub contracts: Vec<ContractAbiSpec>,

    #[serde(default)]
    pub type_overrides: Vec<TypeOverrideSpec>,
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|err| RewindError::Config(err.to_string()))
    }

    /// Look up a chain by name, alias or chain id
    ///
    /// Configured chains shadow built-in entries with the same name.
    pub fn chain(&self, name: &str) -> Result<ChainConfig> {
        self.chains
            .iter()
            .find(|c| c.matches(name))
            .cloned()
            .or_else(|| builtin_chains().into_iter().find(|c| c.matches(name)))
            .ok_or_else(|| RewindError::Config(format!("unknown chain {name:?}")))
    }

    /// Built-in overrides followed by configured ones
    pub fn type_override_registry(&self) -> TypeOverrideRegistry {
        let mut registry = TypeOverrideRegistry::builtin();
        for spec in &self.type_overrides {
            registry.push(spec.to_override());
        }
        registry
    }

    /// ABI search roots with `~` expanded
    pub fn abi_roots(&self) -> Vec<PathBuf> {
        self.abi_paths.iter().map(|p| expand_home(p)).collect()
    }
}

/// Load configuration from `explicit`, or the first default location
///
/// A missing file yields defaults; an unreadable or malformed one is an error.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let Some(path) = explicit.map(Path::to_path_buf).or_else(config_path) else {
        return Ok(Config::default());
    };
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound && explicit.is_none() => {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }
        Err(err) => return Err(RewindError::io(path, err)),
    };
    debug!(path = %path.display(), "loaded config");
    Config::from_toml(&content).map_err(|err| RewindError::Config(format!("{}: {err}", path.display())))
}

pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("REWIND_CONFIG").map(PathBuf::from) {
        return Some(path);
    }
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from) {
        return Some(xdg.join("rewind").join("config.toml"));
    }
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        return Some(home.join(".config").join("rewind").join("config.toml"));
    }

    directories::ProjectDirs::from("io", "rewind", "rewind").map(|dirs| dirs.config_dir().join("config.toml"))
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}

fn short_addr(value: &str) -> String {
    let value = value.trim();
    if value.len() <= 10 {
        return value.to_string();
    }
    format!("{}..{}", &value[..6], &value[value.len() - 4..])
}
