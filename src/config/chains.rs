//! Chain metadata used for fork setup and explorer queries

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    /// Environment variable the generated test reads its fork URL from
    pub rpc_env_var: String,
    #[serde(default)]
    pub rpc_urls: Vec<String>,
    #[serde(default)]
    pub explorer_api: Option<String>,
    pub native_token: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl ChainConfig {
    /// Match by name, alias or decimal chain id, ignoring case
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim();
        self.name.eq_ignore_ascii_case(query)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(query))
            || query.parse::<u64>().is_ok_and(|id| id == self.chain_id)
    }

    /// First RPC URL: the env var if set, else the first configured URL
    pub fn rpc_url(&self) -> Option<String> {
        std::env::var(&self.rpc_env_var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.rpc_urls.first().cloned())
    }
}

fn chain(
    name: &str,
    aliases: &[&str],
    chain_id: u64,
    rpc_env_var: &str,
    rpc_url: &str,
    explorer_api: &str,
    native_token: &str,
) -> ChainConfig {
    ChainConfig {
        name: name.to_string(),
        chain_id,
        rpc_env_var: rpc_env_var.to_string(),
        rpc_urls: vec![rpc_url.to_string()],
        explorer_api: Some(explorer_api.to_string()),
        native_token: native_token.to_string(),
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
    }
}

pub fn builtin_chains() -> Vec<ChainConfig> {
    vec![
        chain(
            "mainnet",
            &["ethereum", "eth"],
            1,
            "ETH_RPC_URL",
            "https://eth.llamarpc.com",
            "https://api.etherscan.io/api",
            "ETH",
        ),
        chain(
            "bsc",
            &["bnb", "binance"],
            56,
            "BSC_RPC_URL",
            "https://bsc-dataseed.binance.org",
            "https://api.bscscan.com/api",
            "BNB",
        ),
        chain(
            "polygon",
            &["matic"],
            137,
            "POLYGON_RPC_URL",
            "https://polygon-rpc.com",
            "https://api.polygonscan.com/api",
            "MATIC",
        ),
        chain(
            "arbitrum",
            &["arb", "arbitrum-one"],
            42161,
            "ARBITRUM_RPC_URL",
            "https://arb1.arbitrum.io/rpc",
            "https://api.arbiscan.io/api",
            "ETH",
        ),
        chain(
            "optimism",
            &["op"],
            10,
            "OPTIMISM_RPC_URL",
            "https://mainnet.optimism.io",
            "https://api-optimistic.etherscan.io/api",
            "ETH",
        ),
        chain(
            "base",
            &[],
            8453,
            "BASE_RPC_URL",
            "https://mainnet.base.org",
            "https://api.basescan.org/api",
            "ETH",
        ),
        chain(
            "avalanche",
            &["avax"],
            43114,
            "AVALANCHE_RPC_URL",
            "https://api.avax.network/ext/bc/C/rpc",
            "https://api.snowtrace.io/api",
            "AVAX",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_name_alias_and_id() {
        let chains = builtin_chains();
        let bsc = chains.iter().find(|c| c.name == "bsc").unwrap();
        assert!(bsc.matches("BSC"));
        assert!(bsc.matches("binance"));
        assert!(bsc.matches("56"));
        assert!(!bsc.matches("5"));
    }

    #[test]
    fn test_chain_ids_are_unique() {
        let chains = builtin_chains();
        let mut ids: Vec<_> = chains.iter().map(|c| c.chain_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), chains.len());
    }
}
