//! Well-known addresses that get a readable name without any lookup

use alloy_primitives::{address, Address};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WellKnownKind {
    Token { symbol: &'static str, decimals: u8 },
    Protocol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WellKnown {
    pub chain_id: u64,
    pub address: Address,
    pub name: &'static str,
    pub kind: WellKnownKind,
}

const fn token(chain_id: u64, address: Address, name: &'static str, symbol: &'static str, decimals: u8) -> WellKnown {
    WellKnown {
        chain_id,
        address,
        name,
        kind: WellKnownKind::Token { symbol, decimals },
    }
}

const fn protocol(chain_id: u64, address: Address, name: &'static str) -> WellKnown {
    WellKnown {
        chain_id,
        address,
        name,
        kind: WellKnownKind::Protocol,
    }
}

const WELL_KNOWN: &[WellKnown] = &[
    token(1, address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"), "Wrapped Ether", "WETH", 18),
    token(1, address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"), "USD Coin", "USDC", 6),
    token(1, address!("dac17f958d2ee523a2206206994597c13d831ec7"), "Tether USD", "USDT", 6),
    token(1, address!("6b175474e89094c44da98b954eedeac495271d0f"), "Dai Stablecoin", "DAI", 18),
    token(1, address!("2260fac5e5542a773aa44fbcfedf7c193bc2c599"), "Wrapped BTC", "WBTC", 8),
    protocol(1, address!("ba12222222228d8ba445958a75a0704d566bf2c8"), "BalancerVault"),
    protocol(1, address!("87870bca3f3fd6335c3f4ce8392d69350b4fa4e2"), "AaveV3Pool"),
    protocol(1, address!("7d2768de32b0b80b7a3454c06bdac94a69ddc7a9"), "AaveV2LendingPool"),
    protocol(1, address!("1e0447b19bb6ecfdae1e4ae1694b0c3659614e4e"), "DydxSoloMargin"),
    protocol(1, address!("bbbbbbbbbb9cc5e90e3b3af64bdaf62c37eeffcb"), "MorphoBlue"),
    protocol(1, address!("7a250d5630b4cf539739df2c5dacb4c659f2488d"), "UniswapV2Router"),
    protocol(1, address!("e592427a0aece92de3edee1f18e0157c05861564"), "UniswapV3Router"),
    token(56, address!("bb4cdb9cbd36b01bd1cbaebf2de08d9173bc095c"), "Wrapped BNB", "WBNB", 18),
    token(56, address!("55d398326f99059ff775485246999027b3197955"), "Tether USD", "USDT", 18),
    protocol(56, address!("10ed43c718714eb63d5aa57b78b54704e256024e"), "PancakeRouter"),
];

/// Well-known entries for one chain
pub fn well_known(chain_id: u64) -> impl Iterator<Item = &'static WellKnown> {
    WELL_KNOWN.iter().filter(move |w| w.chain_id == chain_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filtered_by_chain() {
        assert!(well_known(1).all(|w| w.chain_id == 1));
        assert!(well_known(1).any(|w| w.name == "BalancerVault"));
        assert_eq!(well_known(999_999).count(), 0);
    }
}
