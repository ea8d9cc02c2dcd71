//! Positional type overrides for well-known protocol methods
//!
//! Public registries often carry a colliding or mistyped signature for
//! popular selectors. When the resolver's own parameter types do not fit a
//! payload, these entries are tried in order before falling back to raw
//! word reconstruction.

use serde::{Deserialize, Serialize};

/// How an override matches a function name (always case-insensitive)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamePattern {
    Exact(String),
    Prefix(String),
    Contains(String),
}

impl NamePattern {
    pub fn matches(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        match self {
            Self::Exact(p) => name == p.to_ascii_lowercase(),
            Self::Prefix(p) => name.starts_with(&p.to_ascii_lowercase()),
            Self::Contains(p) => name.contains(&p.to_ascii_lowercase()),
        }
    }
}

/// One override: a name pattern and the parameter types to decode with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeOverride {
    pub pattern: NamePattern,
    pub types: Vec<String>,
}

impl TypeOverride {
    pub fn new(pattern: NamePattern, types: &[&str]) -> Self {
        Self {
            pattern,
            types: types.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Ordered override table; earlier entries win
#[derive(Debug, Clone, Default)]
pub struct TypeOverrideRegistry {
    entries: Vec<TypeOverride>,
}

impl TypeOverrideRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in table
    pub fn builtin() -> Self {
        use NamePattern::Exact;
        let exact = |name: &str| Exact(name.to_string());

        Self {
            entries: vec![
                // Uniswap V2 pair
                TypeOverride::new(exact("swap"), &["uint256", "uint256", "address", "bytes"]),
                // Uniswap V3 pool
                TypeOverride::new(exact("swap"), &["address", "bool", "int256", "uint160", "bytes"]),
                TypeOverride::new(exact("flash"), &["address", "uint256", "uint256", "bytes"]),
                // Aave V2/V3 pool
                TypeOverride::new(
                    exact("flashLoan"),
                    &["address", "address[]", "uint256[]", "uint256[]", "address", "bytes", "uint16"],
                ),
                // Balancer vault
                TypeOverride::new(exact("flashLoan"), &["address", "address[]", "uint256[]", "bytes"]),
                // ERC-3156 lender
                TypeOverride::new(exact("flashLoan"), &["address", "address", "uint256", "bytes"]),
                // Morpho Blue
                TypeOverride::new(exact("flashLoan"), &["address", "uint256", "bytes"]),
                TypeOverride::new(
                    exact("flashLoanSimple"),
                    &["address", "address", "uint256", "bytes", "uint16"],
                ),
                // SwapRouter (with deadline), then SwapRouter02
                TypeOverride::new(
                    exact("exactInputSingle"),
                    &["(address,address,uint24,address,uint256,uint256,uint256,uint160)"],
                ),
                TypeOverride::new(
                    exact("exactInputSingle"),
                    &["(address,address,uint24,address,uint256,uint256,uint160)"],
                ),
            ],
        }
    }

    /// Append an entry after everything already registered
    pub fn push(&mut self, entry: TypeOverride) {
        self.entries.push(entry);
    }

    /// Entries whose pattern matches `name`, in table order
    pub fn matching<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a TypeOverride> + 'a {
        self.entries.iter().filter(move |e| e.pattern.matches(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
