//! Contract category patterns scored by called-function keywords

use std::collections::BTreeSet;

pub struct ContractPattern {
    pub category: &'static str,
    /// Lower-cased function names characteristic of the category
    pub keywords: &'static [&'static str],
}

/// Declaration order is the tie-break order.
pub const PATTERN_TABLE: &[ContractPattern] = &[
    ContractPattern {
        category: "vault",
        keywords: &[
            "deposit",
            "withdraw",
            "redeem",
            "totalassets",
            "converttoshares",
            "converttoassets",
            "previewdeposit",
            "previewredeem",
            "maxwithdraw",
            "getpooltokens",
        ],
    },
    ContractPattern {
        category: "pool",
        keywords: &[
            "swap",
            "getreserves",
            "sync",
            "skim",
            "token0",
            "token1",
            "slot0",
            "flash",
            "observe",
            "liquidity",
        ],
    },
    ContractPattern {
        category: "router",
        keywords: &[
            "swapexacttokensfortokens",
            "swaptokensforexacttokens",
            "swapexactethfortokens",
            "swapexacttokensforeth",
            "swapexacttokensfortokenssupportingfeeontransfertokens",
            "addliquidity",
            "removeliquidity",
            "exactinputsingle",
            "exactinput",
            "exactoutputsingle",
            "getamountsout",
            "getamountsin",
        ],
    },
    ContractPattern {
        category: "factory",
        keywords: &["createpair", "getpair", "createpool", "getpool", "allpairs", "allpairslength", "feeto"],
    },
    ContractPattern {
        category: "token",
        keywords: &[
            "transfer",
            "transferfrom",
            "approve",
            "balanceof",
            "allowance",
            "totalsupply",
            "decimals",
            "symbol",
        ],
    },
    ContractPattern {
        category: "lending",
        keywords: &[
            "borrow",
            "repay",
            "supply",
            "liquidationcall",
            "flashloan",
            "flashloansimple",
            "getuseraccountdata",
            "repayborrow",
            "liquidateborrow",
            "borrowbalancecurrent",
        ],
    },
    ContractPattern {
        category: "governance",
        keywords: &["propose", "castvote", "execute", "queue", "delegate", "getvotes", "quorum"],
    },
    ContractPattern {
        category: "nft",
        keywords: &[
            "safetransferfrom",
            "ownerof",
            "setapprovalforall",
            "isapprovedforall",
            "tokenuri",
            "safemint",
        ],
    },
];

/// Minimum keyword hits before a category is trusted
pub const MIN_SCORE: usize = 2;

/// Best-scoring category for a set of lower-cased function names
pub fn categorize(function_names: &BTreeSet<String>) -> Option<&'static str> {
    let mut best: Option<(&'static str, usize)> = None;
    for pattern in PATTERN_TABLE {
        let score = pattern
            .keywords
            .iter()
            .filter(|kw| function_names.contains(**kw))
            .count();
        // strict comparison keeps the earlier category on ties
        if score >= MIN_SCORE && best.map_or(true, |(_, s)| score > s) {
            best = Some((pattern.category, score));
        }
    }
    best.map(|(category, _)| category)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_categorize() {
        assert_eq!(categorize(&names(&["transfer", "approve", "balanceof"])), Some("token"));
        assert_eq!(categorize(&names(&["swap", "sync", "getreserves"])), Some("pool"));
        assert_eq!(categorize(&names(&["createpair", "getpair"])), Some("factory"));
    }

    #[test]
    fn test_threshold() {
        assert_eq!(categorize(&names(&["transfer"])), None);
        assert_eq!(categorize(&names(&[])), None);
    }

    #[test]
    fn test_tie_goes_to_first_declared() {
        // two vault hits, two token hits
        assert_eq!(
            categorize(&names(&["deposit", "withdraw", "transfer", "approve"])),
            Some("vault")
        );
        // three token hits beat two vault hits
        assert_eq!(
            categorize(&names(&["deposit", "withdraw", "transfer", "approve", "balanceof"])),
            Some("token")
        );
    }
}
