use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Chains the market-insights upstream exposes.
pub const SUPPORTED_CHAINS: [&str; 7] = [
    "ethereum",
    "binance",
    "avalanche",
    "linea",
    "solana",
    "polygon",
    "bitcoin",
];

/// Time ranges the market-insights upstream exposes.
pub const SUPPORTED_TIME_FRAMES: [&str; 5] = ["24h", "7d", "30d", "90d", "all"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Binance,
    Avalanche,
    Linea,
    Solana,
    Polygon,
    Bitcoin,
}

impl Chain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Binance => "binance",
            Chain::Avalanche => "avalanche",
            Chain::Linea => "linea",
            Chain::Solana => "solana",
            Chain::Polygon => "polygon",
            Chain::Bitcoin => "bitcoin",
        }
    }

    pub fn parse(input: &str) -> Option<Chain> {
        match input {
            "ethereum" => Some(Chain::Ethereum),
            "binance" => Some(Chain::Binance),
            "avalanche" => Some(Chain::Avalanche),
            "linea" => Some(Chain::Linea),
            "solana" => Some(Chain::Solana),
            "polygon" => Some(Chain::Polygon),
            "bitcoin" => Some(Chain::Bitcoin),
            _ => None,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeFrame {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
    #[serde(rename = "all")]
    All,
}

impl TimeFrame {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFrame::Day => "24h",
            TimeFrame::Week => "7d",
            TimeFrame::Month => "30d",
            TimeFrame::Quarter => "90d",
            TimeFrame::All => "all",
        }
    }

    pub fn parse(input: &str) -> Option<TimeFrame> {
        match input {
            "24h" => Some(TimeFrame::Day),
            "7d" => Some(TimeFrame::Week),
            "30d" => Some(TimeFrame::Month),
            "90d" => Some(TimeFrame::Quarter),
            "all" => Some(TimeFrame::All),
            _ => None,
        }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid chain parameter")]
    UnsupportedChain {
        given: String,
        supported: Vec<&'static str>,
    },
    #[error("Invalid timeFrame parameter. Supported values are: 24h, 7d, 30d, 90d, all")]
    UnsupportedTimeFrame {
        given: String,
        supported: Vec<&'static str>,
    },
    #[error("All time frame not supported for Ethereum")]
    UnsupportedCombination,
}

/// Validate raw `chain` / `timeFrame` query parameters against the
/// allow-lists. Absent parameters fall back to ethereum / 24h.
///
/// The (ethereum, all) pair is rejected even though both values are
/// individually valid: the upstream has no all-time ethereum dataset.
pub fn validate_market_query(
    chain: Option<&str>,
    time_frame: Option<&str>,
) -> Result<(Chain, TimeFrame), ValidationError> {
    let time_frame_raw = time_frame.unwrap_or("24h");
    let chain_raw = chain.unwrap_or("ethereum");

    let time_frame = TimeFrame::parse(time_frame_raw).ok_or_else(|| {
        ValidationError::UnsupportedTimeFrame {
            given: time_frame_raw.to_string(),
            supported: SUPPORTED_TIME_FRAMES.to_vec(),
        }
    })?;

    let chain = Chain::parse(chain_raw).ok_or_else(|| ValidationError::UnsupportedChain {
        given: chain_raw.to_string(),
        supported: SUPPORTED_CHAINS.to_vec(),
    })?;

    if chain == Chain::Ethereum && time_frame == TimeFrame::All {
        return Err(ValidationError::UnsupportedCombination);
    }

    Ok((chain, time_frame))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_valid_pairs_accepted_except_ethereum_all() {
        for chain in SUPPORTED_CHAINS {
            for tf in SUPPORTED_TIME_FRAMES {
                let result = validate_market_query(Some(chain), Some(tf));
                if chain == "ethereum" && tf == "all" {
                    assert_eq!(result, Err(ValidationError::UnsupportedCombination));
                } else {
                    let (c, t) = result.unwrap();
                    assert_eq!(c.as_str(), chain);
                    assert_eq!(t.as_str(), tf);
                }
            }
        }
    }

    #[test]
    fn test_unknown_chain_rejected_with_allow_list() {
        let err = validate_market_query(Some("dogechain"), Some("24h")).unwrap_err();
        match err {
            ValidationError::UnsupportedChain { given, supported } => {
                assert_eq!(given, "dogechain");
                assert_eq!(supported, SUPPORTED_CHAINS.to_vec());
            }
            other => panic!("expected chain error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_time_frame_rejected_with_allow_list() {
        let err = validate_market_query(Some("solana"), Some("12h")).unwrap_err();
        match err {
            ValidationError::UnsupportedTimeFrame { given, supported } => {
                assert_eq!(given, "12h");
                assert_eq!(supported, SUPPORTED_TIME_FRAMES.to_vec());
            }
            other => panic!("expected timeFrame error, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults_applied_when_absent() {
        let (chain, tf) = validate_market_query(None, None).unwrap();
        assert_eq!(chain, Chain::Ethereum);
        assert_eq!(tf, TimeFrame::Day);
    }

    #[test]
    fn test_default_chain_with_explicit_all_is_rejected() {
        // Defaulted ethereum still participates in the cross-field rule
        let err = validate_market_query(None, Some("all")).unwrap_err();
        assert_eq!(err, ValidationError::UnsupportedCombination);
    }

    #[test]
    fn test_case_sensitive_like_upstream() {
        assert!(validate_market_query(Some("Ethereum"), Some("24h")).is_err());
    }
}
