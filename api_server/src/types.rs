use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unleash_client::WalletProfile;

/// Standard API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: String) -> Self {
        Self {
            error,
            details: None,
            timestamp: Utc::now(),
            params: None,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Query parameters for the market insight chart routes
#[derive(Debug, Deserialize)]
pub struct MarketQuery {
    pub chain: Option<String>,
    #[serde(rename = "timeFrame")]
    pub time_frame: Option<String>,
}

/// Query parameters for wallet-scoped routes
#[derive(Debug, Deserialize)]
pub struct WalletQuery {
    pub wallet: Option<String>,
}

/// Query parameters for the token image route
#[derive(Debug, Deserialize)]
pub struct TokenImageQuery {
    pub blockchain: Option<String>,
    pub contract_address: Option<String>,
    pub token_id: Option<String>,
    pub currency: Option<String>,
}

/// Token image response
#[derive(Debug, Serialize)]
pub struct TokenImageResponse {
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
}

/// Query parameters for the wallet scores passthrough
#[derive(Debug, Deserialize)]
pub struct WalletScoresQuery {
    pub wallet: Option<String>,
    pub blockchain: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub time_range: Option<String>,
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

/// Marketplace reward summary for a wallet
#[derive(Debug, Serialize)]
pub struct RewardsResponse {
    pub blur: f64,
    pub looks: f64,
    pub stats: RewardsStats,
    pub risk: RewardsRisk,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RewardsStats {
    pub collection_count: u64,
    pub nft_count: u64,
    pub is_shark: bool,
    pub is_whale: bool,
    pub washtrade_nft_count: u64,
}

#[derive(Debug, Serialize)]
pub struct RewardsRisk {
    pub is_sanctioned: bool,
    pub risk_level: String,
    pub is_custodial: bool,
    pub is_contract: bool,
}

impl RewardsResponse {
    /// The zeroed shape served when the upstream profile fetch fails.
    pub fn degraded(error: String, details: String) -> Self {
        Self {
            blur: 0.0,
            looks: 0.0,
            stats: RewardsStats {
                collection_count: 0,
                nft_count: 0,
                is_shark: false,
                is_whale: false,
                washtrade_nft_count: 0,
            },
            risk: RewardsRisk {
                is_sanctioned: false,
                risk_level: "unknown".to_string(),
                is_custodial: false,
                is_contract: false,
            },
            error: Some(error),
            details: Some(details),
        }
    }
}

impl From<WalletProfile> for RewardsResponse {
    fn from(profile: WalletProfile) -> Self {
        let reward = profile.nft_marketplace_reward.unwrap_or_default();
        Self {
            blur: reward.blur.unwrap_or(0.0),
            looks: reward.looks.unwrap_or(0.0),
            stats: RewardsStats {
                collection_count: profile.collection_count.unwrap_or(0),
                nft_count: profile.nft_count.unwrap_or(0),
                is_shark: profile.is_shark.unwrap_or(false),
                is_whale: profile.is_whale.unwrap_or(false),
                washtrade_nft_count: profile.washtrade_nft_count.unwrap_or(0),
            },
            risk: RewardsRisk {
                is_sanctioned: profile.aml_is_sanctioned.unwrap_or(false),
                risk_level: profile.aml_risk_level.unwrap_or_else(|| "low".to_string()),
                is_custodial: profile.is_custodial.unwrap_or(false),
                is_contract: profile.is_contract.unwrap_or(false),
            },
            error: None,
            details: None,
        }
    }
}
