use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

/// The marketplace endpoints emit numeric fields as either JSON numbers or
/// decimal strings depending on magnitude; accept both.
fn flexible_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

/// One entity from the paginated `/nft/marketplace/traders` dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketplaceTrader {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub traders: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub traders_buyers: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub traders_sellers: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub volume: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub total_assets: Option<f64>,
}

/// One entity from the paginated `/nft/marketplace/washtrade` dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketplaceWashTrade {
    pub id: String,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub washtrade_suspect_sales_ratio: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub washtrade_wallets: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub washtrade_volume: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub washtrade_assets: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "Moderate Risk")]
    Moderate,
    #[serde(rename = "High Risk")]
    High,
    #[serde(rename = "Very High Risk")]
    VeryHigh,
    #[serde(rename = "Extreme Risk")]
    Extreme,
}

impl RiskLevel {
    /// Bands are keyed on the risk score (100 - health score).
    pub fn from_risk_score(risk_score: u8) -> RiskLevel {
        match risk_score {
            0..=20 => RiskLevel::Low,
            21..=40 => RiskLevel::Moderate,
            41..=60 => RiskLevel::High,
            61..=80 => RiskLevel::VeryHigh,
            _ => RiskLevel::Extreme,
        }
    }
}

/// Transparency metrics echoed alongside the score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthMetrics {
    #[serde(rename = "suspectSalesRatio")]
    pub suspect_sales_ratio: f64,
    #[serde(rename = "washTradeWallets")]
    pub wash_trade_wallets: u64,
    #[serde(rename = "totalTraders")]
    pub total_traders: u64,
    #[serde(rename = "washTradeAssets")]
    pub wash_trade_assets: u64,
}

/// Scored marketplace entity as served by /api/marketplacehealth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceHealth {
    pub name: String,
    #[serde(rename = "healthScore")]
    pub health_score: u8,
    #[serde(rename = "riskLevel")]
    pub risk_level: RiskLevel,
    pub buyers: u64,
    pub sellers: u64,
    #[serde(rename = "washTradeVolume")]
    pub wash_trade_volume: f64,
    pub id: String,
    pub metrics: HealthMetrics,
}

const WEIGHT_SUSPECT_SALES: f64 = 0.4;
const WEIGHT_WASH_WALLETS: f64 = 0.3;
const WEIGHT_WASH_VOLUME: f64 = 0.2;
const WEIGHT_WASH_ASSETS: f64 = 0.1;

/// Denominators fall back to 1 so absent or zero totals never divide by zero.
fn denominator(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v > 0.0 => v,
        _ => 1.0,
    }
}

/// Weighted composite health score in [0, 100]; 100 is cleanest.
///
/// Any non-finite intermediate collapses to the neutral fallback of 50.
pub fn calculate_health_score(trader: &MarketplaceTrader, wash: &MarketplaceWashTrade) -> u8 {
    let suspect_sales_ratio = wash.washtrade_suspect_sales_ratio.unwrap_or(0.0);
    let wash_wallets_ratio = wash.washtrade_wallets.unwrap_or(0.0) / denominator(trader.traders);
    let volume_ratio = wash.washtrade_volume.unwrap_or(0.0) / denominator(trader.volume);
    let assets_ratio = wash.washtrade_assets.unwrap_or(0.0) / denominator(trader.total_assets);

    let risk_score = (suspect_sales_ratio * WEIGHT_SUSPECT_SALES
        + wash_wallets_ratio * WEIGHT_WASH_WALLETS
        + volume_ratio * WEIGHT_WASH_VOLUME
        + assets_ratio * WEIGHT_WASH_ASSETS)
        * 100.0;

    if !risk_score.is_finite() {
        warn!(
            "Health score computation produced a non-finite value for '{}', using fallback",
            trader.id
        );
        return 50;
    }

    let normalized = risk_score.clamp(0.0, 100.0).round() as u8;
    100 - normalized
}

/// Join the traders and wash-trade datasets by entity id and score each
/// entity. First match wins; entities without a wash-trade record score
/// against an empty one.
pub fn build_marketplace_health(
    traders: &[MarketplaceTrader],
    wash_trades: &[MarketplaceWashTrade],
) -> Vec<MarketplaceHealth> {
    let empty = MarketplaceWashTrade::default();

    let scored: Vec<MarketplaceHealth> = traders
        .iter()
        .map(|trader| {
            let wash = wash_trades
                .iter()
                .find(|w| w.id == trader.id)
                .unwrap_or(&empty);

            let health_score = calculate_health_score(trader, wash);

            MarketplaceHealth {
                name: trader.name.clone().unwrap_or_default(),
                health_score,
                risk_level: RiskLevel::from_risk_score(100 - health_score),
                buyers: trader.traders_buyers.unwrap_or(0.0).max(0.0) as u64,
                sellers: trader.traders_sellers.unwrap_or(0.0).max(0.0) as u64,
                wash_trade_volume: wash.washtrade_volume.unwrap_or(0.0),
                id: trader.id.clone(),
                metrics: HealthMetrics {
                    suspect_sales_ratio: wash.washtrade_suspect_sales_ratio.unwrap_or(0.0),
                    wash_trade_wallets: wash.washtrade_wallets.unwrap_or(0.0).max(0.0) as u64,
                    total_traders: trader.traders.unwrap_or(0.0).max(0.0) as u64,
                    wash_trade_assets: wash.washtrade_assets.unwrap_or(0.0).max(0.0) as u64,
                },
            }
        })
        .collect();

    debug!("Scored {} marketplace entities", scored.len());
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trader(id: &str) -> MarketplaceTrader {
        MarketplaceTrader {
            id: id.to_string(),
            name: Some(format!("Marketplace {}", id)),
            traders: Some(1000.0),
            traders_buyers: Some(600.0),
            traders_sellers: Some(400.0),
            volume: Some(50_000.0),
            total_assets: Some(2000.0),
        }
    }

    #[test]
    fn test_clean_marketplace_scores_100_low_risk() {
        let t = trader("os");
        let w = MarketplaceWashTrade {
            id: "os".to_string(),
            ..Default::default()
        };
        assert_eq!(calculate_health_score(&t, &w), 100);

        let health = build_marketplace_health(&[t], &[w]);
        assert_eq!(health[0].health_score, 100);
        assert_eq!(health[0].risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_saturated_ratios_clamp_to_extreme() {
        let t = trader("bad");
        let w = MarketplaceWashTrade {
            id: "bad".to_string(),
            washtrade_suspect_sales_ratio: Some(2.0),
            washtrade_wallets: Some(5000.0),
            washtrade_volume: Some(500_000.0),
            washtrade_assets: Some(40_000.0),
        };
        assert_eq!(calculate_health_score(&t, &w), 0);

        let health = build_marketplace_health(&[t], &[w]);
        assert_eq!(health[0].risk_level, RiskLevel::Extreme);
    }

    #[test]
    fn test_missing_denominators_default_to_one() {
        let t = MarketplaceTrader {
            id: "sparse".to_string(),
            ..Default::default()
        };
        let w = MarketplaceWashTrade {
            id: "sparse".to_string(),
            washtrade_wallets: Some(0.3),
            ..Default::default()
        };
        // wallets ratio = 0.3 / 1, weighted 0.3 * 0.3 * 100 = 9 -> health 91
        assert_eq!(calculate_health_score(&t, &w), 91);
    }

    #[test]
    fn test_non_finite_input_falls_back_to_50() {
        let t = trader("nan");
        let w = MarketplaceWashTrade {
            id: "nan".to_string(),
            washtrade_suspect_sales_ratio: Some(f64::NAN),
            ..Default::default()
        };
        assert_eq!(calculate_health_score(&t, &w), 50);
    }

    #[test]
    fn test_unmatched_trader_uses_empty_wash_record() {
        let health = build_marketplace_health(&[trader("solo")], &[]);
        assert_eq!(health.len(), 1);
        assert_eq!(health[0].health_score, 100);
        assert_eq!(health[0].wash_trade_volume, 0.0);
        assert_eq!(health[0].buyers, 600);
        assert_eq!(health[0].sellers, 400);
    }

    #[test]
    fn test_risk_bands() {
        assert_eq!(RiskLevel::from_risk_score(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_risk_score(20), RiskLevel::Low);
        assert_eq!(RiskLevel::from_risk_score(21), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_risk_score(40), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_risk_score(60), RiskLevel::High);
        assert_eq!(RiskLevel::from_risk_score(80), RiskLevel::VeryHigh);
        assert_eq!(RiskLevel::from_risk_score(81), RiskLevel::Extreme);
        assert_eq!(RiskLevel::from_risk_score(100), RiskLevel::Extreme);
    }

    #[test]
    fn test_flexible_numeric_parsing() {
        let json = r#"{
            "id": "m1",
            "name": "StringNumbers",
            "traders": "1200",
            "traders_buyers": 700,
            "volume": "98765.43",
            "total_assets": null
        }"#;
        let t: MarketplaceTrader = serde_json::from_str(json).unwrap();
        assert_eq!(t.traders, Some(1200.0));
        assert_eq!(t.traders_buyers, Some(700.0));
        assert_eq!(t.volume, Some(98765.43));
        assert_eq!(t.total_assets, None);
    }
}
