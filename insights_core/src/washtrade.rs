use crate::chains::{Chain, TimeFrame};
use serde::{Deserialize, Serialize};

/// The wash-trade family from `/nft/market-insights/washtrade`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WashTradeFamily {
    #[serde(default)]
    pub block_dates: Vec<String>,
    #[serde(default)]
    pub washtrade_assets_trend: Vec<Option<f64>>,
    #[serde(default)]
    pub washtrade_suspect_sales_trend: Vec<Option<f64>>,
    #[serde(default)]
    pub washtrade_suspect_transactions_trend: Vec<Option<f64>>,
    #[serde(default)]
    pub washtrade_volume_trend: Vec<Option<f64>>,
    #[serde(default)]
    pub washtrade_wallets_trend: Vec<Option<f64>>,
    #[serde(default)]
    pub washtrade_assets: Option<f64>,
    #[serde(default)]
    pub washtrade_suspect_sales: Option<f64>,
    #[serde(default)]
    pub washtrade_suspect_transactions: Option<f64>,
    #[serde(default)]
    pub washtrade_volume: Option<f64>,
    #[serde(default)]
    pub washtrade_wallets: Option<f64>,
    #[serde(default)]
    pub washtrade_assets_change: Option<f64>,
    #[serde(default)]
    pub washtrade_suspect_sales_change: Option<f64>,
    #[serde(default)]
    pub washtrade_suspect_transactions_change: Option<f64>,
    #[serde(default)]
    pub washtrade_volume_change: Option<f64>,
    #[serde(default)]
    pub washtrade_wallets_change: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WashTradePoint {
    pub date: String,
    pub assets: f64,
    #[serde(rename = "suspectSales")]
    pub suspect_sales: f64,
    #[serde(rename = "suspectTransactions")]
    pub suspect_transactions: f64,
    pub volume: f64,
    pub wallets: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WashTradeTotals {
    pub assets: f64,
    #[serde(rename = "suspectSales")]
    pub suspect_sales: f64,
    #[serde(rename = "suspectTransactions")]
    pub suspect_transactions: f64,
    pub volume: f64,
    pub wallets: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WashTradeChanges {
    pub assets_change: f64,
    pub suspect_sales_change: f64,
    pub suspect_transactions_change: f64,
    pub volume_change: f64,
    pub wallets_change: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WashTradeChartMetadata {
    #[serde(rename = "timeFrame")]
    pub time_frame: String,
    pub chain: String,
    pub totals: WashTradeTotals,
    pub changes: WashTradeChanges,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WashTradeChart {
    pub data: Vec<WashTradePoint>,
    pub metadata: WashTradeChartMetadata,
}

fn trend_at(trend: &[Option<f64>], index: usize) -> f64 {
    trend.get(index).copied().flatten().unwrap_or(0.0)
}

/// Reshape the wash-trade family into a chart, one point per block date.
/// Same zero-fill rule as the market merge: short trends never error.
pub fn build_wash_trade_chart(
    family: &WashTradeFamily,
    chain: Chain,
    time_frame: TimeFrame,
) -> WashTradeChart {
    let data: Vec<WashTradePoint> = family
        .block_dates
        .iter()
        .enumerate()
        .map(|(i, date)| WashTradePoint {
            date: date.clone(),
            assets: trend_at(&family.washtrade_assets_trend, i),
            suspect_sales: trend_at(&family.washtrade_suspect_sales_trend, i),
            suspect_transactions: trend_at(&family.washtrade_suspect_transactions_trend, i),
            volume: trend_at(&family.washtrade_volume_trend, i),
            wallets: trend_at(&family.washtrade_wallets_trend, i),
        })
        .collect();

    WashTradeChart {
        data,
        metadata: WashTradeChartMetadata {
            time_frame: time_frame.as_str().to_string(),
            chain: chain.as_str().to_string(),
            totals: WashTradeTotals {
                assets: family.washtrade_assets.unwrap_or(0.0),
                suspect_sales: family.washtrade_suspect_sales.unwrap_or(0.0),
                suspect_transactions: family.washtrade_suspect_transactions.unwrap_or(0.0),
                volume: family.washtrade_volume.unwrap_or(0.0),
                wallets: family.washtrade_wallets.unwrap_or(0.0),
            },
            changes: WashTradeChanges {
                assets_change: family.washtrade_assets_change.unwrap_or(0.0),
                suspect_sales_change: family.washtrade_suspect_sales_change.unwrap_or(0.0),
                suspect_transactions_change: family
                    .washtrade_suspect_transactions_change
                    .unwrap_or(0.0),
                volume_change: family.washtrade_volume_change.unwrap_or(0.0),
                wallets_change: family.washtrade_wallets_change.unwrap_or(0.0),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reshape_aligns_by_index() {
        let family = WashTradeFamily {
            block_dates: vec![
                "2024-02-01T00:00:00Z".to_string(),
                "2024-02-02T00:00:00Z".to_string(),
            ],
            washtrade_assets_trend: vec![Some(1.0), Some(2.0)],
            washtrade_suspect_sales_trend: vec![Some(3.0)],
            washtrade_volume_trend: vec![Some(10.5), Some(20.5)],
            washtrade_wallets_trend: vec![None, Some(4.0)],
            washtrade_volume: Some(31.0),
            washtrade_volume_change: Some(0.5),
            ..Default::default()
        };

        let chart = build_wash_trade_chart(&family, Chain::Ethereum, TimeFrame::Week);
        assert_eq!(chart.data.len(), 2);
        assert_eq!(chart.data[0].assets, 1.0);
        // short / null trends fall back to zero
        assert_eq!(chart.data[1].suspect_sales, 0.0);
        assert_eq!(chart.data[0].wallets, 0.0);
        assert_eq!(chart.data[1].wallets, 4.0);
        assert_eq!(chart.metadata.totals.volume, 31.0);
        assert_eq!(chart.metadata.changes.volume_change, 0.5);
        assert_eq!(chart.metadata.totals.assets, 0.0);
    }

    #[test]
    fn test_empty_family_yields_empty_chart() {
        let chart =
            build_wash_trade_chart(&WashTradeFamily::default(), Chain::Bitcoin, TimeFrame::All);
        assert!(chart.data.is_empty());
        assert_eq!(chart.metadata.totals.wallets, 0.0);
    }
}
