use crate::chains::{Chain, TimeFrame};
use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One metric family from `/nft/market-insights/analytics`.
///
/// Trend arrays are index-aligned with `block_dates`; the upstream pads
/// them irregularly and may emit nulls, so every slot is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsFamily {
    #[serde(default)]
    pub block_dates: Vec<String>,
    #[serde(default)]
    pub volume_trend: Vec<Option<f64>>,
    #[serde(default)]
    pub sales_trend: Vec<Option<f64>>,
    #[serde(default)]
    pub transactions_trend: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub sales: Option<f64>,
    #[serde(default)]
    pub transactions: Option<f64>,
    #[serde(default)]
    pub volume_change: Option<f64>,
    #[serde(default)]
    pub sales_change: Option<f64>,
    #[serde(default)]
    pub transactions_change: Option<f64>,
}

/// One metric family from `/nft/market-insights/holders`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HoldersFamily {
    #[serde(default)]
    pub block_dates: Vec<String>,
    #[serde(default)]
    pub holders_trend: Vec<Option<f64>>,
    #[serde(default)]
    pub holders: Option<f64>,
    #[serde(default)]
    pub holders_change: Option<f64>,
}

/// One metric family from `/nft/market-insights/traders`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradersFamily {
    #[serde(default)]
    pub block_dates: Vec<String>,
    #[serde(default)]
    pub traders_trend: Vec<Option<f64>>,
    #[serde(default)]
    pub traders_buyers_trend: Vec<Option<f64>>,
    #[serde(default)]
    pub traders_sellers_trend: Vec<Option<f64>>,
    #[serde(default)]
    pub traders: Option<f64>,
    #[serde(default)]
    pub traders_change: Option<f64>,
}

/// The three families fetched together for one (chain, timeFrame) pair.
///
/// Index i refers to the same point in time across all three families.
/// That alignment comes from the upstream and is assumed, not verified;
/// the merger zero-fills any family that runs short.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub analytics: AnalyticsFamily,
    pub holders: HoldersFamily,
    pub traders: TradersFamily,
}

impl MarketSnapshot {
    /// True when any of the structural arrays the merger relies on is missing.
    pub fn has_expected_shape(&self) -> bool {
        !self.analytics.block_dates.is_empty()
            && !self.holders.holders_trend.is_empty()
            && !self.traders.traders_trend.is_empty()
    }
}

/// One merged per-timestamp record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPoint {
    pub date: String,
    pub volume_trend: f64,
    pub sales_trend: f64,
    pub transactions_trend: f64,
    pub holders_trend: f64,
    pub traders_trend: f64,
    pub traders_buyers_trend: f64,
    pub traders_sellers_trend: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketTotals {
    pub volume: f64,
    pub sales: f64,
    pub transactions: f64,
    pub holders: f64,
    pub traders: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketChanges {
    pub volume_change: f64,
    pub sales_change: f64,
    pub transactions_change: f64,
    pub holders_change: f64,
    pub traders_change: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketChartMetadata {
    #[serde(rename = "timeFrame")]
    pub time_frame: String,
    pub chain: String,
    pub totals: MarketTotals,
    pub changes: MarketChanges,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketChart {
    pub data: Vec<MarketPoint>,
    pub metadata: MarketChartMetadata,
}

fn trend_at(trend: &[Option<f64>], index: usize) -> f64 {
    trend.get(index).copied().flatten().unwrap_or(0.0)
}

/// Merge the three families into one chart.
///
/// Output length always equals the analytics timestamp count; families
/// shorter than that contribute zeros for the missing indices.
pub fn build_market_chart(
    snapshot: &MarketSnapshot,
    chain: Chain,
    time_frame: TimeFrame,
) -> MarketChart {
    let analytics = &snapshot.analytics;
    let holders = &snapshot.holders;
    let traders = &snapshot.traders;

    let data: Vec<MarketPoint> = analytics
        .block_dates
        .iter()
        .enumerate()
        .map(|(i, date)| MarketPoint {
            date: date.clone(),
            volume_trend: trend_at(&analytics.volume_trend, i),
            sales_trend: trend_at(&analytics.sales_trend, i),
            transactions_trend: trend_at(&analytics.transactions_trend, i),
            holders_trend: trend_at(&holders.holders_trend, i),
            traders_trend: trend_at(&traders.traders_trend, i),
            traders_buyers_trend: trend_at(&traders.traders_buyers_trend, i),
            traders_sellers_trend: trend_at(&traders.traders_sellers_trend, i),
        })
        .collect();

    debug!(
        "Merged market chart for {}/{}: {} points",
        chain,
        time_frame,
        data.len()
    );

    MarketChart {
        data,
        metadata: MarketChartMetadata {
            time_frame: time_frame.as_str().to_string(),
            chain: chain.as_str().to_string(),
            totals: MarketTotals {
                volume: analytics.volume.unwrap_or(0.0),
                sales: analytics.sales.unwrap_or(0.0),
                transactions: analytics.transactions.unwrap_or(0.0),
                holders: holders.holders.unwrap_or(0.0),
                traders: traders.traders.unwrap_or(0.0),
            },
            changes: MarketChanges {
                volume_change: analytics.volume_change.unwrap_or(0.0),
                sales_change: analytics.sales_change.unwrap_or(0.0),
                transactions_change: analytics.transactions_change.unwrap_or(0.0),
                holders_change: holders.holders_change.unwrap_or(0.0),
                traders_change: traders.traders_change.unwrap_or(0.0),
            },
        },
    }
}

/// Rewrite Bitcoin block dates onto the granularity the other chains use.
///
/// Bitcoin block timestamps land at arbitrary minutes; for the 24h range
/// they are floored to the hour so the chart buckets line up. Every entry
/// is re-emitted as RFC 3339 UTC. Unparseable entries are left untouched.
pub fn normalize_bitcoin_block_dates(dates: &mut [String], time_frame: TimeFrame) {
    for date in dates.iter_mut() {
        let parsed = match DateTime::parse_from_rfc3339(date) {
            Ok(ts) => ts.with_timezone(&Utc),
            Err(e) => {
                warn!("Skipping unparseable bitcoin block date '{}': {}", date, e);
                continue;
            }
        };

        let normalized: DateTime<Utc> = if time_frame == TimeFrame::Day {
            parsed
                .with_minute(0)
                .and_then(|ts| ts.with_second(0))
                .and_then(|ts| ts.with_nanosecond(0))
                .unwrap_or(parsed)
        } else {
            parsed
        };

        *date = normalized.to_rfc3339_opts(SecondsFormat::Secs, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(n: usize) -> MarketSnapshot {
        let dates: Vec<String> = (0..n).map(|i| format!("2024-01-01T{:02}:00:00Z", i)).collect();
        MarketSnapshot {
            analytics: AnalyticsFamily {
                block_dates: dates.clone(),
                volume_trend: (0..n).map(|i| Some(i as f64 * 10.0)).collect(),
                sales_trend: (0..n).map(|i| Some(i as f64)).collect(),
                transactions_trend: (0..n).map(|i| Some(i as f64 * 2.0)).collect(),
                volume: Some(1000.0),
                sales: Some(50.0),
                transactions: Some(80.0),
                volume_change: Some(0.1),
                sales_change: Some(-0.2),
                transactions_change: Some(0.0),
            },
            holders: HoldersFamily {
                block_dates: dates.clone(),
                holders_trend: (0..n).map(|i| Some(i as f64 * 3.0)).collect(),
                holders: Some(700.0),
                holders_change: Some(0.05),
            },
            traders: TradersFamily {
                block_dates: dates,
                traders_trend: (0..n).map(|i| Some(i as f64 * 4.0)).collect(),
                traders_buyers_trend: (0..n).map(|i| Some(i as f64 * 5.0)).collect(),
                traders_sellers_trend: (0..n).map(|i| Some(i as f64 * 6.0)).collect(),
                traders: Some(300.0),
                traders_change: Some(-0.01),
            },
        }
    }

    #[test]
    fn test_equal_length_families_merge_index_aligned() {
        let chart = build_market_chart(&snapshot(4), Chain::Polygon, TimeFrame::Week);
        assert_eq!(chart.data.len(), 4);
        let p = &chart.data[2];
        assert_eq!(p.volume_trend, 20.0);
        assert_eq!(p.holders_trend, 6.0);
        assert_eq!(p.traders_sellers_trend, 12.0);
        assert_eq!(chart.metadata.totals.volume, 1000.0);
        assert_eq!(chart.metadata.changes.sales_change, -0.2);
        assert_eq!(chart.metadata.chain, "polygon");
        assert_eq!(chart.metadata.time_frame, "7d");
    }

    #[test]
    fn test_short_families_zero_fill_without_panicking() {
        let mut snap = snapshot(5);
        snap.holders.holders_trend.truncate(2);
        snap.traders.traders_trend.clear();
        snap.analytics.volume_trend[3] = None;

        let chart = build_market_chart(&snap, Chain::Ethereum, TimeFrame::Day);
        assert_eq!(chart.data.len(), 5);
        assert_eq!(chart.data[1].holders_trend, 3.0);
        assert_eq!(chart.data[4].holders_trend, 0.0);
        assert_eq!(chart.data[0].traders_trend, 0.0);
        assert_eq!(chart.data[3].volume_trend, 0.0);
    }

    #[test]
    fn test_missing_totals_default_to_zero() {
        let mut snap = snapshot(1);
        snap.analytics.volume = None;
        snap.holders.holders_change = None;
        let chart = build_market_chart(&snap, Chain::Solana, TimeFrame::Month);
        assert_eq!(chart.metadata.totals.volume, 0.0);
        assert_eq!(chart.metadata.changes.holders_change, 0.0);
    }

    #[test]
    fn test_bitcoin_24h_floors_to_hour() {
        let mut dates = vec!["2024-01-01T13:47:22Z".to_string()];
        normalize_bitcoin_block_dates(&mut dates, TimeFrame::Day);
        assert_eq!(dates[0], "2024-01-01T13:00:00Z");
    }

    #[test]
    fn test_bitcoin_7d_keeps_minutes() {
        let mut dates = vec!["2024-01-01T13:47:22Z".to_string()];
        normalize_bitcoin_block_dates(&mut dates, TimeFrame::Week);
        assert_eq!(dates[0], "2024-01-01T13:47:22Z");
    }

    #[test]
    fn test_unparseable_dates_left_alone() {
        let mut dates = vec!["not-a-date".to_string(), "2024-03-05T09:30:00Z".to_string()];
        normalize_bitcoin_block_dates(&mut dates, TimeFrame::Day);
        assert_eq!(dates[0], "not-a-date");
        assert_eq!(dates[1], "2024-03-05T09:00:00Z");
    }

    #[test]
    fn test_shape_check() {
        assert!(snapshot(3).has_expected_shape());
        let mut snap = snapshot(3);
        snap.holders.holders_trend.clear();
        assert!(!snap.has_expected_shape());
    }
}
