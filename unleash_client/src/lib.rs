use async_trait::async_trait;
use config_manager::UnleashConfig;
use insights_core::chains::{Chain, TimeFrame};
use insights_core::health::{MarketplaceTrader, MarketplaceWashTrade};
use insights_core::market::{AnalyticsFamily, HoldersFamily, TradersFamily};
use insights_core::portfolio::{NftBalanceSource, NftHolding};
use insights_core::registry::TokenImageSource;
use insights_core::washtrade::WashTradeFamily;
use insights_core::{normalize_bitcoin_block_dates, InsightsError, MarketSnapshot};
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client, StatusCode,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum UnleashError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("API key invalid or missing")]
    Auth,
    #[error("Upstream resource not found")]
    NotFound,
    #[error("Rate limit exceeded")]
    RateLimit,
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl UnleashError {
    fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => UnleashError::Auth,
            StatusCode::NOT_FOUND => UnleashError::NotFound,
            StatusCode::TOO_MANY_REQUESTS => UnleashError::RateLimit,
            other => UnleashError::Api {
                status: other.as_u16(),
                message: body,
            },
        }
    }

    /// The upstream HTTP status, when one was observed.
    pub fn status(&self) -> Option<u16> {
        match self {
            UnleashError::Auth => Some(401),
            UnleashError::NotFound => Some(404),
            UnleashError::RateLimit => Some(429),
            UnleashError::Api { status, .. } => Some(*status),
            UnleashError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<UnleashError> for InsightsError {
    fn from(err: UnleashError) -> Self {
        match err {
            UnleashError::NotFound => InsightsError::NotFound,
            UnleashError::RateLimit => InsightsError::RateLimited,
            UnleashError::Auth => InsightsError::Forbidden,
            UnleashError::Api { status: 403, .. } => InsightsError::Forbidden,
            UnleashError::Http(e) if e.is_timeout() => InsightsError::Timeout,
            UnleashError::Json(e) => InsightsError::DataShape(e.to_string()),
            UnleashError::InvalidResponse(msg) => InsightsError::DataShape(msg),
            other => InsightsError::Upstream(other.to_string()),
        }
    }
}

/// Standard `{ "data": [...] }` envelope the v2 API wraps list payloads in.
#[derive(Debug, Clone, Deserialize)]
struct DataEnvelope<T> {
    #[serde(default)]
    data: Vec<T>,
}

/// v1 token-by-id payload; only the image matters here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenDetails {
    #[serde(default)]
    pub token_image_url: Option<String>,
}

/// Marketplace reward balances inside the wallet profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketplaceReward {
    #[serde(default)]
    pub blur: Option<f64>,
    #[serde(default)]
    pub looks: Option<f64>,
}

/// One wallet profile record from `/nft/wallet/profile`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletProfile {
    #[serde(default)]
    pub nft_marketplace_reward: Option<MarketplaceReward>,
    #[serde(default)]
    pub collection_count: Option<u64>,
    #[serde(default)]
    pub nft_count: Option<u64>,
    #[serde(default)]
    pub is_shark: Option<bool>,
    #[serde(default)]
    pub is_whale: Option<bool>,
    #[serde(default)]
    pub washtrade_nft_count: Option<u64>,
    #[serde(default)]
    pub aml_is_sanctioned: Option<bool>,
    #[serde(default)]
    pub aml_risk_level: Option<String>,
    #[serde(default)]
    pub is_custodial: Option<bool>,
    #[serde(default)]
    pub is_contract: Option<bool>,
}

/// Query parameters forwarded verbatim to `/nft/wallet/scores`.
#[derive(Debug, Clone)]
pub struct WalletScoresParams {
    pub wallet: String,
    pub blockchain: String,
    pub sort_by: String,
    pub sort_order: String,
    pub time_range: String,
    pub offset: u32,
    pub limit: u32,
}

impl WalletScoresParams {
    pub fn for_wallet(wallet: impl Into<String>) -> Self {
        Self {
            wallet: wallet.into(),
            blockchain: "ethereum".to_string(),
            sort_by: "portfolio_value".to_string(),
            sort_order: "desc".to_string(),
            time_range: "all".to_string(),
            offset: 0,
            limit: 30,
        }
    }
}

/// Records the marketplace pagination helper can de-duplicate.
pub trait MarketplaceRecord {
    fn entity_id(&self) -> &str;
}

impl MarketplaceRecord for MarketplaceTrader {
    fn entity_id(&self) -> &str {
        &self.id
    }
}

impl MarketplaceRecord for MarketplaceWashTrade {
    fn entity_id(&self) -> &str {
        &self.id
    }
}

/// Fetch marketplace pages until a short page, merging and de-duplicating
/// by entity id. A failed page logs and returns what was accumulated so
/// far instead of propagating.
pub(crate) async fn drain_marketplace_pages<T, F, Fut>(mut fetch_page: F, batch_size: u32) -> Vec<T>
where
    T: MarketplaceRecord,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>, UnleashError>>,
{
    let mut accumulated: Vec<T> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut offset = 0u32;

    loop {
        match fetch_page(offset).await {
            Ok(page) => {
                let page_len = page.len();
                for record in page {
                    if seen.insert(record.entity_id().to_string()) {
                        accumulated.push(record);
                    }
                }
                debug!(
                    "📄 Marketplace page at offset {}: {} records ({} unique total)",
                    offset,
                    page_len,
                    accumulated.len()
                );

                if (page_len as u32) < batch_size {
                    break;
                }
                offset += batch_size;
            }
            Err(e) => {
                error!(
                    "❌ Marketplace page fetch failed at offset {}: {} - returning {} records accumulated so far",
                    offset,
                    e,
                    accumulated.len()
                );
                break;
            }
        }
    }

    accumulated
}

/// Client for the UnleashNFTs REST API (v1 + v2), authenticated with the
/// x-api-key header on every request.
#[derive(Clone)]
pub struct UnleashClient {
    client: Client,
    config: UnleashConfig,
}

impl UnleashClient {
    pub fn new(config: UnleashConfig) -> Result<Self, UnleashError> {
        let mut headers = HeaderMap::new();
        headers.insert("accept", HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            config
                .api_key
                .parse()
                .map_err(|e| UnleashError::Config(format!("Invalid API key header: {}", e)))?,
        );

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_seconds))
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &UnleashConfig {
        &self.config
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, UnleashError> {
        debug!("🌐 GET {}", url);
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("❌ UnleashNFTs API error {} at {}: {}", status, url, body);
            return Err(UnleashError::from_status(status, body));
        }

        let body = response.text().await?;
        match serde_json::from_str(&body) {
            Ok(value) => Ok(value),
            Err(e) => {
                error!(
                    "❌ JSON parsing failed for {}: {} - snippet: {}",
                    url,
                    e,
                    &body.chars().take(500).collect::<String>()
                );
                Err(UnleashError::Json(e))
            }
        }
    }

    /// One market-insights family; the payload of interest is `data[0]`.
    async fn fetch_family<T: DeserializeOwned>(
        &self,
        family: &str,
        chain: Chain,
        time_frame: TimeFrame,
    ) -> Result<T, UnleashError> {
        let url = format!(
            "{}/nft/market-insights/{}?blockchain={}&time_range={}",
            self.config.api_base_url_v2, family, chain, time_frame
        );
        let envelope: DataEnvelope<T> = self.get_json(&url).await?;
        envelope.data.into_iter().next().ok_or_else(|| {
            UnleashError::InvalidResponse(format!(
                "empty data array from market-insights/{} for {}/{}",
                family, chain, time_frame
            ))
        })
    }

    /// The three market families for one (chain, timeFrame), fetched
    /// concurrently; any single failure fails the snapshot. Bitcoin block
    /// dates are normalized onto the other chains' granularity.
    pub async fn fetch_market_snapshot(
        &self,
        chain: Chain,
        time_frame: TimeFrame,
    ) -> Result<MarketSnapshot, UnleashError> {
        info!("Fetching market snapshot for {}/{}", chain, time_frame);

        let (analytics, holders, traders) = tokio::try_join!(
            self.fetch_family::<AnalyticsFamily>("analytics", chain, time_frame),
            self.fetch_family::<HoldersFamily>("holders", chain, time_frame),
            self.fetch_family::<TradersFamily>("traders", chain, time_frame),
        )?;

        let mut snapshot = MarketSnapshot {
            analytics,
            holders,
            traders,
        };

        if chain == Chain::Bitcoin {
            normalize_bitcoin_block_dates(&mut snapshot.analytics.block_dates, time_frame);
            normalize_bitcoin_block_dates(&mut snapshot.holders.block_dates, time_frame);
            normalize_bitcoin_block_dates(&mut snapshot.traders.block_dates, time_frame);
        }

        Ok(snapshot)
    }

    /// The wash-trade family for one (chain, timeFrame).
    pub async fn fetch_wash_trade_family(
        &self,
        chain: Chain,
        time_frame: TimeFrame,
    ) -> Result<WashTradeFamily, UnleashError> {
        self.fetch_family("washtrade", chain, time_frame).await
    }

    fn marketplace_url(&self, dataset: &str, offset: u32) -> String {
        format!(
            "{}/nft/marketplace/{}?blockchain={}&time_range=all&sort_by=name&sort_order=desc&offset={}&limit={}",
            self.config.api_base_url_v2,
            dataset,
            self.config.default_blockchain,
            offset,
            self.config.marketplace_batch_size
        )
    }

    /// All marketplace trader rankings, de-duplicated across pages.
    pub async fn fetch_marketplace_traders(&self) -> Vec<MarketplaceTrader> {
        let batch = self.config.marketplace_batch_size;
        drain_marketplace_pages(
            |offset| async move {
                let url = self.marketplace_url("traders", offset);
                let envelope: DataEnvelope<MarketplaceTrader> = self.get_json(&url).await?;
                Ok(envelope.data)
            },
            batch,
        )
        .await
    }

    /// All marketplace wash-trade rankings, de-duplicated across pages.
    pub async fn fetch_marketplace_wash_trades(&self) -> Vec<MarketplaceWashTrade> {
        let batch = self.config.marketplace_batch_size;
        drain_marketplace_pages(
            |offset| async move {
                let url = self.marketplace_url("washtrade", offset);
                let envelope: DataEnvelope<MarketplaceWashTrade> = self.get_json(&url).await?;
                Ok(envelope.data)
            },
            batch,
        )
        .await
    }

    /// One page of a wallet's NFT balances.
    pub async fn fetch_wallet_balance_page(
        &self,
        wallet: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<NftHolding>, UnleashError> {
        let url = format!(
            "{}/wallet/balance/nft?wallet={}&blockchain={}&time_range=all&sort_by=volume&offset={}&limit={}",
            self.config.api_base_url_v2, wallet, self.config.default_blockchain, offset, limit
        );
        let envelope: DataEnvelope<NftHolding> = self.get_json(&url).await?;
        Ok(envelope.data)
    }

    /// Wallet scores passthrough; the upstream body is returned verbatim.
    pub async fn fetch_wallet_scores(
        &self,
        params: &WalletScoresParams,
    ) -> Result<serde_json::Value, UnleashError> {
        let url = format!(
            "{}/nft/wallet/scores?wallet={}&blockchain={}&sort_by={}&sort_order={}&time_range={}&offset={}&limit={}",
            self.config.api_base_url_v2,
            params.wallet,
            params.blockchain,
            params.sort_by,
            params.sort_order,
            params.time_range,
            params.offset,
            params.limit
        );
        self.get_json(&url).await
    }

    /// First profile record for a wallet; feeds the marketplace rewards
    /// reshape.
    pub async fn fetch_wallet_profile(&self, wallet: &str) -> Result<WalletProfile, UnleashError> {
        let url = format!(
            "{}/nft/wallet/profile?wallet={}&offset=0&limit=30",
            self.config.api_base_url_v2, wallet
        );
        let envelope: DataEnvelope<WalletProfile> = self.get_json(&url).await?;
        envelope.data.into_iter().next().ok_or_else(|| {
            UnleashError::InvalidResponse(format!("empty profile data for wallet {}", wallet))
        })
    }

    /// v1 token-by-id details, used for image lookups.
    pub async fn fetch_token_details(
        &self,
        blockchain: &str,
        contract_address: &str,
        token_id: &str,
        currency: &str,
    ) -> Result<TokenDetails, UnleashError> {
        let url = format!(
            "{}/nft/{}/{}/{}?currency={}&include_washtrade=true",
            self.config.api_base_url_v1, blockchain, contract_address, token_id, currency
        );
        self.get_json(&url).await
    }
}

#[async_trait]
impl NftBalanceSource for UnleashClient {
    async fn fetch_nft_page(
        &self,
        wallet: &str,
        offset: u32,
        limit: u32,
    ) -> insights_core::Result<Vec<NftHolding>> {
        self.fetch_wallet_balance_page(wallet, offset, limit)
            .await
            .map_err(InsightsError::from)
    }
}

#[async_trait]
impl TokenImageSource for UnleashClient {
    async fn fetch_token_image(
        &self,
        blockchain: &str,
        contract_address: &str,
        token_id: &str,
    ) -> insights_core::Result<Option<String>> {
        let details = self
            .fetch_token_details(blockchain, contract_address, token_id, "usd")
            .await
            .map_err(InsightsError::from)?;

        if details.token_image_url.is_none() {
            warn!(
                "Token {}/{} has no image URL in upstream payload",
                contract_address, token_id
            );
        }
        Ok(details.token_image_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn test_config() -> UnleashConfig {
        UnleashConfig {
            api_key: "test_key".to_string(),
            api_base_url_v2: "https://api.unleashnfts.com/api/v2".to_string(),
            api_base_url_v1: "https://api.unleashnfts.com/api/v1".to_string(),
            request_timeout_seconds: 30,
            marketplace_batch_size: 30,
            wallet_page_size: 100,
            max_wallet_pages: 50,
            default_blockchain: "ethereum".to_string(),
        }
    }

    #[test]
    fn test_client_creation() {
        assert!(UnleashClient::new(test_config()).is_ok());
    }

    #[test]
    fn test_market_insights_envelope_parsing() {
        let json = r#"{
            "data": [{
                "block_dates": ["2024-01-01T00:00:00Z", "2024-01-01T01:00:00Z"],
                "volume_trend": [123.4, null],
                "sales_trend": [5, 7],
                "volume": 128500.75,
                "volume_change": -0.12
            }]
        }"#;
        let envelope: DataEnvelope<AnalyticsFamily> = serde_json::from_str(json).unwrap();
        let analytics = envelope.data.into_iter().next().unwrap();
        assert_eq!(analytics.block_dates.len(), 2);
        assert_eq!(analytics.volume_trend[0], Some(123.4));
        assert_eq!(analytics.volume_trend[1], None);
        assert_eq!(analytics.volume, Some(128500.75));
        assert_eq!(analytics.transactions, None);
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            UnleashError::from_status(StatusCode::UNAUTHORIZED, String::new()),
            UnleashError::Auth
        ));
        assert!(matches!(
            UnleashError::from_status(StatusCode::NOT_FOUND, String::new()),
            UnleashError::NotFound
        ));
        assert!(matches!(
            UnleashError::from_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            UnleashError::RateLimit
        ));
        let err = UnleashError::from_status(StatusCode::BAD_GATEWAY, "oops".to_string());
        assert_eq!(err.status(), Some(502));
    }

    #[test]
    fn test_error_conversion_to_core() {
        assert!(matches!(
            InsightsError::from(UnleashError::NotFound),
            InsightsError::NotFound
        ));
        assert!(matches!(
            InsightsError::from(UnleashError::RateLimit),
            InsightsError::RateLimited
        ));
        assert!(matches!(
            InsightsError::from(UnleashError::Api {
                status: 403,
                message: String::new()
            }),
            InsightsError::Forbidden
        ));
        assert!(matches!(
            InsightsError::from(UnleashError::InvalidResponse("x".to_string())),
            InsightsError::DataShape(_)
        ));
    }

    fn trader(id: &str) -> MarketplaceTrader {
        MarketplaceTrader {
            id: id.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_drain_pages_until_short_page() {
        let calls = Mutex::new(Vec::new());
        let records = drain_marketplace_pages(
            |offset| {
                calls.lock().unwrap().push(offset);
                async move {
                    Ok(match offset {
                        0 => (0..30).map(|i| trader(&format!("m{}", i))).collect(),
                        30 => (30..42).map(|i| trader(&format!("m{}", i))).collect(),
                        _ => Vec::new(),
                    })
                }
            },
            30,
        )
        .await;

        assert_eq!(records.len(), 42);
        // short second page halts the loop; no third request
        assert_eq!(*calls.lock().unwrap(), vec![0, 30]);
    }

    #[tokio::test]
    async fn test_drain_pages_deduplicates_by_id() {
        let records = drain_marketplace_pages(
            |offset| async move {
                Ok(match offset {
                    0 => vec![trader("a"), trader("b"), trader("c")],
                    _ => Vec::new(),
                })
            },
            3,
        )
        .await;
        assert_eq!(records.len(), 3);

        let records = drain_marketplace_pages(
            |offset| async move {
                Ok(match offset {
                    0 => vec![trader("a"), trader("b"), trader("c")],
                    3 => vec![trader("b"), trader("d")],
                    _ => Vec::new(),
                })
            },
            3,
        )
        .await;
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_drain_pages_returns_partial_on_failure() {
        let records = drain_marketplace_pages(
            |offset| async move {
                match offset {
                    0 => Ok((0..30).map(|i| trader(&format!("m{}", i))).collect()),
                    _ => Err(UnleashError::Api {
                        status: 502,
                        message: "bad gateway".to_string(),
                    }),
                }
            },
            30,
        )
        .await;

        // the failed page is swallowed; the first page survives
        assert_eq!(records.len(), 30);
    }

    #[tokio::test]
    #[ignore] // Run manually with: cargo test test_live_market_snapshot -- --ignored
    async fn test_live_market_snapshot() {
        let mut config = test_config();
        config.api_key = std::env::var("NFT_INSIGHTS__UNLEASH__API_KEY").unwrap_or_default();
        let client = UnleashClient::new(config).unwrap();

        let snapshot = client
            .fetch_market_snapshot(Chain::Polygon, TimeFrame::Day)
            .await;
        match snapshot {
            Ok(s) => {
                println!(
                    "analytics: {} dates, holders: {} points, traders: {} points",
                    s.analytics.block_dates.len(),
                    s.holders.holders_trend.len(),
                    s.traders.traders_trend.len()
                );
            }
            Err(e) => panic!("live snapshot failed: {:?}", e),
        }
    }
}
