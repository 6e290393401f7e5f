pub mod chains;
pub mod health;
pub mod market;
pub mod portfolio;
pub mod registry;
pub mod washtrade;

pub use chains::{validate_market_query, Chain, TimeFrame, ValidationError};
pub use health::{build_marketplace_health, MarketplaceHealth, RiskLevel};
pub use market::{build_market_chart, normalize_bitcoin_block_dates, MarketChart, MarketSnapshot};
pub use portfolio::{collect_wallet_portfolio, NftBalanceSource, NftHolding, WalletPortfolio};
pub use registry::{
    MediaVerdict, RegistryConflict, SeenMedia, TokenImageRegistry, TokenImageSource,
};
pub use washtrade::{build_wash_trade_chart, WashTradeChart};

use thiserror::Error;

/// Errors surfaced by upstream data sources and reshape logic.
///
/// Source trait implementations map their transport errors onto these
/// variants so the callers (portfolio collector, gallery loader) can decide
/// between retrying, skipping and failing without knowing the transport.
#[derive(Error, Debug)]
pub enum InsightsError {
    #[error("Upstream request failed: {0}")]
    Upstream(String),
    #[error("Upstream resource not found")]
    NotFound,
    #[error("Upstream access forbidden")]
    Forbidden,
    #[error("Rate limit exceeded")]
    RateLimited,
    #[error("Upstream request timed out")]
    Timeout,
    #[error("Invalid data structure received from API: {0}")]
    DataShape(String),
}

pub type Result<T> = std::result::Result<T, InsightsError>;
