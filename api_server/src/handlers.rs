use crate::types::*;
use crate::{ApiError, AppState};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use insights_core::{
    build_market_chart, build_marketplace_health, build_wash_trade_chart,
    collect_wallet_portfolio, validate_market_query, InsightsError,
};
use serde_json::json;
use tracing::{error, info};
use unleash_client::{UnleashError, WalletScoresParams};

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Merged market trend chart for one (chain, timeFrame) pair
pub async fn get_market_insights(
    State(state): State<AppState>,
    Query(query): Query<MarketQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (chain, time_frame) =
        validate_market_query(query.chain.as_deref(), query.time_frame.as_deref())?;

    info!("Fetching market data for: {}/{}", chain, time_frame);

    let snapshot = state
        .unleash
        .fetch_market_snapshot(chain, time_frame)
        .await
        .map_err(|e| {
            ApiError::upstream(
                "Failed to fetch market data",
                e,
                Some(json!({ "timeFrame": time_frame.as_str(), "chain": chain.as_str() })),
            )
        })?;

    if !snapshot.has_expected_shape() {
        error!(
            "Invalid market data structure received for {}/{}",
            chain, time_frame
        );
        return Err(ApiError::DataShape);
    }

    Ok(Json(build_market_chart(&snapshot, chain, time_frame)))
}

/// Wash trade trend chart for one (chain, timeFrame) pair
pub async fn get_wash_trade(
    State(state): State<AppState>,
    Query(query): Query<MarketQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (chain, time_frame) =
        validate_market_query(query.chain.as_deref(), query.time_frame.as_deref())?;

    let family = state
        .unleash
        .fetch_wash_trade_family(chain, time_frame)
        .await
        .map_err(|e| ApiError::upstream("Failed to fetch wash trade data", e, None))?;

    if family.block_dates.is_empty() {
        error!(
            "Invalid wash trade data structure received for {}/{}",
            chain, time_frame
        );
        return Err(ApiError::DataShape);
    }

    Ok(Json(build_wash_trade_chart(&family, chain, time_frame)))
}

/// Marketplace health scores, joined from the traders and wash-trade
/// rankings. Each dataset is already partial-tolerant; only both being
/// empty is an error.
pub async fn get_marketplace_health(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let (traders, wash_trades) = tokio::join!(
        state.unleash.fetch_marketplace_traders(),
        state.unleash.fetch_marketplace_wash_trades(),
    );

    if traders.is_empty() && wash_trades.is_empty() {
        return Err(ApiError::NotFound("No data available".to_string()));
    }

    Ok(Json(build_marketplace_health(&traders, &wash_trades)))
}

/// A wallet's NFT holdings grouped by collection
pub async fn get_wallet_portfolio(
    State(state): State<AppState>,
    Query(query): Query<WalletQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let wallet = query
        .wallet
        .filter(|w| !w.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Wallet address is required".to_string()))?;

    let unleash_config = &state.config.unleash;
    let portfolio = collect_wallet_portfolio(
        state.unleash.as_ref(),
        &wallet,
        unleash_config.wallet_page_size,
        unleash_config.max_wallet_pages,
    )
    .await
    .map_err(|e| ApiError::Upstream {
        context: "Failed to fetch data from API".to_string(),
        details: e.to_string(),
        status: insights_status(&e),
        params: None,
    })?;

    Ok(Json(portfolio))
}

/// Token image lookup through the v1 token-by-id endpoint
pub async fn get_token_image(
    State(state): State<AppState>,
    Query(query): Query<TokenImageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let blockchain = require_param(query.blockchain, "blockchain")?;
    let contract_address = require_param(query.contract_address, "contract_address")?;
    let token_id = require_param(query.token_id, "token_id")?;
    let currency = query.currency.unwrap_or_else(|| "usd".to_string());

    let details = state
        .unleash
        .fetch_token_details(&blockchain, &contract_address, &token_id, &currency)
        .await
        .map_err(|e| ApiError::upstream("Failed to fetch NFT data", e, None))?;

    Ok(Json(TokenImageResponse {
        image_url: details.token_image_url,
    }))
}

/// Wallet scores passthrough with upstream status codes preserved
pub async fn get_wallet_scores(
    State(state): State<AppState>,
    Query(query): Query<WalletScoresQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let wallet = query
        .wallet
        .filter(|w| !w.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing required parameter: wallet".to_string()))?;

    let mut params = WalletScoresParams::for_wallet(wallet);
    if let Some(blockchain) = query.blockchain {
        params.blockchain = blockchain;
    }
    if let Some(sort_by) = query.sort_by {
        params.sort_by = sort_by;
    }
    if let Some(sort_order) = query.sort_order {
        params.sort_order = sort_order;
    }
    if let Some(time_range) = query.time_range {
        params.time_range = time_range;
    }
    if let Some(offset) = query.offset {
        params.offset = offset;
    }
    if let Some(limit) = query.limit {
        params.limit = limit;
    }

    match state.unleash.fetch_wallet_scores(&params).await {
        Ok(payload) => Ok(Json(payload)),
        Err(UnleashError::NotFound) => Err(ApiError::NotFound("Wallet data not found".to_string())),
        Err(UnleashError::RateLimit) => {
            Err(ApiError::RateLimited("Rate limit exceeded".to_string()))
        }
        Err(UnleashError::Auth) => {
            Err(ApiError::Unauthorized("API key invalid or missing".to_string()))
        }
        Err(e) => Err(ApiError::upstream("Failed to fetch wallet scores", e, None)),
    }
}

/// Marketplace reward summary for a wallet.
///
/// Degrades on upstream failure: serves the zeroed default shape with the
/// error echoed inside, never a bare error body.
pub async fn get_marketplace_rewards(
    State(state): State<AppState>,
    Query(query): Query<WalletQuery>,
) -> Response {
    let Some(wallet) = query.wallet.filter(|w| !w.is_empty()) else {
        return ApiError::BadRequest("Wallet address is required".to_string()).into_response();
    };

    match state.unleash.fetch_wallet_profile(&wallet).await {
        Ok(profile) => Json(RewardsResponse::from(profile)).into_response(),
        Err(e) => {
            error!("Marketplace rewards API error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RewardsResponse::degraded(
                    "Failed to fetch marketplace rewards".to_string(),
                    e.to_string(),
                )),
            )
                .into_response()
        }
    }
}

fn require_param(value: Option<String>, name: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("Missing required parameter: {}", name)))
}

fn insights_status(error: &InsightsError) -> Option<u16> {
    match error {
        InsightsError::NotFound => Some(404),
        InsightsError::Forbidden => Some(403),
        InsightsError::RateLimited => Some(429),
        _ => None,
    }
}
