use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use config_manager::SystemConfig;
use insights_core::ValidationError;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;
use unleash_client::UnleashClient;

mod handlers;
mod types;

use handlers::*;
use types::ErrorResponse;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: SystemConfig,
    pub unleash: Arc<UnleashClient>,
}

/// Main application error type
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    RateLimited(String),
    #[error("Invalid data structure received from API")]
    DataShape,
    #[error("{context}")]
    Upstream {
        context: String,
        details: String,
        status: Option<u16>,
        params: Option<serde_json::Value>,
    },
}

impl ApiError {
    /// Wrap an upstream client error, echoing its status when it had one.
    pub fn upstream(
        context: &str,
        err: unleash_client::UnleashError,
        params: Option<serde_json::Value>,
    ) -> Self {
        ApiError::Upstream {
            context: context.to_string(),
            details: err.to_string(),
            status: err.status(),
            params,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            // Validation failures echo the allow-list that was violated
            ApiError::Validation(err) => {
                let body = match &err {
                    ValidationError::UnsupportedChain { supported, .. } => serde_json::json!({
                        "error": err.to_string(),
                        "supportedChains": supported,
                    }),
                    ValidationError::UnsupportedTimeFrame { supported, .. } => serde_json::json!({
                        "error": err.to_string(),
                        "supportedTimeframes": supported,
                    }),
                    ValidationError::UnsupportedCombination => serde_json::json!({
                        "error": err.to_string(),
                    }),
                };
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(message)),
            )
                .into_response(),
            ApiError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new(message)),
            )
                .into_response(),
            ApiError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new(message)),
            )
                .into_response(),
            ApiError::RateLimited(message) => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ErrorResponse::new(message)),
            )
                .into_response(),
            ApiError::DataShape => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(
                    "Invalid data structure received from API".to_string(),
                )),
            )
                .into_response(),
            ApiError::Upstream {
                context,
                details,
                status,
                params,
            } => {
                let status = status
                    .and_then(|code| StatusCode::from_u16(code).ok())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let body = ErrorResponse {
                    error: context,
                    details: Some(details),
                    timestamp: Utc::now(),
                    params,
                };
                (status, Json(body)).into_response()
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,api_server=debug".into()),
        )
        .init();

    info!("Starting NFT Insights API Server...");

    // Load configuration
    let config = SystemConfig::load()?;
    info!("Configuration loaded successfully");

    // Initialize the upstream client
    let unleash = Arc::new(UnleashClient::new(config.unleash.clone())?);
    info!("UnleashNFTs client initialized");

    // Create application state
    let app_state = AppState {
        config: config.clone(),
        unleash,
    };

    // Build the application router
    let app = create_router(app_state);

    info!("🎯 API Server ready");
    info!("📋 Available endpoints:");
    info!("   • GET /api/marketinsights?chain&timeFrame - Merged market trend chart");
    info!("   • GET /api/washtrade?chain&timeFrame - Wash trade trend chart");
    info!("   • GET /api/marketplacehealth - Marketplace health scores");
    info!("   • GET /api/walletportfolio?wallet - Wallet NFT portfolio by collection");
    info!("   • GET /api/tokenimage?blockchain&contract_address&token_id&currency - Token image lookup");
    info!("   • GET /api/walletscores?wallet - Wallet score passthrough");
    info!("   • GET /api/marketplacerewards?wallet - Marketplace reward summary");
    info!("   • GET /health - Health check");

    // Bind and serve
    let bind_addr = format!("{}:{}", config.api.host, config.api.port);
    info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Market insight charts
        .route("/api/marketinsights", get(get_market_insights))
        .route("/api/washtrade", get(get_wash_trade))
        // Marketplace analytics
        .route("/api/marketplacehealth", get(get_marketplace_health))
        .route("/api/marketplacerewards", get(get_marketplace_rewards))
        // Wallet analytics
        .route("/api/walletportfolio", get(get_wallet_portfolio))
        .route("/api/walletscores", get(get_wallet_scores))
        // Token lookups
        .route("/api/tokenimage", get(get_token_image))
        // Add CORS middleware
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .into_inner(),
        )
        .with_state(state)
}
