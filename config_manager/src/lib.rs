use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Configuration loading error: {0}")]
    ConfigLoad(#[from] ConfigError),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// General system settings
    pub system: SystemSettings,

    /// UnleashNFTs API configuration (the single upstream data source)
    pub unleash: UnleashConfig,

    /// Collection gallery loader configuration
    pub gallery: GalleryConfig,

    /// API server configuration
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSettings {
    /// Enable debug mode
    pub debug_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnleashConfig {
    /// UnleashNFTs API key, sent as the x-api-key header
    pub api_key: String,

    /// Base URL for the v2 API (market insights, marketplace, wallet)
    pub api_base_url_v2: String,

    /// Base URL for the v1 API (token-by-id lookups)
    pub api_base_url_v1: String,

    /// Request timeout in seconds
    pub request_timeout_seconds: u64,

    /// Page size for marketplace ranking requests
    pub marketplace_batch_size: u32,

    /// Page size for wallet NFT balance requests
    pub wallet_page_size: u32,

    /// Ceiling on wallet balance pages fetched per request
    pub max_wallet_pages: u32,

    /// Blockchain used for marketplace and wallet balance queries
    pub default_blockchain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryConfig {
    /// Number of token images loaded per batch
    pub batch_size: usize,

    /// Timeout for a single token-image lookup in seconds
    pub image_timeout_seconds: u64,

    /// Maximum retry attempts for a failed token-image lookup
    pub max_retries: u32,

    /// Base delay for the linearly increasing retry backoff, in milliseconds
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API server host
    pub host: String,

    /// API server port
    pub port: u16,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            system: SystemSettings { debug_mode: false },
            unleash: UnleashConfig {
                api_key: "".to_string(), // Must be set in config file or environment
                api_base_url_v2: "https://api.unleashnfts.com/api/v2".to_string(),
                api_base_url_v1: "https://api.unleashnfts.com/api/v1".to_string(),
                request_timeout_seconds: 30,
                marketplace_batch_size: 30,
                wallet_page_size: 100,
                max_wallet_pages: 50,
                default_blockchain: "ethereum".to_string(),
            },
            gallery: GalleryConfig {
                batch_size: 8,
                image_timeout_seconds: 10,
                max_retries: 3,
                retry_base_delay_ms: 400,
            },
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
        }
    }
}

impl UnleashConfig {
    /// Validate UnleashNFTs configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(ConfigurationError::InvalidValue(
                "UnleashNFTs API key is required".to_string(),
            ));
        }

        if self.request_timeout_seconds == 0 {
            return Err(ConfigurationError::InvalidValue(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if self.marketplace_batch_size == 0 || self.wallet_page_size == 0 {
            return Err(ConfigurationError::InvalidValue(
                "Page sizes must be greater than 0".to_string(),
            ));
        }

        if self.max_wallet_pages == 0 {
            return Err(ConfigurationError::InvalidValue(
                "max_wallet_pages must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl GalleryConfig {
    /// Validate gallery loader configuration
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ConfigurationError::InvalidValue(
                "Gallery batch size must be greater than 0".to_string(),
            ));
        }

        if self.image_timeout_seconds == 0 {
            return Err(ConfigurationError::InvalidValue(
                "Image timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl SystemConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config_builder = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&SystemConfig::default())?);

        // Add config file if it exists
        if config_path.as_ref().exists() {
            info!(
                "Loading configuration from: {}",
                config_path.as_ref().display()
            );
            config_builder = config_builder.add_source(File::from(config_path.as_ref()));
        } else {
            debug!("Config file not found, using defaults and environment variables");
        }

        // Add environment variables with prefix
        config_builder = config_builder.add_source(
            Environment::with_prefix("NFT_INSIGHTS")
                .try_parsing(true)
                .separator("__"),
        );

        let config = config_builder.build()?;
        let system_config: SystemConfig = config.try_deserialize()?;

        if system_config.unleash.api_key.is_empty() {
            warn!("No UnleashNFTs API key configured; upstream requests will be rejected");
        }

        system_config.validate()?;

        Ok(system_config)
    }

    /// Validate configuration values
    ///
    /// The API key is only warned about at load time so offline tooling can
    /// still construct a config; request paths fail with an auth error instead.
    pub fn validate(&self) -> Result<()> {
        self.gallery.validate()?;

        if self.api.port == 0 {
            return Err(ConfigurationError::InvalidValue(
                "API port cannot be 0".to_string(),
            ));
        }

        if self.unleash.request_timeout_seconds == 0 {
            return Err(ConfigurationError::InvalidValue(
                "Upstream request timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get configuration as a JSON value for API responses
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = SystemConfig::default();
        // Default config has no API key but everything else is usable
        assert!(config.validate().is_ok());
        assert_eq!(config.unleash.wallet_page_size, 100);
        assert_eq!(config.unleash.marketplace_batch_size, 30);
        assert_eq!(config.gallery.max_retries, 3);
    }

    #[test]
    fn test_unleash_validation_rejects_empty_key() {
        let config = SystemConfig::default();
        let err = config.unleash.validate().unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidValue(_)));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = SystemConfig::default();
        config.gallery.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = SystemConfig::load_from_path("definitely_not_here.toml").unwrap();
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.unleash.default_blockchain, "ethereum");
    }
}
