use anyhow::Result;
use config_manager::SystemConfig;
use gallery_loader::{CollectionGalleryLoader, LoadOutcome};
use insights_core::collect_wallet_portfolio;
use tracing::{info, Level};
use unleash_client::UnleashClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    info!("🔧 Testing wallet portfolio + gallery pipeline");

    let config = SystemConfig::load()?;
    let client = UnleashClient::new(config.unleash.clone())?;

    let wallet = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "0x7c1958Ba95AB3170f6069DADF4de304B0c00000C".to_string());

    info!("🚀 Fetching portfolio for {}", wallet);
    let portfolio = collect_wallet_portfolio(
        &client,
        &wallet,
        config.unleash.wallet_page_size,
        config.unleash.max_wallet_pages,
    )
    .await?;

    info!(
        "📊 Portfolio: {} collections, {} tokens",
        portfolio.collections.len(),
        portfolio.total_tokens()
    );
    for (name, collection) in &portfolio.collections {
        info!(
            "   • {} ({}): {} tokens",
            name, collection.contract_address, collection.count
        );
    }

    let mut loader = CollectionGalleryLoader::new(
        client,
        config.gallery.clone(),
        config.unleash.default_blockchain.clone(),
    );
    loader.queue_portfolio(&portfolio);

    let mut batches = 0u32;
    loop {
        match loader.load_next_batch().await {
            LoadOutcome::BatchLoaded {
                collection,
                items,
                more_available,
            } => {
                batches += 1;
                info!(
                    "🖼️  Batch {} for '{}': {} images (more: {})",
                    batches,
                    collection,
                    items.len(),
                    more_available
                );
                for nft in &items {
                    info!("      {} -> {}", nft.name, nft.image_url);
                }
            }
            LoadOutcome::Finished => break,
        }
    }

    info!(
        "✅ Gallery run complete: {} images loaded, {} collections skipped",
        loader.display_list().len(),
        loader.skipped().len()
    );

    Ok(())
}
