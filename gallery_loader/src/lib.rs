use config_manager::GalleryConfig;
use insights_core::registry::{is_placeholder, MediaVerdict, SeenMedia, TokenImageRegistry};
use insights_core::{InsightsError, TokenImageSource, WalletPortfolio};
use retry_utils::{retry_with_backoff, RetryConfig, RetryableError};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A collection queued for gallery loading, with its distinct token ids
/// in portfolio order.
#[derive(Debug, Clone)]
pub struct CollectionEntry {
    pub name: String,
    pub contract_address: String,
    pub token_ids: Vec<String>,
}

impl CollectionEntry {
    fn from_portfolio(portfolio: &WalletPortfolio) -> Vec<CollectionEntry> {
        portfolio
            .collections
            .iter()
            .map(|(name, bucket)| {
                let mut seen = HashSet::new();
                let token_ids = bucket
                    .tokens
                    .iter()
                    .filter(|id| seen.insert((*id).clone()))
                    .cloned()
                    .collect();
                CollectionEntry {
                    name: name.clone(),
                    contract_address: bucket.contract_address.clone(),
                    token_ids,
                }
            })
            .collect()
    }
}

/// One NFT ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayNft {
    pub name: String,
    pub collection: String,
    pub contract_address: String,
    pub token_id: String,
    pub image_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Idle,
    TestingCollection,
    LoadingBatch,
    AwaitingMore,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    AlreadySkipListed,
    MissingFields,
    SmokeTestFailed,
}

/// What one driver step produced.
#[derive(Debug)]
pub enum LoadOutcome {
    /// A batch finished for `collection`; `more_available` tells the caller
    /// whether another `load_next_batch` call will continue it.
    BatchLoaded {
        collection: String,
        items: Vec<DisplayNft>,
        more_available: bool,
    },
    /// Every queued collection has been processed or skipped.
    Finished,
}

fn classify_image_error(error: &InsightsError) -> RetryableError {
    match error {
        InsightsError::Timeout => RetryableError::Timeout,
        InsightsError::RateLimited => RetryableError::RateLimit,
        InsightsError::Upstream(_) => RetryableError::ServerError,
        // 404/403 and malformed payloads will not improve on retry
        _ => RetryableError::Other,
    }
}

/// Caller-driven loader that walks a wallet's collections and resolves
/// token images in bounded, strictly sequential batches.
///
/// All session state (skip list, registries, seen-media set, counters)
/// lives on the instance; two loaders never share anything.
pub struct CollectionGalleryLoader<S: TokenImageSource> {
    source: S,
    config: GalleryConfig,
    retry: RetryConfig,
    blockchain: String,
    collections: Vec<CollectionEntry>,
    cursor: usize,
    processed: usize,
    tested: bool,
    state: LoaderState,
    registry: TokenImageRegistry,
    seen_media: SeenMedia,
    skip_list: HashSet<String>,
    skipped: Vec<(String, SkipReason)>,
    display: Vec<DisplayNft>,
}

impl<S: TokenImageSource> CollectionGalleryLoader<S> {
    pub fn new(source: S, config: GalleryConfig, blockchain: impl Into<String>) -> Self {
        let retry = RetryConfig::linear(config.retry_base_delay_ms, config.max_retries);
        Self {
            source,
            config,
            retry,
            blockchain: blockchain.into(),
            collections: Vec::new(),
            cursor: 0,
            processed: 0,
            tested: false,
            state: LoaderState::Idle,
            registry: TokenImageRegistry::new(),
            seen_media: SeenMedia::new(),
            skip_list: HashSet::new(),
            skipped: Vec::new(),
            display: Vec::new(),
        }
    }

    pub fn queue_portfolio(&mut self, portfolio: &WalletPortfolio) {
        self.queue_collections(CollectionEntry::from_portfolio(portfolio));
    }

    pub fn queue_collections(&mut self, collections: Vec<CollectionEntry>) {
        info!("🖼️  Queued {} collections for gallery loading", collections.len());
        self.collections.extend(collections);
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    pub fn display_list(&self) -> &[DisplayNft] {
        &self.display
    }

    pub fn skip_list(&self) -> &HashSet<String> {
        &self.skip_list
    }

    pub fn skipped(&self) -> &[(String, SkipReason)] {
        &self.skipped
    }

    /// Drive the loader one step: advance past skippable collections,
    /// smoke-test the next live one, and load one batch of token images.
    ///
    /// Skipped collections never require caller action; the cursor moves
    /// on inside this call. `Finished` is terminal and idempotent.
    pub async fn load_next_batch(&mut self) -> LoadOutcome {
        loop {
            // A completed collection hands the cursor forward and resets
            // all per-collection registries before the next smoke test.
            if self.state == LoaderState::Complete {
                self.advance_cursor();
            }

            let Some(entry) = self.collections.get(self.cursor).cloned() else {
                self.state = LoaderState::Idle;
                return LoadOutcome::Finished;
            };

            if !self.tested {
                self.state = LoaderState::TestingCollection;

                if self.skip_list.contains(&entry.contract_address) {
                    self.record_skip(&entry, SkipReason::AlreadySkipListed);
                    continue;
                }

                if entry.contract_address.is_empty() || entry.token_ids.is_empty() {
                    self.record_skip(&entry, SkipReason::MissingFields);
                    continue;
                }

                if !self.smoke_test(&entry).await {
                    self.skip_list.insert(entry.contract_address.clone());
                    self.record_skip(&entry, SkipReason::SmokeTestFailed);
                    continue;
                }

                self.tested = true;
            }

            self.state = LoaderState::LoadingBatch;

            let batch: Vec<String> = entry
                .token_ids
                .iter()
                .skip(self.processed)
                .filter(|id| !self.registry.contains_token(id))
                .take(self.config.batch_size)
                .cloned()
                .collect();

            debug!(
                "Loading batch of {} tokens for '{}' ({}/{} processed)",
                batch.len(),
                entry.name,
                self.processed,
                entry.token_ids.len()
            );

            let mut items = Vec::new();
            for token_id in &batch {
                if let Some(nft) = self.load_token(&entry, token_id).await {
                    items.push(nft);
                }
            }
            self.processed += batch.len();

            // Merge into the display list, deduplicated by (token, contract)
            for nft in &items {
                let duplicate = self
                    .display
                    .iter()
                    .any(|d| d.token_id == nft.token_id && d.contract_address == nft.contract_address);
                if !duplicate {
                    self.display.push(nft.clone());
                }
            }

            let more_available = self.processed < entry.token_ids.len();
            self.state = if more_available {
                LoaderState::AwaitingMore
            } else {
                info!(
                    "✅ Collection '{}' complete: {} of {} tokens accepted",
                    entry.name,
                    self.registry.len(),
                    entry.token_ids.len()
                );
                LoaderState::Complete
            };

            return LoadOutcome::BatchLoaded {
                collection: entry.name,
                items,
                more_available,
            };
        }
    }

    fn advance_cursor(&mut self) {
        self.cursor += 1;
        self.processed = 0;
        self.tested = false;
        self.registry.reset();
        self.seen_media.reset();
        self.state = LoaderState::Idle;
    }

    fn record_skip(&mut self, entry: &CollectionEntry, reason: SkipReason) {
        warn!("⏭️  Skipping collection '{}': {:?}", entry.name, reason);
        self.skipped.push((entry.name.clone(), reason));
        self.advance_cursor();
    }

    /// Probe the collection with its first token. Any failure or a
    /// placeholder image condemns the whole collection.
    async fn smoke_test(&mut self, entry: &CollectionEntry) -> bool {
        let first_token = match entry.token_ids.first() {
            Some(id) => id,
            None => return false,
        };

        let timeout = Duration::from_secs(self.config.image_timeout_seconds);
        let result = tokio::time::timeout(
            timeout,
            self.source
                .fetch_token_image(&self.blockchain, &entry.contract_address, first_token),
        )
        .await;

        match result {
            Ok(Ok(Some(url))) if !is_placeholder(&url) => true,
            Ok(Ok(_)) => {
                debug!(
                    "Smoke test for '{}' returned no usable image",
                    entry.name
                );
                false
            }
            Ok(Err(e)) => {
                debug!("Smoke test for '{}' failed: {}", entry.name, e);
                false
            }
            Err(_) => {
                debug!("Smoke test for '{}' timed out", entry.name);
                false
            }
        }
    }

    /// Resolve one token's image with timeout and linear-backoff retries.
    /// Every failure mode drops the token; nothing escapes the batch.
    async fn load_token(&mut self, entry: &CollectionEntry, token_id: &str) -> Option<DisplayNft> {
        let timeout = Duration::from_secs(self.config.image_timeout_seconds);
        let source = &self.source;
        let blockchain = &self.blockchain;
        let contract = &entry.contract_address;

        let fetched = retry_with_backoff(
            || async move {
                match tokio::time::timeout(
                    timeout,
                    source.fetch_token_image(blockchain, contract, token_id),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(InsightsError::Timeout),
                }
            },
            &self.retry,
            classify_image_error,
        )
        .await;

        let url = match fetched {
            Ok(Some(url)) => url,
            Ok(None) => {
                debug!("Token {}/{} has no image, dropping", contract, token_id);
                return None;
            }
            Err(e) => {
                warn!(
                    "Dropping token {}/{} after exhausting retries: {}",
                    contract, token_id, e
                );
                return None;
            }
        };

        match self.seen_media.screen(&url) {
            MediaVerdict::Accepted => {}
            verdict => {
                debug!(
                    "Rejecting image for token {}/{}: {:?}",
                    contract, token_id, verdict
                );
                return None;
            }
        }

        if let Err(conflict) = self.registry.register(token_id, &url) {
            warn!(
                "Duplicate pairing for token {}/{}: {:?}",
                contract, token_id, conflict
            );
            return None;
        }

        Some(DisplayNft {
            name: format!("{} #{}", entry.name, token_id),
            collection: entry.name.clone(),
            contract_address: entry.contract_address.clone(),
            token_id: token_id.to_string(),
            image_url: url,
        })
    }
}
