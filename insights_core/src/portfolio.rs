use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// One owned NFT as reported by the wallet balance endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NftHolding {
    #[serde(default)]
    pub collection: Option<String>,
    pub contract_address: String,
    pub token_id: String,
}

/// Per-collection bucket, built incrementally across pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioCollection {
    pub contract_address: String,
    pub tokens: Vec<String>,
    pub count: u64,
}

/// A wallet's holdings grouped by collection name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletPortfolio {
    pub collections: BTreeMap<String, PortfolioCollection>,
}

impl WalletPortfolio {
    /// Upsert one page of holdings. The contract address is captured the
    /// first time a collection is seen; token ids are append-only.
    pub fn ingest(&mut self, holdings: &[NftHolding]) {
        for nft in holdings {
            // Unnamed collections bucket under their contract address
            let key = nft
                .collection
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| nft.contract_address.clone());

            let bucket = self
                .collections
                .entry(key)
                .or_insert_with(|| PortfolioCollection {
                    contract_address: nft.contract_address.clone(),
                    tokens: Vec::new(),
                    count: 0,
                });
            bucket.tokens.push(nft.token_id.clone());
            bucket.count += 1;
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.collections.values().map(|c| c.count).sum()
    }
}

/// One page of a wallet's NFT balances.
#[async_trait]
pub trait NftBalanceSource: Send + Sync {
    async fn fetch_nft_page(
        &self,
        wallet: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<NftHolding>>;
}

/// Paginate the balance endpoint to completion and group by collection.
///
/// Pages are requested at offsets 0, L, 2L, ... and the loop halts on an
/// empty or short page. The first request failure propagates; there is no
/// partial-result fallback on this path. `max_pages` bounds a pathological
/// upstream that never returns a short page; hitting it returns what was
/// aggregated, with a warning.
pub async fn collect_wallet_portfolio<S: NftBalanceSource>(
    source: &S,
    wallet: &str,
    page_size: u32,
    max_pages: u32,
) -> Result<WalletPortfolio> {
    let mut portfolio = WalletPortfolio::default();
    let mut offset = 0u32;
    let mut page_num = 0u32;

    info!("🔄 Starting NFT portfolio fetch for wallet: {}", wallet);

    loop {
        if page_num >= max_pages {
            warn!(
                "⚠️  Wallet {} hit the {}-page ceiling, returning {} tokens aggregated so far",
                wallet,
                max_pages,
                portfolio.total_tokens()
            );
            break;
        }

        let page = source.fetch_nft_page(wallet, offset, page_size).await?;
        page_num += 1;

        if page.is_empty() {
            debug!("📄 Page {}: empty, stopping pagination", page_num);
            break;
        }

        let page_len = page.len();
        portfolio.ingest(&page);
        debug!(
            "📄 Page {}: {} NFTs ({} collections so far)",
            page_num,
            page_len,
            portfolio.collections.len()
        );

        if (page_len as u32) < page_size {
            debug!("📄 Page {}: short page, stopping pagination", page_num);
            break;
        }

        offset += page_size;
    }

    info!(
        "📊 Portfolio for {}: {} collections, {} tokens across {} pages",
        wallet,
        portfolio.collections.len(),
        portfolio.total_tokens(),
        page_num
    );

    Ok(portfolio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InsightsError;
    use std::sync::Mutex;

    /// Scripted source: returns the configured pages in order, then empties.
    struct ScriptedSource {
        pages: Vec<Vec<NftHolding>>,
        calls: Mutex<Vec<u32>>,
        fail_on_call: Option<usize>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Vec<NftHolding>>) -> Self {
            Self {
                pages,
                calls: Mutex::new(Vec::new()),
                fail_on_call: None,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl NftBalanceSource for ScriptedSource {
        async fn fetch_nft_page(
            &self,
            _wallet: &str,
            offset: u32,
            _limit: u32,
        ) -> Result<Vec<NftHolding>> {
            let mut calls = self.calls.lock().unwrap();
            let call_index = calls.len();
            calls.push(offset);

            if self.fail_on_call == Some(call_index) {
                return Err(InsightsError::Upstream("balance endpoint down".to_string()));
            }

            Ok(self.pages.get(call_index).cloned().unwrap_or_default())
        }
    }

    fn holdings(collection: &str, contract: &str, n: usize, start: usize) -> Vec<NftHolding> {
        (0..n)
            .map(|i| NftHolding {
                collection: Some(collection.to_string()),
                contract_address: contract.to_string(),
                token_id: (start + i).to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_three_pages_three_requests_237_tokens() {
        let source = ScriptedSource::new(vec![
            holdings("Punks", "0xabc", 100, 0),
            holdings("Punks", "0xabc", 100, 100),
            holdings("Apes", "0xdef", 37, 0),
        ]);

        let portfolio = collect_wallet_portfolio(&source, "0xwallet", 100, 50)
            .await
            .unwrap();

        assert_eq!(source.call_count(), 3);
        assert_eq!(portfolio.total_tokens(), 237);
        assert_eq!(portfolio.collections["Punks"].count, 200);
        assert_eq!(portfolio.collections["Apes"].count, 37);
        // offsets advance by the page size
        assert_eq!(*source.calls.lock().unwrap(), vec![0, 100, 200]);
    }

    #[tokio::test]
    async fn test_contract_address_captured_once() {
        let mut first = holdings("Punks", "0xabc", 2, 0);
        first.extend(holdings("Punks", "0xother", 1, 2));
        let source = ScriptedSource::new(vec![first]);

        let portfolio = collect_wallet_portfolio(&source, "0xwallet", 100, 50)
            .await
            .unwrap();

        // The bucket keeps the address it was created with
        assert_eq!(portfolio.collections["Punks"].contract_address, "0xabc");
        assert_eq!(portfolio.collections["Punks"].count, 3);
        assert_eq!(
            portfolio.collections["Punks"].tokens,
            vec!["0", "1", "2"]
        );
    }

    #[tokio::test]
    async fn test_first_failure_propagates() {
        let mut source = ScriptedSource::new(vec![
            holdings("Punks", "0xabc", 100, 0),
            holdings("Punks", "0xabc", 100, 100),
        ]);
        source.fail_on_call = Some(1);

        let result = collect_wallet_portfolio(&source, "0xwallet", 100, 50).await;
        assert!(matches!(result, Err(InsightsError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_page_ceiling_stops_pathological_source() {
        // Every page is full-size, so only the ceiling can stop the loop
        let pages: Vec<Vec<NftHolding>> = (0..10)
            .map(|i| holdings("Loop", "0xloop", 5, i * 5))
            .collect();
        let source = ScriptedSource::new(pages);

        let portfolio = collect_wallet_portfolio(&source, "0xwallet", 5, 4)
            .await
            .unwrap();

        assert_eq!(source.call_count(), 4);
        assert_eq!(portfolio.total_tokens(), 20);
    }

    #[tokio::test]
    async fn test_unnamed_collection_buckets_under_contract() {
        let source = ScriptedSource::new(vec![vec![NftHolding {
            collection: None,
            contract_address: "0xnameless".to_string(),
            token_id: "7".to_string(),
        }]]);

        let portfolio = collect_wallet_portfolio(&source, "0xwallet", 100, 50)
            .await
            .unwrap();
        assert!(portfolio.collections.contains_key("0xnameless"));
    }
}
