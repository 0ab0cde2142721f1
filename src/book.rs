// =============================================================================
// Order Book Snapshot - exchange types and the fetch seam
// =============================================================================
//
// The exchange sends price levels as string pairs; parsing to f64 happens in
// the sentiment pipeline. Fetching is behind the `BookProvider` trait so the
// worker cycle can run against a canned snapshot in tests.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One side level of the book: `[price, volume]` as the exchange sends it.
pub type Order = (String, String);

/// Order book snapshot for a single market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub market: String,
    #[serde(default)]
    pub nonce: u64,
    pub bids: Vec<Order>,
    pub asks: Vec<Order>,
}

/// Source of order book snapshots, one fetch per trading cycle.
#[async_trait]
pub trait BookProvider: Send + Sync {
    async fn fetch_book(&self, market: &str) -> Result<Book>;
}

/// REST implementation against the exchange `/{market}/book` endpoint.
pub struct HttpBookProvider {
    base_url: String,
    /// Number of price levels requested per side.
    depth: u64,
    client: reqwest::Client,
}

impl HttpBookProvider {
    pub fn new(base_url: impl Into<String>, depth: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        Self {
            base_url: base_url.into(),
            depth,
            client,
        }
    }
}

#[async_trait]
impl BookProvider for HttpBookProvider {
    async fn fetch_book(&self, market: &str) -> Result<Book> {
        let url = format!("{}/{}/book?depth={}", self.base_url, market, self.depth);
        debug!(url = %url, "fetching order book");

        let book = self
            .client
            .get(&url)
            .send()
            .await
            .context("order book request failed")?
            .error_for_status()
            .context("order book request rejected")?
            .json::<Book>()
            .await
            .context("failed to decode order book")?;

        Ok(book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn book_decodes_exchange_shape() {
        let json = r#"{
            "market": "BTC-EUR",
            "nonce": 74133,
            "bids": [["100.0", "1.5"], ["99.5", "2.0"]],
            "asks": [["100.5", "0.7"]]
        }"#;

        let book: Book = serde_json::from_str(json).unwrap();
        assert_eq!(book.market, "BTC-EUR");
        assert_eq!(book.bids.len(), 2);
        assert_eq!(book.bids[0], ("100.0".to_string(), "1.5".to_string()));
        assert_eq!(book.asks.len(), 1);
    }

    #[test]
    fn nonce_is_optional() {
        let json = r#"{ "market": "ETH-EUR", "bids": [], "asks": [] }"#;
        let book: Book = serde_json::from_str(json).unwrap();
        assert_eq!(book.nonce, 0);
    }
}
