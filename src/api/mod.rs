use std::time::Duration;

use async_trait::async_trait;

use crate::error::ScrapeError;
use crate::models::{MarketId, QuerySpec, Quote, StockSymbol};
use crate::payload::ChartVariant;

pub mod google_client;
pub use google_client::GoogleFinanceClient;

/// Fixed courtesy pause between upstream requests. Not adaptive backoff,
/// just the politeness delay that keeps the scraper from being blocked.
pub struct CourtesyDelay {
    delay: Duration,
}

impl CourtesyDelay {
    pub fn new(secs: u64) -> Self {
        Self {
            delay: Duration::from_secs(secs),
        }
    }

    pub async fn wait(&self) {
        tokio::time::sleep(self.delay).await;
    }
}

/// Source of historical quote data. The production implementation is
/// [`GoogleFinanceClient`]; tests substitute a stub.
#[async_trait]
pub trait HistoricalQuoteSource {
    /// Resolve a human ticker to the market id the chart endpoint needs.
    async fn resolve_market_id(&self, symbol: &StockSymbol) -> Result<MarketId, ScrapeError>;

    /// Fetch and parse the closing-price series for one query.
    async fn get_historical(
        &self,
        spec: &QuerySpec,
        variant: ChartVariant,
    ) -> Result<Vec<Quote>, ScrapeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn courtesy_delay_waits_roughly_the_configured_time() {
        let delay = CourtesyDelay::new(0);
        let start = std::time::Instant::now();
        delay.wait().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
