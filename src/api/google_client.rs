use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use scraper::{Html, Selector};
use tracing::{debug, info};

use crate::error::ScrapeError;
use crate::models::{MarketId, QuerySpec, Quote, StockSymbol};
use crate::payload::{self, ChartVariant};

use super::HistoricalQuoteSource;

/// Desktop user agent; the chart endpoint serves a different (unparseable)
/// page to unknown clients.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_10_1) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/39.0.2171.95 Safari/537.36";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const SEARCH_BASE: &str = "https://www.google.com";
const FINANCE_BASE: &str = "https://www.google.com";

static SEARCH_CONTAINER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#search").expect("valid selector"));
static RESULT_CONTAINER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#rso").expect("valid selector"));
static MID_CARRIER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div[data-mid]").expect("valid selector"));
static SESSION_TOKEN_INPUT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input[name=\"ei\"]").expect("valid selector"));

/// Scraping client for the Google Finance chart pages.
///
/// One reused HTTP client; a chart query is a two-step exchange (bootstrap
/// page for the session token, then the chart-data URL) and symbol
/// resolution is a single finance-vertical search fetch.
pub struct GoogleFinanceClient {
    client: Client,
    search_base: String,
    finance_base: String,
}

impl GoogleFinanceClient {
    pub fn new() -> Result<Self, ScrapeError> {
        Self::with_endpoints(SEARCH_BASE, FINANCE_BASE)
    }

    /// Point the client at alternative hosts. Tests use this with a mock
    /// server.
    pub fn with_endpoints(
        search_base: impl Into<String>,
        finance_base: impl Into<String>,
    ) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            search_base: search_base.into(),
            finance_base: finance_base.into(),
        })
    }

    /// Fetch the bootstrap page and pull the `ei` session token out of the
    /// search form. The chart endpoint rejects requests without it.
    async fn fetch_session_token(&self) -> Result<String, ScrapeError> {
        let url = format!("{}/finance", self.finance_base);
        debug!("fetching bootstrap page: {}", url);
        let response = ensure_success(self.client.get(&url).send().await?)?;
        let body = response.text().await?;
        extract_session_token(&body)
    }

    /// Fetch the raw chart response text for a query. The body is the
    /// chunked payload that [`payload::parse_quotes`] understands.
    pub async fn fetch_raw_chart(&self, spec: &QuerySpec) -> Result<String, ScrapeError> {
        let token = self.fetch_session_token().await?;
        let encoded_mid: String =
            url::form_urlencoded::byte_serialize(spec.market_id.as_str().as_bytes()).collect();
        let url = format!(
            "{base}/async/finance_wholepage_chart?ei={ei}&yv=3&async=mid_list:{mid},\
period:{period},interval:{interval},extended:true,element_id:fw-uid_{ei}_1,\
_id:fw-uid_{ei}_1,_pms:s,_fmt:pc",
            base = self.finance_base,
            ei = token,
            mid = encoded_mid,
            period = spec.period,
            interval = spec.interval_secs,
        );
        debug!("fetching chart data: {}", url);
        let response = ensure_success(self.client.get(&url).send().await?)?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl HistoricalQuoteSource for GoogleFinanceClient {
    async fn resolve_market_id(&self, symbol: &StockSymbol) -> Result<MarketId, ScrapeError> {
        let query: String =
            url::form_urlencoded::byte_serialize(symbol.to_string().as_bytes()).collect();
        let url = format!(
            "{}/search?hl=en&q={}&btnG=Google+Search&tbs=0&safe=off&tbm=fin",
            self.search_base, query
        );
        debug!("resolving {} via {}", symbol, url);
        let response = ensure_success(self.client.get(&url).send().await?)?;
        let body = response.text().await?;
        let mid = extract_market_id(&body, symbol)?;
        info!("resolved {} -> {}", symbol, mid);
        Ok(mid)
    }

    async fn get_historical(
        &self,
        spec: &QuerySpec,
        variant: ChartVariant,
    ) -> Result<Vec<Quote>, ScrapeError> {
        let raw = self.fetch_raw_chart(spec).await?;
        let quotes = payload::parse_quotes(&raw, variant)?;
        info!(
            "fetched {} quotes for {} (period {}, interval {}s)",
            quotes.len(),
            spec.market_id,
            spec.period,
            spec.interval_secs
        );
        Ok(quotes)
    }
}

fn ensure_success(response: Response) -> Result<Response, ScrapeError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ScrapeError::FetchStatus {
            url: response.url().to_string(),
            status,
        });
    }
    Ok(response)
}

/// Pull the `data-mid` attribute out of the search result markup.
///
/// The id sits on a result container under `#search > #rso`; zero carriers
/// means the symbol did not resolve, disagreeing carriers mean the query
/// was ambiguous. Either way the caller gets a `Resolution` error, not a
/// guess.
fn extract_market_id(body: &str, symbol: &StockSymbol) -> Result<MarketId, ScrapeError> {
    let resolution_error = |reason: &str| ScrapeError::Resolution {
        symbol: symbol.to_string(),
        reason: reason.to_string(),
    };

    let document = Html::parse_document(body);
    let search = document
        .select(&SEARCH_CONTAINER)
        .next()
        .ok_or_else(|| resolution_error("search page has no #search container"))?;
    let rso = search
        .select(&RESULT_CONTAINER)
        .next()
        .ok_or_else(|| resolution_error("search page has no #rso result block"))?;

    let mids: Vec<&str> = rso
        .select(&MID_CARRIER)
        .filter_map(|el| el.value().attr("data-mid"))
        .collect();
    match mids.as_slice() {
        [] => Err(resolution_error("no result carries a data-mid attribute")),
        [first, rest @ ..] if rest.iter().all(|m| m == first) => {
            Ok(MarketId((*first).to_string()))
        }
        _ => Err(resolution_error("ambiguous results with differing data-mid values")),
    }
}

fn extract_session_token(body: &str) -> Result<String, ScrapeError> {
    let document = Html::parse_document(body);
    document
        .select(&SESSION_TOKEN_INPUT)
        .find_map(|el| el.value().attr("value"))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            ScrapeError::shape(
                "bootstrap page",
                "a search form input named 'ei'",
                "no such input",
            )
        })
}
