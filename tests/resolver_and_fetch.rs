use gfinance_history::api::{GoogleFinanceClient, HistoricalQuoteSource};
use gfinance_history::error::ScrapeError;
use gfinance_history::models::{MarketId, QuerySpec, StockSymbol};
use gfinance_history::payload::ChartVariant;
use wiremock::matchers::{method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

const SEARCH_GOOGL: &str = include_str!("fixtures/search_googl.html");
const SEARCH_TOYOTA: &str = include_str!("fixtures/search_toyota.html");
const FINANCE_TOP: &str = include_str!("fixtures/finance_top.html");
const WHOLEPAGE_FIXTURE: &str = include_str!("fixtures/wholepage_chart.txt");

/// Matches requests whose query string contains the given fragment, which
/// sidesteps the form-encoding of the symbol in the `q` parameter.
struct QueryContains(&'static str);

impl Match for QueryContains {
    fn matches(&self, request: &Request) -> bool {
        request.url.query().is_some_and(|q| q.contains(self.0))
    }
}

async fn client_for(server: &MockServer) -> GoogleFinanceClient {
    GoogleFinanceClient::with_endpoints(server.uri(), server.uri()).unwrap()
}

#[tokio::test]
async fn distinct_symbols_resolve_to_distinct_market_ids() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(QueryContains("GOOGL"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SEARCH_GOOGL))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(QueryContains("7203"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SEARCH_TOYOTA))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let googl = client
        .resolve_market_id(&"NASDAQ: GOOGL".parse::<StockSymbol>().unwrap())
        .await
        .unwrap();
    let toyota = client
        .resolve_market_id(&"TYO: 7203".parse::<StockSymbol>().unwrap())
        .await
        .unwrap();

    assert_eq!(googl, MarketId("/m/07zln7n".into()));
    assert_eq!(toyota, MarketId("/m/0cl3bc5".into()));
    assert_ne!(googl, toyota);
}

#[tokio::test]
async fn resolution_fails_cleanly_on_markup_drift() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html><body>nothing here</body></html>"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .resolve_market_id(&StockSymbol::tyo("7203"))
        .await
        .unwrap_err();
    assert!(matches!(err, ScrapeError::Resolution { .. }));
}

#[tokio::test]
async fn fetch_bootstraps_a_session_token_then_parses_the_chart() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/finance"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FINANCE_TOP))
        .mount(&server)
        .await;
    // The chart request must carry the token scraped from the bootstrap
    // page; without it this mock never matches and the fetch fails.
    Mock::given(method("GET"))
        .and(path("/async/finance_wholepage_chart"))
        .and(QueryContains("ei=testEi42"))
        .and(QueryContains("period:5d"))
        .respond_with(ResponseTemplate::new(200).set_body_string(WHOLEPAGE_FIXTURE))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let spec = QuerySpec::new(MarketId("/m/0cl3bc5".into()), "5d", 86_400).unwrap();
    let quotes = client
        .get_historical(&spec, ChartVariant::Wholepage)
        .await
        .unwrap();

    assert_eq!(quotes.len(), 5);
    assert_eq!(quotes[0].timestamp_minutes, 25199520);
    assert_eq!(quotes[0].close, 6930.0);
}

#[tokio::test]
async fn non_success_status_is_a_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/finance"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let spec = QuerySpec::new(MarketId("/m/0cl3bc5".into()), "5d", 86_400).unwrap();
    let err = client
        .get_historical(&spec, ChartVariant::Wholepage)
        .await
        .unwrap_err();
    match err {
        ScrapeError::FetchStatus { status, .. } => assert_eq!(status.as_u16(), 503),
        other => panic!("expected FetchStatus, got {other:?}"),
    }
}
