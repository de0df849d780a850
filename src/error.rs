use thiserror::Error;

/// Error taxonomy for the scraper.
///
/// `Resolution` and `Fetch` mean the symbol or the network is the problem;
/// `PayloadShape` means the upstream page format drifted and the scraper
/// itself needs updating. Callers rely on that distinction.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("symbol resolution failed for '{symbol}': {reason}")]
    Resolution { symbol: String, reason: String },

    #[error("request failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("request to {url} returned status {status}")]
    FetchStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("unexpected payload shape at {context}: expected {expected}, observed {observed}")]
    PayloadShape {
        context: String,
        expected: String,
        observed: String,
    },

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl ScrapeError {
    /// Shorthand for a failed structural checkpoint while parsing the payload.
    pub fn shape(
        context: impl Into<String>,
        expected: impl Into<String>,
        observed: impl Into<String>,
    ) -> Self {
        ScrapeError::PayloadShape {
            context: context.into(),
            expected: expected.into(),
            observed: observed.into(),
        }
    }
}
