use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScrapeError;

/// Smallest interval the chart endpoint serves, in seconds (one minute bars).
pub const MIN_INTERVAL_SECS: u32 = 60;

/// A single closing-price observation.
///
/// Upstream encodes the timestamp as whole minutes since the Unix epoch,
/// so the calendar time is always `timestamp_minutes * 60` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub timestamp_minutes: i64,
    pub close: f64,
}

impl Quote {
    pub fn new(timestamp_minutes: i64, close: f64) -> Self {
        Self {
            timestamp_minutes,
            close,
        }
    }

    /// Calendar time of the quote in UTC.
    pub fn datetime_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.timestamp_minutes * 60, 0).single()
    }

    /// Calendar time of the quote in the machine's local zone, which is what
    /// the CSV output records.
    pub fn datetime_local(&self) -> Option<DateTime<Local>> {
        Local.timestamp_opt(self.timestamp_minutes * 60, 0).single()
    }
}

/// Human-readable ticker: exchange plus local code, e.g. "TYO: 7203".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSymbol {
    pub exchange: String,
    pub local_code: String,
}

impl StockSymbol {
    pub fn new(exchange: impl Into<String>, local_code: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            local_code: local_code.into(),
        }
    }

    /// Tokyo Stock Exchange symbol from a bare numeric code.
    pub fn tyo(local_code: impl Into<String>) -> Self {
        Self::new("TYO", local_code)
    }
}

impl fmt::Display for StockSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.exchange, self.local_code)
    }
}

impl FromStr for StockSymbol {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((exchange, code)) if !exchange.trim().is_empty() && !code.trim().is_empty() => {
                Ok(Self::new(exchange.trim(), code.trim()))
            }
            // A bare code is taken as a Tokyo listing, matching the batch
            // driver's symbol-list convention.
            None if !s.trim().is_empty() => Ok(Self::tyo(s.trim())),
            _ => Err(ScrapeError::InvalidQuery(format!(
                "cannot parse stock symbol from '{s}'"
            ))),
        }
    }
}

/// Opaque identifier the chart endpoint uses to select a listed security,
/// e.g. "/m/0cl3bc5". Resolved per run, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketId(pub String);

impl MarketId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parameters of one chart-data request.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub market_id: MarketId,
    /// Upstream period token: "1d", "5d", "1Y", "3Y", "5Y", ...
    pub period: String,
    /// Bar interval in seconds, at least [`MIN_INTERVAL_SECS`].
    pub interval_secs: u32,
}

impl QuerySpec {
    pub fn new(
        market_id: MarketId,
        period: impl Into<String>,
        interval_secs: u32,
    ) -> Result<Self, ScrapeError> {
        if interval_secs < MIN_INTERVAL_SECS {
            return Err(ScrapeError::InvalidQuery(format!(
                "interval must be at least {MIN_INTERVAL_SECS} seconds, got {interval_secs}"
            )));
        }
        Ok(Self {
            market_id,
            period: period.into(),
            interval_secs,
        })
    }
}

/// Parsed quotes for one symbol, tagged with the code the batch driver
/// writes into the CSV.
#[derive(Debug, Clone)]
pub struct HistoricalSeries {
    pub symbol_code: String,
    pub quotes: Vec<Quote>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_parses_exchange_and_code() {
        let sym: StockSymbol = "NASDAQ: GOOGL".parse().unwrap();
        assert_eq!(sym.exchange, "NASDAQ");
        assert_eq!(sym.local_code, "GOOGL");
        assert_eq!(sym.to_string(), "NASDAQ: GOOGL");
    }

    #[test]
    fn bare_code_defaults_to_tokyo() {
        let sym: StockSymbol = "7203".parse().unwrap();
        assert_eq!(sym, StockSymbol::tyo("7203"));
        assert_eq!(sym.to_string(), "TYO: 7203");
    }

    #[test]
    fn empty_symbol_is_rejected() {
        assert!("".parse::<StockSymbol>().is_err());
        assert!(" : ".parse::<StockSymbol>().is_err());
    }

    #[test]
    fn sub_minute_interval_is_rejected() {
        let err = QuerySpec::new(MarketId("/m/0cl3bc5".into()), "1d", 30).unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidQuery(_)));
    }

    #[test]
    fn timestamp_is_minutes_since_epoch() {
        // 25_000_000 minutes = 1_500_000_000 seconds.
        let quote = Quote::new(25_000_000, 100.0);
        let utc = quote.datetime_utc().unwrap();
        assert_eq!(utc.to_rfc3339(), "2017-07-14T02:40:00+00:00");
    }
}
