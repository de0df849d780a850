//! Batch download of many symbols to timestamped CSV files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::api::{CourtesyDelay, HistoricalQuoteSource};
use crate::models::{HistoricalSeries, QuerySpec, StockSymbol};
use crate::payload::ChartVariant;

/// Inputs for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Local codes; a bare code is treated as a TYO listing.
    pub symbols: Vec<String>,
    pub period: String,
    pub interval_secs: u32,
    /// Courtesy pause between symbols, in seconds.
    pub pause_secs: u64,
    /// Output directory, created if absent.
    pub folder: PathBuf,
    pub variant: ChartVariant,
}

/// Outcome summary of a batch run. A failing symbol never aborts the rest
/// of the batch; it lands in `failures` instead.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<(String, String)>,
    pub files: Vec<PathBuf>,
}

/// One CSV output row.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Close")]
    close: f64,
    #[serde(rename = "Timestamp")]
    timestamp: i64,
    #[serde(rename = "Symbol_Code")]
    symbol_code: &'a str,
}

pub struct BatchDownloader<S: HistoricalQuoteSource> {
    source: S,
}

impl<S: HistoricalQuoteSource> BatchDownloader<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Download every symbol in the list to its own CSV file, pausing
    /// between symbols.
    pub async fn run(&self, options: &BatchOptions) -> Result<BatchReport> {
        std::fs::create_dir_all(&options.folder).with_context(|| {
            format!("failed to create output folder {}", options.folder.display())
        })?;

        // One capture stamp for the whole run, so a batch groups together
        // on disk.
        let capture_stamp = Local::now().format("%Y-%m-%d_%H").to_string();
        let delay = CourtesyDelay::new(options.pause_secs);
        let total = options.symbols.len();
        let mut report = BatchReport::default();

        info!(
            "starting batch of {} symbols (period {}, interval {}s) into {}",
            total,
            options.period,
            options.interval_secs,
            options.folder.display()
        );

        for (i, code) in options.symbols.iter().enumerate() {
            match self.download_symbol(code, options).await {
                Ok(series) => {
                    let path = options
                        .folder
                        .join(format!("{capture_stamp}_{code}.csv"));
                    match write_series_csv(&path, &series) {
                        Ok(rows) => {
                            info!(
                                "{}/{}: {} - {} rows written to {}",
                                i + 1,
                                total,
                                code,
                                rows,
                                path.display()
                            );
                            report.succeeded += 1;
                            report.files.push(path);
                        }
                        Err(e) => {
                            error!("{}/{}: {} - csv write failed: {:#}", i + 1, total, code, e);
                            report.failed += 1;
                            report.failures.push((code.clone(), format!("{e:#}")));
                        }
                    }
                }
                Err(e) => {
                    warn!("{}/{}: {} failed - {}", i + 1, total, code, e);
                    report.failed += 1;
                    report.failures.push((code.clone(), e.to_string()));
                }
            }

            if i + 1 < total {
                delay.wait().await;
            }
        }

        info!(
            "batch complete: {} succeeded, {} failed",
            report.succeeded, report.failed
        );
        Ok(report)
    }

    async fn download_symbol(
        &self,
        code: &str,
        options: &BatchOptions,
    ) -> Result<HistoricalSeries, crate::error::ScrapeError> {
        let symbol: StockSymbol = code.parse()?;
        let market_id = self.source.resolve_market_id(&symbol).await?;
        let spec = QuerySpec::new(market_id, options.period.clone(), options.interval_secs)?;
        let quotes = self.source.get_historical(&spec, options.variant).await?;
        Ok(HistoricalSeries {
            symbol_code: symbol.local_code,
            quotes,
        })
    }
}

/// Serialize one series as `Date,Close,Timestamp,Symbol_Code`, returning
/// the row count.
fn write_series_csv(path: &Path, series: &HistoricalSeries) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut rows = 0;
    for quote in &series.quotes {
        let date = quote
            .datetime_local()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        writer.serialize(CsvRow {
            date,
            close: quote.close,
            timestamp: quote.timestamp_minutes,
            symbol_code: &series.symbol_code,
        })?;
        rows += 1;
    }
    writer.flush()?;
    Ok(rows)
}
