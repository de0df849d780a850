use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use gfinance_history::api::{GoogleFinanceClient, HistoricalQuoteSource};
use gfinance_history::batch::{BatchDownloader, BatchOptions};
use gfinance_history::models::{MarketId, QuerySpec, StockSymbol};
use gfinance_history::payload::ChartVariant;

/// Google Finance historical closing-price downloader
#[derive(Parser)]
#[command(name = "gfinance-history")]
#[command(version = "0.1.0")]
#[command(about = "Scrape historical closing prices from Google Finance chart pages")]
#[command(long_about = "
Downloads the closing-price series embedded in the Google Finance chart
pages. Only timestamps and closes are available upstream; there is no
open/high/low/volume data in the scraped payload.

Examples:
  gfinance-history resolve 'NASDAQ: GOOGL'
  gfinance-history fetch --symbol 'TYO: 7203' --period 5d --interval 300
  gfinance-history batch --symbols 7203,9984 --period 3Y --pause 2 --folder stockdata
")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log verbosity (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: Level,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a ticker like 'TYO: 7203' to its internal market id
    Resolve {
        /// Symbol in 'EXCHANGE: CODE' form, or a bare TYO code
        symbol: String,
    },
    /// Fetch one symbol's closing prices and print them
    Fetch {
        /// Symbol in 'EXCHANGE: CODE' form; resolved before fetching
        #[arg(long, conflicts_with = "market_id")]
        symbol: Option<String>,
        /// Already-resolved market id, e.g. /m/0cl3bc5
        #[arg(long)]
        market_id: Option<String>,
        /// History span token: 1d, 5d, 1Y, 3Y, 5Y
        #[arg(long, default_value = "5d")]
        period: String,
        /// Bar interval in seconds, minimum 60
        #[arg(long, default_value_t = 86_400)]
        interval: u32,
        /// Parse with the legacy chart format instead of the wholepage one
        #[arg(long)]
        legacy: bool,
    },
    /// Download several symbols to timestamped CSV files
    Batch {
        /// Comma-separated local codes (TYO assumed), e.g. 7203,9984
        #[arg(long, value_delimiter = ',', required = true)]
        symbols: Vec<String>,
        #[arg(long, default_value = "3Y")]
        period: String,
        /// Bar interval in seconds, minimum 60
        #[arg(long, default_value_t = 86_400)]
        interval: u32,
        /// Pause between symbols in seconds
        #[arg(long, default_value_t = 1)]
        pause: u64,
        /// Output folder for the CSV files
        #[arg(long, default_value = "stockdata")]
        folder: std::path::PathBuf,
        /// Parse with the legacy chart format instead of the wholepage one
        #[arg(long)]
        legacy: bool,
    },
}

fn variant(legacy: bool) -> ChartVariant {
    if legacy {
        ChartVariant::Legacy
    } else {
        ChartVariant::Wholepage
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let client = GoogleFinanceClient::new()?;

    match cli.command {
        Command::Resolve { symbol } => {
            let symbol: StockSymbol = symbol.parse()?;
            let mid = client.resolve_market_id(&symbol).await?;
            println!("{mid}");
        }
        Command::Fetch {
            symbol,
            market_id,
            period,
            interval,
            legacy,
        } => {
            let market_id = match (symbol, market_id) {
                (Some(s), None) => {
                    let symbol: StockSymbol = s.parse()?;
                    client.resolve_market_id(&symbol).await?
                }
                (None, Some(mid)) => MarketId(mid),
                _ => return Err(anyhow!("pass exactly one of --symbol or --market-id")),
            };
            let spec = QuerySpec::new(market_id, period, interval)?;
            let quotes = client.get_historical(&spec, variant(legacy)).await?;

            println!("Date                | Close");
            println!("--------------------|----------");
            for quote in &quotes {
                let date = quote
                    .datetime_local()
                    .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "(invalid)".to_string());
                println!("{date} | {:.2}", quote.close);
            }
            println!("{} quotes", quotes.len());
        }
        Command::Batch {
            symbols,
            period,
            interval,
            pause,
            folder,
            legacy,
        } => {
            let options = BatchOptions {
                symbols,
                period,
                interval_secs: interval,
                pause_secs: pause,
                folder,
                variant: variant(legacy),
            };
            let report = BatchDownloader::new(client).run(&options).await?;

            println!(
                "Batch finished: {} succeeded, {} failed",
                report.succeeded, report.failed
            );
            for (code, reason) in &report.failures {
                eprintln!("  {code}: {reason}");
            }
            if report.failed > 0 {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
