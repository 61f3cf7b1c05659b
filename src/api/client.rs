//! Historical daily-quote client.
//!
//! Fetches daily OHLC bars from the Stooq CSV endpoint. Only the contract
//! the core needs is exposed: an ordered series for a symbol and date
//! range.

use super::error::{ApiError, ApiResult};
use crate::data::OhlcBar;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

const BASE_URL: &str = "https://stooq.com";

/// Row shape of the Stooq daily CSV feed.
#[derive(Debug, Deserialize)]
struct QuoteRow {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Open")]
    open: f64,
    #[serde(rename = "High")]
    high: f64,
    #[serde(rename = "Low")]
    low: f64,
    #[serde(rename = "Close")]
    close: f64,
}

/// HTTP client for historical daily quotes.
#[derive(Debug, Clone)]
pub struct QuoteClient {
    client: Client,
    base_url: String,
}

impl Default for QuoteClient {
    fn default() -> Self {
        Self::new()
    }
}

impl QuoteClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point at a different feed host, e.g. a local fixture server in tests.
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch daily OHLC bars for `symbol` over `[start, end]`, oldest first.
    pub async fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ApiResult<Vec<OhlcBar>> {
        if start > end {
            return Err(ApiError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        let url = format!(
            "{}/q/d/l/?s={}&d1={}&d2={}&i=d",
            self.base_url,
            normalize_symbol(symbol),
            start.format("%Y%m%d"),
            end.format("%Y%m%d"),
        );
        debug!(%url, "fetching daily quotes");

        let body = self.client.get(&url).send().await?.text().await?;
        let bars = parse_quote_csv(&body, symbol)?;
        if bars.is_empty() {
            return Err(ApiError::NoData {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }
}

/// Stooq expects US tickers suffixed with the market, lowercased.
fn normalize_symbol(symbol: &str) -> String {
    let lower = symbol.to_lowercase();
    if lower.contains('.') {
        lower
    } else {
        format!("{lower}.us")
    }
}

fn parse_quote_csv(body: &str, symbol: &str) -> ApiResult<Vec<OhlcBar>> {
    if body.trim().is_empty() || body.starts_with("No data") {
        return Err(ApiError::NoData {
            symbol: symbol.to_string(),
        });
    }

    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let mut bars = Vec::new();
    for record in reader.deserialize::<QuoteRow>() {
        let row = record.map_err(|err| ApiError::MalformedResponse(err.to_string()))?;
        bars.push(OhlcBar {
            date: row.date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
        });
    }
    bars.sort_by_key(|bar| bar.date);
    Ok(bars)
}
