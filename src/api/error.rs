//! Market-data API error types.

use thiserror::Error;

/// Failures while fetching historical quotes.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("quote feed returned malformed data: {0}")]
    MalformedResponse(String),

    #[error("no data returned for {symbol}")]
    NoData { symbol: String },

    #[error("invalid date range: {start} to {end}")]
    InvalidRange { start: String, end: String },
}

pub type ApiResult<T> = Result<T, ApiError>;
