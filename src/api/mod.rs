//! External market-data collaborator.

pub mod client;
pub mod error;

pub use client::QuoteClient;
pub use error::{ApiError, ApiResult};
