//! Crate-wide error taxonomy.

use crate::data::Channel;
use thiserror::Error;

/// Errors surfaced by the forecasting pipeline.
#[derive(Error, Debug)]
pub enum DeltacastError {
    #[error("insufficient history: need at least {needed} bars, got {got}")]
    InsufficientHistory { needed: usize, got: usize },

    #[error("empty series: need at least {needed} delta bars, got {got}")]
    EmptySeries { needed: usize, got: usize },

    #[error("training data too small: {train} train rows, {holdout} holdout rows")]
    TrainingDataTooSmall { train: usize, holdout: usize },

    #[error("no champion model found for channel {0}")]
    ModelNotFound(Channel),

    #[error("feature shape mismatch: model for {channel} expects {expected} features, got {got}")]
    FeatureShapeMismatch {
        channel: Channel,
        expected: usize,
        got: usize,
    },

    #[error("no feature row for date {0}")]
    DateNotFound(chrono::NaiveDate),

    #[error("market data unavailable: {0}")]
    DataUnavailable(String),

    #[error("persistence failure at {path}: {source}")]
    PersistenceFailure {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("model artifact corrupt at {path}: {reason}")]
    CorruptArtifact { path: String, reason: String },

    #[error("model fit failed: {0}")]
    FitFailed(String),
}

pub type Result<T> = std::result::Result<T, DeltacastError>;

impl From<crate::api::ApiError> for DeltacastError {
    fn from(err: crate::api::ApiError) -> Self {
        DeltacastError::DataUnavailable(err.to_string())
    }
}
