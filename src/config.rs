//! Run configuration.
//!
//! Loaded once at startup and passed by reference into each component;
//! immutable thereafter.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Treatment of the first delta bar when building feature rows.
///
/// The same policy must flow through training and serving; it is therefore
/// part of the run configuration rather than a per-call argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LagPolicy {
    /// The first delta bar contributes no feature row (n bars -> n-1 rows).
    DropFirst,
    /// The first delta bar gets zero-filled lag features (n bars -> n rows).
    ZeroFill,
}

impl Default for LagPolicy {
    fn default() -> Self {
        LagPolicy::DropFirst
    }
}

/// Immutable run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Instrument symbols tracked by the fetch command.
    pub symbols: Vec<String>,
    /// Symbol served by the prediction endpoint.
    pub primary_symbol: String,
    /// Directory holding the per-symbol OHLC and delta CSV stores.
    pub data_dir: PathBuf,
    /// Directory holding champion model artifacts.
    pub model_dir: PathBuf,
    /// Suffix appended to a symbol's file stem for its delta store.
    pub delta_suffix: String,
    /// First day of the historical window fetched by default.
    pub history_start: NaiveDate,
    /// Fraction of rows used for training in the chronological split.
    pub train_fraction: f64,
    /// First-delta-bar policy, applied identically at train and serve time.
    pub lag_policy: LagPolicy,
    /// Whether the date ordinal is part of the feature vector.
    pub include_timestamp: bool,
    /// Seed for bootstrap sampling and feature subsetting.
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbols: vec![
                "AAPL".to_string(),
                "002502.SZ".to_string(),
                "LNVGY".to_string(),
                "APH".to_string(),
                "DIOD".to_string(),
                "INTC".to_string(),
                "HPQ".to_string(),
                "DELL".to_string(),
                "SNE".to_string(),
            ],
            primary_symbol: "AAPL".to_string(),
            data_dir: PathBuf::from("markets"),
            model_dir: PathBuf::from("models"),
            delta_suffix: "_deviated".to_string(),
            history_start: NaiveDate::from_ymd_opt(2017, 1, 1).unwrap(),
            train_fraction: 0.8,
            lag_policy: LagPolicy::DropFirst,
            include_timestamp: true,
            seed: 42,
        }
    }
}

impl Config {
    /// Path of a symbol's OHLC store.
    pub fn ohlc_path(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(format!("{symbol}.csv"))
    }

    /// Path of a symbol's delta store.
    pub fn delta_path(&self, symbol: &str) -> PathBuf {
        self.data_dir
            .join(format!("{symbol}{}.csv", self.delta_suffix))
    }

    /// Path of the lagged-feature dataset for the primary symbol.
    pub fn dataset_path(&self) -> PathBuf {
        self.data_dir.join("final_dataset.csv")
    }

    /// Number of features each model is trained on.
    pub fn n_features(&self) -> usize {
        if self.include_timestamp {
            5
        } else {
            4
        }
    }

    /// Override the data directory, e.g. for tests.
    pub fn with_data_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.data_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_model_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.model_dir = dir.as_ref().to_path_buf();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_paths() {
        let config = Config::default().with_data_dir("/tmp/markets");
        assert_eq!(
            config.ohlc_path("AAPL"),
            PathBuf::from("/tmp/markets/AAPL.csv")
        );
        assert_eq!(
            config.delta_path("AAPL"),
            PathBuf::from("/tmp/markets/AAPL_deviated.csv")
        );
    }

    #[test]
    fn test_feature_arity_follows_timestamp_flag() {
        let mut config = Config::default();
        assert_eq!(config.n_features(), 5);
        config.include_timestamp = false;
        assert_eq!(config.n_features(), 4);
    }
}
