//! Training dataset assembled from feature rows.

use super::builder::FeatureRow;
use crate::data::Channel;
use crate::error::{DeltacastError, Result};
use chrono::NaiveDate;
use ndarray::{Array1, Array2};

/// Feature matrix plus labels for one target channel, kept in
/// chronological order.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<f64>,
    pub feature_names: Vec<String>,
    pub dates: Vec<NaiveDate>,
}

/// Chronological train/holdout split.
#[derive(Debug)]
pub struct Split {
    pub train: Dataset,
    pub holdout: Dataset,
}

impl Dataset {
    /// Materialize a dataset for `channel` from lagged rows.
    pub fn from_rows(rows: &[FeatureRow], channel: Channel, include_timestamp: bool) -> Self {
        let mut feature_names = Vec::new();
        if include_timestamp {
            feature_names.push("date_ms".to_string());
        }
        feature_names.extend(
            ["prev_opend", "prev_closed", "prev_highd", "prev_lowd"]
                .iter()
                .map(|s| s.to_string()),
        );

        Self {
            features: rows.iter().map(|r| r.features(include_timestamp)).collect(),
            labels: rows.iter().map(|r| r.label(channel)).collect(),
            feature_names,
            dates: rows.iter().map(|r| r.date).collect(),
        }
    }

    pub fn n_samples(&self) -> usize {
        self.features.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Feature matrix as ndarray, shape (n_samples, n_features).
    pub fn features_array(&self) -> Array2<f64> {
        let n_samples = self.n_samples();
        let n_features = self.n_features();
        if n_samples == 0 {
            return Array2::zeros((0, n_features));
        }
        Array2::from_shape_fn((n_samples, n_features), |(i, j)| self.features[i][j])
    }

    pub fn labels_array(&self) -> Array1<f64> {
        Array1::from_vec(self.labels.clone())
    }

    /// Split chronologically: the first `train_fraction` of rows train, the
    /// rest are held out. No shuffling, so the holdout never leaks into the
    /// past.
    pub fn chronological_split(&self, train_fraction: f64) -> Result<Split> {
        let n = self.n_samples();
        let holdout_size = ((1.0 - train_fraction) * n as f64) as usize;
        let train_size = n - holdout_size;
        if train_size == 0 || holdout_size == 0 {
            return Err(DeltacastError::TrainingDataTooSmall {
                train: train_size,
                holdout: holdout_size,
            });
        }

        Ok(Split {
            train: self.slice(0, train_size),
            holdout: self.slice(train_size, n),
        })
    }

    fn slice(&self, start: usize, end: usize) -> Dataset {
        Dataset {
            features: self.features[start..end].to_vec(),
            labels: self.labels[start..end].to_vec(),
            feature_names: self.feature_names.clone(),
            dates: self.dates[start..end].to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LagPolicy;
    use crate::data::DeltaBar;
    use crate::features::builder::build_rows;

    fn rows(n: u32) -> Vec<FeatureRow> {
        let deltas: Vec<DeltaBar> = (0..n)
            .map(|i| DeltaBar {
                date: NaiveDate::from_ymd_opt(2020, 1, 1 + i).unwrap(),
                opend: i as f64,
                highd: 1.0,
                lowd: -1.0,
                closed: i as f64 * 0.5,
            })
            .collect();
        build_rows(&deltas, LagPolicy::DropFirst).unwrap()
    }

    #[test]
    fn test_split_preserves_order() {
        let dataset = Dataset::from_rows(&rows(11), Channel::Closed, true);
        assert_eq!(dataset.n_samples(), 10);
        assert_eq!(dataset.n_features(), 5);

        let split = dataset.chronological_split(0.8).unwrap();
        assert_eq!(split.train.n_samples(), 8);
        assert_eq!(split.holdout.n_samples(), 2);
        assert!(split.train.dates.last().unwrap() < split.holdout.dates.first().unwrap());
    }

    #[test]
    fn test_two_rows_is_too_small() {
        let dataset = Dataset::from_rows(&rows(3), Channel::Closed, false);
        assert_eq!(dataset.n_samples(), 2);
        match dataset.chronological_split(0.8) {
            Err(DeltacastError::TrainingDataTooSmall { train: 2, holdout: 0 }) => {}
            other => panic!("expected TrainingDataTooSmall, got {other:?}"),
        }
    }
}
