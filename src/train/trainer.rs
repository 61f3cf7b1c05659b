//! Per-channel model tournament.
//!
//! For one target channel, every candidate family/hyperparameter pair is
//! fit on the chronological training split and scored by held-out MSE; the
//! global minimum becomes the channel's champion. Evaluation order is
//! fixed (family order, then ascending hyperparameters) so ties resolve to
//! the first candidate found.

use crate::config::Config;
use crate::data::Channel;
use crate::error::{DeltacastError, Result};
use crate::features::Dataset;
use crate::models::{
    metrics, ForestRegressor, GbmParams, GbmRegressor, KernelSvr, LinearSvr, ModelKind,
    Regressor, RidgeRegression,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Regularization grid shared by the ridge and SVR families.
const REG_GRID: [f64; 7] = [0.01, 0.033, 0.066, 0.1, 0.3, 0.6, 1.0];
/// Ensemble sizes for the forest families.
const TREE_GRID: [usize; 4] = [5, 10, 15, 20];
/// Depth x size grid for gradient boosting.
const GBM_DEPTHS: [usize; 2] = [2, 3];
const GBM_SIZES: [usize; 2] = [25, 50];

/// The retained best model for one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChampionModel {
    pub channel: Channel,
    pub model: ModelKind,
    pub holdout_rmse: f64,
    pub n_features: usize,
}

impl ChampionModel {
    /// Predict this channel's delta, surfacing arity problems as
    /// `FeatureShapeMismatch` before any numeric work happens downstream.
    pub fn predict(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.n_features {
            return Err(DeltacastError::FeatureShapeMismatch {
                channel: self.channel,
                expected: self.n_features,
                got: features.len(),
            });
        }
        self.model
            .predict_one(features)
            .map_err(|err| DeltacastError::FitFailed(err.to_string()))
    }

    /// One incremental fit step on a newly realized observation.
    pub fn update(&mut self, features: &[f64], label: f64) -> Result<()> {
        if features.len() != self.n_features {
            return Err(DeltacastError::FeatureShapeMismatch {
                channel: self.channel,
                expected: self.n_features,
                got: features.len(),
            });
        }
        self.model
            .update(features, label)
            .map_err(|err| DeltacastError::FitFailed(err.to_string()))
    }
}

/// Candidate models in fixed evaluation order.
fn candidates(seed: u64) -> Vec<ModelKind> {
    let mut list = Vec::new();
    for &alpha in &REG_GRID {
        list.push(ModelKind::Ridge(RidgeRegression::new(alpha)));
    }
    for &c in &REG_GRID {
        list.push(ModelKind::LinearSvr(LinearSvr::new(c)));
        list.push(ModelKind::KernelSvr(KernelSvr::new(c)));
    }
    for &n_trees in &TREE_GRID {
        list.push(ModelKind::Forest(ForestRegressor::random_forest(n_trees, seed)));
        list.push(ModelKind::Forest(ForestRegressor::extra_trees(n_trees, seed)));
    }
    for &max_depth in &GBM_DEPTHS {
        for &n_estimators in &GBM_SIZES {
            list.push(ModelKind::Gbm(GbmRegressor::new(GbmParams {
                n_estimators,
                max_depth,
                seed,
                ..Default::default()
            })));
        }
    }
    list
}

/// Train every candidate for one channel and keep the best.
pub fn train_best(dataset: &Dataset, channel: Channel, config: &Config) -> Result<ChampionModel> {
    let split = dataset.chronological_split(config.train_fraction)?;
    let x_train = split.train.features_array();
    let y_train = split.train.labels_array();
    let n_features = dataset.n_features();

    info!(
        %channel,
        train_rows = split.train.n_samples(),
        holdout_rows = split.holdout.n_samples(),
        "starting model tournament"
    );

    let mut best: Option<(ModelKind, f64)> = None;

    for mut candidate in candidates(config.seed) {
        let family = candidate.family();
        let params = candidate.describe();

        if let Err(err) = candidate.fit(&x_train, &y_train) {
            warn!(%channel, family, %params, %err, "candidate fit failed, skipping");
            continue;
        }

        let mut predictions = Vec::with_capacity(split.holdout.n_samples());
        let mut failed = false;
        for row in &split.holdout.features {
            match candidate.predict_one(row) {
                Ok(pred) => predictions.push(pred),
                Err(err) => {
                    warn!(%channel, family, %params, %err, "holdout prediction failed, skipping");
                    failed = true;
                    break;
                }
            }
        }
        if failed {
            continue;
        }

        let mse = metrics::mean_squared_error(&split.holdout.labels, &predictions);
        if !mse.is_finite() {
            warn!(%channel, family, %params, mse, "non-finite holdout score, skipping");
            continue;
        }

        if best.as_ref().map_or(true, |(_, best_mse)| mse < *best_mse) {
            info!(%channel, family, %params, mse, "new best candidate");
            best = Some((candidate, mse));
        }
    }

    let (model, mse) = best.ok_or(DeltacastError::TrainingDataTooSmall {
        train: split.train.n_samples(),
        holdout: split.holdout.n_samples(),
    })?;

    info!(
        %channel,
        family = model.family(),
        params = %model.describe(),
        rmse = mse.sqrt(),
        "champion selected"
    );

    Ok(ChampionModel {
        channel,
        model,
        holdout_rmse: mse.sqrt(),
        n_features,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LagPolicy;
    use crate::data::DeltaBar;
    use crate::features::build_rows;
    use chrono::NaiveDate;

    fn synthetic_rows(n: u32) -> Vec<crate::features::FeatureRow> {
        // Deltas with structure a linear model can pick up: today's closed
        // delta follows yesterday's opend delta.
        let deltas: Vec<DeltaBar> = (0..n)
            .map(|i| {
                let wave = ((i as f64) * 0.7).sin();
                DeltaBar {
                    date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
                        + chrono::Duration::days(i as i64),
                    opend: wave,
                    highd: wave.abs() + 0.5,
                    lowd: -wave.abs() - 0.5,
                    closed: ((i as f64 - 1.0) * 0.7).sin() * 0.8,
                }
            })
            .collect();
        build_rows(&deltas, LagPolicy::DropFirst).unwrap()
    }

    fn synthetic_dataset(n: u32) -> Dataset {
        Dataset::from_rows(&synthetic_rows(n), Channel::Closed, false)
    }

    #[test]
    fn test_champion_selected_on_structured_data() {
        let config = Config::default();
        let dataset = synthetic_dataset(60);
        let champion = train_best(&dataset, Channel::Closed, &config).unwrap();

        assert_eq!(champion.channel, Channel::Closed);
        assert_eq!(champion.n_features, 4);
        assert!(champion.holdout_rmse.is_finite());
        assert!(champion.holdout_rmse < 1.0);
    }

    #[test]
    fn test_tournament_with_timestamp_feature() {
        let config = Config::default();
        let dataset = Dataset::from_rows(&synthetic_rows(60), Channel::Opend, true);
        let champion = train_best(&dataset, Channel::Opend, &config).unwrap();

        assert_eq!(champion.n_features, 5);
        assert!(champion.holdout_rmse.is_finite());
    }

    #[test]
    fn test_too_small_dataset_is_rejected() {
        let config = Config::default();
        let dataset = synthetic_dataset(3);
        assert!(matches!(
            train_best(&dataset, Channel::Closed, &config),
            Err(DeltacastError::TrainingDataTooSmall { .. })
        ));
    }

    #[test]
    fn test_champion_predict_checks_arity() {
        let config = Config::default();
        let dataset = synthetic_dataset(40);
        let champion = train_best(&dataset, Channel::Closed, &config).unwrap();

        assert!(matches!(
            champion.predict(&[1.0, 2.0]),
            Err(DeltacastError::FeatureShapeMismatch {
                expected: 4,
                got: 2,
                ..
            })
        ));
    }
}
