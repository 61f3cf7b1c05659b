//! Gradient-boosted tree regressor.
//!
//! Stagewise least-squares boosting over shallow regression trees: each
//! stage fits the residual of the running prediction, scaled by the
//! learning rate.

use super::tree::{DecisionTree, Splitter, TreeConfig};
use super::{check_arity, ModelError, ModelResult, Regressor};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Leaf-update rate for incremental steps.
const UPDATE_RATE: f64 = 0.1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbmParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            n_estimators: 50,
            max_depth: 3,
            learning_rate: 0.1,
            min_samples_split: 5,
            min_samples_leaf: 2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbmRegressor {
    params: GbmParams,
    base_score: f64,
    trees: Vec<DecisionTree>,
}

impl GbmRegressor {
    pub fn new(params: GbmParams) -> Self {
        Self {
            params,
            base_score: 0.0,
            trees: Vec::new(),
        }
    }

    pub fn params(&self) -> &GbmParams {
        &self.params
    }

    pub fn n_stages(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for GbmRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> ModelResult<()> {
        let n = x.nrows();
        if n == 0 || n != y.len() {
            return Err(ModelError::DimensionMismatch {
                expected: n,
                got: y.len(),
            });
        }
        if self.params.learning_rate <= 0.0 || self.params.learning_rate > 1.0 {
            return Err(ModelError::InvalidParameter(format!(
                "learning_rate must be in (0, 1], got {}",
                self.params.learning_rate
            )));
        }

        let features: Vec<Vec<f64>> = x.outer_iter().map(|r| r.to_vec()).collect();
        self.base_score = y.sum() / n as f64;
        let mut predictions = vec![self.base_score; n];
        let mut trees = Vec::with_capacity(self.params.n_estimators);

        for stage in 0..self.params.n_estimators {
            let residuals: Vec<f64> = y
                .iter()
                .zip(predictions.iter())
                .map(|(&target, &pred)| target - pred)
                .collect();

            let mut tree = DecisionTree::new(TreeConfig {
                max_depth: self.params.max_depth,
                min_samples_split: self.params.min_samples_split,
                min_samples_leaf: self.params.min_samples_leaf,
                max_features: None,
                seed: self.params.seed.wrapping_add(stage as u64),
                splitter: Splitter::Best,
            });
            tree.fit(&features, &residuals)?;

            for (pred, row) in predictions.iter_mut().zip(features.iter()) {
                *pred += self.params.learning_rate * tree.predict_one(row)?;
            }
            trees.push(tree);
        }

        self.trees = trees;
        Ok(())
    }

    fn predict_one(&self, x: &[f64]) -> ModelResult<f64> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        check_arity(self.n_features(), x.len())?;

        let mut prediction = self.base_score;
        for tree in &self.trees {
            prediction += self.params.learning_rate * tree.predict_one(x)?;
        }
        Ok(prediction)
    }

    /// Replay the boosting recurrence for one observation, nudging each
    /// stage's leaf toward the residual it should have explained.
    fn update(&mut self, x: &[f64], y: f64) -> ModelResult<()> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        check_arity(self.n_features(), x.len())?;

        let mut running = self.base_score;
        let learning_rate = self.params.learning_rate;
        for tree in &mut self.trees {
            let residual = y - running;
            tree.update_leaf(x, residual, UPDATE_RATE)?;
            running += learning_rate * tree.predict_one(x)?;
        }
        Ok(())
    }

    fn n_features(&self) -> Option<usize> {
        self.trees.first().and_then(|t| t.n_features())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quadratic() -> (Array2<f64>, Array1<f64>) {
        let rows: Vec<f64> = (0..60).map(|i| i as f64 / 6.0).collect();
        let labels: Vec<f64> = rows.iter().map(|&v| v * v).collect();
        (
            Array2::from_shape_vec((60, 1), rows).unwrap(),
            Array1::from_vec(labels),
        )
    }

    #[test]
    fn test_boosting_beats_base_score() {
        let (x, y) = quadratic();
        let mut model = GbmRegressor::new(GbmParams::default());
        model.fit(&x, &y).unwrap();
        assert_eq!(model.n_stages(), 50);

        let base_err = (model.base_score - 64.0).abs();
        let pred = model.predict_one(&[8.0]).unwrap();
        assert!((pred - 64.0).abs() < base_err);
        assert!((pred - 64.0).abs() < 10.0, "pred={pred}");
    }

    #[test]
    fn test_rejects_bad_learning_rate() {
        let (x, y) = quadratic();
        let mut model = GbmRegressor::new(GbmParams {
            learning_rate: 0.0,
            ..Default::default()
        });
        assert!(model.fit(&x, &y).is_err());
    }

    #[test]
    fn test_incremental_update_converges_on_point() {
        let (x, y) = quadratic();
        let mut model = GbmRegressor::new(GbmParams {
            n_estimators: 20,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let probe = [5.0];
        let before = (model.predict_one(&probe).unwrap() - 40.0).abs();
        for _ in 0..30 {
            model.update(&probe, 40.0).unwrap();
        }
        let after = (model.predict_one(&probe).unwrap() - 40.0).abs();
        assert!(after <= before);
    }
}
