//! Tree ensembles: random forest and extra-trees.

use super::tree::{DecisionTree, Splitter, TreeConfig};
use super::{check_arity, ModelError, ModelResult, Regressor};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Leaf-update rate for incremental steps, damped across the ensemble.
const UPDATE_RATE: f64 = 0.05;

/// Ensemble flavor. Extra-trees skips bootstrap sampling and draws random
/// split thresholds, as its name suggests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForestKind {
    RandomForest,
    ExtraTrees,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features per split (None = n/3, the regression default).
    pub max_features: Option<usize>,
    pub seed: u64,
    pub kind: ForestKind,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 10,
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: None,
            seed: 42,
            kind: ForestKind::RandomForest,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestRegressor {
    config: ForestConfig,
    trees: Vec<DecisionTree>,
}

impl ForestRegressor {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
        }
    }

    pub fn random_forest(n_trees: usize, seed: u64) -> Self {
        Self::new(ForestConfig {
            n_trees,
            seed,
            kind: ForestKind::RandomForest,
            ..Default::default()
        })
    }

    pub fn extra_trees(n_trees: usize, seed: u64) -> Self {
        Self::new(ForestConfig {
            n_trees,
            seed,
            kind: ForestKind::ExtraTrees,
            ..Default::default()
        })
    }

    pub fn kind(&self) -> ForestKind {
        self.config.kind
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_trees_configured(&self) -> usize {
        self.config.n_trees
    }
}

impl Regressor for ForestRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> ModelResult<()> {
        let n = x.nrows();
        if n == 0 || n != y.len() {
            return Err(ModelError::DimensionMismatch {
                expected: n,
                got: y.len(),
            });
        }
        if self.config.n_trees == 0 {
            return Err(ModelError::InvalidParameter("n_trees must be positive".into()));
        }

        let features: Vec<Vec<f64>> = x.outer_iter().map(|r| r.to_vec()).collect();
        let labels: Vec<f64> = y.to_vec();
        let n_features = x.ncols();
        let config = self.config.clone();
        let max_features = config
            .max_features
            .unwrap_or_else(|| (n_features / 3).max(1));
        let splitter = match config.kind {
            ForestKind::RandomForest => Splitter::Best,
            ForestKind::ExtraTrees => Splitter::Random,
        };
        let bootstrap = config.kind == ForestKind::RandomForest;

        let trees: ModelResult<Vec<DecisionTree>> = (0..config.n_trees)
            .into_par_iter()
            .map(|i| {
                let tree_seed = config.seed.wrapping_add(i as u64);
                let tree_config = TreeConfig {
                    max_depth: config.max_depth,
                    min_samples_split: config.min_samples_split,
                    min_samples_leaf: config.min_samples_leaf,
                    max_features: Some(max_features),
                    seed: tree_seed,
                    splitter,
                };
                let mut tree = DecisionTree::new(tree_config);

                if bootstrap {
                    let mut rng = ChaCha8Rng::seed_from_u64(tree_seed);
                    let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                    let boot_features: Vec<Vec<f64>> =
                        sample.iter().map(|&idx| features[idx].clone()).collect();
                    let boot_labels: Vec<f64> = sample.iter().map(|&idx| labels[idx]).collect();
                    tree.fit(&boot_features, &boot_labels)?;
                } else {
                    tree.fit(&features, &labels)?;
                }
                Ok(tree)
            })
            .collect();

        self.trees = trees?;
        Ok(())
    }

    fn predict_one(&self, x: &[f64]) -> ModelResult<f64> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        check_arity(self.n_features(), x.len())?;

        let sum: f64 = self
            .trees
            .iter()
            .map(|t| t.predict_one(x))
            .collect::<ModelResult<Vec<f64>>>()?
            .iter()
            .sum();
        Ok(sum / self.trees.len() as f64)
    }

    fn update(&mut self, x: &[f64], y: f64) -> ModelResult<()> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        check_arity(self.n_features(), x.len())?;
        for tree in &mut self.trees {
            tree.update_leaf(x, y, UPDATE_RATE)?;
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

    fn noisy_linear() -> (Array2<f64>, Array1<f64>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..120 {
            let x1 = i as f64 / 12.0;
            let x2 = ((i * 5) % 11) as f64;
            rows.extend_from_slice(&[x1, x2]);
            labels.push(x1 * 2.0 + 0.1 * (i % 3) as f64);
        }
        (
            Array2::from_shape_vec((120, 2), rows).unwrap(),
            Array1::from_vec(labels),
        )
    }

    #[test]
    fn test_forest_fits_and_predicts() {
        let (x, y) = noisy_linear();
        let mut forest = ForestRegressor::random_forest(10, 7);
        forest.fit(&x, &y).unwrap();

        assert_eq!(forest.n_trees(), 10);
        let pred = forest.predict_one(&[5.0, 3.0]).unwrap();
        assert!((pred - 10.0).abs() < 2.5, "pred={pred}");
    }

    #[test]
    fn test_extra_trees_variant() {
        let (x, y) = noisy_linear();
        let mut forest = ForestRegressor::extra_trees(10, 7);
        forest.fit(&x, &y).unwrap();
        assert_eq!(forest.kind(), ForestKind::ExtraTrees);

        let low = forest.predict_one(&[1.0, 3.0]).unwrap();
        let high = forest.predict_one(&[9.0, 3.0]).unwrap();
        assert!(high > low);
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let (x, y) = noisy_linear();
        let mut a = ForestRegressor::random_forest(5, 11);
        let mut b = ForestRegressor::random_forest(5, 11);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        let probe = [4.2, 1.0];
        assert_eq!(a.predict_one(&probe).unwrap(), b.predict_one(&probe).unwrap());
    }

    #[test]
    fn test_update_shifts_ensemble() {
        let (x, y) = noisy_linear();
        let mut forest = ForestRegressor::random_forest(5, 3);
        forest.fit(&x, &y).unwrap();

        let probe = [5.0, 3.0];
        let before = forest.predict_one(&probe).unwrap();
        for _ in 0..50 {
            forest.update(&probe, 42.0).unwrap();
        }
        let after = forest.predict_one(&probe).unwrap();
        assert!((after - 42.0).abs() < (before - 42.0).abs());
    }
}
