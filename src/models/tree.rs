//! Regression decision tree.
//!
//! Building block for the ensemble families. Splits minimize weighted
//! variance; the splitter is either exhaustive over observed thresholds or
//! a single random threshold per candidate feature (the extra-trees
//! variant).

use super::{check_arity, ModelError, ModelResult};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Threshold selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Splitter {
    /// Evaluate every midpoint between consecutive observed values.
    Best,
    /// Draw one uniform threshold per candidate feature.
    Random,
}

/// Decision tree configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split (None = all).
    pub max_features: Option<usize>,
    pub seed: u64,
    pub splitter: Splitter,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: None,
            seed: 42,
            splitter: Splitter::Best,
        }
    }
}

/// Tree node. Leaves carry the mean label of their samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub feature_idx: Option<usize>,
    pub threshold: Option<f64>,
    pub value: f64,
    pub n_samples: usize,
    pub left: Option<Box<TreeNode>>,
    pub right: Option<Box<TreeNode>>,
}

impl TreeNode {
    fn leaf(value: f64, n_samples: usize) -> Self {
        Self {
            feature_idx: None,
            threshold: None,
            value,
            n_samples,
            left: None,
            right: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    config: TreeConfig,
    root: Option<TreeNode>,
    n_features: usize,
}

struct BestSplit {
    feature_idx: usize,
    threshold: f64,
    score: f64,
}

impl DecisionTree {
    pub fn new(config: TreeConfig) -> Self {
        Self {
            config,
            root: None,
            n_features: 0,
        }
    }

    /// Fit on row-major features and labels.
    pub fn fit(&mut self, features: &[Vec<f64>], labels: &[f64]) -> ModelResult<()> {
        if features.is_empty() || features.len() != labels.len() {
            return Err(ModelError::DimensionMismatch {
                expected: features.len(),
                got: labels.len(),
            });
        }
        self.n_features = features[0].len();
        let indices: Vec<usize> = (0..features.len()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        self.root = Some(self.build_node(features, labels, &indices, 0, &mut rng));
        Ok(())
    }

    pub fn predict_one(&self, x: &[f64]) -> ModelResult<f64> {
        let root = self.root.as_ref().ok_or(ModelError::NotFitted)?;
        check_arity(Some(self.n_features), x.len())?;

        let mut node = root;
        while let (Some(feature_idx), Some(threshold)) = (node.feature_idx, node.threshold) {
            node = if x[feature_idx] <= threshold {
                node.left.as_deref().unwrap_or(node)
            } else {
                node.right.as_deref().unwrap_or(node)
            };
            if node.is_leaf() {
                break;
            }
        }
        Ok(node.value)
    }

    /// Nudge the leaf that `x` lands in toward `target` by `rate`.
    pub fn update_leaf(&mut self, x: &[f64], target: f64, rate: f64) -> ModelResult<()> {
        if self.root.is_none() {
            return Err(ModelError::NotFitted);
        }
        check_arity(Some(self.n_features), x.len())?;

        let mut node = self.root.as_mut().ok_or(ModelError::NotFitted)?;
        loop {
            if node.is_leaf() {
                node.value += rate * (target - node.value);
                return Ok(());
            }
            let feature_idx = node.feature_idx.unwrap_or(0);
            let threshold = node.threshold.unwrap_or(0.0);
            node = if x[feature_idx] <= threshold {
                node.left.as_deref_mut().ok_or(ModelError::NotFitted)?
            } else {
                node.right.as_deref_mut().ok_or(ModelError::NotFitted)?
            };
        }
    }

    pub fn n_features(&self) -> Option<usize> {
        if self.root.is_some() {
            Some(self.n_features)
        } else {
            None
        }
    }

    pub fn depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            if node.is_leaf() {
                1
            } else {
                1 + node
                    .left
                    .as_deref()
                    .map(node_depth)
                    .unwrap_or(0)
                    .max(node.right.as_deref().map(node_depth).unwrap_or(0))
            }
        }
        self.root.as_ref().map(node_depth).unwrap_or(0)
    }

    fn build_node(
        &self,
        features: &[Vec<f64>],
        labels: &[f64],
        indices: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let mean = indices.iter().map(|&i| labels[i]).sum::<f64>() / indices.len() as f64;

        if depth >= self.config.max_depth
            || indices.len() < self.config.min_samples_split
            || variance(labels, indices) < 1e-12
        {
            return TreeNode::leaf(mean, indices.len());
        }

        let split = match self.find_split(features, labels, indices, rng) {
            Some(split) => split,
            None => return TreeNode::leaf(mean, indices.len()),
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| features[i][split.feature_idx] <= split.threshold);

        if left_idx.len() < self.config.min_samples_leaf
            || right_idx.len() < self.config.min_samples_leaf
        {
            return TreeNode::leaf(mean, indices.len());
        }

        let left = self.build_node(features, labels, &left_idx, depth + 1, rng);
        let right = self.build_node(features, labels, &right_idx, depth + 1, rng);

        TreeNode {
            feature_idx: Some(split.feature_idx),
            threshold: Some(split.threshold),
            value: mean,
            n_samples: indices.len(),
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
        }
    }

    fn find_split(
        &self,
        features: &[Vec<f64>],
        labels: &[f64],
        indices: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Option<BestSplit> {
        let candidate_features = self.candidate_features(rng);
        let mut best: Option<BestSplit> = None;

        for &feature_idx in &candidate_features {
            let thresholds = self.thresholds_for(features, indices, feature_idx, rng);
            for threshold in thresholds {
                let score = split_score(features, labels, indices, feature_idx, threshold);
                if let Some(score) = score {
                    if best.as_ref().map_or(true, |b| score < b.score) {
                        best = Some(BestSplit {
                            feature_idx,
                            threshold,
                            score,
                        });
                    }
                }
            }
        }
        best
    }

    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let k = self
            .config
            .max_features
            .unwrap_or(self.n_features)
            .clamp(1, self.n_features);
        if k >= self.n_features {
            return (0..self.n_features).collect();
        }
        // Sample k distinct feature indices.
        let mut chosen: Vec<usize> = (0..self.n_features).collect();
        for i in 0..k {
            let j = rng.gen_range(i..chosen.len());
            chosen.swap(i, j);
        }
        chosen.truncate(k);
        chosen
    }

    fn thresholds_for(
        &self,
        features: &[Vec<f64>],
        indices: &[usize],
        feature_idx: usize,
        rng: &mut ChaCha8Rng,
    ) -> Vec<f64> {
        let mut values: Vec<f64> = indices.iter().map(|&i| features[i][feature_idx]).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        values.dedup();
        if values.len() < 2 {
            return Vec::new();
        }

        match self.config.splitter {
            Splitter::Best => values
                .windows(2)
                .map(|pair| (pair[0] + pair[1]) / 2.0)
                .collect(),
            Splitter::Random => {
                let lo = values[0];
                let hi = values[values.len() - 1];
                vec![rng.gen_range(lo..hi)]
            }
        }
    }
}

fn variance(labels: &[f64], indices: &[usize]) -> f64 {
    let n = indices.len() as f64;
    let mean = indices.iter().map(|&i| labels[i]).sum::<f64>() / n;
    indices.iter().map(|&i| (labels[i] - mean).powi(2)).sum::<f64>() / n
}

/// Weighted child variance for one candidate split; None when a side is empty.
fn split_score(
    features: &[Vec<f64>],
    labels: &[f64],
    indices: &[usize],
    feature_idx: usize,
    threshold: f64,
) -> Option<f64> {
    let (left, right): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .copied()
        .partition(|&i| features[i][feature_idx] <= threshold);
    if left.is_empty() || right.is_empty() {
        return None;
    }
    let n = indices.len() as f64;
    Some(
        variance(labels, &left) * left.len() as f64 / n
            + variance(labels, &right) * right.len() as f64 / n,
    )
}
