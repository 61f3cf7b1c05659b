//! Regression model families.
//!
//! Every family implements [`Regressor`]; the trainer selects among tagged
//! [`ModelKind`] variants rather than inspecting types at runtime, and a
//! fitted champion round-trips through serde unchanged.

pub mod forest;
pub mod gbm;
pub mod metrics;
pub mod ridge;
pub mod svr;
pub mod tree;

pub use forest::{ForestKind, ForestRegressor};
pub use gbm::{GbmParams, GbmRegressor};
pub use metrics::RegressionMetrics;
pub use ridge::RidgeRegression;
pub use svr::{KernelSvr, LinearSvr};
pub use tree::{DecisionTree, Splitter, TreeConfig};

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors shared by all model families.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model has not been fitted yet")]
    NotFitted,

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("invalid hyperparameter: {0}")]
    InvalidParameter(String),

    #[error("matrix is singular and cannot be solved")]
    SingularMatrix,
}

pub type ModelResult<T> = Result<T, ModelError>;

/// A trainable, incrementally updatable regressor.
pub trait Regressor {
    /// Fit from scratch on a design matrix and label vector.
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> ModelResult<()>;

    /// Predict a single value for one feature vector.
    fn predict_one(&self, x: &[f64]) -> ModelResult<f64>;

    /// One incremental fit step on a single new observation.
    fn update(&mut self, x: &[f64], y: f64) -> ModelResult<()>;

    /// Feature arity the model was fitted on, if fitted.
    fn n_features(&self) -> Option<usize>;
}

/// Tagged union over the candidate families.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModelKind {
    Ridge(RidgeRegression),
    LinearSvr(LinearSvr),
    KernelSvr(KernelSvr),
    Forest(ForestRegressor),
    Gbm(GbmRegressor),
}

impl ModelKind {
    /// Family tag for logs and artifact metadata.
    pub fn family(&self) -> &'static str {
        match self {
            ModelKind::Ridge(_) => "ridge",
            ModelKind::LinearSvr(_) => "linear_svr",
            ModelKind::KernelSvr(_) => "kernel_svr",
            ModelKind::Forest(m) => match m.kind() {
                ForestKind::RandomForest => "random_forest",
                ForestKind::ExtraTrees => "extra_trees",
            },
            ModelKind::Gbm(_) => "gbm",
        }
    }

    /// Short hyperparameter description for logs.
    pub fn describe(&self) -> String {
        match self {
            ModelKind::Ridge(m) => format!("alpha={}", m.alpha()),
            ModelKind::LinearSvr(m) => format!("c={}", m.c()),
            ModelKind::KernelSvr(m) => format!("c={}", m.c()),
            ModelKind::Forest(m) => format!("n_trees={}", m.n_trees_configured()),
            ModelKind::Gbm(m) => {
                format!("depth={} n_trees={}", m.params().max_depth, m.params().n_estimators)
            }
        }
    }

    fn inner(&self) -> &dyn Regressor {
        match self {
            ModelKind::Ridge(m) => m,
            ModelKind::LinearSvr(m) => m,
            ModelKind::KernelSvr(m) => m,
            ModelKind::Forest(m) => m,
            ModelKind::Gbm(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Regressor {
        match self {
            ModelKind::Ridge(m) => m,
            ModelKind::LinearSvr(m) => m,
            ModelKind::KernelSvr(m) => m,
            ModelKind::Forest(m) => m,
            ModelKind::Gbm(m) => m,
        }
    }
}

impl Regressor for ModelKind {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> ModelResult<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict_one(&self, x: &[f64]) -> ModelResult<f64> {
        self.inner().predict_one(x)
    }

    fn update(&mut self, x: &[f64], y: f64) -> ModelResult<()> {
        self.inner_mut().update(x, y)
    }

    fn n_features(&self) -> Option<usize> {
        self.inner().n_features()
    }
}

/// Check one feature vector against a fitted model's arity.
pub(crate) fn check_arity(expected: Option<usize>, got: usize) -> ModelResult<()> {
    match expected {
        Some(expected) if expected != got => Err(ModelError::DimensionMismatch { expected, got }),
        None => Err(ModelError::NotFitted),
        _ => Ok(()),
    }
}
