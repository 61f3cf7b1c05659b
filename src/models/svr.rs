//! Support-vector regression.
//!
//! Both variants minimize the epsilon-insensitive loss with L2 regularization
//! by deterministic subgradient descent over the training rows, with inputs
//! standardized by running statistics captured at fit time. The kernel
//! variant keeps the training rows as support points and learns representer
//! coefficients.

use super::{check_arity, ModelError, ModelResult, Regressor};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

const EPSILON: f64 = 0.01;
const EPOCHS: usize = 200;
const KERNEL_EPOCHS: usize = 50;
const UPDATE_LR: f64 = 1e-3;

/// Per-feature standardization captured at fit time.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Scaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl Scaler {
    fn fit(x: &Array2<f64>) -> Self {
        let n = x.nrows() as f64;
        let n_features = x.ncols();
        let mut means = vec![0.0; n_features];
        let mut stds = vec![0.0; n_features];
        for j in 0..n_features {
            let col = x.column(j);
            let mean = col.sum() / n;
            let var = col.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / n;
            means[j] = mean;
            stds[j] = var.sqrt();
        }
        Self { means, stds }
    }

    fn transform(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(self.means.iter().zip(self.stds.iter()))
            .map(|(&v, (&m, &s))| if s > 1e-12 { (v - m) / s } else { v - m })
            .collect()
    }
}

/// Linear epsilon-SVR trained in the primal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSvr {
    c: f64,
    weights: Option<Vec<f64>>,
    bias: f64,
    scaler: Option<Scaler>,
}

impl LinearSvr {
    pub fn new(c: f64) -> Self {
        Self {
            c,
            weights: None,
            bias: 0.0,
            scaler: None,
        }
    }

    pub fn c(&self) -> f64 {
        self.c
    }
}

impl Regressor for LinearSvr {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> ModelResult<()> {
        if self.c <= 0.0 {
            return Err(ModelError::InvalidParameter(format!(
                "C must be positive, got {}",
                self.c
            )));
        }
        let n = x.nrows();
        if n == 0 || n != y.len() {
            return Err(ModelError::DimensionMismatch {
                expected: n,
                got: y.len(),
            });
        }

        let scaler = Scaler::fit(x);
        let rows: Vec<Vec<f64>> = x
            .outer_iter()
            .map(|r| scaler.transform(&r.to_vec()))
            .collect();

        let n_features = x.ncols();
        let mut weights = vec![0.0; n_features];
        let mut bias = 0.0;
        // Regularization strength is the inverse of C, as in the usual
        // SVR objective 0.5||w||^2 + C * sum(loss).
        let lambda = 1.0 / (self.c * n as f64);

        for epoch in 0..EPOCHS {
            let lr = 0.1 / (1.0 + epoch as f64 * 0.05);
            for (row, &target) in rows.iter().zip(y.iter()) {
                let pred: f64 =
                    weights.iter().zip(row.iter()).map(|(&w, &v)| w * v).sum::<f64>() + bias;
                let error = pred - target;

                if error.abs() > EPSILON {
                    let sign = error.signum();
                    for (w, &v) in weights.iter_mut().zip(row.iter()) {
                        *w -= lr * (sign * v + lambda * *w);
                    }
                    bias -= lr * sign;
                } else {
                    for w in weights.iter_mut() {
                        *w -= lr * lambda * *w;
                    }
                }
            }
        }

        self.weights = Some(weights);
        self.bias = bias;
        self.scaler = Some(scaler);
        Ok(())
    }

    fn predict_one(&self, x: &[f64]) -> ModelResult<f64> {
        let weights = self.weights.as_ref().ok_or(ModelError::NotFitted)?;
        let scaler = self.scaler.as_ref().ok_or(ModelError::NotFitted)?;
        check_arity(Some(weights.len()), x.len())?;

        let row = scaler.transform(x);
        Ok(weights.iter().zip(row.iter()).map(|(&w, &v)| w * v).sum::<f64>() + self.bias)
    }

    fn update(&mut self, x: &[f64], y: f64) -> ModelResult<()> {
        let error = self.predict_one(x)? - y;
        if error.abs() <= EPSILON {
            return Ok(());
        }
        let sign = error.signum();
        let scaler = self.scaler.as_ref().ok_or(ModelError::NotFitted)?;
        let row = scaler.transform(x);
        let weights = self.weights.as_mut().ok_or(ModelError::NotFitted)?;
        for (w, &v) in weights.iter_mut().zip(row.iter()) {
            *w -= UPDATE_LR * sign * v.clamp(-10.0, 10.0);
        }
        self.bias -= UPDATE_LR * sign;
        Ok(())
    }

    fn n_features(&self) -> Option<usize> {
        self.weights.as_ref().map(|w| w.len())
    }
}

/// RBF-kernel epsilon-SVR in representer form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelSvr {
    c: f64,
    gamma: Option<f64>,
    support: Vec<Vec<f64>>,
    coefficients: Vec<f64>,
    bias: f64,
    scaler: Option<Scaler>,
}

impl KernelSvr {
    pub fn new(c: f64) -> Self {
        Self {
            c,
            gamma: None,
            support: Vec::new(),
            coefficients: Vec::new(),
            bias: 0.0,
            scaler: None,
        }
    }

    pub fn c(&self) -> f64 {
        self.c
    }

    pub fn n_support(&self) -> usize {
        self.support.len()
    }

    fn kernel(gamma: f64, a: &[f64], b: &[f64]) -> f64 {
        let sq_dist: f64 = a.iter().zip(b.iter()).map(|(&x, &z)| (x - z).powi(2)).sum();
        (-gamma * sq_dist).exp()
    }

    fn decision(&self, row: &[f64]) -> f64 {
        let gamma = self.gamma.unwrap_or(1.0);
        self.support
            .iter()
            .zip(self.coefficients.iter())
            .map(|(sv, &beta)| beta * Self::kernel(gamma, sv, row))
            .sum::<f64>()
            + self.bias
    }
}

impl Regressor for KernelSvr {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> ModelResult<()> {
        if self.c <= 0.0 {
            return Err(ModelError::InvalidParameter(format!(
                "C must be positive, got {}",
                self.c
            )));
        }
        let n = x.nrows();
        if n == 0 || n != y.len() {
            return Err(ModelError::DimensionMismatch {
                expected: n,
                got: y.len(),
            });
        }

        let scaler = Scaler::fit(x);
        let rows: Vec<Vec<f64>> = x
            .outer_iter()
            .map(|r| scaler.transform(&r.to_vec()))
            .collect();
        // With standardized inputs, unit variance per feature.
        let gamma = 1.0 / x.ncols() as f64;

        let mut coefficients = vec![0.0; n];
        let mut bias = 0.0;
        let shrink = 1.0 - 1.0 / (self.c * n as f64);

        for epoch in 0..KERNEL_EPOCHS {
            let lr = 0.1 / (1.0 + epoch as f64 * 0.1);
            for i in 0..n {
                let pred: f64 = rows
                    .iter()
                    .zip(coefficients.iter())
                    .map(|(sv, &beta)| beta * Self::kernel(gamma, sv, &rows[i]))
                    .sum::<f64>()
                    + bias;
                let error = pred - y[i];
                if error.abs() > EPSILON {
                    let step = lr * error.signum();
                    coefficients[i] = (coefficients[i] - step).clamp(-self.c, self.c);
                    bias -= step;
                }
            }
            for beta in coefficients.iter_mut() {
                *beta *= shrink.max(0.0);
            }
        }

        self.gamma = Some(gamma);
        self.support = rows;
        self.coefficients = coefficients;
        self.bias = bias;
        self.scaler = Some(scaler);
        Ok(())
    }

    fn predict_one(&self, x: &[f64]) -> ModelResult<f64> {
        let scaler = self.scaler.as_ref().ok_or(ModelError::NotFitted)?;
        check_arity(Some(scaler.means.len()), x.len())?;
        Ok(self.decision(&scaler.transform(x)))
    }

    fn update(&mut self, x: &[f64], y: f64) -> ModelResult<()> {
        let error = self.predict_one(x)? - y;
        if error.abs() <= EPSILON {
            return Ok(());
        }
        // The new observation joins the support set with a small clipped
        // coefficient opposing the residual.
        let scaler = self.scaler.as_ref().ok_or(ModelError::NotFitted)?;
        let row = scaler.transform(x);
        let beta = (-UPDATE_LR * error.signum() * error.abs().min(self.c)).clamp(-self.c, self.c);
        self.support.push(row);
        self.coefficients.push(beta);
        Ok(())
    }

    fn n_features(&self) -> Option<usize> {
        self.scaler.as_ref().map(|s| s.means.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_data() -> (Array2<f64>, Array1<f64>) {
        // y = 0.5*x1 - 0.2*x2
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let x1 = (i as f64) / 10.0;
            let x2 = ((i * 7) % 13) as f64 / 5.0;
            rows.extend_from_slice(&[x1, x2]);
            labels.push(0.5 * x1 - 0.2 * x2);
        }
        (
            Array2::from_shape_vec((40, 2), rows).unwrap(),
            Array1::from_vec(labels),
        )
    }

    #[test]
    fn test_linear_svr_tracks_linear_target() {
        let (x, y) = linear_data();
        let mut model = LinearSvr::new(1.0);
        model.fit(&x, &y).unwrap();

        let pred = model.predict_one(&[2.0, 1.0]).unwrap();
        assert!((pred - 0.8).abs() < 0.3, "pred={pred}");
    }

    #[test]
    fn test_kernel_svr_fits_training_points() {
        let (x, y) = linear_data();
        let mut model = KernelSvr::new(1.0);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.n_support(), 40);

        let pred = model.predict_one(&[1.0, 0.4]).unwrap();
        let target = 0.5 - 0.08;
        assert!((pred - target).abs() < 0.3, "pred={pred}");
    }

    #[test]
    fn test_arity_mismatch_rejected() {
        let (x, y) = linear_data();
        let mut model = LinearSvr::new(0.1);
        model.fit(&x, &y).unwrap();
        assert!(matches!(
            model.predict_one(&[1.0, 2.0, 3.0]),
            Err(ModelError::DimensionMismatch { expected: 2, got: 3 })
        ));
    }

    #[test]
    fn test_kernel_update_grows_support_set() {
        let (x, y) = linear_data();
        let mut model = KernelSvr::new(1.0);
        model.fit(&x, &y).unwrap();
        let before = model.n_support();
        model.update(&[3.0, 0.0], 100.0).unwrap();
        assert_eq!(model.n_support(), before + 1);
    }
}
