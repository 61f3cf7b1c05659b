//! Ridge regression (L2-regularized linear regression).
//!
//! Fits the closed-form solution on centered data:
//! beta = (X'X + alpha*I)^(-1) X'y. Incremental updates take one clipped
//! gradient step on the squared loss.

use super::{check_arity, ModelError, ModelResult, Regressor};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Learning rate for incremental update steps.
const UPDATE_LR: f64 = 1e-3;
/// Gradient clip bound for incremental updates.
const MAX_GRAD: f64 = 1.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeRegression {
    alpha: f64,
    coefficients: Option<Array1<f64>>,
    intercept: Option<f64>,
}

impl RidgeRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            coefficients: None,
            intercept: None,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }
}

impl Regressor for RidgeRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> ModelResult<()> {
        if self.alpha < 0.0 {
            return Err(ModelError::InvalidParameter(format!(
                "alpha must be non-negative, got {}",
                self.alpha
            )));
        }
        if x.nrows() != y.len() {
            return Err(ModelError::DimensionMismatch {
                expected: x.nrows(),
                got: y.len(),
            });
        }
        if x.nrows() == 0 {
            return Err(ModelError::InvalidParameter("empty design matrix".into()));
        }

        // Center features and labels so the intercept falls out of the solve.
        let x_mean = x.mean_axis(Axis(0)).ok_or(ModelError::SingularMatrix)?;
        let y_mean = y.mean().unwrap_or(0.0);
        let x_centered = x - &x_mean;
        let y_centered = y - y_mean;

        let n_features = x.ncols();
        let mut xtx = x_centered.t().dot(&x_centered);
        for i in 0..n_features {
            xtx[[i, i]] += self.alpha;
        }
        let xty = x_centered.t().dot(&y_centered);

        let coefficients = solve_spd(&xtx, &xty)?;
        let intercept = y_mean - coefficients.dot(&x_mean);

        self.coefficients = Some(coefficients);
        self.intercept = Some(intercept);
        Ok(())
    }

    fn predict_one(&self, x: &[f64]) -> ModelResult<f64> {
        let coefficients = self.coefficients.as_ref().ok_or(ModelError::NotFitted)?;
        let intercept = self.intercept.ok_or(ModelError::NotFitted)?;
        check_arity(Some(coefficients.len()), x.len())?;

        Ok(x.iter()
            .zip(coefficients.iter())
            .map(|(&xi, &wi)| xi * wi)
            .sum::<f64>()
            + intercept)
    }

    fn update(&mut self, x: &[f64], y: f64) -> ModelResult<()> {
        let prediction = self.predict_one(x)?;
        let error = prediction - y;

        let coefficients = self.coefficients.as_mut().ok_or(ModelError::NotFitted)?;
        for (wi, &xi) in coefficients.iter_mut().zip(x.iter()) {
            let grad = (2.0 * error * xi).clamp(-MAX_GRAD, MAX_GRAD);
            *wi -= UPDATE_LR * grad;
        }
        let bias_grad = (2.0 * error).clamp(-MAX_GRAD, MAX_GRAD);
        if let Some(intercept) = self.intercept.as_mut() {
            *intercept -= UPDATE_LR * bias_grad;
        }
        Ok(())
    }

    fn n_features(&self) -> Option<usize> {
        self.coefficients.as_ref().map(|c| c.len())
    }
}

/// Solve a symmetric positive-definite system via Cholesky, falling back to
/// gradient iteration when the decomposition breaks down.
pub(crate) fn solve_spd(a: &Array2<f64>, b: &Array1<f64>) -> ModelResult<Array1<f64>> {
    match cholesky_solve(a, b) {
        Ok(x) => Ok(x),
        Err(_) => gradient_solve(a, b),
    }
}

fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> ModelResult<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return Err(ModelError::SingularMatrix);
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // Forward then backward substitution.
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * z[j];
        }
        z[i] = (b[i] - sum) / l[[i, i]];
    }
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (z[i] - sum) / l[[i, i]];
    }
    Ok(x)
}

fn gradient_solve(a: &Array2<f64>, b: &Array1<f64>) -> ModelResult<Array1<f64>> {
    let n = a.ncols();
    let mut x = Array1::<f64>::zeros(n);
    let learning_rate = 0.01;
    let max_iter = 1000;
    let tol = 1e-10;

    for _ in 0..max_iter {
        let residual = a.dot(&x) - b;
        let gradient = a.t().dot(&residual);
        let norm: f64 = gradient.iter().map(|&g| g * g).sum::<f64>().sqrt();
        if norm < tol {
            break;
        }
        x = &x - &(&gradient * learning_rate);
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovers_linear_function() {
        // y = 2 + 3*x, near-zero regularization
        let x = Array2::from_shape_vec((5, 1), vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let y = Array1::from_vec(vec![5.0, 8.0, 11.0, 14.0, 17.0]);

        let mut model = RidgeRegression::new(1e-8);
        model.fit(&x, &y).unwrap();

        assert!((model.predict_one(&[6.0]).unwrap() - 20.0).abs() < 1e-4);
        assert_eq!(model.n_features(), Some(1));
    }

    #[test]
    fn test_shrinkage_reduces_coefficients() {
        let x = Array2::from_shape_vec((4, 1), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let y = Array1::from_vec(vec![2.0, 4.0, 6.0, 8.0]);

        let mut loose = RidgeRegression::new(1e-8);
        let mut tight = RidgeRegression::new(100.0);
        loose.fit(&x, &y).unwrap();
        tight.fit(&x, &y).unwrap();

        let w_loose = loose.coefficients().unwrap()[0].abs();
        let w_tight = tight.coefficients().unwrap()[0].abs();
        assert!(w_tight < w_loose);
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let model = RidgeRegression::new(0.1);
        assert!(matches!(
            model.predict_one(&[1.0]),
            Err(ModelError::NotFitted)
        ));
    }

    #[test]
    fn test_arity_checked_before_predict() {
        let x = Array2::from_shape_vec((3, 2), vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0]).unwrap();
        let y = Array1::from_vec(vec![1.0, 2.0, 3.0]);
        let mut model = RidgeRegression::new(0.01);
        model.fit(&x, &y).unwrap();

        assert!(matches!(
            model.predict_one(&[1.0]),
            Err(ModelError::DimensionMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn test_update_moves_toward_observation() {
        let x = Array2::from_shape_vec((4, 1), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let y = Array1::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
        let mut model = RidgeRegression::new(0.01);
        model.fit(&x, &y).unwrap();

        let before = (model.predict_one(&[2.0]).unwrap() - 10.0).abs();
        for _ in 0..200 {
            model.update(&[2.0], 10.0).unwrap();
        }
        let after = (model.predict_one(&[2.0]).unwrap() - 10.0).abs();
        assert!(after < before);
    }
}
