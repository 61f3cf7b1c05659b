//! Regression evaluation metrics.

/// Summary metrics for a set of held-out predictions.
#[derive(Debug, Clone)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    pub n_samples: usize,
}

impl RegressionMetrics {
    pub fn calculate(y_true: &[f64], y_pred: &[f64]) -> Self {
        let mse = mean_squared_error(y_true, y_pred);
        Self {
            mse,
            rmse: mse.sqrt(),
            mae: mean_absolute_error(y_true, y_pred),
            r2: r_squared(y_true, y_pred),
            n_samples: y_true.len(),
        }
    }
}

/// Mean Squared Error: (1/n) * sum((y_true - y_pred)^2)
pub fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len();
    if n == 0 {
        return f64::NAN;
    }
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(&t, &p)| (t - p).powi(2))
        .sum::<f64>()
        / n as f64
}

/// Mean Absolute Error: (1/n) * sum(|y_true - y_pred|)
pub fn mean_absolute_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len();
    if n == 0 {
        return f64::NAN;
    }
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(&t, &p)| (t - p).abs())
        .sum::<f64>()
        / n as f64
}

/// R-squared: 1 - SS_res / SS_tot
pub fn r_squared(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len();
    if n == 0 {
        return f64::NAN;
    }
    let mean = y_true.iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = y_true.iter().map(|&t| (t - mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(&t, &p)| (t - p).powi(2))
        .sum();
    if ss_tot == 0.0 {
        0.0
    } else {
        1.0 - ss_res / ss_tot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let y = [1.0, 2.0, 3.0];
        let metrics = RegressionMetrics::calculate(&y, &y);
        assert_eq!(metrics.mse, 0.0);
        assert_eq!(metrics.rmse, 0.0);
        assert_eq!(metrics.r2, 1.0);
    }

    #[test]
    fn test_known_errors() {
        let y_true = [1.0, 2.0, 3.0, 4.0];
        let y_pred = [1.0, 2.0, 3.0, 6.0];
        assert!((mean_squared_error(&y_true, &y_pred) - 1.0).abs() < 1e-12);
        assert!((mean_absolute_error(&y_true, &y_pred) - 0.5).abs() < 1e-12);
    }
}
