// src/oracle.rs
use log::debug;

// SmartCore imports
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::linear_regression::{LinearRegression, LinearRegressionParameters};

use crate::error::{MarketError, Result};

/// Scores predictions against the truth. Expected in roughly [0, 1].
pub type GainFn = fn(&[f64], &[f64]) -> f64;

/// Any model that can be fit on a T x M design and queried on it.
///
/// Fitting mutates learned parameters, so callers never share one instance
/// between evaluations: they ask for a `fresh` copy instead.
pub trait GainOracle: Send + Sync {
    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<()>;

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>>;

    /// Unfitted instance with the same configuration.
    fn fresh(&self) -> Box<dyn GainOracle>;
}

/// Ordinary least squares (with intercept) backed by SmartCore.
#[derive(Default)]
pub struct LinearRegressionOracle {
    model: Option<LinearRegression<f64, f64, DenseMatrix<f64>, Vec<f64>>>,
}

impl LinearRegressionOracle {
    pub fn new() -> Self {
        Self { model: None }
    }
}

impl GainOracle for LinearRegressionOracle {
    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<()> {
        if features.len() != targets.len() {
            return Err(MarketError::Shape(format!(
                "{} feature rows for {} targets",
                features.len(),
                targets.len()
            )));
        }
        if features.first().map_or(true, |row| row.is_empty()) {
            return Err(MarketError::Shape("cannot fit on an empty design".into()));
        }

        let x = DenseMatrix::from_2d_vec(&features.to_vec());
        let y = targets.to_vec();
        let model = LinearRegression::fit(&x, &y, LinearRegressionParameters::default())
            .map_err(|e| MarketError::Oracle(format!("Failed to fit linear regression: {}", e)))?;

        self.model = Some(model);
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| MarketError::Oracle("predict called before fit".into()))?;
        let x = DenseMatrix::from_2d_vec(&features.to_vec());
        model
            .predict(&x)
            .map_err(|e| MarketError::Oracle(format!("Failed to predict: {}", e)))
    }

    fn fresh(&self) -> Box<dyn GainOracle> {
        Box::new(LinearRegressionOracle::new())
    }
}

/// Gain G = 1 - RMSE / std(y_true), floored at 0. A constant target is
/// trivially predictable and scores 1.0.
pub fn gain_rmse(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len() as f64;
    let mse = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / n;
    let rmse = mse.sqrt();

    let mean = y_true.iter().sum::<f64>() / n;
    let y_std = (y_true.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / n).sqrt();
    if y_std == 0.0 {
        return 1.0;
    }

    (1.0 - rmse / y_std).max(0.0)
}

/// Fit `oracle` on the design, predict in-sample and score with `gain_fn`.
///
/// In-sample evaluation is a known simplification: it inflates the gain
/// relative to a held-out split.
pub fn prediction_gain(
    oracle: &mut dyn GainOracle,
    gain_fn: GainFn,
    features: &[Vec<f64>],
    targets: &[f64],
) -> Result<f64> {
    oracle.fit(features, targets)?;
    let predictions = oracle.predict(features)?;

    if predictions.len() != targets.len() {
        return Err(MarketError::Shape(format!(
            "oracle returned {} predictions for {} targets",
            predictions.len(),
            targets.len()
        )));
    }
    if predictions.iter().any(|p| !p.is_finite()) {
        return Err(MarketError::Numeric("oracle produced a non-finite prediction".into()));
    }

    let gain = gain_fn(targets, &predictions);
    if !gain.is_finite() {
        return Err(MarketError::Numeric(format!("gain function returned {}", gain)));
    }

    debug!(
        "Prediction gain {:.4} over {} observations x {} features",
        gain,
        features.len(),
        features.first().map_or(0, |r| r.len())
    );
    Ok(gain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_prediction_has_full_gain() {
        let y = vec![1.0, 2.0, 3.0, 4.0];
        assert!((gain_rmse(&y, &y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn mean_prediction_has_zero_gain() {
        let y = vec![1.0, 2.0, 3.0, 4.0];
        let pred = vec![2.5; 4];
        assert!(gain_rmse(&y, &pred).abs() < 1e-12);
    }

    #[test]
    fn gain_is_floored_at_zero() {
        let y = vec![1.0, 2.0, 3.0];
        let pred = vec![100.0, -100.0, 50.0];
        assert_eq!(gain_rmse(&y, &pred), 0.0);
    }

    #[test]
    fn constant_target_falls_back_to_one() {
        let y = vec![3.0; 5];
        let pred = vec![0.0; 5];
        assert_eq!(gain_rmse(&y, &pred), 1.0);
    }

    #[test]
    fn linear_regression_recovers_exact_linear_target() {
        let features: Vec<Vec<f64>> = (0..20)
            .map(|t| vec![t as f64, ((t * 7) % 5) as f64])
            .collect();
        let targets: Vec<f64> = features.iter().map(|r| 2.0 * r[0] - 3.0 * r[1] + 1.5).collect();

        let mut oracle = LinearRegressionOracle::new();
        let gain = prediction_gain(&mut oracle, gain_rmse, &features, &targets).unwrap();
        assert!(gain > 0.999, "gain {} should be ~1 for an exact fit", gain);
    }

    #[test]
    fn predict_before_fit_is_an_oracle_error() {
        let oracle = LinearRegressionOracle::new();
        let err = oracle.predict(&[vec![1.0]]).unwrap_err();
        assert!(matches!(err, MarketError::Oracle(_)));
    }
}
