// tests/common/mod.rs
#![allow(dead_code)]

use datamarket_lib::{FeaturePool, GainOracle, Result, Target};

/// Predicts the sum of each design row; fitting is a no-op.
pub struct RowSumOracle;

impl GainOracle for RowSumOracle {
    fn fit(&mut self, _features: &[Vec<f64>], _targets: &[f64]) -> Result<()> {
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        Ok(features.iter().map(|row| row.iter().sum()).collect())
    }

    fn fresh(&self) -> Box<dyn GainOracle> {
        Box::new(RowSumOracle)
    }
}

/// With `RowSumOracle` this makes a coalition worth the sum of its members'
/// row means: an additive game.
pub fn mean_prediction(_y_true: &[f64], y_pred: &[f64]) -> f64 {
    y_pred.iter().sum::<f64>() / y_pred.len() as f64
}

/// 1 when every prediction is exactly zero, else 0. On an all-zero pool this
/// turns the allocation rule into a step at the posted price.
pub fn clean_delivery(_y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_pred.iter().all(|p| *p == 0.0) { 1.0 } else { 0.0 }
}

pub fn zero_pool(contributors: usize, observations: usize) -> (FeaturePool, Target) {
    let pool = FeaturePool::new(vec![vec![0.0; observations]; contributors]).unwrap();
    let target = Target::new((0..observations).map(|t| t as f64).collect()).unwrap();
    (pool, target)
}
