// src/synthetic.rs
use rand::Rng;
use rand_distr::{Distribution, Normal, StandardNormal, Uniform};

use crate::error::{MarketError, Result};
use crate::models::{FeaturePool, Target};

/// Std of the observation noise added to the linear target.
const TARGET_NOISE_STD: f64 = 0.5;

/// `m` contributors with `t` observations each, `X ~ U(0, 10)`, and a target
/// that is a random linear combination of the rows plus Gaussian noise.
pub fn generate_market_data<R: Rng + ?Sized>(
    m: usize,
    t: usize,
    rng: &mut R,
) -> Result<(FeaturePool, Target)> {
    if m == 0 || t == 0 {
        return Err(MarketError::Config(format!(
            "cannot generate a {} x {} pool",
            m, t
        )));
    }

    let features = Uniform::new(0.0, 10.0);
    let rows: Vec<Vec<f64>> = (0..m)
        .map(|_| (0..t).map(|_| features.sample(rng)).collect())
        .collect();

    let true_weights: Vec<f64> = (0..m)
        .map(|_| {
            let w: f64 = StandardNormal.sample(rng);
            w
        })
        .collect();
    let noise = Normal::new(0.0, TARGET_NOISE_STD)
        .map_err(|e| MarketError::Numeric(format!("invalid target noise: {}", e)))?;

    let target = (0..t)
        .map(|col| {
            let signal: f64 = rows
                .iter()
                .zip(&true_weights)
                .map(|(row, w)| w * row[col])
                .sum();
            signal + noise.sample(rng)
        })
        .collect();

    Ok((FeaturePool::new(rows)?, Target::new(target)?))
}
