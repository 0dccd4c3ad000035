// src/revenue_divider.rs
use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;

use crate::error::{MarketError, Result};
use crate::models::{FeaturePool, Target};
use crate::oracle::{GainFn, GainOracle, gain_rmse, prediction_gain};

/// Splits revenue by each contributor's estimated Shapley value, discounted
/// for similarity to the other contributors.
pub struct RevenueDivider {
    oracle: Box<dyn GainOracle>,
    gain_fn: GainFn,
}

impl RevenueDivider {
    pub fn new(oracle: Box<dyn GainOracle>, gain_fn: GainFn) -> Self {
        Self { oracle, gain_fn }
    }

    pub fn with_defaults(oracle: Box<dyn GainOracle>) -> Self {
        Self::new(oracle, gain_rmse)
    }

    /// Gain of the model trained on `subset` only. The empty coalition is
    /// worth exactly 0.
    pub fn subset_gain(&self, pool: &FeaturePool, target: &Target, subset: &[usize]) -> Result<f64> {
        if subset.is_empty() {
            return Ok(0.0);
        }
        let design = pool.design_matrix(subset);
        let mut oracle = self.oracle.fresh();
        prediction_gain(oracle.as_mut(), self.gain_fn, &design, target.values())
    }

    /// Monte-Carlo Shapley estimate from `k` uniformly drawn orderings.
    ///
    /// One seed per ordering is drawn from `rng` up front, so the estimate is
    /// reproducible for a given seed whatever the rayon thread count.
    pub fn shapley_approx<R: Rng + ?Sized>(
        &self,
        pool: &FeaturePool,
        target: &Target,
        k: usize,
        rng: &mut R,
    ) -> Result<Vec<f64>> {
        if k == 0 {
            return Err(MarketError::Config("Shapley sampling needs k >= 1".into()));
        }
        pool.check_target(target)?;

        let m = pool.contributors();
        let seeds: Vec<u64> = (0..k).map(|_| rng.next_u64()).collect();

        let per_permutation = seeds
            .par_iter()
            .map(|&seed| {
                let mut perm_rng = ChaCha20Rng::seed_from_u64(seed);
                let mut order: Vec<usize> = (0..m).collect();
                order.shuffle(&mut perm_rng);
                self.permutation_marginals(pool, target, &order)
            })
            .collect::<Result<Vec<Vec<f64>>>>()?;

        let mut shapley_values = vec![0.0; m];
        for marginals in &per_permutation {
            for (total, marginal) in shapley_values.iter_mut().zip(marginals) {
                *total += marginal;
            }
        }
        for value in shapley_values.iter_mut() {
            *value /= k as f64;
        }

        debug!(
            "Approximate Shapley values over {} permutations: {:?}",
            k, shapley_values
        );
        Ok(shapley_values)
    }

    fn permutation_marginals(
        &self,
        pool: &FeaturePool,
        target: &Target,
        order: &[usize],
    ) -> Result<Vec<f64>> {
        let mut marginals = vec![0.0; pool.contributors()];
        let mut coalition = Vec::with_capacity(order.len());
        let mut gain_predecessors = 0.0;

        for &contributor in order {
            coalition.push(contributor);
            let gain_current = self.subset_gain(pool, target, &coalition)?;
            marginals[contributor] += gain_current - gain_predecessors;
            gain_predecessors = gain_current;
        }
        Ok(marginals)
    }

    /// Shapley values scaled by `exp(-lambda * total similarity to others)`.
    pub fn shapley_robust<R: Rng + ?Sized>(
        &self,
        pool: &FeaturePool,
        target: &Target,
        k: usize,
        lambda: f64,
        rng: &mut R,
    ) -> Result<Vec<f64>> {
        if !lambda.is_finite() || lambda < 0.0 {
            return Err(MarketError::Config(format!(
                "duplication lambda must be finite and non-negative, got {}",
                lambda
            )));
        }
        let approx = self.shapley_approx(pool, target, k, rng)?;
        let penalties = duplication_penalties(pool, lambda);

        Ok(approx
            .iter()
            .zip(&penalties)
            .map(|(value, penalty)| value * penalty)
            .collect())
    }
}

/// Cosine similarity; `None` for mismatched, empty or zero-norm vectors.
pub fn cosine_similarity(v1: &[f64], v2: &[f64]) -> Option<f64> {
    if v1.len() != v2.len() || v1.is_empty() {
        return None;
    }
    let mut dot_product = 0.0;
    let mut mag1_sq = 0.0;
    let mut mag2_sq = 0.0;
    for (a, b) in v1.iter().zip(v2) {
        dot_product += a * b;
        mag1_sq += a * a;
        mag2_sq += b * b;
    }
    let mag1 = mag1_sq.sqrt();
    let mag2 = mag2_sq.sqrt();
    if mag1 == 0.0 || mag2 == 0.0 {
        return None;
    }
    Some(dot_product / (mag1 * mag2))
}

/// Pairwise cosine similarity between contributor rows. Zero-norm rows are
/// treated as dissimilar to everything.
pub fn similarity_matrix(pool: &FeaturePool) -> Vec<Vec<f64>> {
    let rows = pool.rows();
    rows.iter()
        .map(|a| {
            rows.iter()
                .map(|b| cosine_similarity(a, b).unwrap_or(0.0))
                .collect()
        })
        .collect()
}

/// Per-contributor factor `exp(-lambda * sum_{j != i} cos(i, j))`.
pub fn duplication_penalties(pool: &FeaturePool, lambda: f64) -> Vec<f64> {
    similarity_matrix(pool)
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let total_similarity: f64 = row
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, s)| s)
                .sum();
            (-lambda * total_similarity).exp()
        })
        .collect()
}

/// Normalized allocation ratios; equal split when the values do not sum to
/// something positive.
pub fn payout_ratios(values: &[f64]) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        values.iter().map(|v| v / total).collect()
    } else {
        warn!(
            "Shapley values sum to {:.4}; falling back to an equal split across {} contributors",
            total,
            values.len()
        );
        vec![1.0 / values.len() as f64; values.len()]
    }
}

pub fn split_revenue(revenue: f64, ratios: &[f64]) -> Vec<f64> {
    ratios.iter().map(|r| revenue * r).collect()
}
