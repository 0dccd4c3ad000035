// src/pricing/mod.rs

// Module declarations
mod mwu_pricer;
mod types;
mod ucb_pricer;

use rand::RngCore;

use crate::error::{MarketError, Result};

// Public re-exports
pub use mwu_pricer::MwuPricer;
pub use types::{ExpertStats, PricingStrategy, RoundOutcome};
pub use ucb_pricer::UcbPricer;

/// Adaptive posted-price policy over a fixed set of candidate prices.
///
/// `update` must be fed the index returned by the preceding `choose_price`.
pub trait PricingPolicy: Send {
    fn name(&self) -> &'static str;

    fn experts(&self) -> &[f64];

    fn choose_price(&mut self, rng: &mut dyn RngCore) -> Result<(f64, usize)>;

    fn update(&mut self, outcome: &RoundOutcome) -> Result<()>;

    /// Whether `update` needs the counterfactual revenue of every expert.
    fn needs_virtual_revenue(&self) -> bool {
        false
    }

    fn stats(&self) -> Vec<ExpertStats>;
}

/// `num_experts` evenly spaced prices over `[min_price, max_price]`.
pub fn discretize_prices(min_price: f64, max_price: f64, num_experts: usize) -> Result<Vec<f64>> {
    if num_experts == 0 {
        return Err(MarketError::Config("num_experts must be at least 1".into()));
    }
    if !min_price.is_finite() || !max_price.is_finite() || min_price < 0.0 {
        return Err(MarketError::Config(format!(
            "price range ({}, {}) must be finite and non-negative",
            min_price, max_price
        )));
    }
    if min_price >= max_price {
        return Err(MarketError::Config(format!(
            "price range ({}, {}) is empty",
            min_price, max_price
        )));
    }

    if num_experts == 1 {
        return Ok(vec![min_price]);
    }
    let step = (max_price - min_price) / (num_experts - 1) as f64;
    Ok((0..num_experts)
        .map(|i| {
            if i == num_experts - 1 {
                max_price
            } else {
                min_price + step * i as f64
            }
        })
        .collect())
}

pub fn build_pricer(
    strategy: PricingStrategy,
    min_price: f64,
    max_price: f64,
    num_experts: usize,
) -> Result<Box<dyn PricingPolicy>> {
    Ok(match strategy {
        PricingStrategy::Mwu { learning_rate } => {
            Box::new(MwuPricer::new(min_price, max_price, num_experts, learning_rate)?)
        }
        PricingStrategy::Ucb { confidence_c } => {
            Box::new(UcbPricer::new(min_price, max_price, num_experts, confidence_c)?)
        }
    })
}
