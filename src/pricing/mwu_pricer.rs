// src/pricing/mwu_pricer.rs
use log::debug;
use rand::RngCore;
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};

use super::types::{ExpertStats, RoundOutcome};
use super::{PricingPolicy, discretize_prices};
use crate::error::{MarketError, Result};

/// Weight sum above which the weights are rescaled to a distribution.
const RENORMALIZE_ABOVE: f64 = 1e6;

/// Smallest weight an expert can hold. Without it a long losing streak
/// underflows to 0.0 and the expert is never sampled again.
const WEIGHT_FLOOR: f64 = f64::MIN_POSITIVE;

/// Multiplicative-weights pricing: `w_i <- w_i * (1 + delta * g_i)` with
/// `g_i` the expert's counterfactual revenue divided by the top price.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MwuPricer {
    experts: Vec<f64>,
    weights: Vec<f64>,
    selections: Vec<usize>,
    learning_rate: f64,
    b_max: f64,
}

impl MwuPricer {
    pub fn new(min_price: f64, max_price: f64, num_experts: usize, learning_rate: f64) -> Result<Self> {
        // delta < 1 keeps 1 + delta * g > 0 for every g in [-1, 1]
        if !(learning_rate > 0.0 && learning_rate < 1.0) {
            return Err(MarketError::Config(format!(
                "learning_rate must lie in (0, 1), got {}",
                learning_rate
            )));
        }
        let experts = discretize_prices(min_price, max_price, num_experts)?;

        Ok(Self {
            weights: vec![1.0; experts.len()],
            selections: vec![0; experts.len()],
            experts,
            learning_rate,
            b_max: max_price,
        })
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn probabilities(&self) -> Vec<f64> {
        let total: f64 = self.weights.iter().sum();
        self.weights.iter().map(|w| w / total).collect()
    }
}

impl PricingPolicy for MwuPricer {
    fn name(&self) -> &'static str {
        "mwu"
    }

    fn experts(&self) -> &[f64] {
        &self.experts
    }

    fn choose_price(&mut self, rng: &mut dyn RngCore) -> Result<(f64, usize)> {
        let dist = WeightedIndex::new(&self.weights)
            .map_err(|e| MarketError::Pricing(format!("invalid expert weights: {}", e)))?;
        let idx = dist.sample(rng);
        self.selections[idx] += 1;

        debug!("MWU sampled price {:.2} (expert {})", self.experts[idx], idx);
        Ok((self.experts[idx], idx))
    }

    fn update(&mut self, outcome: &RoundOutcome) -> Result<()> {
        if outcome.expert_index >= self.experts.len() {
            return Err(MarketError::Pricing(format!(
                "expert index {} out of range for {} experts",
                outcome.expert_index,
                self.experts.len()
            )));
        }
        let revenues = outcome.virtual_revenue.as_ref().ok_or_else(|| {
            MarketError::Pricing("MWU update requires the virtual revenue of every expert".into())
        })?;
        if revenues.len() != self.weights.len() {
            return Err(MarketError::Pricing(format!(
                "got {} virtual revenues for {} experts",
                revenues.len(),
                self.weights.len()
            )));
        }
        if let Some(bad) = revenues.iter().find(|r| !r.is_finite()) {
            return Err(MarketError::Numeric(format!("non-finite virtual revenue {}", bad)));
        }

        for (weight, revenue) in self.weights.iter_mut().zip(revenues) {
            let gain = (revenue / self.b_max).clamp(-1.0, 1.0);
            *weight *= 1.0 + self.learning_rate * gain;
        }

        let total: f64 = self.weights.iter().sum();
        if total > RENORMALIZE_ABOVE {
            for weight in self.weights.iter_mut() {
                *weight /= total;
            }
            debug!("Renormalized MWU weights (sum was {:.3e})", total);
        }
        for weight in self.weights.iter_mut() {
            *weight = weight.max(WEIGHT_FLOOR);
        }

        debug!(
            "MWU update after expert {}: reward={:.4}, weight sum={:.4}",
            outcome.expert_index,
            outcome.reward,
            self.weights.iter().sum::<f64>()
        );
        Ok(())
    }

    fn needs_virtual_revenue(&self) -> bool {
        true
    }

    fn stats(&self) -> Vec<ExpertStats> {
        self.experts
            .iter()
            .zip(self.probabilities())
            .zip(&self.selections)
            .map(|((&price, score), &trials)| ExpertStats { price, score, trials })
            .collect()
    }
}
