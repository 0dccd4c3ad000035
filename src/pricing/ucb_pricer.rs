// src/pricing/ucb_pricer.rs
use log::debug;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::types::{ExpertStats, RoundOutcome};
use super::{PricingPolicy, discretize_prices};
use crate::error::{MarketError, Result};

#[derive(Serialize, Deserialize, Debug, Clone)]
struct PriceArm {
    price: f64,
    mean_reward: f64,
    trials: usize,
}

impl PriceArm {
    fn new(price: f64) -> Self {
        Self {
            price,
            mean_reward: 0.0,
            trials: 0,
        }
    }

    fn update(&mut self, reward: f64) {
        self.trials += 1;
        self.mean_reward += (reward - self.mean_reward) / self.trials as f64;
    }

    fn ucb_score(&self, confidence_c: f64, total_rounds: usize) -> f64 {
        if self.trials == 0 {
            return f64::INFINITY; // Encourage exploration
        }

        let exploitation = self.mean_reward;
        let exploration = (confidence_c * (total_rounds as f64).ln() / self.trials as f64).sqrt();

        exploitation + exploration
    }
}

/// UCB1 over the discretized prices. Deterministic: unvisited experts are
/// taken in index order, ties go to the lowest index.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UcbPricer {
    arms: Vec<PriceArm>,
    experts: Vec<f64>,
    confidence_c: f64,
    total_rounds: usize,
}

impl UcbPricer {
    pub fn new(min_price: f64, max_price: f64, num_experts: usize, confidence_c: f64) -> Result<Self> {
        if !confidence_c.is_finite() || confidence_c < 0.0 {
            return Err(MarketError::Config(format!(
                "confidence_c must be finite and non-negative, got {}",
                confidence_c
            )));
        }
        let experts = discretize_prices(min_price, max_price, num_experts)?;
        let arms = experts.iter().map(|&p| PriceArm::new(p)).collect();

        Ok(Self {
            arms,
            experts,
            confidence_c,
            total_rounds: 0,
        })
    }

    pub fn total_rounds(&self) -> usize {
        self.total_rounds
    }

    pub fn trials(&self, expert_index: usize) -> Option<usize> {
        self.arms.get(expert_index).map(|arm| arm.trials)
    }

    pub fn mean_reward(&self, expert_index: usize) -> Option<f64> {
        self.arms.get(expert_index).map(|arm| arm.mean_reward)
    }
}

impl PricingPolicy for UcbPricer {
    fn name(&self) -> &'static str {
        "ucb"
    }

    fn experts(&self) -> &[f64] {
        &self.experts
    }

    fn choose_price(&mut self, _rng: &mut dyn RngCore) -> Result<(f64, usize)> {
        self.total_rounds += 1;

        if let Some(idx) = self.arms.iter().position(|arm| arm.trials == 0) {
            debug!("Forced exploration of expert {} at price {:.2}", idx, self.arms[idx].price);
            return Ok((self.arms[idx].price, idx));
        }

        let mut best_idx = 0;
        let mut best_score = self.arms[0].ucb_score(self.confidence_c, self.total_rounds);

        for (i, arm) in self.arms.iter().enumerate().skip(1) {
            let score = arm.ucb_score(self.confidence_c, self.total_rounds);
            if score > best_score {
                best_score = score;
                best_idx = i;
            }
        }

        debug!(
            "UCB selected price {:.2} (expert {}, score {:.4})",
            self.arms[best_idx].price, best_idx, best_score
        );
        Ok((self.arms[best_idx].price, best_idx))
    }

    fn update(&mut self, outcome: &RoundOutcome) -> Result<()> {
        if !outcome.reward.is_finite() {
            return Err(MarketError::Numeric(format!(
                "non-finite reward {} for expert {}",
                outcome.reward, outcome.expert_index
            )));
        }
        let num_experts = self.arms.len();
        let arm = self.arms.get_mut(outcome.expert_index).ok_or_else(|| {
            MarketError::Pricing(format!(
                "expert index {} out of range for {} experts",
                outcome.expert_index, num_experts
            ))
        })?;

        arm.update(outcome.reward);

        debug!(
            "Updated expert {} at price {:.2}: reward={:.4}, mean={:.4}, trials={}",
            outcome.expert_index, arm.price, outcome.reward, arm.mean_reward, arm.trials
        );
        Ok(())
    }

    fn stats(&self) -> Vec<ExpertStats> {
        self.arms
            .iter()
            .map(|arm| ExpertStats {
                price: arm.price,
                score: arm.mean_reward,
                trials: arm.trials,
            })
            .collect()
    }
}
