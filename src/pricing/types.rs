// src/pricing/types.rs
use serde::{Deserialize, Serialize};

/// Which learner drives the posted price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PricingStrategy {
    Mwu { learning_rate: f64 },
    Ucb { confidence_c: f64 },
}

impl PricingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingStrategy::Mwu { .. } => "mwu",
            PricingStrategy::Ucb { .. } => "ucb",
        }
    }
}

/// Feedback for one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    pub expert_index: usize,
    pub reward: f64,
    /// Revenue the market would have collected at each expert's price,
    /// same order as `PricingPolicy::experts`. Required by MWU only.
    pub virtual_revenue: Option<Vec<f64>>,
}

impl RoundOutcome {
    pub fn realized(expert_index: usize, reward: f64) -> Self {
        Self {
            expert_index,
            reward,
            virtual_revenue: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpertStats {
    pub price: f64,
    /// Selection probability (MWU) or running mean reward (UCB1).
    pub score: f64,
    pub trials: usize,
}
