// src/models.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MarketError, Result};
use crate::pricing::ExpertStats;

/// M contributors x T observations. Row order is the contributor order used
/// by every per-contributor output vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFeaturePool")]
pub struct FeaturePool {
    rows: Vec<Vec<f64>>,
    observations: usize,
}

/// Wire form of a pool; only reaches `FeaturePool` through `new`.
#[derive(Deserialize)]
struct RawFeaturePool {
    rows: Vec<Vec<f64>>,
    observations: usize,
}

impl TryFrom<RawFeaturePool> for FeaturePool {
    type Error = MarketError;

    fn try_from(raw: RawFeaturePool) -> Result<Self> {
        let pool = FeaturePool::new(raw.rows)?;
        if pool.observations != raw.observations {
            return Err(MarketError::Shape(format!(
                "pool declares {} observations but its rows have {}",
                raw.observations, pool.observations
            )));
        }
        Ok(pool)
    }
}

impl FeaturePool {
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self> {
        let observations = match rows.first() {
            Some(first) => first.len(),
            None => return Err(MarketError::Shape("feature pool has no contributors".into())),
        };
        if observations == 0 {
            return Err(MarketError::Shape("feature pool has no observations".into()));
        }
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != observations) {
            return Err(MarketError::Shape(format!(
                "contributor {} has {} observations, expected {}",
                idx,
                row.len(),
                observations
            )));
        }
        Ok(Self { rows, observations })
    }

    pub fn contributors(&self) -> usize {
        self.rows.len()
    }

    pub fn observations(&self) -> usize {
        self.observations
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn row(&self, contributor: usize) -> &[f64] {
        &self.rows[contributor]
    }

    /// Transposed view of the selected contributors: one row per observation,
    /// one column per contributor in `subset` order.
    pub fn design_matrix(&self, subset: &[usize]) -> Vec<Vec<f64>> {
        (0..self.observations)
            .map(|t| subset.iter().map(|&m| self.rows[m][t]).collect())
            .collect()
    }

    pub fn all_contributors(&self) -> Vec<usize> {
        (0..self.rows.len()).collect()
    }

    /// Fresh pool with `f` applied element-wise; `self` is untouched.
    pub fn map_values<F: FnMut(f64) -> f64>(&self, mut f: F) -> FeaturePool {
        let rows = self
            .rows
            .iter()
            .map(|row| row.iter().map(|&v| f(v)).collect())
            .collect();
        FeaturePool {
            rows,
            observations: self.observations,
        }
    }

    pub fn check_target(&self, target: &Target) -> Result<()> {
        if target.len() != self.observations {
            return Err(MarketError::Shape(format!(
                "target has {} values but the pool has {} observations",
                target.len(),
                self.observations
            )));
        }
        Ok(())
    }
}

/// Values to be predicted, paired 1:1 with the pool's observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>")]
pub struct Target(Vec<f64>);

impl TryFrom<Vec<f64>> for Target {
    type Error = MarketError;

    fn try_from(values: Vec<f64>) -> Result<Self> {
        Target::new(values)
    }
}

impl Target {
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(MarketError::Shape("target is empty".into()));
        }
        Ok(Self(values))
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Outcome of the external credential check that gates a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessDecision {
    Proceed,
    Denied,
}

/// Consumer-facing record of one transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResult {
    pub transaction_id: Uuid,
    pub expert_index: usize,
    pub market_price_offered: f64,
    pub your_bid: f64,
    pub prediction_gain_achieved: f64,
    pub cost_to_you: f64,
    /// Duplication-robust Shapley values before normalization.
    pub shapley_values: Vec<f64>,
    pub seller_payouts: Vec<f64>,
}

/// Summary of a whole session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub run_id: String,
    pub run_timestamp: NaiveDateTime,
    pub pricing_strategy: String,
    pub total_transactions: usize,
    pub total_revenue: f64,
    pub avg_prediction_gain: f64,
    pub expert_stats: Vec<ExpertStats>,
    /// Cumulative payout per contributor, in pool row order.
    pub contributor_payouts: Vec<f64>,
}
