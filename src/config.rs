// src/config.rs
use anyhow::{Context, Result};
use std::env;

use crate::error::MarketError;
use crate::pricing::PricingStrategy;

// Posted price range and its discretization
pub const DEFAULT_PRICE_MIN: f64 = 50.0;
pub const DEFAULT_PRICE_MAX: f64 = 500.0;
pub const DEFAULT_NUM_EXPERTS: usize = 20;

// Learners
pub const DEFAULT_MWU_LEARNING_RATE: f64 = 0.1;
pub const DEFAULT_UCB_CONFIDENCE_C: f64 = 2.0;

// Allocation rule: noise std per unit of underbid
pub const DEFAULT_NOISE_COEFFICIENT: f64 = 0.1;

// Simpson nodes for the Myerson integral (odd)
pub const DEFAULT_INTEGRATION_POINTS: usize = 101;

// Revenue division
pub const DEFAULT_SHAPLEY_ITERATIONS: usize = 50;
pub const DEFAULT_DUPLICATION_LAMBDA: f64 = std::f64::consts::LN_2;

// Simulation driver
pub const DEFAULT_CONTRIBUTORS: usize = 10;
pub const DEFAULT_OBSERVATIONS: usize = 100;
pub const DEFAULT_ROUNDS: usize = 1;
pub const DEFAULT_BUYER_VALUATION: f64 = 200.0;

/// Market configuration
#[derive(Debug, Clone)]
pub struct MarketConfig {
    // Pricing
    pub price_min: f64,
    pub price_max: f64,
    pub num_experts: usize,
    pub pricing_strategy: PricingStrategy,

    // Auction
    pub noise_coefficient: f64,
    pub integration_points: usize,

    // Revenue division
    pub shapley_iterations: usize,
    pub duplication_lambda: f64,

    // Simulation
    pub contributors: usize,
    pub observations: usize,
    pub rounds: usize,
    pub buyer_valuation: f64,
    pub seed: Option<u64>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            price_min: DEFAULT_PRICE_MIN,
            price_max: DEFAULT_PRICE_MAX,
            num_experts: DEFAULT_NUM_EXPERTS,
            pricing_strategy: PricingStrategy::Ucb {
                confidence_c: DEFAULT_UCB_CONFIDENCE_C,
            },
            noise_coefficient: DEFAULT_NOISE_COEFFICIENT,
            integration_points: DEFAULT_INTEGRATION_POINTS,
            shapley_iterations: DEFAULT_SHAPLEY_ITERATIONS,
            duplication_lambda: DEFAULT_DUPLICATION_LAMBDA,
            contributors: DEFAULT_CONTRIBUTORS,
            observations: DEFAULT_OBSERVATIONS,
            rounds: DEFAULT_ROUNDS,
            buyer_valuation: DEFAULT_BUYER_VALUATION,
            seed: None,
        }
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr + ToString,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("Failed to parse {}", key))
}

impl MarketConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Result<Self> {
        let pricing_strategy = match env::var("MARKET_PRICER")
            .unwrap_or_else(|_| "ucb".to_string())
            .to_lowercase()
            .as_str()
        {
            "mwu" => PricingStrategy::Mwu {
                learning_rate: env_or("MARKET_LEARNING_RATE", DEFAULT_MWU_LEARNING_RATE)?,
            },
            "ucb" => PricingStrategy::Ucb {
                confidence_c: env_or("MARKET_CONFIDENCE_C", DEFAULT_UCB_CONFIDENCE_C)?,
            },
            other => anyhow::bail!("Unknown MARKET_PRICER '{}', expected 'mwu' or 'ucb'", other),
        };

        let seed = match env::var("MARKET_SEED") {
            Ok(val) => Some(val.parse().context("Failed to parse MARKET_SEED")?),
            Err(_) => None,
        };

        let config = MarketConfig {
            // Pricing
            price_min: env_or("MARKET_PRICE_MIN", DEFAULT_PRICE_MIN)?,
            price_max: env_or("MARKET_PRICE_MAX", DEFAULT_PRICE_MAX)?,
            num_experts: env_or("MARKET_NUM_EXPERTS", DEFAULT_NUM_EXPERTS)?,
            pricing_strategy,

            // Auction
            noise_coefficient: env_or("MARKET_NOISE_COEFFICIENT", DEFAULT_NOISE_COEFFICIENT)?,
            integration_points: env_or("MARKET_INTEGRATION_POINTS", DEFAULT_INTEGRATION_POINTS)?,

            // Revenue division
            shapley_iterations: env_or("MARKET_SHAPLEY_ITERATIONS", DEFAULT_SHAPLEY_ITERATIONS)?,
            duplication_lambda: env_or("MARKET_DUPLICATION_LAMBDA", DEFAULT_DUPLICATION_LAMBDA)?,

            // Simulation
            contributors: env_or("MARKET_CONTRIBUTORS", DEFAULT_CONTRIBUTORS)?,
            observations: env_or("MARKET_OBSERVATIONS", DEFAULT_OBSERVATIONS)?,
            rounds: env_or("MARKET_ROUNDS", DEFAULT_ROUNDS)?,
            buyer_valuation: env_or("MARKET_BUYER_VALUATION", DEFAULT_BUYER_VALUATION)?,
            seed,
        };

        config.validate()?;
        Ok(config)
    }

    /// Fail fast on settings that would otherwise surface as NaN later.
    pub fn validate(&self) -> std::result::Result<(), MarketError> {
        crate::pricing::discretize_prices(self.price_min, self.price_max, self.num_experts)?;

        match self.pricing_strategy {
            PricingStrategy::Mwu { learning_rate } if !(learning_rate > 0.0 && learning_rate < 1.0) => {
                return Err(MarketError::Config(format!(
                    "MWU learning rate must lie in (0, 1), got {}",
                    learning_rate
                )));
            }
            PricingStrategy::Ucb { confidence_c } if !(confidence_c >= 0.0 && confidence_c.is_finite()) => {
                return Err(MarketError::Config(format!(
                    "UCB confidence must be finite and non-negative, got {}",
                    confidence_c
                )));
            }
            _ => {}
        }

        if !(self.noise_coefficient >= 0.0 && self.noise_coefficient.is_finite()) {
            return Err(MarketError::Config(format!(
                "noise coefficient must be finite and non-negative, got {}",
                self.noise_coefficient
            )));
        }
        if self.integration_points < 3 || self.integration_points % 2 == 0 {
            return Err(MarketError::Config(format!(
                "integration points must be odd and at least 3, got {}",
                self.integration_points
            )));
        }
        if self.shapley_iterations == 0 {
            return Err(MarketError::Config("shapley iterations must be at least 1".into()));
        }
        if !(self.duplication_lambda >= 0.0 && self.duplication_lambda.is_finite()) {
            return Err(MarketError::Config(format!(
                "duplication lambda must be finite and non-negative, got {}",
                self.duplication_lambda
            )));
        }
        if self.contributors == 0 || self.observations == 0 {
            return Err(MarketError::Config(
                "the simulated pool needs at least one contributor and one observation".into(),
            ));
        }
        if !(self.buyer_valuation >= 0.0 && self.buyer_valuation.is_finite()) {
            return Err(MarketError::Config(format!(
                "buyer valuation must be finite and non-negative, got {}",
                self.buyer_valuation
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(MarketConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_experts_fails_fast() {
        let config = MarketConfig {
            num_experts: 0,
            ..MarketConfig::default()
        };
        assert!(matches!(config.validate(), Err(MarketError::Config(_))));
    }

    #[test]
    fn zero_shapley_iterations_fails_fast() {
        let config = MarketConfig {
            shapley_iterations: 0,
            ..MarketConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_price_range_fails_fast() {
        let config = MarketConfig {
            price_min: 100.0,
            price_max: 100.0,
            ..MarketConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn mwu_learning_rate_is_checked() {
        let config = MarketConfig {
            pricing_strategy: PricingStrategy::Mwu { learning_rate: 1.5 },
            ..MarketConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
