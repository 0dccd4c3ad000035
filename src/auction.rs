// src/auction.rs
use log::debug;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::config::{DEFAULT_INTEGRATION_POINTS, DEFAULT_NOISE_COEFFICIENT};
use crate::error::{MarketError, Result};
use crate::models::{FeaturePool, Target};
use crate::oracle::{GainFn, GainOracle, gain_rmse, prediction_gain};

/// Truthful auction: Gaussian degradation as the allocation rule and the
/// Myerson payment `b * G(b) - integral_0^b G(z) dz` as the revenue rule.
pub struct HonestAuction {
    oracle: Box<dyn GainOracle>,
    gain_fn: GainFn,
    noise_coefficient: f64,
    integration_points: usize,
}

impl HonestAuction {
    pub fn new(
        oracle: Box<dyn GainOracle>,
        gain_fn: GainFn,
        noise_coefficient: f64,
        integration_points: usize,
    ) -> Result<Self> {
        if !noise_coefficient.is_finite() || noise_coefficient < 0.0 {
            return Err(MarketError::Config(format!(
                "noise_coefficient must be finite and non-negative, got {}",
                noise_coefficient
            )));
        }
        validate_integration_points(integration_points)?;

        Ok(Self {
            oracle,
            gain_fn,
            noise_coefficient,
            integration_points,
        })
    }

    /// RMSE gain, 0.1 noise coefficient, 101 Simpson nodes.
    pub fn with_defaults(oracle: Box<dyn GainOracle>) -> Self {
        Self {
            oracle,
            gain_fn: gain_rmse,
            noise_coefficient: DEFAULT_NOISE_COEFFICIENT,
            integration_points: DEFAULT_INTEGRATION_POINTS,
        }
    }

    pub fn noise_coefficient(&self) -> f64 {
        self.noise_coefficient
    }

    pub fn integration_points(&self) -> usize {
        self.integration_points
    }

    /// The pool as delivered to a buyer bidding `b_n` against price `p_n`.
    /// Full bids get an identical copy; shortfalls get element-wise noise with
    /// std `noise_coefficient * (p_n - b_n)`.
    pub fn allocate<R: Rng + ?Sized>(
        &self,
        pool: &FeaturePool,
        p_n: f64,
        b_n: f64,
        rng: &mut R,
    ) -> Result<FeaturePool> {
        check_amount("price", p_n)?;
        check_amount("bid", b_n)?;

        let noise_std = self.noise_coefficient * (p_n - b_n).max(0.0);
        if b_n >= p_n || noise_std == 0.0 {
            return Ok(pool.clone());
        }

        let noise = Normal::new(0.0, noise_std)
            .map_err(|e| MarketError::Numeric(format!("invalid noise distribution: {}", e)))?;
        Ok(pool.map_values(|v| v + noise.sample(rng)))
    }

    pub fn prediction_gain<R: Rng + ?Sized>(
        &self,
        pool: &FeaturePool,
        target: &Target,
        p_n: f64,
        b_n: f64,
        rng: &mut R,
    ) -> Result<f64> {
        pool.check_target(target)?;
        let degraded = self.allocate(pool, p_n, b_n, rng)?;
        let design = degraded.design_matrix(&degraded.all_contributors());

        let mut oracle = self.oracle.fresh();
        prediction_gain(oracle.as_mut(), self.gain_fn, &design, target.values())
    }

    /// Myerson revenue clamped at zero. The information-rent integral uses a
    /// fixed composite Simpson grid, so its error is bounded but nonzero.
    pub fn calculate_revenue<R: Rng + ?Sized>(
        &self,
        pool: &FeaturePool,
        target: &Target,
        p_n: f64,
        b_n: f64,
        rng: &mut R,
    ) -> Result<f64> {
        check_amount("price", p_n)?;
        if !b_n.is_finite() || b_n < 0.0 {
            return Err(MarketError::InvalidBid(b_n));
        }
        if b_n == 0.0 {
            return Ok(0.0);
        }

        let gain_at_bid = self.prediction_gain(pool, target, p_n, b_n, rng)?;

        let n = self.integration_points;
        let step = b_n / (n - 1) as f64;
        let mut samples = Vec::with_capacity(n);
        for k in 0..n - 1 {
            samples.push(self.prediction_gain(pool, target, p_n, step * k as f64, rng)?);
        }
        samples.push(gain_at_bid);
        let information_rent = composite_simpson(&samples, step);

        let revenue = b_n * gain_at_bid - information_rent;
        if !revenue.is_finite() {
            return Err(MarketError::Numeric(format!(
                "revenue evaluated to {} at price {:.2}, bid {:.2}",
                revenue, p_n, b_n
            )));
        }

        debug!(
            "Revenue at price {:.2}, bid {:.2}: gain={:.4}, rent={:.4}, revenue={:.4}",
            p_n, b_n, gain_at_bid, information_rent, revenue
        );
        Ok(revenue.max(0.0))
    }

    /// Revenue each candidate price would have produced against `b_n`.
    pub fn virtual_revenues<R: Rng + ?Sized>(
        &self,
        pool: &FeaturePool,
        target: &Target,
        experts: &[f64],
        b_n: f64,
        rng: &mut R,
    ) -> Result<Vec<f64>> {
        experts
            .iter()
            .map(|&price| self.calculate_revenue(pool, target, price, b_n, rng))
            .collect()
    }
}

fn validate_integration_points(points: usize) -> Result<()> {
    if points < 3 || points % 2 == 0 {
        return Err(MarketError::Config(format!(
            "integration_points must be odd and at least 3, got {}",
            points
        )));
    }
    Ok(())
}

fn check_amount(label: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(MarketError::Config(format!(
            "{} must be finite and non-negative, got {}",
            label, value
        )));
    }
    Ok(())
}

/// Composite Simpson's rule over evenly spaced samples (odd count).
pub(crate) fn composite_simpson(samples: &[f64], step: f64) -> f64 {
    let last = samples.len() - 1;
    let weighted: f64 = samples
        .iter()
        .enumerate()
        .map(|(k, y)| {
            let w = if k == 0 || k == last {
                1.0
            } else if k % 2 == 1 {
                4.0
            } else {
                2.0
            };
            w * y
        })
        .sum();
    weighted * step / 3.0
}
