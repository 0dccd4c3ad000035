// src/market.rs
use chrono::{NaiveDateTime, Utc};
use log::{debug, info};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use uuid::Uuid;

use crate::auction::HonestAuction;
use crate::config::MarketConfig;
use crate::error::{MarketError, Result};
use crate::models::{AccessDecision, FeaturePool, SessionReport, Target, TransactionResult};
use crate::oracle::{LinearRegressionOracle, gain_rmse};
use crate::pricing::{PricingPolicy, RoundOutcome, build_pricer};
use crate::revenue_divider::{self, RevenueDivider};

/// One simulated market session: a posted-price learner that persists across
/// transactions, plus the stateless auction and divider.
pub struct MarketSession {
    pricer: Box<dyn PricingPolicy>,
    auction: HonestAuction,
    divider: RevenueDivider,
    shapley_iterations: usize,
    duplication_lambda: f64,
    rng: ChaCha20Rng,
    run_id: String,
    started_at: NaiveDateTime,
    history: Vec<TransactionResult>,
}

impl MarketSession {
    pub fn new(
        pricer: Box<dyn PricingPolicy>,
        auction: HonestAuction,
        divider: RevenueDivider,
        shapley_iterations: usize,
        duplication_lambda: f64,
        rng: ChaCha20Rng,
    ) -> Result<Self> {
        if shapley_iterations == 0 {
            return Err(MarketError::Config("shapley_iterations must be at least 1".into()));
        }
        if !duplication_lambda.is_finite() || duplication_lambda < 0.0 {
            return Err(MarketError::Config(format!(
                "duplication_lambda must be finite and non-negative, got {}",
                duplication_lambda
            )));
        }

        let run_id = Uuid::new_v4().to_string();
        info!(
            "Market session {} started with {} pricer over {} experts",
            run_id,
            pricer.name(),
            pricer.experts().len()
        );

        Ok(Self {
            pricer,
            auction,
            divider,
            shapley_iterations,
            duplication_lambda,
            rng,
            run_id,
            started_at: Utc::now().naive_utc(),
            history: Vec::new(),
        })
    }

    /// Session backed by SmartCore linear regression and the RMSE gain.
    pub fn from_config(config: &MarketConfig) -> Result<Self> {
        config.validate()?;

        let pricer = build_pricer(
            config.pricing_strategy,
            config.price_min,
            config.price_max,
            config.num_experts,
        )?;
        let auction = HonestAuction::new(
            Box::new(LinearRegressionOracle::new()),
            gain_rmse,
            config.noise_coefficient,
            config.integration_points,
        )?;
        let divider = RevenueDivider::new(Box::new(LinearRegressionOracle::new()), gain_rmse);
        let rng = match config.seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_entropy(),
        };

        Self::new(
            pricer,
            auction,
            divider,
            config.shapley_iterations,
            config.duplication_lambda,
            rng,
        )
    }

    pub fn pricer(&self) -> &dyn PricingPolicy {
        self.pricer.as_ref()
    }

    pub fn history(&self) -> &[TransactionResult] {
        &self.history
    }

    /// Price, auction, learn, divide. A denied transaction leaves the session
    /// untouched.
    pub fn run_transaction(
        &mut self,
        pool: &FeaturePool,
        target: &Target,
        bid: f64,
        access: AccessDecision,
    ) -> Result<TransactionResult> {
        if access == AccessDecision::Denied {
            return Err(MarketError::AccessDenied);
        }
        if !bid.is_finite() || bid < 0.0 {
            return Err(MarketError::InvalidBid(bid));
        }
        pool.check_target(target)?;

        // Step 1: post a price
        let (price, expert_index) = self.pricer.choose_price(&mut self.rng)?;
        debug!("Posted price {:.2} (expert {})", price, expert_index);

        // Step 2: allocate and charge
        let gain = self
            .auction
            .prediction_gain(pool, target, price, bid, &mut self.rng)?;
        let revenue = self
            .auction
            .calculate_revenue(pool, target, price, bid, &mut self.rng)?;

        // Step 3: learn from the outcome
        let virtual_revenue = if self.pricer.needs_virtual_revenue() {
            let experts = self.pricer.experts().to_vec();
            Some(
                self.auction
                    .virtual_revenues(pool, target, &experts, bid, &mut self.rng)?,
            )
        } else {
            None
        };
        self.pricer.update(&RoundOutcome {
            expert_index,
            reward: revenue,
            virtual_revenue,
        })?;

        // Step 4: divide the revenue
        let shapley_values = self.divider.shapley_robust(
            pool,
            target,
            self.shapley_iterations,
            self.duplication_lambda,
            &mut self.rng,
        )?;
        let ratios = revenue_divider::payout_ratios(&shapley_values);
        let seller_payouts = revenue_divider::split_revenue(revenue, &ratios);

        let result = TransactionResult {
            transaction_id: Uuid::new_v4(),
            expert_index,
            market_price_offered: price,
            your_bid: bid,
            prediction_gain_achieved: gain,
            cost_to_you: revenue,
            shapley_values,
            seller_payouts,
        };

        info!(
            "Transaction {}: price={:.2}, bid={:.2}, gain={:.4}, revenue={:.2}",
            result.transaction_id, price, bid, gain, revenue
        );
        self.history.push(result.clone());
        Ok(result)
    }

    pub fn report(&self) -> SessionReport {
        let total_transactions = self.history.len();
        let total_revenue = self.history.iter().map(|t| t.cost_to_you).sum();
        let avg_prediction_gain = if total_transactions == 0 {
            0.0
        } else {
            self.history
                .iter()
                .map(|t| t.prediction_gain_achieved)
                .sum::<f64>()
                / total_transactions as f64
        };

        let mut contributor_payouts: Vec<f64> = Vec::new();
        for transaction in &self.history {
            if contributor_payouts.len() < transaction.seller_payouts.len() {
                contributor_payouts.resize(transaction.seller_payouts.len(), 0.0);
            }
            for (total, payout) in contributor_payouts.iter_mut().zip(&transaction.seller_payouts) {
                *total += payout;
            }
        }

        SessionReport {
            run_id: self.run_id.clone(),
            run_timestamp: self.started_at,
            pricing_strategy: self.pricer.name().to_string(),
            total_transactions,
            total_revenue,
            avg_prediction_gain,
            expert_stats: self.pricer.stats(),
            contributor_payouts,
        }
    }
}
