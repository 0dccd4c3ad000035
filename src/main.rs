// src/main.rs
use anyhow::{Context, Result};
use log::{info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::time::Instant;

use datamarket_lib::{
    AccessDecision, MarketSession,
    config::MarketConfig,
    registry::{DataRegistry, UnverifiedOwnership},
    synthetic,
};

fn main() -> Result<()> {
    // Load .env before the logger so RUST_LOG can come from it
    dotenv::dotenv().ok();

    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    info!("Starting data market simulation");
    let start_time = Instant::now();

    let config = MarketConfig::from_env().context("Failed to load market configuration")?;
    info!("Loaded configuration: {:?}", config);

    // Phase 1: data supply and registration
    info!("Phase 1: Contributor registration");
    let mut data_rng = match config.seed {
        Some(seed) => ChaCha20Rng::seed_from_u64(seed.wrapping_add(1)),
        None => ChaCha20Rng::from_entropy(),
    };
    let (raw_pool, target) =
        synthetic::generate_market_data(config.contributors, config.observations, &mut data_rng)
            .context("Failed to generate market data")?;

    let mut registry = DataRegistry::new(Box::new(UnverifiedOwnership));
    for (idx, row) in raw_pool.rows().iter().enumerate() {
        let contributor_id = format!("seller_{}", idx);
        let registration = registry
            .register(&contributor_id, row.clone(), &[])
            .with_context(|| format!("Failed to register {}", contributor_id))?;
        if !registration.is_accepted() {
            warn!("{} was not admitted: {:?}", contributor_id, registration);
        }
    }
    let contributor_ids = registry.contributor_ids();
    let pool = registry.into_pool().context("No contributor was admitted")?;
    info!(
        "Registration complete: {} contributors x {} observations",
        pool.contributors(),
        pool.observations()
    );

    // Phase 2: transactions
    info!("Phase 2: Running {} transaction(s)", config.rounds);
    let mut session = MarketSession::from_config(&config).context("Failed to build market session")?;
    let bid = config.buyer_valuation;

    for round in 0..config.rounds {
        let result = session
            .run_transaction(&pool, &target, bid, AccessDecision::Proceed)
            .with_context(|| format!("Transaction {} failed", round + 1))?;
        info!(
            "Round {}/{}: price offered {:.2}, cost {:.2}, gain {:.4}",
            round + 1,
            config.rounds,
            result.market_price_offered,
            result.cost_to_you,
            result.prediction_gain_achieved
        );
        for (id, payout) in contributor_ids.iter().zip(&result.seller_payouts) {
            info!("  {} receives {:.2}", id, payout);
        }
    }

    // Phase 3: report
    let report = session.report();
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize session report")?
    );

    info!(
        "Simulation completed in {:.2?}: {} transactions, total revenue {:.2}",
        start_time.elapsed(),
        report.total_transactions,
        report.total_revenue
    );
    Ok(())
}
