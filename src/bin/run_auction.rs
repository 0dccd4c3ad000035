// src/bin/run_auction.rs
//
// Usage: run_auction <bid> [model_id]
// Prints the transaction result as JSON, or {"error": "..."} with exit code 1.
// The market sells one pooled model, so model_id is accepted for CLI
// compatibility with existing callers and only appears in the log.

use anyhow::{Context, Result};
use log::info;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde_json::json;

use datamarket_lib::{
    AccessDecision, MarketSession, TransactionResult, config::MarketConfig, synthetic,
};

fn run_auction(bid: f64, model_id: &str) -> Result<TransactionResult> {
    let config = MarketConfig::from_env().context("Failed to load market configuration")?;
    info!("Running single auction for model '{}' at bid {:.2}", model_id, bid);

    let mut data_rng = match config.seed {
        Some(seed) => ChaCha20Rng::seed_from_u64(seed.wrapping_add(1)),
        None => ChaCha20Rng::from_entropy(),
    };
    let (pool, target) =
        synthetic::generate_market_data(config.contributors, config.observations, &mut data_rng)?;

    let mut session = MarketSession::from_config(&config)?;
    Ok(session.run_transaction(&pool, &target, bid, AccessDecision::Proceed)?)
}

fn main() {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("warn"));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let outcome = args
        .first()
        .context("Missing <bid> argument")
        .and_then(|raw| raw.parse::<f64>().with_context(|| format!("Invalid bid '{}'", raw)))
        .and_then(|bid| run_auction(bid, args.get(1).map_or("default", |s| s.as_str())));

    match outcome {
        Ok(result) => match serde_json::to_string(&result) {
            Ok(body) => println!("{}", body),
            Err(e) => {
                println!("{}", json!({ "error": e.to_string() }));
                std::process::exit(1);
            }
        },
        Err(e) => {
            println!("{}", json!({ "error": format!("{:#}", e) }));
            std::process::exit(1);
        }
    }
}
