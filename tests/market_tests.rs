mod common;

use common::{RowSumOracle, clean_delivery, zero_pool};
use datamarket_lib::config::MarketConfig;
use datamarket_lib::pricing::{PricingStrategy, build_pricer};
use datamarket_lib::synthetic::generate_market_data;
use datamarket_lib::{
    AccessDecision, FeaturePool, HonestAuction, MarketError, MarketSession, RevenueDivider, Target,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

fn scenario_config(strategy: PricingStrategy, seed: u64) -> MarketConfig {
    MarketConfig {
        price_min: 50.0,
        price_max: 500.0,
        num_experts: 20,
        pricing_strategy: strategy,
        shapley_iterations: 50,
        contributors: 5,
        observations: 100,
        seed: Some(seed),
        ..MarketConfig::default()
    }
}

fn scenario_data(seed: u64) -> (FeaturePool, Target) {
    generate_market_data(5, 100, &mut ChaCha20Rng::seed_from_u64(seed)).unwrap()
}

fn assert_consistent(session: &MarketSession, bid: f64, result: &datamarket_lib::TransactionResult) {
    let experts = session.pricer().experts();
    assert_eq!(experts.len(), 20);
    assert_eq!(result.market_price_offered, experts[result.expert_index]);
    assert_eq!(result.your_bid, bid);
    assert!(result.cost_to_you >= 0.0);
    assert!((0.0..=1.0).contains(&result.prediction_gain_achieved));
    assert_eq!(result.seller_payouts.len(), 5);
    assert_eq!(result.shapley_values.len(), 5);

    let paid: f64 = result.seller_payouts.iter().sum();
    let tolerance = 1e-9 * result.cost_to_you.max(1.0);
    assert!(
        (paid - result.cost_to_you).abs() < tolerance,
        "payouts {} vs revenue {}",
        paid,
        result.cost_to_you
    );
}

#[test]
fn test_truthful_buyer_scenario_with_ucb() {
    let config = scenario_config(PricingStrategy::Ucb { confidence_c: 2.0 }, 2024);
    let (pool, target) = scenario_data(1);
    let mut session = MarketSession::from_config(&config).unwrap();

    let result = session
        .run_transaction(&pool, &target, 200.0, AccessDecision::Proceed)
        .unwrap();
    assert_consistent(&session, 200.0, &result);
    // UCB starts with the cheapest unexplored price
    assert_eq!(result.expert_index, 0);
    assert_eq!(result.market_price_offered, 50.0);
}

#[test]
fn test_truthful_buyer_scenario_with_mwu() {
    let mut config = scenario_config(PricingStrategy::Mwu { learning_rate: 0.1 }, 7);
    // A coarser integration grid keeps the per-expert counterfactuals cheap
    config.integration_points = 21;
    let (pool, target) = scenario_data(2);
    let mut session = MarketSession::from_config(&config).unwrap();

    for _ in 0..2 {
        let result = session
            .run_transaction(&pool, &target, 200.0, AccessDecision::Proceed)
            .unwrap();
        assert_consistent(&session, 200.0, &result);
    }

    let stats = session.pricer().stats();
    assert_eq!(stats.iter().map(|s| s.trials).sum::<usize>(), 2);
    assert!((stats.iter().map(|s| s.score).sum::<f64>() - 1.0).abs() < 1e-9);
}

#[test]
fn test_zero_bid_collects_nothing() {
    let config = scenario_config(PricingStrategy::Ucb { confidence_c: 2.0 }, 3);
    let (pool, target) = scenario_data(3);
    let mut session = MarketSession::from_config(&config).unwrap();

    let result = session
        .run_transaction(&pool, &target, 0.0, AccessDecision::Proceed)
        .unwrap();
    assert_eq!(result.cost_to_you, 0.0);
    assert!(result.seller_payouts.iter().all(|p| *p == 0.0));
}

#[test]
fn test_denied_access_leaves_session_untouched() {
    let config = scenario_config(PricingStrategy::Ucb { confidence_c: 2.0 }, 4);
    let (pool, target) = scenario_data(4);
    let mut session = MarketSession::from_config(&config).unwrap();

    let err = session
        .run_transaction(&pool, &target, 200.0, AccessDecision::Denied)
        .unwrap_err();
    assert!(matches!(err, MarketError::AccessDenied));
    assert!(session.history().is_empty());
    assert!(session.pricer().stats().iter().all(|s| s.trials == 0));
}

#[test]
fn test_shape_mismatch_is_rejected_before_pricing() {
    let config = scenario_config(PricingStrategy::Ucb { confidence_c: 2.0 }, 5);
    let (pool, _) = scenario_data(5);
    let short = Target::new(vec![1.0; 99]).unwrap();
    let mut session = MarketSession::from_config(&config).unwrap();

    let err = session
        .run_transaction(&pool, &short, 200.0, AccessDecision::Proceed)
        .unwrap_err();
    assert!(matches!(err, MarketError::Shape(_)));
    assert!(session.pricer().stats().iter().all(|s| s.trials == 0));
}

#[test]
fn test_ucb_session_learns_the_posted_price_revenue() {
    // Step allocation: a bid of 300 pays roughly the posted price if it covers it
    let pricer = build_pricer(PricingStrategy::Ucb { confidence_c: 2.0 }, 100.0, 400.0, 4).unwrap();
    let auction = HonestAuction::new(Box::new(RowSumOracle), clean_delivery, 0.1, 61).unwrap();
    let divider = RevenueDivider::new(Box::new(RowSumOracle), clean_delivery);
    let mut session = MarketSession::new(
        pricer,
        auction,
        divider,
        3,
        std::f64::consts::LN_2,
        ChaCha20Rng::seed_from_u64(10),
    )
    .unwrap();
    let (pool, target) = zero_pool(2, 8);

    let mut charged = Vec::new();
    for _ in 0..4 {
        let result = session
            .run_transaction(&pool, &target, 300.0, AccessDecision::Proceed)
            .unwrap();
        charged.push((result.market_price_offered, result.cost_to_you));
    }

    // One visit per expert, in order
    let prices: Vec<f64> = charged.iter().map(|(p, _)| *p).collect();
    assert_eq!(prices, vec![100.0, 200.0, 300.0, 400.0]);
    for (price, revenue) in &charged[..3] {
        assert!((revenue - price).abs() < 10.0, "charged {} at price {}", revenue, price);
    }
    assert_eq!(charged[3].1, 0.0);
}

#[test]
fn test_report_accumulates_history() {
    let pricer = build_pricer(PricingStrategy::Ucb { confidence_c: 2.0 }, 100.0, 400.0, 4).unwrap();
    let auction = HonestAuction::new(Box::new(RowSumOracle), clean_delivery, 0.1, 21).unwrap();
    let divider = RevenueDivider::new(Box::new(RowSumOracle), clean_delivery);
    let mut session =
        MarketSession::new(pricer, auction, divider, 2, 0.5, ChaCha20Rng::seed_from_u64(1)).unwrap();
    let (pool, target) = zero_pool(3, 6);

    for _ in 0..3 {
        session
            .run_transaction(&pool, &target, 250.0, AccessDecision::Proceed)
            .unwrap();
    }

    let report = session.report();
    assert_eq!(report.total_transactions, 3);
    assert_eq!(report.pricing_strategy, "ucb");
    assert_eq!(report.contributor_payouts.len(), 3);
    let revenue: f64 = session.history().iter().map(|t| t.cost_to_you).sum();
    assert!((report.total_revenue - revenue).abs() < 1e-9);
    assert!((report.contributor_payouts.iter().sum::<f64>() - revenue).abs() < 1e-6);
    assert_eq!(report.expert_stats.iter().map(|s| s.trials).sum::<usize>(), 3);

    let json = serde_json::to_value(&report).unwrap();
    assert!(json.get("run_timestamp").is_some());
}

#[test]
fn test_session_rejects_zero_shapley_iterations() {
    let pricer = build_pricer(PricingStrategy::Ucb { confidence_c: 2.0 }, 1.0, 2.0, 2).unwrap();
    let auction = HonestAuction::new(Box::new(RowSumOracle), clean_delivery, 0.1, 3).unwrap();
    let divider = RevenueDivider::new(Box::new(RowSumOracle), clean_delivery);
    let err = MarketSession::new(pricer, auction, divider, 0, 0.5, ChaCha20Rng::seed_from_u64(0))
        .err()
        .unwrap();
    assert!(matches!(err, MarketError::Config(_)));
}

#[test]
fn test_transaction_result_serializes_with_contract_field_names() {
    let config = scenario_config(PricingStrategy::Ucb { confidence_c: 2.0 }, 8);
    let (pool, target) = scenario_data(8);
    let mut session = MarketSession::from_config(&config).unwrap();
    let result = session
        .run_transaction(&pool, &target, 120.0, AccessDecision::Proceed)
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    for field in [
        "market_price_offered",
        "your_bid",
        "prediction_gain_achieved",
        "cost_to_you",
        "seller_payouts",
    ] {
        assert!(json.get(field).is_some(), "missing field {}", field);
    }
}
