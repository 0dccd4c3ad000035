// src/lib.rs
pub mod auction;
pub mod config;
pub mod error;
pub mod market;
pub mod models;
pub mod oracle;
pub mod pricing;
pub mod registry;
pub mod revenue_divider;
pub mod synthetic;

// Re-export common types for easier access
pub use models::{AccessDecision, FeaturePool, SessionReport, Target, TransactionResult};

// Re-export important functionality
pub use auction::HonestAuction;
pub use error::{MarketError, Result};
pub use market::MarketSession;
pub use oracle::{GainOracle, LinearRegressionOracle};
pub use pricing::{MwuPricer, PricingPolicy, PricingStrategy, UcbPricer};
pub use revenue_divider::RevenueDivider;
