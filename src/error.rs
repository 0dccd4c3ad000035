// src/error.rs
use thiserror::Error;

/// Errors raised by the market core.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("Numeric failure: {0}")]
    Numeric(String),

    #[error("Gain oracle failure: {0}")]
    Oracle(String),

    #[error("Pricing state error: {0}")]
    Pricing(String),

    #[error("Invalid bid: {0}")]
    InvalidBid(f64),

    #[error("Transaction denied by the access layer")]
    AccessDenied,
}

pub type Result<T> = std::result::Result<T, MarketError>;
