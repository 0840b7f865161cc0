//! Common types used across the application

use serde::{Deserialize, Serialize};

/// Trade direction relative to a pool: buy the traded token with SOL, or
/// sell it back for SOL. Kept as a dedicated enum so buy/sell never travels
/// through an interchangeable boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl TradeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeDirection::Buy => "BUY",
            TradeDirection::Sell => "SELL",
        }
    }
}
