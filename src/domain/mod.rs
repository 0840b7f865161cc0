//! Domain layer - trading policy, state, and decision logic

pub mod balance;
pub mod catalog;
pub mod execution;
pub mod opportunity;
pub mod threshold;

pub use balance::{BalanceGuard, BalanceState};
pub use catalog::{PoolCatalog, PoolDescriptor, RawPool};
pub use execution::{SlippageLadder, SwapOutcome, SwapQuote, TradeExecutor};
pub use opportunity::{Opportunity, OpportunityEvaluator, PoolPriceSample, ReferencePrice};
pub use threshold::{ThresholdController, TradeHistory};

use crate::shared::types::TradeDirection;
use chrono::{DateTime, Utc};
use std::time::Instant;

/// Outcome of one execution attempt. Immutable once created; appended to the
/// in-memory trade log for observability and folded into [`TradeHistory`].
#[derive(Debug, Clone)]
pub struct TradeRecord {
    pub id: String,
    pub pool_address: String,
    pub direction: TradeDirection,
    pub amount_in: u64,
    pub amount_out: u64,
    pub success: bool,
    pub signature: Option<String>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// The single explicit mutable state object threaded through every component
/// call. Mutated only by the scan loop's thread of control; no locking is
/// needed because nothing runs concurrently with it.
#[derive(Debug)]
pub struct BotContext {
    pub history: TradeHistory,
    pub balance: BalanceState,
    pub trade_log: Vec<TradeRecord>,
    /// Proxy for realized profit: output amount x signed gap at opportunity
    /// time, not exact settlement accounting.
    pub total_profit_estimate: f64,
    pub last_trade_at: Option<Instant>,
    pub completed_trades: u32,
    pub sell_only_periods: u32,
}

impl BotContext {
    pub fn new() -> Self {
        Self {
            history: TradeHistory::default(),
            balance: BalanceState::default(),
            trade_log: Vec::new(),
            total_profit_estimate: 0.0,
            last_trade_at: None,
            completed_trades: 0,
            sell_only_periods: 0,
        }
    }
}

impl Default for BotContext {
    fn default() -> Self {
        Self::new()
    }
}
