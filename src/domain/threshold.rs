//! Dynamic profit-threshold policy driven by trade history

use crate::shared::types::TradeDirection;

/// Running trade counters. Net buy pressure is buys minus sells, floored at
/// zero; it feeds the buy-side threshold escalation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradeHistory {
    pub buy_trades: u32,
    pub sell_trades: u32,
    pub net_buy_pressure: u32,
}

impl TradeHistory {
    /// Fold one completed trade into the counters. Only successful
    /// completions reach this point.
    pub fn record_fill(&mut self, direction: TradeDirection) {
        match direction {
            TradeDirection::Buy => {
                self.buy_trades += 1;
                self.net_buy_pressure += 1;
            }
            TradeDirection::Sell => {
                self.sell_trades += 1;
                self.net_buy_pressure = self.net_buy_pressure.saturating_sub(1);
            }
        }
    }
}

/// Monotone-adjustable required-profit threshold.
///
/// Sell trades always pay the base threshold. Buy trades pay
/// base + net_buy_pressure x increment, never below base, so each net buy
/// fill is progressively harder to repeat until offset by sells.
#[derive(Debug, Clone)]
pub struct ThresholdController {
    base_pct: f64,
    increment_pct: f64,
}

impl ThresholdController {
    pub fn new(base_pct: f64, increment_pct: f64) -> Self {
        Self {
            base_pct,
            increment_pct,
        }
    }

    /// Required threshold percentage for a trade in `direction`. Pure
    /// function of the history state.
    pub fn required_threshold(&self, direction: TradeDirection, history: &TradeHistory) -> f64 {
        match direction {
            TradeDirection::Sell => self.base_pct,
            TradeDirection::Buy => {
                let dynamic = self.base_pct + history.net_buy_pressure as f64 * self.increment_pct;
                dynamic.max(self.base_pct)
            }
        }
    }
}
