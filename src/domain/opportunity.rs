//! Opportunity evaluation - price gap, required profit, viability, ranking

use crate::domain::balance::BalanceState;
use crate::domain::catalog::PoolDescriptor;
use crate::domain::threshold::{ThresholdController, TradeHistory};
use crate::shared::types::TradeDirection;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// Reference price for the traded asset in SOL, with its capture time.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencePrice {
    pub price_sol: f64,
    pub captured_at: DateTime<Utc>,
}

impl ReferencePrice {
    pub fn age_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.captured_at).num_milliseconds()
    }

    /// Usable iff the capture age does not exceed the staleness window.
    pub fn is_usable(&self, now: DateTime<Utc>, max_age_ms: u64) -> bool {
        let age = self.age_ms(now);
        age >= 0 && age as u64 <= max_age_ms
    }
}

/// A pool's observed spot price, read fresh every scan and never cached
/// across cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolPriceSample {
    pub price_sol: f64,
    pub bin_id: i32,
}

/// Derived, immutable per-scan value for one (reference, pool, sample)
/// triple. Non-viable opportunities are still fully populated so the cycle
/// report can show why nothing traded.
#[derive(Debug, Clone, PartialEq)]
pub struct Opportunity {
    pub pool_address: String,
    pub pool_name: String,
    pub bin_step: u16,
    pub liquidity_sol: f64,
    pub base_fee_pct: f64,

    pub reference_price: f64,
    pub pool_price: f64,
    /// Signed absolute price difference in SOL.
    pub price_diff: f64,
    /// Signed gap percent: (pool - reference) / reference * 100.
    pub price_diff_pct: f64,

    /// Buy when the pool is cheaper than reference, sell when dearer.
    /// None when the gap is exactly zero.
    pub direction: Option<TradeDirection>,
    pub buy_threshold_pct: f64,
    pub sell_threshold_pct: f64,
    /// Pool fee + direction-specific threshold.
    pub required_profit_pct: f64,

    pub viable: bool,
    pub should_buy: bool,
    pub should_sell: bool,
    /// A buy that passed the raw profit test but was suppressed by
    /// sell-only mode, reported for observability.
    pub filtered_by_balance: bool,

    /// Excess profit above the admission bar; zero when not viable.
    pub rank: f64,
}

/// Pure evaluator: identical inputs always yield identical opportunities.
pub struct OpportunityEvaluator {
    controller: ThresholdController,
}

impl OpportunityEvaluator {
    pub fn new(controller: ThresholdController) -> Self {
        Self { controller }
    }

    /// Current (buy, sell) admission thresholds for reporting.
    pub fn required_thresholds(&self, history: &TradeHistory) -> (f64, f64) {
        (
            self.controller
                .required_threshold(TradeDirection::Buy, history),
            self.controller
                .required_threshold(TradeDirection::Sell, history),
        )
    }

    pub fn evaluate(
        &self,
        reference: &ReferencePrice,
        pool: &PoolDescriptor,
        sample: &PoolPriceSample,
        balance: &BalanceState,
        history: &TradeHistory,
    ) -> Opportunity {
        let price_diff = sample.price_sol - reference.price_sol;
        let price_diff_pct = price_diff / reference.price_sol * 100.0;
        let abs_diff_pct = price_diff_pct.abs();

        let direction = match price_diff_pct.partial_cmp(&0.0) {
            Some(Ordering::Less) => Some(TradeDirection::Buy),
            Some(Ordering::Greater) => Some(TradeDirection::Sell),
            _ => None,
        };

        let buy_threshold_pct = self
            .controller
            .required_threshold(TradeDirection::Buy, history);
        let sell_threshold_pct = self
            .controller
            .required_threshold(TradeDirection::Sell, history);

        let required_profit_buy = pool.base_fee_pct + buy_threshold_pct;
        let required_profit_sell = pool.base_fee_pct + sell_threshold_pct;

        let raw_should_buy =
            direction == Some(TradeDirection::Buy) && abs_diff_pct >= required_profit_buy;
        let should_sell =
            direction == Some(TradeDirection::Sell) && abs_diff_pct >= required_profit_sell;

        // Sell-only mode suppresses buys entirely, but the raw signal is
        // kept visible through filtered_by_balance.
        let filtered_by_balance = balance.sell_only && raw_should_buy;
        let should_buy = raw_should_buy && !balance.sell_only;

        let viable = should_buy || should_sell;

        let required_profit_pct = match direction {
            Some(TradeDirection::Buy) => required_profit_buy,
            _ => required_profit_sell,
        };

        let rank = if viable {
            abs_diff_pct - required_profit_pct
        } else {
            0.0
        };

        Opportunity {
            pool_address: pool.address.clone(),
            pool_name: pool.name.clone(),
            bin_step: pool.bin_step,
            liquidity_sol: pool.liquidity_sol,
            base_fee_pct: pool.base_fee_pct,
            reference_price: reference.price_sol,
            pool_price: sample.price_sol,
            price_diff,
            price_diff_pct,
            direction,
            buy_threshold_pct,
            sell_threshold_pct,
            required_profit_pct,
            viable,
            should_buy,
            should_sell,
            filtered_by_balance,
            rank,
        }
    }
}

/// Keep only viable opportunities, sorted descending by rank. The sort is
/// stable, so equal ranks retain catalog order.
pub fn rank_opportunities(mut opportunities: Vec<Opportunity>) -> Vec<Opportunity> {
    opportunities.retain(|op| op.viable);
    opportunities.sort_by(|a, b| b.rank.partial_cmp(&a.rank).unwrap_or(Ordering::Equal));
    opportunities
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(address: &str, base_fee_pct: f64) -> PoolDescriptor {
        PoolDescriptor {
            address: address.to_string(),
            name: format!("TOKEN-SOL {}", address),
            liquidity_sol: 5.0,
            base_fee_pct,
            max_fee_pct: base_fee_pct * 2.0,
            bin_step: 100,
        }
    }

    fn reference(price: f64) -> ReferencePrice {
        ReferencePrice {
            price_sol: price,
            captured_at: Utc::now(),
        }
    }

    fn sample(price: f64) -> PoolPriceSample {
        PoolPriceSample {
            price_sol: price,
            bin_id: 0,
        }
    }

    fn history(pressure: u32) -> TradeHistory {
        TradeHistory {
            buy_trades: pressure,
            sell_trades: 0,
            net_buy_pressure: pressure,
        }
    }

    fn evaluator() -> OpportunityEvaluator {
        OpportunityEvaluator::new(ThresholdController::new(0.5, 0.2))
    }

    #[test]
    fn scenario_a_viable_buy_at_zero_pressure() {
        // Pool 10% cheaper, fee 0.5%, base threshold 0.5% -> required 1.0%.
        let op = evaluator().evaluate(
            &reference(0.00010000),
            &pool("p1", 0.5),
            &sample(0.00009000),
            &BalanceState::default(),
            &history(0),
        );
        assert!((op.price_diff_pct - -10.0).abs() < 1e-9);
        assert_eq!(op.direction, Some(TradeDirection::Buy));
        assert!((op.buy_threshold_pct - 0.5).abs() < 1e-9);
        assert!((op.required_profit_pct - 1.0).abs() < 1e-9);
        assert!(op.viable);
        assert!(op.should_buy);
        assert!((op.rank - 9.0).abs() < 1e-9);
    }

    #[test]
    fn scenario_b_escalated_threshold_still_viable() {
        // Net buy pressure 20 -> buy threshold 0.5 + 20 * 0.2 = 4.5%.
        let op = evaluator().evaluate(
            &reference(0.00010000),
            &pool("p1", 0.5),
            &sample(0.00009000),
            &BalanceState::default(),
            &history(20),
        );
        assert!((op.buy_threshold_pct - 4.5).abs() < 1e-9);
        assert!((op.required_profit_pct - 5.0).abs() < 1e-9);
        assert!(op.viable);
        assert!((op.rank - 5.0).abs() < 1e-9);
    }

    #[test]
    fn scenario_c_sell_only_mode_suppresses_buy() {
        let balance = BalanceState {
            balance_sol: 0.01,
            sell_only: true,
        };
        let op = evaluator().evaluate(
            &reference(0.00010000),
            &pool("p1", 0.5),
            &sample(0.00009000),
            &balance,
            &history(0),
        );
        assert!(!op.should_buy);
        assert!(!op.viable);
        assert!(op.filtered_by_balance);
        assert_eq!(op.rank, 0.0);
    }

    #[test]
    fn sell_side_uses_base_threshold() {
        // Pool 10% dearer than reference.
        let op = evaluator().evaluate(
            &reference(0.00010000),
            &pool("p1", 0.5),
            &sample(0.00011000),
            &BalanceState::default(),
            &history(20),
        );
        assert_eq!(op.direction, Some(TradeDirection::Sell));
        assert!((op.sell_threshold_pct - 0.5).abs() < 1e-9);
        assert!((op.required_profit_pct - 1.0).abs() < 1e-9);
        assert!(op.should_sell);
        assert!((op.rank - 9.0).abs() < 1e-9);
    }

    #[test]
    fn zero_gap_has_no_direction() {
        let op = evaluator().evaluate(
            &reference(0.0001),
            &pool("p1", 0.5),
            &sample(0.0001),
            &BalanceState::default(),
            &history(0),
        );
        assert_eq!(op.direction, None);
        assert!(!op.viable);
        assert_eq!(op.rank, 0.0);
    }

    #[test]
    fn sub_threshold_gap_is_reported_not_viable() {
        // 0.8% gap < 1.0% required: populated but not viable.
        let op = evaluator().evaluate(
            &reference(0.00010000),
            &pool("p1", 0.5),
            &sample(0.00009920),
            &BalanceState::default(),
            &history(0),
        );
        assert_eq!(op.direction, Some(TradeDirection::Buy));
        assert!(!op.viable);
        assert_eq!(op.rank, 0.0);
    }

    #[test]
    fn evaluation_is_pure() {
        let eval = evaluator();
        let r = reference(0.0001);
        let p = pool("p1", 0.5);
        let s = sample(0.00009);
        let b = BalanceState::default();
        let h = history(3);
        let first = eval.evaluate(&r, &p, &s, &b, &h);
        let second = eval.evaluate(&r, &p, &s, &b, &h);
        assert_eq!(first, second);
    }

    #[test]
    fn ranking_is_stable_descending() {
        let eval = evaluator();
        let r = reference(0.0001);
        let b = BalanceState::default();
        let h = history(0);
        // Two pools with identical gaps (equal rank) plus one better pool.
        let ops = vec![
            eval.evaluate(&r, &pool("first_equal", 0.5), &sample(0.00009), &b, &h),
            eval.evaluate(&r, &pool("second_equal", 0.5), &sample(0.00009), &b, &h),
            eval.evaluate(&r, &pool("best", 0.5), &sample(0.00008), &b, &h),
            eval.evaluate(&r, &pool("not_viable", 0.5), &sample(0.0000999), &b, &h),
        ];
        let ranked = rank_opportunities(ops);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].pool_address, "best");
        assert_eq!(ranked[1].pool_address, "first_equal");
        assert_eq!(ranked[2].pool_address, "second_equal");
    }

    #[test]
    fn reference_price_staleness() {
        let now = Utc::now();
        let fresh = ReferencePrice {
            price_sol: 0.0001,
            captured_at: now - chrono::Duration::milliseconds(30_000),
        };
        let stale = ReferencePrice {
            price_sol: 0.0001,
            captured_at: now - chrono::Duration::milliseconds(61_000),
        };
        assert!(fresh.is_usable(now, 60_000));
        assert!(!stale.is_usable(now, 60_000));
    }
}
