//! Session statistics and the end-of-run report

use crate::domain::BotContext;
use std::time::{Duration, Instant};
use tracing::info;

/// Counters accumulated over one bot session. Owned by the scan loop and
/// printed on shutdown.
#[derive(Debug)]
pub struct SessionStats {
    pub start_time: Instant,
    pub cycles_completed: u64,
    pub cycles_skipped_stale_price: u64,
    pub pools_scanned: u64,
    pub viable_opportunities: u64,
    pub trades_executed: u64,
    pub successful_trades: u64,
    pub failed_trades: u64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            cycles_completed: 0,
            cycles_skipped_stale_price: 0,
            pools_scanned: 0,
            viable_opportunities: 0,
            trades_executed: 0,
            successful_trades: 0,
            failed_trades: 0,
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn success_rate(&self) -> f64 {
        if self.trades_executed == 0 {
            return 0.0;
        }
        self.successful_trades as f64 / self.trades_executed as f64 * 100.0
    }

    /// End-of-cycle session report, printed every scan cycle.
    pub fn print_cycle_report(
        &self,
        ctx: &BotContext,
        buy_threshold_pct: f64,
        sell_threshold_pct: f64,
    ) {
        let mode = if ctx.balance.sell_only {
            "SELL-ONLY"
        } else {
            "NORMAL"
        };
        let last_trade = match ctx.last_trade_at {
            Some(at) => format!("{}s ago", at.elapsed().as_secs()),
            None => "never".to_string(),
        };
        info!("📊 Session stats:");
        info!("   Cycles: {} ({} skipped on stale price)", self.cycles_completed, self.cycles_skipped_stale_price);
        info!("   Pools scanned: {}", self.pools_scanned);
        info!(
            "   SOL balance: {:.6} SOL ({} mode)",
            ctx.balance.balance_sol, mode
        );
        info!(
            "   Net BUY pressure: {} ({} buys / {} sells)",
            ctx.history.net_buy_pressure, ctx.history.buy_trades, ctx.history.sell_trades
        );
        info!(
            "   Current thresholds: BUY {:.1}% | SELL {:.1}%",
            buy_threshold_pct, sell_threshold_pct
        );
        info!("   Sell-only periods: {}", ctx.sell_only_periods);
        info!(
            "   Trades: {} ({} successful)",
            self.trades_executed, self.successful_trades
        );
        info!(
            "   Estimated profit: {:.6} SOL",
            ctx.total_profit_estimate
        );
        info!("   Runtime: {}s", self.uptime().as_secs());
        info!("   Last trade: {}", last_trade);
    }

    pub fn print_summary(&self, ctx: &BotContext) {
        let uptime = self.uptime();
        info!("📊 ===== SESSION SUMMARY =====");
        info!(
            "⏱️ Runtime: {}m {}s",
            uptime.as_secs() / 60,
            uptime.as_secs() % 60
        );
        info!(
            "🔁 Cycles: {} ({} skipped on stale price)",
            self.cycles_completed, self.cycles_skipped_stale_price
        );
        info!("🏊 Pools scanned: {}", self.pools_scanned);
        info!("🎯 Viable opportunities: {}", self.viable_opportunities);
        info!(
            "💱 Trades: {} executed, {} ok, {} failed ({:.1}% success)",
            self.trades_executed,
            self.successful_trades,
            self.failed_trades,
            self.success_rate()
        );
        info!(
            "📈 Net buy pressure: {} ({} buys / {} sells)",
            ctx.history.net_buy_pressure, ctx.history.buy_trades, ctx.history.sell_trades
        );
        info!(
            "💰 Estimated captured edge: {:.6} SOL",
            ctx.total_profit_estimate
        );
        info!(
            "🔒 Sell-only periods entered: {}",
            ctx.sell_only_periods
        );
        info!("📊 ============================");
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_handles_zero_trades() {
        let stats = SessionStats::new();
        assert_eq!(stats.success_rate(), 0.0);
    }

    #[test]
    fn success_rate_is_percentage() {
        let mut stats = SessionStats::new();
        stats.trades_executed = 4;
        stats.successful_trades = 3;
        stats.failed_trades = 1;
        assert!((stats.success_rate() - 75.0).abs() < 1e-9);
    }
}
