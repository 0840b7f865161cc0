//! Funding-balance tracking and sell-only mode switching

use crate::domain::BotContext;
use crate::infrastructure::traits::WalletBalanceSource;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Current funding-asset balance plus the restrictive-mode flag. The flag
/// uses a single threshold in both directions: below min is restrictive,
/// at or above min is not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BalanceState {
    pub balance_sol: f64,
    pub sell_only: bool,
}

/// Guards the SOL balance and toggles sell-only mode. A failed balance read
/// is treated as balance 0 and forces restrictive mode: an unreadable
/// balance is never treated as plenty of funds.
pub struct BalanceGuard {
    source: Arc<dyn WalletBalanceSource>,
    min_balance_sol: f64,
}

impl BalanceGuard {
    pub fn new(source: Arc<dyn WalletBalanceSource>, min_balance_sol: f64) -> Self {
        Self {
            source,
            min_balance_sol,
        }
    }

    /// Re-read the wallet balance and update the mode flag in the context.
    /// Returns the new state.
    pub async fn refresh(&self, ctx: &mut BotContext) -> BalanceState {
        let balance = match self.source.funding_balance_sol().await {
            Ok(balance) => balance,
            Err(e) => {
                error!("❌ Error checking SOL balance: {}", e);
                0.0
            }
        };

        let was_sell_only = ctx.balance.sell_only;
        let sell_only = balance < self.min_balance_sol;

        if !was_sell_only && sell_only {
            warn!(
                "🚨 SOL balance alert: {:.6} SOL < {} SOL",
                balance, self.min_balance_sol
            );
            warn!("🔒 Switching to SELL-ONLY mode to preserve SOL for fees");
            ctx.sell_only_periods += 1;
        } else if was_sell_only && !sell_only {
            info!(
                "✅ SOL balance restored: {:.6} SOL >= {} SOL",
                balance, self.min_balance_sol
            );
            info!("🔓 Resuming normal BUY/SELL operations");
        }

        ctx.balance = BalanceState {
            balance_sol: balance,
            sell_only,
        };

        let mode = if sell_only { "SELL-ONLY" } else { "BUY/SELL" };
        info!("💰 Current SOL balance: {:.6} SOL ({} mode)", balance, mode);

        ctx.balance.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::errors::SwapError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedBalances {
        values: Mutex<Vec<Result<f64, SwapError>>>,
    }

    impl ScriptedBalances {
        fn new(values: Vec<Result<f64, SwapError>>) -> Self {
            Self {
                values: Mutex::new(values),
            }
        }
    }

    #[async_trait]
    impl WalletBalanceSource for ScriptedBalances {
        async fn funding_balance_sol(&self) -> Result<f64, SwapError> {
            self.values.lock().unwrap().remove(0)
        }
    }

    #[tokio::test]
    async fn hysteresis_single_threshold_crossing() {
        // Sequence crosses min=0.05 downward then upward; values that stay
        // on one side must not flip the mode.
        let source = Arc::new(ScriptedBalances::new(vec![
            Ok(0.10),
            Ok(0.06),
            Ok(0.04), // crosses down -> restrictive
            Ok(0.02), // stays restrictive
            Ok(0.05), // crosses up (>= min) -> normal
            Ok(0.09),
        ]));
        let guard = BalanceGuard::new(source, 0.05);
        let mut ctx = BotContext::new();

        let expected = [false, false, true, true, false, false];
        for want in expected {
            let state = guard.refresh(&mut ctx).await;
            assert_eq!(state.sell_only, want);
        }
        assert_eq!(ctx.sell_only_periods, 1);
    }

    #[tokio::test]
    async fn read_failure_fails_safe() {
        let source = Arc::new(ScriptedBalances::new(vec![Err(SwapError::Rpc(
            "connection refused".to_string(),
        ))]));
        let guard = BalanceGuard::new(source, 0.05);
        let mut ctx = BotContext::new();

        let state = guard.refresh(&mut ctx).await;
        assert!(state.sell_only);
        assert_eq!(state.balance_sol, 0.0);
    }

    #[tokio::test]
    async fn balance_at_threshold_is_not_restrictive() {
        let source = Arc::new(ScriptedBalances::new(vec![Ok(0.05)]));
        let guard = BalanceGuard::new(source, 0.05);
        let mut ctx = BotContext::new();

        let state = guard.refresh(&mut ctx).await;
        assert!(!state.sell_only);
    }
}
