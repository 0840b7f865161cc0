//! Trade execution - admission control, sizing, and slippage-ladder retry

use crate::domain::balance::BalanceGuard;
use crate::domain::opportunity::Opportunity;
use crate::domain::{BotContext, TradeRecord};
use crate::infrastructure::traits::SwapClient;
use crate::shared::config::BotConfig;
use crate::shared::errors::{AdmissionError, SwapError};
use crate::shared::types::TradeDirection;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// A quote for a prospective swap, before slippage protection is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapQuote {
    pub in_amount: u64,
    pub out_amount: u64,
}

/// Result of a confirmed swap.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapOutcome {
    pub consumed_in_amount: u64,
    pub out_amount: u64,
    pub signature: String,
}

/// Two-step slippage policy for sells: quote at the primary tolerance, and
/// on a retryable failure widen once to the fallback tolerance. Never more
/// than two attempts per trade.
#[derive(Debug, Clone)]
pub struct SlippageLadder {
    primary_pct: f64,
    fallback_pct: f64,
}

impl SlippageLadder {
    pub fn new(primary_pct: f64, fallback_pct: f64) -> Self {
        Self {
            primary_pct,
            fallback_pct,
        }
    }

    pub fn attempts(&self) -> [f64; 2] {
        [self.primary_pct, self.fallback_pct]
    }

    /// Minimum acceptable output for a quoted amount at the given tolerance.
    pub fn min_out(quoted_out: u64, slippage_pct: f64) -> u64 {
        let kept = (100.0 - slippage_pct).max(0.0) / 100.0;
        (quoted_out as f64 * kept).floor() as u64
    }
}

/// Executes trades against one pool at a time. Holds no mutable state of
/// its own; all session state lives in [`BotContext`].
pub struct TradeExecutor {
    swap: Arc<dyn SwapClient>,
    size_sol: f64,
    token_decimals: u8,
    min_cooldown: Duration,
    max_trades_total: u32,
    ladder: SlippageLadder,
}

impl TradeExecutor {
    pub fn new(swap: Arc<dyn SwapClient>, config: &BotConfig) -> Self {
        Self {
            swap,
            size_sol: config.trade.size_sol,
            token_decimals: config.tokens.token_decimals,
            min_cooldown: config.min_cooldown(),
            max_trades_total: config.trade.max_trades_total,
            ladder: SlippageLadder::new(
                config.trade.slippage_tolerance_pct,
                config.trade.fallback_slippage_tolerance_pct,
            ),
        }
    }

    /// Cooldown and lifetime-cap checks, evaluated before any network call.
    /// Rejections are normal control flow and leave the context untouched.
    pub fn admit(&self, ctx: &BotContext, now: Instant) -> Result<(), AdmissionError> {
        if ctx.completed_trades >= self.max_trades_total {
            return Err(AdmissionError::TradeCapReached(self.max_trades_total));
        }
        if let Some(last) = ctx.last_trade_at {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.min_cooldown {
                let remaining = self.min_cooldown - elapsed;
                return Err(AdmissionError::CooldownActive {
                    remaining_ms: remaining.as_millis() as u64,
                });
            }
        }
        Ok(())
    }

    /// Execute the opportunity's trade. Returns the trade record on both
    /// success and swap failure; only admission rejections are errors.
    /// Failed swaps are logged but never advance the history counters,
    /// the trade count, or the cooldown clock.
    pub async fn execute(
        &self,
        ctx: &mut BotContext,
        guard: &BalanceGuard,
        opportunity: &Opportunity,
        now: Instant,
    ) -> Result<TradeRecord, AdmissionError> {
        // Only viable opportunities reach execution, and viability implies
        // a direction; a zero-gap opportunity is rejected with its own
        // variant rather than mislabeled as a mode or cooldown issue.
        let direction = match opportunity.direction {
            Some(direction) => direction,
            None => return Err(AdmissionError::NoDirection),
        };
        self.admit(ctx, now)?;

        // The cycle-start snapshot can be seconds old; a buy spends SOL, so
        // re-read the balance right before committing.
        if direction == TradeDirection::Buy {
            let state = guard.refresh(ctx).await;
            if state.sell_only {
                return Err(AdmissionError::SellOnlyMode);
            }
        }

        info!(
            "🎯 Executing {} on {} | gap {:.2}% | required {:.2}%",
            direction.as_str(),
            opportunity.pool_name,
            opportunity.price_diff_pct,
            opportunity.required_profit_pct
        );

        let amount_in = self.amount_in(direction, opportunity.pool_price);
        let result = match direction {
            TradeDirection::Buy => self.buy(&opportunity.pool_address, amount_in).await,
            TradeDirection::Sell => self.sell(&opportunity.pool_address, amount_in).await,
        };

        match result {
            Ok(outcome) => Ok(self.settle(ctx, opportunity, direction, &outcome)),
            Err(e) => {
                error!(
                    "❌ {} on {} failed: {}",
                    direction.as_str(),
                    opportunity.pool_name,
                    e
                );
                let record = TradeRecord {
                    id: Uuid::new_v4().to_string(),
                    pool_address: opportunity.pool_address.clone(),
                    direction,
                    amount_in,
                    amount_out: 0,
                    success: false,
                    signature: None,
                    error: Some(e.to_string()),
                    timestamp: Utc::now(),
                };
                ctx.trade_log.push(record.clone());
                Ok(record)
            }
        }
    }

    /// Buys send a fixed SOL amount and accept whatever fills: the bot is
    /// accumulating into a dislocated pool, so min_out is nominal.
    async fn buy(&self, pool_address: &str, lamports_in: u64) -> Result<SwapOutcome, SwapError> {
        self.swap
            .execute_swap(pool_address, TradeDirection::Buy, lamports_in, 1)
            .await
    }

    /// Sells quote first and protect the SOL proceeds with a slippage
    /// floor, retrying once at the wider tolerance on retryable failures.
    async fn sell(&self, pool_address: &str, token_amount: u64) -> Result<SwapOutcome, SwapError> {
        let mut last_error: Option<SwapError> = None;
        for (i, slippage_pct) in self.ladder.attempts().iter().enumerate() {
            if i > 0 {
                warn!(
                    "🔄 Retrying with higher slippage tolerance ({}%)...",
                    slippage_pct
                );
            }
            let attempt = async {
                let quote = self
                    .swap
                    .quote(pool_address, TradeDirection::Sell, token_amount)
                    .await?;
                if quote.out_amount == 0 {
                    return Err(SwapError::QuoteUnavailable(format!(
                        "zero-output quote for {}",
                        pool_address
                    )));
                }
                let min_out = SlippageLadder::min_out(quote.out_amount, *slippage_pct);
                self.swap
                    .execute_swap(pool_address, TradeDirection::Sell, token_amount, min_out)
                    .await
            };
            match attempt.await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    // Insufficient funds will not improve at wider slippage.
                    let fatal = e.is_insufficient_balance();
                    warn!("⚠️ SELL attempt at {}% slippage failed: {}", slippage_pct, e);
                    last_error = Some(e);
                    if fatal {
                        break;
                    }
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| SwapError::QuoteUnavailable("no sell attempt made".to_string())))
    }

    /// Input size in native units: lamports of SOL for buys, token base
    /// units worth `size_sol` at the pool price for sells.
    fn amount_in(&self, direction: TradeDirection, pool_price_sol: f64) -> u64 {
        match direction {
            TradeDirection::Buy => (self.size_sol * LAMPORTS_PER_SOL) as u64,
            TradeDirection::Sell => {
                let tokens = self.size_sol / pool_price_sol;
                (tokens * 10f64.powi(self.token_decimals as i32)) as u64
            }
        }
    }

    fn settle(
        &self,
        ctx: &mut BotContext,
        opportunity: &Opportunity,
        direction: TradeDirection,
        outcome: &SwapOutcome,
    ) -> TradeRecord {
        let record = TradeRecord {
            id: Uuid::new_v4().to_string(),
            pool_address: opportunity.pool_address.clone(),
            direction,
            amount_in: outcome.consumed_in_amount,
            amount_out: outcome.out_amount,
            success: true,
            signature: Some(outcome.signature.clone()),
            error: None,
            timestamp: Utc::now(),
        };

        ctx.history.record_fill(direction);
        ctx.completed_trades += 1;
        ctx.last_trade_at = Some(Instant::now());

        // Captured edge at decision time, not settlement accounting. The
        // output is valued in SOL first: sells pay out SOL directly, buys
        // pay out tokens valued at the pool price.
        let output_sol = match direction {
            TradeDirection::Sell => outcome.out_amount as f64 / LAMPORTS_PER_SOL,
            TradeDirection::Buy => {
                outcome.out_amount as f64 / 10f64.powi(self.token_decimals as i32)
                    * opportunity.pool_price
            }
        };
        let estimated = output_sol * opportunity.price_diff_pct.abs() / 100.0;
        ctx.total_profit_estimate += estimated;

        info!(
            "✅ {} confirmed: {} | est. edge {:.6} SOL | total trades {}",
            direction.as_str(),
            record.signature.as_deref().unwrap_or(""),
            estimated,
            ctx.completed_trades
        );
        ctx.trade_log.push(record.clone());
        record
    }
}
