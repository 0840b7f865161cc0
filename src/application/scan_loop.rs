//! The main scan loop: refresh state, scan pools, rank, execute at most one
//! trade per cycle, then cool down until the next interval.

use crate::application::stats::SessionStats;
use crate::domain::{
    BalanceGuard, BotContext, Opportunity, OpportunityEvaluator, PoolCatalog, PoolDescriptor,
    ThresholdController, TradeExecutor,
};
use crate::domain::opportunity::rank_opportunities;
use crate::infrastructure::traits::{
    PoolCatalogSource, PoolPriceSource, ReferencePriceSource, SwapClient, WalletBalanceSource,
};
use crate::shared::config::BotConfig;
use crate::shared::errors::AppError;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Loop phases. `Idle` before the first cycle, `Scanning` during a cycle,
/// `Cooling` between cycles, `Stopped` after shutdown. Stop requests are
/// honored at the Idle and Cooling boundaries, never mid-scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Scanning,
    Cooling,
    Stopped,
}

pub struct ScanLoop {
    config: BotConfig,
    reference_source: Arc<dyn ReferencePriceSource>,
    pool_price_source: Arc<dyn PoolPriceSource>,
    catalog: PoolCatalog,
    balance_guard: BalanceGuard,
    evaluator: OpportunityEvaluator,
    executor: TradeExecutor,
    stop: Arc<AtomicBool>,
    simulate_only: bool,
    state: LoopState,
}

impl ScanLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: BotConfig,
        reference_source: Arc<dyn ReferencePriceSource>,
        catalog_source: Arc<dyn PoolCatalogSource>,
        pool_price_source: Arc<dyn PoolPriceSource>,
        swap_client: Arc<dyn SwapClient>,
        wallet: Arc<dyn WalletBalanceSource>,
        stop: Arc<AtomicBool>,
        simulate_only: bool,
    ) -> Self {
        let catalog = PoolCatalog::new(
            catalog_source,
            config.catalog.min_liquidity_sol,
            config.catalog.max_fee_pct,
            config.cache_ttl(),
        );
        let balance_guard = BalanceGuard::new(wallet, config.balance.min_sol);
        let evaluator = OpportunityEvaluator::new(ThresholdController::new(
            config.trade.base_profit_threshold_pct,
            config.trade.threshold_increment_pct,
        ));
        let executor = TradeExecutor::new(swap_client, &config);
        Self {
            config,
            reference_source,
            pool_price_source,
            catalog,
            balance_guard,
            evaluator,
            executor,
            stop,
            simulate_only,
            state: LoopState::Idle,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run cycles until a stop is requested or the trade cap is hit.
    pub async fn run(&mut self, ctx: &mut BotContext) -> Result<(), AppError> {
        let mut stats = SessionStats::new();
        info!(
            "🚀 Starting scan loop | interval {}ms | trade cap {}",
            self.config.scan.check_interval_ms, self.config.trade.max_trades_total
        );
        if self.simulate_only {
            info!("🧪 Simulation mode: opportunities are logged, never executed");
        }

        while !self.stop.load(Ordering::SeqCst) {
            self.state = LoopState::Idle;
            if let Err(e) = self.run_cycle(ctx, &mut stats).await {
                error!("❌ Scan cycle failed: {}", e);
                tokio::time::sleep(self.config.recovery_pause()).await;
            }

            self.state = LoopState::Cooling;
            if self.stop.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(self.config.check_interval()).await;
        }

        self.state = LoopState::Stopped;
        info!("🛑 Scan loop stopped");
        stats.print_summary(ctx);
        Ok(())
    }

    /// One full scan cycle, ending with the session report. Public so tests
    /// can drive cycles directly. The trade cap never stops the loop: the
    /// executor rejects per trade and scanning/reporting continue.
    pub async fn run_cycle(
        &mut self,
        ctx: &mut BotContext,
        stats: &mut SessionStats,
    ) -> Result<(), AppError> {
        stats.cycles_completed += 1;
        let result = self.scan(ctx, stats).await;
        let (buy_threshold, sell_threshold) = self.evaluator.required_thresholds(&ctx.history);
        stats.print_cycle_report(ctx, buy_threshold, sell_threshold);
        result
    }

    async fn scan(
        &mut self,
        ctx: &mut BotContext,
        stats: &mut SessionStats,
    ) -> Result<(), AppError> {
        let balance = self.balance_guard.refresh(ctx).await;

        let pools: Vec<PoolDescriptor> =
            self.catalog.refresh_if_stale(Instant::now()).await.to_vec();
        if pools.is_empty() {
            warn!("⚠️ No pools pass the catalog filters, skipping cycle");
            return Ok(());
        }

        // A stale or missing reference price invalidates the whole cycle:
        // no pool is queried against an unusable baseline.
        let reference = match self.reference_source.fetch().await {
            Ok(reference) => reference,
            Err(e) => {
                warn!("⚠️ Reference price unavailable: {}", e);
                stats.cycles_skipped_stale_price += 1;
                return Ok(());
            }
        };
        let now = Utc::now();
        if !reference.is_usable(now, self.config.price_feed.max_age_ms) {
            warn!(
                "⚠️ Reference price stale ({}ms old, max {}ms), skipping cycle",
                reference.age_ms(now),
                self.config.price_feed.max_age_ms
            );
            stats.cycles_skipped_stale_price += 1;
            return Ok(());
        }

        self.state = LoopState::Scanning;
        info!(
            "🔍 Scanning {} pools | reference {:.8} SOL | net pressure {}",
            pools.len(),
            reference.price_sol,
            ctx.history.net_buy_pressure
        );

        let mut opportunities: Vec<Opportunity> = Vec::with_capacity(pools.len());
        let mut pace_next = false;
        for pool in pools.iter() {
            if pace_next {
                tokio::time::sleep(self.config.inter_query_delay()).await;
            }
            pace_next = true;
            let sample = match self.pool_price_source.read_pool_price(&pool.address).await {
                Ok(sample) => sample,
                Err(e) if e.is_rate_limit() => {
                    warn!("⏳ Rate limited on {}, backing off: {}", pool.name, e);
                    // The backoff replaces the normal pacing delay before
                    // the next query.
                    tokio::time::sleep(self.config.rate_limit_backoff()).await;
                    pace_next = false;
                    continue;
                }
                Err(e) => {
                    warn!("⚠️ Could not read price for {}: {}", pool.name, e);
                    continue;
                }
            };
            stats.pools_scanned += 1;

            let op = self
                .evaluator
                .evaluate(&reference, pool, &sample, &balance, &ctx.history);
            info!(
                "📐 {} | pool {:.8} | gap {:+.2}% | required {:.2}% | {}",
                op.pool_name,
                op.pool_price,
                op.price_diff_pct,
                op.required_profit_pct,
                if op.viable {
                    "VIABLE"
                } else if op.filtered_by_balance {
                    "FILTERED (sell-only)"
                } else {
                    "skip"
                }
            );
            opportunities.push(op);
        }

        let ranked = rank_opportunities(opportunities);
        stats.viable_opportunities += ranked.len() as u64;
        let best = match ranked.first() {
            Some(best) => best,
            None => return Ok(()),
        };

        if self.simulate_only {
            info!(
                "🧪 Would execute {} on {} (rank {:.2})",
                best.direction.map(|d| d.as_str()).unwrap_or("-"),
                best.pool_name,
                best.rank
            );
            return Ok(());
        }

        match self
            .executor
            .execute(ctx, &self.balance_guard, best, Instant::now())
            .await
        {
            Ok(record) => {
                stats.trades_executed += 1;
                if record.success {
                    stats.successful_trades += 1;
                } else {
                    stats.failed_trades += 1;
                }
            }
            Err(rejection) => {
                info!("⏸️ Trade not admitted: {}", rejection);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::RawPool;
    use crate::domain::execution::{SwapOutcome, SwapQuote};
    use crate::domain::opportunity::{PoolPriceSample, ReferencePrice};
    use crate::shared::errors::{CatalogError, PriceError, SwapError};
    use crate::shared::types::TradeDirection;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct FixedReference {
        price_sol: f64,
        age_ms: i64,
    }

    #[async_trait]
    impl ReferencePriceSource for FixedReference {
        async fn fetch(&self) -> Result<ReferencePrice, PriceError> {
            Ok(ReferencePrice {
                price_sol: self.price_sol,
                captured_at: Utc::now() - chrono::Duration::milliseconds(self.age_ms),
            })
        }
    }

    struct OnePool;

    #[async_trait]
    impl PoolCatalogSource for OnePool {
        async fn list_candidate_pools(&self) -> Result<Vec<RawPool>, CatalogError> {
            Ok(vec![RawPool {
                address: "pool1".to_string(),
                name: "TOKEN-SOL".to_string(),
                reserve_y_lamports: 5_000_000_000,
                base_fee_pct: 0.5,
                max_fee_pct: 1.0,
                bin_step: 100,
            }])
        }
    }

    struct CountingPoolPrice {
        price_sol: f64,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl PoolPriceSource for CountingPoolPrice {
        async fn read_pool_price(&self, _pool_address: &str) -> Result<PoolPriceSample, SwapError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(PoolPriceSample {
                price_sol: self.price_sol,
                bin_id: 0,
            })
        }
    }

    struct AlwaysFills;

    #[async_trait]
    impl SwapClient for AlwaysFills {
        async fn quote(
            &self,
            _pool_address: &str,
            _direction: TradeDirection,
            amount_in: u64,
        ) -> Result<SwapQuote, SwapError> {
            Ok(SwapQuote {
                in_amount: amount_in,
                out_amount: 1_000_000,
            })
        }

        async fn execute_swap(
            &self,
            _pool_address: &str,
            _direction: TradeDirection,
            amount_in: u64,
            _min_amount_out: u64,
        ) -> Result<SwapOutcome, SwapError> {
            Ok(SwapOutcome {
                consumed_in_amount: amount_in,
                out_amount: 1_000_000,
                signature: "sig".to_string(),
            })
        }
    }

    struct RichWallet;

    #[async_trait]
    impl WalletBalanceSource for RichWallet {
        async fn funding_balance_sol(&self) -> Result<f64, SwapError> {
            Ok(1.0)
        }
    }

    fn fast_config() -> BotConfig {
        let mut config = BotConfig::default();
        config.scan.inter_query_delay_ms = 0;
        config.scan.rate_limit_backoff_ms = 0;
        config
    }

    fn scan_loop(
        reference: FixedReference,
        price_source: Arc<CountingPoolPrice>,
    ) -> ScanLoop {
        ScanLoop::new(
            fast_config(),
            Arc::new(reference),
            Arc::new(OnePool),
            price_source,
            Arc::new(AlwaysFills),
            Arc::new(RichWallet),
            Arc::new(AtomicBool::new(false)),
            false,
        )
    }

    #[tokio::test]
    async fn stale_reference_price_skips_all_pool_reads() {
        let price_source = Arc::new(CountingPoolPrice {
            price_sol: 0.00009,
            reads: AtomicUsize::new(0),
        });
        // 61s old against the 60s default window.
        let mut scan = scan_loop(
            FixedReference {
                price_sol: 0.0001,
                age_ms: 61_000,
            },
            price_source.clone(),
        );
        let mut ctx = BotContext::new();
        let mut stats = SessionStats::new();

        scan.run_cycle(&mut ctx, &mut stats).await.unwrap();

        assert_eq!(price_source.reads.load(Ordering::SeqCst), 0);
        assert_eq!(stats.cycles_skipped_stale_price, 1);
        assert_eq!(stats.pools_scanned, 0);
        // A skipped cycle still counts and reports.
        assert_eq!(stats.cycles_completed, 1);
    }

    #[tokio::test]
    async fn fresh_price_with_viable_gap_executes_one_trade() {
        let price_source = Arc::new(CountingPoolPrice {
            price_sol: 0.00011,
            reads: AtomicUsize::new(0),
        });
        let mut scan = scan_loop(
            FixedReference {
                price_sol: 0.0001,
                age_ms: 1_000,
            },
            price_source.clone(),
        );
        let mut ctx = BotContext::new();
        let mut stats = SessionStats::new();

        scan.run_cycle(&mut ctx, &mut stats).await.unwrap();

        assert_eq!(price_source.reads.load(Ordering::SeqCst), 1);
        assert_eq!(stats.viable_opportunities, 1);
        assert_eq!(stats.trades_executed, 1);
        assert_eq!(stats.successful_trades, 1);
        assert_eq!(ctx.completed_trades, 1);
        assert_eq!(ctx.history.sell_trades, 1);
    }

    #[tokio::test]
    async fn simulation_mode_never_executes() {
        let price_source = Arc::new(CountingPoolPrice {
            price_sol: 0.00011,
            reads: AtomicUsize::new(0),
        });
        let mut scan = ScanLoop::new(
            fast_config(),
            Arc::new(FixedReference {
                price_sol: 0.0001,
                age_ms: 1_000,
            }),
            Arc::new(OnePool),
            price_source,
            Arc::new(AlwaysFills),
            Arc::new(RichWallet),
            Arc::new(AtomicBool::new(false)),
            true,
        );
        let mut ctx = BotContext::new();
        let mut stats = SessionStats::new();

        scan.run_cycle(&mut ctx, &mut stats).await.unwrap();

        assert_eq!(stats.viable_opportunities, 1);
        assert_eq!(stats.trades_executed, 0);
        assert_eq!(ctx.completed_trades, 0);
    }

    struct RateLimitedThenFine {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PoolPriceSource for RateLimitedThenFine {
        async fn read_pool_price(&self, _pool_address: &str) -> Result<PoolPriceSample, SwapError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(SwapError::RateLimited("429".to_string()))
            } else {
                Ok(PoolPriceSample {
                    price_sol: 0.00009,
                    bin_id: 0,
                })
            }
        }
    }

    struct TwoPools;

    #[async_trait]
    impl PoolCatalogSource for TwoPools {
        async fn list_candidate_pools(&self) -> Result<Vec<RawPool>, CatalogError> {
            Ok(vec![
                RawPool {
                    address: "pool1".to_string(),
                    name: "TOKEN-SOL A".to_string(),
                    reserve_y_lamports: 5_000_000_000,
                    base_fee_pct: 0.5,
                    max_fee_pct: 1.0,
                    bin_step: 100,
                },
                RawPool {
                    address: "pool2".to_string(),
                    name: "TOKEN-SOL B".to_string(),
                    reserve_y_lamports: 5_000_000_000,
                    base_fee_pct: 0.5,
                    max_fee_pct: 1.0,
                    bin_step: 100,
                },
            ])
        }
    }

    #[tokio::test]
    async fn cycle_counters_accumulate_across_cycles() {
        let price_source = Arc::new(CountingPoolPrice {
            price_sol: 0.00011,
            reads: AtomicUsize::new(0),
        });
        let mut scan = scan_loop(
            FixedReference {
                price_sol: 0.0001,
                age_ms: 1_000,
            },
            price_source,
        );
        let mut ctx = BotContext::new();
        let mut stats = SessionStats::new();

        scan.run_cycle(&mut ctx, &mut stats).await.unwrap();
        // Second cycle: same gap, but the trade falls inside the cooldown.
        scan.run_cycle(&mut ctx, &mut stats).await.unwrap();

        assert_eq!(stats.cycles_completed, 2);
        assert_eq!(stats.pools_scanned, 2);
        assert_eq!(stats.viable_opportunities, 2);
        assert_eq!(stats.trades_executed, 1);
        assert_eq!(stats.successful_trades, 1);
        assert_eq!(ctx.completed_trades, 1);
    }

    #[tokio::test]
    async fn trade_cap_does_not_stop_scanning() {
        let price_source = Arc::new(CountingPoolPrice {
            price_sol: 0.00011,
            reads: AtomicUsize::new(0),
        });
        let mut scan = scan_loop(
            FixedReference {
                price_sol: 0.0001,
                age_ms: 1_000,
            },
            price_source.clone(),
        );
        let mut ctx = BotContext::new();
        ctx.completed_trades = fast_config().trade.max_trades_total;
        let mut stats = SessionStats::new();

        // Cycles keep scanning and reporting; only execution is rejected.
        scan.run_cycle(&mut ctx, &mut stats).await.unwrap();
        scan.run_cycle(&mut ctx, &mut stats).await.unwrap();

        assert_eq!(price_source.reads.load(Ordering::SeqCst), 2);
        assert_eq!(stats.cycles_completed, 2);
        assert_eq!(stats.viable_opportunities, 2);
        assert_eq!(stats.trades_executed, 0);
        assert_eq!(ctx.completed_trades, fast_config().trade.max_trades_total);
    }

    #[tokio::test]
    async fn state_moves_from_idle_to_scanning() {
        let price_source = Arc::new(CountingPoolPrice {
            price_sol: 0.00011,
            reads: AtomicUsize::new(0),
        });
        let mut scan = scan_loop(
            FixedReference {
                price_sol: 0.0001,
                age_ms: 1_000,
            },
            price_source,
        );
        assert_eq!(scan.state(), LoopState::Idle);

        let mut ctx = BotContext::new();
        let mut stats = SessionStats::new();
        scan.run_cycle(&mut ctx, &mut stats).await.unwrap();
        // The pool-scan phase was entered; the run loop moves on to Cooling.
        assert_eq!(scan.state(), LoopState::Scanning);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_replaces_pacing_delay() {
        let price_source = Arc::new(RateLimitedThenFine {
            calls: AtomicUsize::new(0),
        });
        let mut config = BotConfig::default();
        config.scan.inter_query_delay_ms = 2_000;
        config.scan.rate_limit_backoff_ms = 10_000;
        let mut scan = ScanLoop::new(
            config,
            Arc::new(FixedReference {
                price_sol: 0.0001,
                age_ms: 1_000,
            }),
            Arc::new(TwoPools),
            price_source,
            Arc::new(AlwaysFills),
            Arc::new(RichWallet),
            Arc::new(AtomicBool::new(false)),
            true,
        );
        let mut ctx = BotContext::new();
        let mut stats = SessionStats::new();

        let started = tokio::time::Instant::now();
        scan.run_cycle(&mut ctx, &mut stats).await.unwrap();
        let elapsed = started.elapsed();

        // The first pool read is rate limited. The backoff (10s) replaces
        // the pacing delay before the second query; stacking both would
        // take 12s.
        assert!(elapsed >= std::time::Duration::from_millis(10_000));
        assert!(elapsed < std::time::Duration::from_millis(11_000));
        assert_eq!(stats.pools_scanned, 1);
    }

    #[tokio::test]
    async fn rate_limited_pool_does_not_abort_the_cycle() {
        let price_source = Arc::new(RateLimitedThenFine {
            calls: AtomicUsize::new(0),
        });
        let mut scan = ScanLoop::new(
            fast_config(),
            Arc::new(FixedReference {
                price_sol: 0.0001,
                age_ms: 1_000,
            }),
            Arc::new(TwoPools),
            price_source.clone(),
            Arc::new(AlwaysFills),
            Arc::new(RichWallet),
            Arc::new(AtomicBool::new(false)),
            true,
        );
        let mut ctx = BotContext::new();
        let mut stats = SessionStats::new();

        scan.run_cycle(&mut ctx, &mut stats).await.unwrap();

        // First pool read was rate limited, second still evaluated.
        assert_eq!(price_source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(stats.pools_scanned, 1);
        assert_eq!(stats.viable_opportunities, 1);
    }
}
