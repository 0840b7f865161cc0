use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::Path, time::Duration};

#[derive(Debug, Clone, Deserialize)]
pub struct RpcCfg {
    pub url: String,
}

impl Default for RpcCfg {
    fn default() -> Self {
        Self {
            url: "https://api.mainnet-beta.solana.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokensCfg {
    /// Traded token mint (token X of the DLMM pair).
    pub token_mint: String,
    /// Decimals of the traded token. Part of the price-normalization
    /// contract: pool bin prices are scaled by 10^(token_decimals - 9).
    pub token_decimals: u8,
}

impl Default for TokensCfg {
    fn default() -> Self {
        Self {
            token_mint: "71Jvq4Epe2FCJ7JFSF7jLXdNk1Wy4Bhqd9iL6bEFELvg".to_string(),
            token_decimals: 8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceFeedCfg {
    /// Path to the Jupiter price snapshot JSON file.
    pub file: String,
    /// Staleness ceiling for the reference price.
    pub max_age_ms: u64,
}

impl Default for PriceFeedCfg {
    fn default() -> Self {
        Self {
            file: "data/pumpswap_price_data.json".to_string(),
            max_age_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogCfg {
    /// Meteora DLMM API base URL.
    pub api_url: String,
    /// Lower bound on pool admission, in SOL.
    pub min_liquidity_sol: f64,
    /// Upper bound on pool admission, base fee percent.
    pub max_fee_pct: f64,
    /// Pool cache refresh interval.
    pub cache_ttl_ms: u64,
}

impl Default for CatalogCfg {
    fn default() -> Self {
        Self {
            api_url: "https://dlmm-api.meteora.ag".to_string(),
            min_liquidity_sol: 0.1,
            max_fee_pct: 4.0,
            cache_ttl_ms: 600_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeCfg {
    /// Floor for both directions' required profit, percent.
    pub base_profit_threshold_pct: f64,
    /// Per-net-buy escalation step, percent.
    pub threshold_increment_pct: f64,
    /// Funding-asset amount per trade, in SOL.
    pub size_sol: f64,
    /// Minimum time between successful trades.
    pub min_cooldown_ms: u64,
    /// Lifetime trade ceiling.
    pub max_trades_total: u32,
    /// Sell-path quote safety margin, percent discount off the quoted output.
    pub slippage_tolerance_pct: f64,
    /// Widened margin for the single sell-path retry.
    pub fallback_slippage_tolerance_pct: f64,
}

impl Default for TradeCfg {
    fn default() -> Self {
        Self {
            base_profit_threshold_pct: 0.5,
            threshold_increment_pct: 0.2,
            size_sol: 0.01,
            min_cooldown_ms: 30_000,
            max_trades_total: 100,
            slippage_tolerance_pct: 2.0,
            fallback_slippage_tolerance_pct: 5.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceCfg {
    /// Sell-only mode entry/exit threshold, in SOL.
    pub min_sol: f64,
}

impl Default for BalanceCfg {
    fn default() -> Self {
        Self { min_sol: 0.05 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanCfg {
    /// Cycle sleep duration.
    pub check_interval_ms: u64,
    /// Pacing delay between pool price reads.
    pub inter_query_delay_ms: u64,
    /// Delay after a detected rate-limit error.
    pub rate_limit_backoff_ms: u64,
    /// Pause after an unexpected cycle-level error before resuming.
    pub recovery_pause_ms: u64,
}

impl Default for ScanCfg {
    fn default() -> Self {
        Self {
            check_interval_ms: 10_000,
            inter_query_delay_ms: 2_000,
            rate_limit_backoff_ms: 10_000,
            recovery_pause_ms: 30_000,
        }
    }
}

/// Bot configuration, loaded from Config.toml with per-section defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub rpc: RpcCfg,
    #[serde(default)]
    pub tokens: TokensCfg,
    #[serde(default)]
    pub price_feed: PriceFeedCfg,
    #[serde(default)]
    pub catalog: CatalogCfg,
    #[serde(default)]
    pub trade: TradeCfg,
    #[serde(default)]
    pub balance: BalanceCfg,
    #[serde(default)]
    pub scan: ScanCfg,
}

impl BotConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path.as_ref())
            .with_context(|| format!("read config file {}", path.as_ref().display()))?;
        let cfg: Self = toml::from_str(&s).context("parse Config.toml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.trade.size_sol <= 0.0 {
            anyhow::bail!("trade.size_sol must be positive");
        }
        if self.trade.base_profit_threshold_pct < 0.0 || self.trade.threshold_increment_pct < 0.0 {
            anyhow::bail!("profit thresholds must be non-negative");
        }
        if self.trade.fallback_slippage_tolerance_pct < self.trade.slippage_tolerance_pct {
            anyhow::bail!("fallback slippage tolerance must be at least the primary tolerance");
        }
        if self.catalog.min_liquidity_sol < 0.0 {
            anyhow::bail!("catalog.min_liquidity_sol must be non-negative");
        }
        Ok(())
    }

    pub fn min_cooldown(&self) -> Duration {
        Duration::from_millis(self.trade.min_cooldown_ms)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.scan.check_interval_ms)
    }

    pub fn inter_query_delay(&self) -> Duration {
        Duration::from_millis(self.scan.inter_query_delay_ms)
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_millis(self.scan.rate_limit_backoff_ms)
    }

    pub fn recovery_pause(&self) -> Duration {
        Duration::from_millis(self.scan.recovery_pause_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.catalog.cache_ttl_ms)
    }
}
