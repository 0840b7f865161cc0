//! Collaborator seams for external systems. Domain and application code
//! depend on these traits only, so tests substitute scripted fakes.

use crate::domain::catalog::RawPool;
use crate::domain::execution::{SwapOutcome, SwapQuote};
use crate::domain::opportunity::{PoolPriceSample, ReferencePrice};
use crate::shared::errors::{CatalogError, PriceError, SwapError};
use crate::shared::types::TradeDirection;
use async_trait::async_trait;

/// Source of the cross-venue reference price for the traded token.
#[async_trait]
pub trait ReferencePriceSource: Send + Sync {
    async fn fetch(&self) -> Result<ReferencePrice, PriceError>;
}

/// Source of candidate pools for the traded token, unfiltered.
#[async_trait]
pub trait PoolCatalogSource: Send + Sync {
    async fn list_candidate_pools(&self) -> Result<Vec<RawPool>, CatalogError>;
}

/// Reads a pool's current spot price. Always hits the venue; callers must
/// not cache samples across scan cycles.
#[async_trait]
pub trait PoolPriceSource: Send + Sync {
    async fn read_pool_price(&self, pool_address: &str) -> Result<PoolPriceSample, SwapError>;
}

/// Quote and execute swaps against one pool.
#[async_trait]
pub trait SwapClient: Send + Sync {
    async fn quote(
        &self,
        pool_address: &str,
        direction: TradeDirection,
        amount_in: u64,
    ) -> Result<SwapQuote, SwapError>;

    async fn execute_swap(
        &self,
        pool_address: &str,
        direction: TradeDirection,
        amount_in: u64,
        min_amount_out: u64,
    ) -> Result<SwapOutcome, SwapError>;
}

/// Reads the wallet's funding-asset (SOL) balance.
#[async_trait]
pub trait WalletBalanceSource: Send + Sync {
    async fn funding_balance_sol(&self) -> Result<f64, SwapError>;
}
