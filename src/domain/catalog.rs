//! Pool catalog - filtering and TTL-cached refresh of tradeable candidates

use crate::infrastructure::traits::PoolCatalogSource;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// A pool as reported by the catalog collaborator, before filtering.
/// Liquidity is the raw SOL-side reserve in lamports.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPool {
    pub address: String,
    pub name: String,
    pub reserve_y_lamports: u64,
    pub base_fee_pct: f64,
    pub max_fee_pct: f64,
    pub bin_step: u16,
}

/// A pool admitted for scanning. Entries are replaced wholesale on refresh,
/// never partially mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolDescriptor {
    pub address: String,
    pub name: String,
    pub liquidity_sol: f64,
    pub base_fee_pct: f64,
    pub max_fee_pct: f64,
    pub bin_step: u16,
}

/// Caches the filtered candidate set and refreshes it on a TTL. A failed
/// refresh keeps serving the previous cache rather than clearing it.
pub struct PoolCatalog {
    source: Arc<dyn PoolCatalogSource>,
    min_liquidity_sol: f64,
    max_fee_pct: f64,
    ttl: Duration,
    cache: Vec<PoolDescriptor>,
    last_refresh: Option<Instant>,
}

impl PoolCatalog {
    pub fn new(
        source: Arc<dyn PoolCatalogSource>,
        min_liquidity_sol: f64,
        max_fee_pct: f64,
        ttl: Duration,
    ) -> Self {
        Self {
            source,
            min_liquidity_sol,
            max_fee_pct,
            ttl,
            cache: Vec::new(),
            last_refresh: None,
        }
    }

    /// Current candidate set without triggering a refresh.
    pub fn pools(&self) -> &[PoolDescriptor] {
        &self.cache
    }

    fn is_stale(&self, now: Instant) -> bool {
        match self.last_refresh {
            None => true,
            Some(at) => self.cache.is_empty() || now.duration_since(at) > self.ttl,
        }
    }

    /// Refresh the cache if the TTL elapsed or the cache is empty, then
    /// return the current candidate set.
    pub async fn refresh_if_stale(&mut self, now: Instant) -> &[PoolDescriptor] {
        if !self.is_stale(now) {
            return &self.cache;
        }

        info!("🔍 Fetching pool catalog...");
        match self.source.list_candidate_pools().await {
            Ok(raw) => {
                info!("📊 Found {} TOKEN-SOL pools", raw.len());
                let filtered = self.filter(raw);
                info!(
                    "✅ {} pools meet criteria (>= {} SOL liquidity, <= {}% fees)",
                    filtered.len(),
                    self.min_liquidity_sol,
                    self.max_fee_pct
                );
                self.cache = filtered;
                self.last_refresh = Some(now);
            }
            Err(e) => {
                // Sole fallback-to-cache path in the system.
                warn!(
                    "❌ Error fetching pool catalog: {} - serving {} cached pools",
                    e,
                    self.cache.len()
                );
            }
        }
        &self.cache
    }

    /// Apply the admission predicate: liquidity (normalized from lamports)
    /// at least the minimum AND base fee at most the maximum.
    pub fn filter(&self, raw: Vec<RawPool>) -> Vec<PoolDescriptor> {
        raw.into_iter()
            .filter_map(|pool| {
                let liquidity_sol = pool.reserve_y_lamports as f64 / LAMPORTS_PER_SOL;
                if liquidity_sol < self.min_liquidity_sol {
                    debug!(
                        "⚠️ Skipping {}: low liquidity ({:.2} SOL)",
                        pool.address, liquidity_sol
                    );
                    return None;
                }
                if pool.base_fee_pct > self.max_fee_pct {
                    debug!(
                        "⚠️ Skipping {}: high fees ({}%)",
                        pool.address, pool.base_fee_pct
                    );
                    return None;
                }
                Some(PoolDescriptor {
                    address: pool.address,
                    name: pool.name,
                    liquidity_sol,
                    base_fee_pct: pool.base_fee_pct,
                    max_fee_pct: pool.max_fee_pct,
                    bin_step: pool.bin_step,
                })
            })
            .collect()
    }
}
