//! DLMM Arb - cross-venue arbitrage bot for Meteora DLMM pools
//! Built with Domain-Driven Design principles

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

// Re-export main types for convenience
pub use application::{ScanLoop, SessionStats};
pub use domain::{BotContext, OpportunityEvaluator, PoolCatalog, TradeExecutor};
pub use infrastructure::{DlmmClient, JupiterPriceFile, MeteoraApiClient};
pub use shared::config::BotConfig;
