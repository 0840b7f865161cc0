//! Error handling for the application

use thiserror::Error;

/// Reference-price errors
#[derive(Error, Debug, Clone)]
pub enum PriceError {
    #[error("Price data too old: {age_ms}ms (max: {max_ms}ms)")]
    Stale { age_ms: i64, max_ms: u64 },

    #[error("Missing price data for token {0}")]
    Missing(String),

    #[error("Invalid price data: {0}")]
    InvalidData(String),

    #[error("Price feed unavailable: {0}")]
    FeedUnavailable(String),
}

/// Pool-catalog errors
#[derive(Error, Debug, Clone)]
pub enum CatalogError {
    #[error("Catalog request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid catalog response structure: {0}")]
    MalformedResponse(String),
}

/// Swap and pool-query errors
#[derive(Error, Debug, Clone)]
pub enum SwapError {
    #[error("Rate limited by upstream: {0}")]
    RateLimited(String),

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("No valid quote received: {0}")]
    QuoteUnavailable(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Invalid pool data: {0}")]
    InvalidPoolData(String),
}

impl SwapError {
    /// True for errors that should trigger the longer scan backoff.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, SwapError::RateLimited(_))
    }

    /// True for failures that must not be retried at wider slippage.
    pub fn is_insufficient_balance(&self) -> bool {
        matches!(self, SwapError::InsufficientBalance)
    }

    /// Classify a raw RPC/transport error message into a variant.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("429") || lower.contains("too many requests") {
            SwapError::RateLimited(message)
        } else if lower.contains("insufficient") && (lower.contains("balance") || lower.contains("funds") || lower.contains("lamports")) {
            SwapError::InsufficientBalance
        } else {
            SwapError::Rpc(message)
        }
    }
}

/// Trade-admission rejections. These are expected control-flow outcomes,
/// not transport failures, and never count against the trade history.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdmissionError {
    #[error("Cooldown period active: {remaining_ms}ms remaining")]
    CooldownActive { remaining_ms: u64 },

    #[error("Max trades reached: {0}")]
    TradeCapReached(u32),

    #[error("Sell-only mode active, buy trades suppressed")]
    SellOnlyMode,

    #[error("Opportunity has no trade direction")]
    NoDirection,
}

/// General application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Price error: {0}")]
    Price(#[from] PriceError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Swap error: {0}")]
    Swap(#[from] SwapError),

    #[error("Unknown error: {0}")]
    Unknown(String),
}
