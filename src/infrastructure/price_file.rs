//! Reference price from the Jupiter/Pumpswap price dump file.
//!
//! A sidecar process refreshes the JSON file on its own schedule; we only
//! read it. Layout: `{"data": {"<mint>": {"price": "<string>"}},
//! "fetch_timestamp": "<iso8601>"}`.

use crate::domain::opportunity::ReferencePrice;
use crate::infrastructure::traits::ReferencePriceSource;
use crate::shared::errors::PriceError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct PriceFileDoc {
    data: HashMap<String, TokenPriceEntry>,
    fetch_timestamp: String,
}

#[derive(Debug, Deserialize)]
struct TokenPriceEntry {
    price: String,
}

/// Reads the price dump file from disk on every fetch.
pub struct JupiterPriceFile {
    path: PathBuf,
    token_mint: String,
}

impl JupiterPriceFile {
    pub fn new(path: impl Into<PathBuf>, token_mint: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            token_mint: token_mint.into(),
        }
    }

    /// The producer writes a naive local-ish ISO timestamp; accept RFC 3339
    /// and fall back to a naive parse treated as UTC.
    fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, PriceError> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| PriceError::InvalidData(format!("bad fetch_timestamp '{}': {}", raw, e)))
    }
}

#[async_trait]
impl ReferencePriceSource for JupiterPriceFile {
    async fn fetch(&self) -> Result<ReferencePrice, PriceError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| {
                PriceError::FeedUnavailable(format!("read {}: {}", self.path.display(), e))
            })?;
        let doc: PriceFileDoc = serde_json::from_str(&raw)
            .map_err(|e| PriceError::InvalidData(format!("parse price file: {}", e)))?;

        let entry = doc
            .data
            .get(&self.token_mint)
            .ok_or_else(|| PriceError::Missing(self.token_mint.clone()))?;
        let price_sol: f64 = entry
            .price
            .parse()
            .map_err(|e| PriceError::InvalidData(format!("bad price '{}': {}", entry.price, e)))?;
        if !(price_sol.is_finite() && price_sol > 0.0) {
            return Err(PriceError::InvalidData(format!(
                "non-positive price {} for {}",
                price_sol, self.token_mint
            )));
        }

        Ok(ReferencePrice {
            price_sol,
            captured_at: Self::parse_timestamp(&doc.fetch_timestamp)?,
        })
    }
}
