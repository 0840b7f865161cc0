//! Candidate-pool catalog from the Meteora DLMM REST API.

use crate::domain::catalog::RawPool;
use crate::infrastructure::traits::PoolCatalogSource;
use crate::shared::errors::CatalogError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

/// Response from `GET /pair/all_by_groups?include_token_mints=<mint>`.
/// Numeric fields arrive as strings.
#[derive(Debug, Deserialize)]
struct AllByGroupsResponse {
    groups: Vec<PairGroup>,
}

#[derive(Debug, Deserialize)]
struct PairGroup {
    pairs: Vec<ApiPair>,
}

#[derive(Debug, Deserialize)]
struct ApiPair {
    address: String,
    name: String,
    reserve_y_amount: serde_json::Value,
    base_fee_percentage: String,
    max_fee_percentage: String,
    bin_step: u16,
}

impl ApiPair {
    fn into_raw_pool(self) -> Result<RawPool, CatalogError> {
        // reserve_y_amount is usually a bare integer but has been observed
        // as a string on some pairs.
        let reserve_y_lamports = match &self.reserve_y_amount {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
        .ok_or_else(|| {
            CatalogError::MalformedResponse(format!(
                "bad reserve_y_amount for {}: {}",
                self.address, self.reserve_y_amount
            ))
        })?;
        let base_fee_pct: f64 = self.base_fee_percentage.parse().map_err(|e| {
            CatalogError::MalformedResponse(format!(
                "bad base_fee_percentage for {}: {}",
                self.address, e
            ))
        })?;
        let max_fee_pct: f64 = self.max_fee_percentage.parse().map_err(|e| {
            CatalogError::MalformedResponse(format!(
                "bad max_fee_percentage for {}: {}",
                self.address, e
            ))
        })?;
        Ok(RawPool {
            address: self.address,
            name: self.name,
            reserve_y_lamports,
            base_fee_pct,
            max_fee_pct,
            bin_step: self.bin_step,
        })
    }
}

pub struct MeteoraApiClient {
    http: Client,
    base_url: String,
    token_mint: String,
}

impl MeteoraApiClient {
    pub fn new(base_url: impl Into<String>, token_mint: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            base_url: base_url.into(),
            token_mint: token_mint.into(),
        }
    }
}

#[async_trait]
impl PoolCatalogSource for MeteoraApiClient {
    async fn list_candidate_pools(&self) -> Result<Vec<RawPool>, CatalogError> {
        let url = format!(
            "{}/pair/all_by_groups?include_token_mints={}",
            self.base_url.trim_end_matches('/'),
            self.token_mint
        );
        info!("🔍 Fetching Meteora pool data...");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| CatalogError::RequestFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(CatalogError::RequestFailed(format!(
                "API request failed: {}",
                response.status()
            )));
        }
        let body: AllByGroupsResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::MalformedResponse(e.to_string()))?;

        let group = body.groups.into_iter().next().ok_or_else(|| {
            CatalogError::MalformedResponse("no pair groups for token".to_string())
        })?;
        let pools = group
            .pairs
            .into_iter()
            .map(ApiPair::into_raw_pool)
            .collect::<Result<Vec<_>, _>>()?;

        info!("📊 Found {} pools for token", pools.len());
        Ok(pools)
    }
}
