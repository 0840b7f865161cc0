//! Infrastructure layer - concrete clients for external systems

pub mod dlmm_client;
pub mod meteora_api;
pub mod price_file;
pub mod traits;

pub use dlmm_client::DlmmClient;
pub use meteora_api::MeteoraApiClient;
pub use price_file::JupiterPriceFile;
