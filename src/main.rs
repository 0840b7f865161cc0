use anyhow::{Context, Result};
use clap::Parser;
use dlmm_arb::application::ScanLoop;
use dlmm_arb::domain::BotContext;
use dlmm_arb::infrastructure::{DlmmClient, JupiterPriceFile, MeteoraApiClient};
use dlmm_arb::shared::config::BotConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(version, about = "Arbitrage bot for Meteora DLMM pools against a Jupiter reference price")]
struct Args {
    /// Path to config file
    #[arg(long, default_value = "Config.toml")]
    config: String,

    /// RPC endpoint URL (overrides config)
    #[arg(long)]
    rpc_url: Option<String>,

    /// Path to the reference price file (overrides config)
    #[arg(long)]
    price_file: Option<String>,

    /// Evaluate and log opportunities without executing swaps
    #[arg(long)]
    simulate_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let mut config = if std::path::Path::new(&args.config).exists() {
        BotConfig::from_file(&args.config)?
    } else {
        info!("⚙️ No config file at {}, using defaults", args.config);
        BotConfig::default()
    };
    if let Some(rpc_url) = args.rpc_url {
        config.rpc.url = rpc_url;
    }
    if let Some(price_file) = args.price_file {
        config.price_feed.file = price_file;
    }

    let wallet = DlmmClient::wallet_from_env().context("load signing wallet")?;
    let client = Arc::new(DlmmClient::new(
        config.rpc.url.clone(),
        wallet,
        &config.tokens.token_mint,
        config.tokens.token_decimals,
    )?);
    info!("🔑 Wallet: {}", client.wallet_pubkey());
    info!("🌐 RPC: {}", config.rpc.url);
    info!("🪙 Token: {}", config.tokens.token_mint);

    let price_source = Arc::new(JupiterPriceFile::new(
        config.price_feed.file.clone(),
        config.tokens.token_mint.clone(),
    ));
    let catalog_source = Arc::new(MeteoraApiClient::new(
        config.catalog.api_url.clone(),
        config.tokens.token_mint.clone(),
    ));

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("🛑 Shutdown requested, finishing current cycle...");
                stop.store(true, Ordering::SeqCst);
            }
        });
    }

    let mut ctx = BotContext::new();
    let mut scan = ScanLoop::new(
        config,
        price_source,
        catalog_source,
        client.clone(),
        client.clone(),
        client,
        stop,
        args.simulate_only,
    );

    if let Err(e) = scan.run(&mut ctx).await {
        error!("❌ Bot terminated with error: {}", e);
        return Err(e.into());
    }
    Ok(())
}
