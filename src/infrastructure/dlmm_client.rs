//! Direct Solana client for Meteora DLMM pools: wallet balance, active-bin
//! pool price, local quoting, and swap execution.

use crate::domain::execution::{SwapOutcome, SwapQuote};
use crate::domain::opportunity::PoolPriceSample;
use crate::infrastructure::traits::{PoolPriceSource, SwapClient, WalletBalanceSource};
use crate::shared::errors::{AppError, SwapError};
use crate::shared::types::TradeDirection;
use async_trait::async_trait;
use borsh::BorshSerialize;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::Transaction;
use spl_associated_token_account::get_associated_token_address;
use std::str::FromStr;
use tracing::{info, warn};

const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Meteora DLMM program.
const DLMM_PROGRAM_ID: &str = "LBUZKhRxPF3XUpBCjp4YzTKgLccjZhTSDM9YuVaPwxo";
/// Wrapped SOL, the Y side of every pool this bot trades.
const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Anchor discriminator for the `swap` instruction.
const SWAP_IX_DISCRIMINATOR: [u8; 8] = [0xf8, 0xc6, 0x9e, 0x91, 0xe1, 0x75, 0x87, 0xc8];

/// Bins per bin array account.
const BINS_PER_ARRAY: i32 = 70;

// LbPair account field offsets (8-byte discriminator, then the static and
// variable parameter blocks at 32 bytes each).
const ACTIVE_ID_OFFSET: usize = 76;
const BIN_STEP_OFFSET: usize = 80;
const TOKEN_X_MINT_OFFSET: usize = 88;
const TOKEN_Y_MINT_OFFSET: usize = 120;
const RESERVE_X_OFFSET: usize = 152;
const RESERVE_Y_OFFSET: usize = 184;
const ORACLE_OFFSET: usize = 536;
const LB_PAIR_MIN_LEN: usize = ORACLE_OFFSET + 32;

#[derive(BorshSerialize)]
struct SwapIxArgs {
    amount_in: u64,
    min_amount_out: u64,
}

/// Fields of an LbPair account this bot needs.
#[derive(Debug, Clone)]
struct LbPairState {
    active_id: i32,
    bin_step: u16,
    token_x_mint: Pubkey,
    token_y_mint: Pubkey,
    reserve_x: Pubkey,
    reserve_y: Pubkey,
    oracle: Pubkey,
}

impl LbPairState {
    fn parse(data: &[u8]) -> Result<Self, SwapError> {
        if data.len() < LB_PAIR_MIN_LEN {
            return Err(SwapError::InvalidPoolData(format!(
                "LbPair account too short: {} bytes",
                data.len()
            )));
        }
        let read_i32 = |offset: usize| {
            i32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
        };
        let read_pubkey = |offset: usize| {
            let mut bytes = [0u8; 32];
            bytes.copy_from_slice(&data[offset..offset + 32]);
            Pubkey::new_from_array(bytes)
        };
        Ok(Self {
            active_id: read_i32(ACTIVE_ID_OFFSET),
            bin_step: u16::from_le_bytes([data[BIN_STEP_OFFSET], data[BIN_STEP_OFFSET + 1]]),
            token_x_mint: read_pubkey(TOKEN_X_MINT_OFFSET),
            token_y_mint: read_pubkey(TOKEN_Y_MINT_OFFSET),
            reserve_x: read_pubkey(RESERVE_X_OFFSET),
            reserve_y: read_pubkey(RESERVE_Y_OFFSET),
            oracle: read_pubkey(ORACLE_OFFSET),
        })
    }

    /// Active-bin price of one X base unit in Y base units:
    /// (1 + bin_step/10000) ^ active_id.
    fn lamport_price(&self) -> f64 {
        (1.0 + self.bin_step as f64 / 10_000.0).powi(self.active_id)
    }
}

pub struct DlmmClient {
    rpc: RpcClient,
    wallet: Keypair,
    program_id: Pubkey,
    wsol_mint: Pubkey,
    token_mint: Pubkey,
    token_decimals: u8,
}

impl DlmmClient {
    pub fn new(
        rpc_url: String,
        wallet: Keypair,
        token_mint: &str,
        token_decimals: u8,
    ) -> Result<Self, AppError> {
        let token_mint = Pubkey::from_str(token_mint)
            .map_err(|e| AppError::ConfigError(format!("invalid token mint: {}", e)))?;
        // Both constants are valid base58, parse failures are unreachable.
        let program_id = Pubkey::from_str(DLMM_PROGRAM_ID)
            .map_err(|e| AppError::ConfigError(format!("invalid program id: {}", e)))?;
        let wsol_mint = Pubkey::from_str(WSOL_MINT)
            .map_err(|e| AppError::ConfigError(format!("invalid wSOL mint: {}", e)))?;
        Ok(Self {
            rpc: RpcClient::new_with_commitment(rpc_url, CommitmentConfig::confirmed()),
            wallet,
            program_id,
            wsol_mint,
            token_mint,
            token_decimals,
        })
    }

    /// Load the signing wallet from the `PRIVATE_KEY` env var (base58
    /// encoded 64-byte secret key). Absence is fatal at startup.
    pub fn wallet_from_env() -> Result<Keypair, AppError> {
        let raw = std::env::var("PRIVATE_KEY").map_err(|_| {
            AppError::MissingCredentials("PRIVATE_KEY environment variable not set".to_string())
        })?;
        let bytes = bs58::decode(raw.trim())
            .into_vec()
            .map_err(|e| AppError::MissingCredentials(format!("PRIVATE_KEY is not base58: {}", e)))?;
        Keypair::from_bytes(&bytes)
            .map_err(|e| AppError::MissingCredentials(format!("PRIVATE_KEY is not a keypair: {}", e)))
    }

    pub fn wallet_pubkey(&self) -> Pubkey {
        self.wallet.pubkey()
    }

    async fn load_pair(&self, pool_address: &str) -> Result<LbPairState, SwapError> {
        let pool = Pubkey::from_str(pool_address)
            .map_err(|e| SwapError::InvalidPoolData(format!("invalid pool address: {}", e)))?;
        let data = self
            .rpc
            .get_account_data(&pool)
            .await
            .map_err(|e| SwapError::classify(e.to_string()))?;
        LbPairState::parse(&data)
    }

    /// UI price in SOL per token, from the base-unit ratio and the decimal
    /// spread between the token (X) and SOL (Y, 9 decimals).
    fn ui_price_sol(&self, lamport_price: f64) -> f64 {
        lamport_price * 10f64.powi(self.token_decimals as i32 - 9)
    }

    /// Expected output at the active-bin spot price, shared by quoting and
    /// the post-swap report.
    fn expected_out(
        &self,
        pair: &LbPairState,
        direction: TradeDirection,
        amount_in: u64,
    ) -> Result<u64, SwapError> {
        let price_sol = self.ui_price_sol(pair.lamport_price());
        if price_sol <= 0.0 {
            return Err(SwapError::QuoteUnavailable(
                "degenerate active-bin price".to_string(),
            ));
        }
        let token_scale = 10f64.powi(self.token_decimals as i32);
        Ok(match direction {
            TradeDirection::Buy => {
                (amount_in as f64 / LAMPORTS_PER_SOL / price_sol * token_scale) as u64
            }
            TradeDirection::Sell => {
                (amount_in as f64 / token_scale * price_sol * LAMPORTS_PER_SOL) as u64
            }
        })
    }

    /// The three bin arrays around the active bin, passed as remaining
    /// accounts so small swaps can cross a bin-array boundary.
    fn bin_array_accounts(&self, pool: &Pubkey, active_id: i32) -> Vec<AccountMeta> {
        let center = active_id.div_euclid(BINS_PER_ARRAY) as i64;
        [center - 1, center, center + 1]
            .iter()
            .map(|index| {
                let (address, _) = Pubkey::find_program_address(
                    &[b"bin_array", pool.as_ref(), &index.to_le_bytes()],
                    &self.program_id,
                );
                AccountMeta::new(address, false)
            })
            .collect()
    }

    fn swap_instruction(
        &self,
        pool: &Pubkey,
        pair: &LbPairState,
        direction: TradeDirection,
        amount_in: u64,
        min_amount_out: u64,
    ) -> Result<Instruction, SwapError> {
        let (in_mint, out_mint) = match direction {
            TradeDirection::Buy => (pair.token_y_mint, pair.token_x_mint),
            TradeDirection::Sell => (pair.token_x_mint, pair.token_y_mint),
        };
        let user = self.wallet.pubkey();
        let user_token_in = get_associated_token_address(&user, &in_mint);
        let user_token_out = get_associated_token_address(&user, &out_mint);
        let (event_authority, _) =
            Pubkey::find_program_address(&[b"__event_authority"], &self.program_id);

        let mut data = SWAP_IX_DISCRIMINATOR.to_vec();
        SwapIxArgs {
            amount_in,
            min_amount_out,
        }
        .serialize(&mut data)
        .map_err(|e| SwapError::TransactionFailed(format!("encode swap args: {}", e)))?;

        // Optional accounts (bitmap extension, host fee) are passed as the
        // program id when unused, per the anchor convention.
        let mut accounts = vec![
            AccountMeta::new(*pool, false),
            AccountMeta::new_readonly(self.program_id, false),
            AccountMeta::new(pair.reserve_x, false),
            AccountMeta::new(pair.reserve_y, false),
            AccountMeta::new(user_token_in, false),
            AccountMeta::new(user_token_out, false),
            AccountMeta::new_readonly(pair.token_x_mint, false),
            AccountMeta::new_readonly(pair.token_y_mint, false),
            AccountMeta::new(pair.oracle, false),
            AccountMeta::new_readonly(self.program_id, false),
            AccountMeta::new_readonly(user, true),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(event_authority, false),
            AccountMeta::new_readonly(self.program_id, false),
        ];
        accounts.extend(self.bin_array_accounts(pool, pair.active_id));

        Ok(Instruction {
            program_id: self.program_id,
            accounts,
            data,
        })
    }
}

#[async_trait]
impl WalletBalanceSource for DlmmClient {
    async fn funding_balance_sol(&self) -> Result<f64, SwapError> {
        let lamports = self
            .rpc
            .get_balance(&self.wallet.pubkey())
            .await
            .map_err(|e| SwapError::classify(e.to_string()))?;
        Ok(lamports as f64 / LAMPORTS_PER_SOL)
    }
}

#[async_trait]
impl PoolPriceSource for DlmmClient {
    async fn read_pool_price(&self, pool_address: &str) -> Result<PoolPriceSample, SwapError> {
        let pair = self.load_pair(pool_address).await?;
        if pair.token_x_mint != self.token_mint || pair.token_y_mint != self.wsol_mint {
            return Err(SwapError::InvalidPoolData(format!(
                "pool {} does not trade the configured token against SOL",
                pool_address
            )));
        }
        Ok(PoolPriceSample {
            price_sol: self.ui_price_sol(pair.lamport_price()),
            bin_id: pair.active_id,
        })
    }
}

#[async_trait]
impl SwapClient for DlmmClient {
    /// Local quote at the active-bin spot price. Fees and bin crossings are
    /// covered by the caller's slippage tolerance on `min_amount_out`.
    async fn quote(
        &self,
        pool_address: &str,
        direction: TradeDirection,
        amount_in: u64,
    ) -> Result<SwapQuote, SwapError> {
        let pair = self.load_pair(pool_address).await?;
        let out_amount = self.expected_out(&pair, direction, amount_in)?;
        Ok(SwapQuote {
            in_amount: amount_in,
            out_amount,
        })
    }

    async fn execute_swap(
        &self,
        pool_address: &str,
        direction: TradeDirection,
        amount_in: u64,
        min_amount_out: u64,
    ) -> Result<SwapOutcome, SwapError> {
        let pool = Pubkey::from_str(pool_address)
            .map_err(|e| SwapError::InvalidPoolData(format!("invalid pool address: {}", e)))?;
        let pair = self.load_pair(pool_address).await?;
        let expected_out = self.expected_out(&pair, direction, amount_in)?;
        let instruction =
            self.swap_instruction(&pool, &pair, direction, amount_in, min_amount_out)?;

        let blockhash = self
            .rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| SwapError::classify(e.to_string()))?;
        let message = Message::new(&[instruction], Some(&self.wallet.pubkey()));
        let mut transaction = Transaction::new_unsigned(message);
        transaction.sign(&[&self.wallet], blockhash);

        // Simulation first: a failed swap that never reaches the chain
        // costs nothing.
        let simulation = self
            .rpc
            .simulate_transaction(&transaction)
            .await
            .map_err(|e| SwapError::classify(e.to_string()))?;
        if let Some(err) = simulation.value.err {
            warn!("⚠️ Swap simulation failed: {:?}", err);
            return Err(SwapError::TransactionFailed(format!(
                "simulation error: {:?}",
                err
            )));
        }

        let signature = self
            .rpc
            .send_and_confirm_transaction(&transaction)
            .await
            .map_err(|e| SwapError::classify(e.to_string()))?;
        info!("📝 Swap confirmed: {}", signature);

        // Report the spot-price expected output, not the slippage floor:
        // downstream accounting values the fill off this amount.
        Ok(SwapOutcome {
            consumed_in_amount: amount_in,
            out_amount: expected_out,
            signature: signature.to_string(),
        })
    }
}
