pub mod automation;
pub mod web3;

use alloy::primitives::utils::{format_ether, parse_ether};
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use automation::{DepositSchedule, ScheduleRegistry, spawn_deposit_schedule};
pub use web3::Web3Service;

/// Gas limit requested for the destination leg of a cross-chain transfer.
pub const TRANSFER_GAS_LIMIT: u64 = 500_000;

pub const EXPLORER_TX_URL: &str = "https://testnet.snowtrace.io/tx/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Fuji,
    Echo,
    Dispatch,
}

impl Chain {
    pub const ALL: [Chain; 3] = [Chain::Fuji, Chain::Echo, Chain::Dispatch];

    pub fn key(&self) -> &'static str {
        match self {
            Chain::Fuji => "fuji",
            Chain::Echo => "echo",
            Chain::Dispatch => "dispatch",
        }
    }

    /// Capitalized form used in replies.
    pub fn title(&self) -> &'static str {
        match self {
            Chain::Fuji => "Fuji",
            Chain::Echo => "Echo",
            Chain::Dispatch => "Dispatch",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Chain {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fuji" => Ok(Chain::Fuji),
            "echo" => Ok(Chain::Echo),
            "dispatch" => Ok(Chain::Dispatch),
            other => Err(ChainError::UnknownChain(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Web3Service not available")]
    Unavailable,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unknown chain: {0}")]
    UnknownChain(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Source and destination chains cannot be the same")]
    SameChain,

    #[error("Insufficient balance on {chain}: need {need}, have {have}")]
    InsufficientBalance {
        chain: Chain,
        need: String,
        have: String,
    },

    #[error("Emergency mode not supported on {0}")]
    EmergencyUnsupported(Chain),

    #[error("contract call failed: {0}")]
    Contract(String),

    #[error("transaction {0} reverted")]
    Reverted(String),

    #[error("{source} (emergency mode already active on {activated}, tx {tx_hash})")]
    EmergencyIncomplete {
        activated: Chain,
        tx_hash: String,
        source: Box<ChainError>,
    },
}

impl ChainError {
    pub fn contract(err: impl fmt::Display) -> Self {
        ChainError::Contract(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChainError>;

/// A mined transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub hash: String,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub status: bool,
}

impl TxReceipt {
    pub fn explorer_url(&self) -> String {
        format!("{}{}", EXPLORER_TX_URL, self.hash)
    }

    pub fn block_label(&self) -> String {
        self.block_number
            .map(|b| b.to_string())
            .unwrap_or_else(|| "pending".to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DepositOutcome {
    Deposited(TxReceipt),
    InsufficientBalance { need: U256, have: U256 },
}

/// Token balances held for one address on each chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserBalances {
    pub fuji: U256,
    pub echo: U256,
    pub dispatch: U256,
}

impl UserBalances {
    pub fn total(&self) -> U256 {
        self.fuji
            .saturating_add(self.echo)
            .saturating_add(self.dispatch)
    }

    pub fn get(&self, chain: Chain) -> U256 {
        match chain {
            Chain::Fuji => self.fuji,
            Chain::Echo => self.echo,
            Chain::Dispatch => self.dispatch,
        }
    }
}

/// Decoded `getSIPProgress` result.
#[derive(Debug, Clone, PartialEq)]
pub struct SipProgress {
    pub monthly_amount: U256,
    pub total_target: U256,
    pub total_deposited: U256,
    pub percent_complete: u64,
    pub next_deposit_time: DateTime<Utc>,
    pub is_active: bool,
    pub automation_enabled: bool,
    pub goal: String,
}

/// Contract operations the agent performs for its own wallet.
#[async_trait]
pub trait SipChain: Send + Sync {
    /// Address of the wallet that signs every transaction.
    fn agent_address(&self) -> Address;

    /// Authorizes the agent if needed, opens the plan and makes the first deposit.
    async fn create_sip(&self, monthly: U256, target: U256, goal: &str) -> Result<TxReceipt>;

    /// Approves `amount` for the home contract and triggers a deposit.
    async fn deposit(&self, amount: U256) -> Result<DepositOutcome>;

    async fn cross_chain_transfer(
        &self,
        from: Chain,
        to: Chain,
        amount: U256,
        recipient: Address,
    ) -> Result<TxReceipt>;

    /// Per-chain balances; a chain that cannot be read counts as zero.
    async fn user_balances(&self, user: Address) -> UserBalances;

    async fn sip_progress(&self, user: Address) -> Result<SipProgress>;

    async fn activate_emergency(&self, chain: Chain) -> Result<TxReceipt>;

    async fn log_balance_distribution(&self) {
        let address = self.agent_address();
        let balances = self.user_balances(address).await;
        tracing::info!(
            %address,
            fuji = %format_amount(balances.fuji),
            echo = %format_amount(balances.echo),
            dispatch = %format_amount(balances.dispatch),
            total = %format_amount(balances.total()),
            "balance distribution"
        );
    }
}

/// Parses a decimal token amount into 18-decimal base units.
pub fn parse_amount(amount: &str) -> Result<U256> {
    parse_ether(amount.trim()).map_err(|e| ChainError::InvalidAmount(format!("{}: {}", amount, e)))
}

/// Formats 18-decimal base units without trailing zeros (`20`, `12.5`).
pub fn format_amount(value: U256) -> String {
    let formatted = format_ether(value);
    if formatted.contains('.') {
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        formatted
    }
}
