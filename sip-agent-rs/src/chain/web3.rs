use super::{
    Chain, ChainError, DepositOutcome, Result, SipChain, SipProgress, TRANSFER_GAS_LIMIT,
    TxReceipt, UserBalances, format_amount,
};
use crate::config::{ChainConfig, SipConfig};
use alloy::network::{Ethereum, EthereumWallet, ReceiptResponse};
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

sol! {
    #[sol(rpc)]
    interface ISipHome {
        function createSIP(uint256 monthlyAmount, uint256 totalTarget, uint256 intervalDays, string calldata goal) external;
        function triggerUserDeposit(address user) external;
        function getSIPProgress(address user) external view returns (uint256 monthlyAmount, uint256 totalTarget, uint256 totalDeposited, uint256 percentComplete, uint256 nextDepositTime, bool isActive, bool automationEnabled, string memory goal);
        function addAuthorizedAgent(address agent) external;
        function authorizedAgents(address agent) external view returns (bool);
        function userBalances(address user) external view returns (uint256);
        function send(bytes32 destinationBlockchainID, address destinationTokenTransferrerAddress, address recipient, uint256 amount, uint256 requiredGasLimit) external;
    }

    #[sol(rpc)]
    interface ISipRemote {
        function balanceOf(address account) external view returns (uint256);
        function send(bytes32 destinationBlockchainID, address destinationTokenTransferrerAddress, address recipient, uint256 amount, uint256 requiredGasLimit) external;
        function aiActivateGlobalEmergency() external;
    }

    #[sol(rpc)]
    interface ISipToken {
        function balanceOf(address account) external view returns (uint256);
        function approve(address spender, uint256 value) external returns (bool);
    }
}

/// Signs and sends contract calls for the agent wallet on all three chains.
pub struct Web3Service {
    agent: Address,
    token: ISipToken::ISipTokenInstance<DynProvider>,
    home: ISipHome::ISipHomeInstance<DynProvider>,
    echo: ISipRemote::ISipRemoteInstance<DynProvider>,
    dispatch: ISipRemote::ISipRemoteInstance<DynProvider>,
    fuji_config: ChainConfig,
    echo_config: ChainConfig,
    dispatch_config: ChainConfig,
}

impl Web3Service {
    /// Returns `None` when no private key is configured.
    pub fn from_config(config: &SipConfig) -> Result<Option<Self>> {
        let Some(key) = config.private_key.as_deref() else {
            tracing::warn!("AI_AGENT_PRIVATE_KEY not set, chain operations are disabled");
            return Ok(None);
        };
        let signer: PrivateKeySigner = key
            .trim()
            .parse()
            .map_err(|e| ChainError::Config(format!("AI_AGENT_PRIVATE_KEY: {}", e)))?;
        let agent = signer.address();
        let wallet = EthereumWallet::from(signer);

        let fuji = connect(&config.fuji, &wallet)?;
        let echo = connect(&config.echo, &wallet)?;
        let dispatch = connect(&config.dispatch, &wallet)?;

        tracing::info!(%agent, "web3 service ready");
        Ok(Some(Self {
            agent,
            token: ISipToken::new(config.token_address, fuji.clone()),
            home: ISipHome::new(config.fuji.contract_address, fuji),
            echo: ISipRemote::new(config.echo.contract_address, echo),
            dispatch: ISipRemote::new(config.dispatch.contract_address, dispatch),
            fuji_config: config.fuji.clone(),
            echo_config: config.echo.clone(),
            dispatch_config: config.dispatch.clone(),
        }))
    }

    fn chain_config(&self, chain: Chain) -> &ChainConfig {
        match chain {
            Chain::Fuji => &self.fuji_config,
            Chain::Echo => &self.echo_config,
            Chain::Dispatch => &self.dispatch_config,
        }
    }

    fn remote(&self, chain: Chain) -> Option<&ISipRemote::ISipRemoteInstance<DynProvider>> {
        match chain {
            Chain::Fuji => None,
            Chain::Echo => Some(&self.echo),
            Chain::Dispatch => Some(&self.dispatch),
        }
    }

    /// Tokens the user holds on `chain`: the home ledger on Fuji, remote balances elsewhere.
    async fn balance_on(&self, chain: Chain, user: Address) -> Result<U256> {
        match self.remote(chain) {
            None => self
                .home
                .userBalances(user)
                .call()
                .await
                .map_err(ChainError::contract),
            Some(remote) => remote
                .balanceOf(user)
                .call()
                .await
                .map_err(ChainError::contract),
        }
    }

    async fn ensure_authorized(&self) -> Result<()> {
        let authorized = self
            .home
            .authorizedAgents(self.agent)
            .call()
            .await
            .map_err(ChainError::contract)?;
        if authorized {
            tracing::debug!(agent = %self.agent, "agent already authorized");
            return Ok(());
        }

        tracing::info!(agent = %self.agent, "authorizing agent on home contract");
        let pending = self
            .home
            .addAuthorizedAgent(self.agent)
            .send()
            .await
            .map_err(ChainError::contract)?;
        confirm("addAuthorizedAgent", pending).await?;
        Ok(())
    }
}

#[async_trait]
impl SipChain for Web3Service {
    fn agent_address(&self) -> Address {
        self.agent
    }

    async fn create_sip(&self, monthly: U256, target: U256, goal: &str) -> Result<TxReceipt> {
        self.ensure_authorized().await?;

        tracing::info!(
            monthly = %format_amount(monthly),
            target = %format_amount(target),
            goal,
            "creating SIP"
        );
        let pending = self
            .home
            .createSIP(monthly, target, U256::from(1), goal.to_string())
            .send()
            .await
            .map_err(ChainError::contract)?;
        let receipt = confirm("createSIP", pending).await?;

        match self.deposit(monthly).await {
            Ok(DepositOutcome::Deposited(deposit)) => {
                tracing::info!(hash = %deposit.hash, "first deposit executed");
                self.log_balance_distribution().await;
            }
            Ok(DepositOutcome::InsufficientBalance { need, have }) => {
                tracing::warn!(
                    need = %format_amount(need),
                    have = %format_amount(have),
                    "insufficient token balance, first deposit skipped"
                );
            }
            Err(e) => tracing::error!(error = %e, "first deposit failed"),
        }

        Ok(receipt)
    }

    async fn deposit(&self, amount: U256) -> Result<DepositOutcome> {
        let have = self
            .token
            .balanceOf(self.agent)
            .call()
            .await
            .map_err(ChainError::contract)?;
        if have < amount {
            return Ok(DepositOutcome::InsufficientBalance { need: amount, have });
        }

        let pending = self
            .token
            .approve(*self.home.address(), amount)
            .send()
            .await
            .map_err(ChainError::contract)?;
        confirm("approve", pending).await?;

        let pending = self
            .home
            .triggerUserDeposit(self.agent)
            .send()
            .await
            .map_err(ChainError::contract)?;
        let receipt = confirm("triggerUserDeposit", pending).await?;
        Ok(DepositOutcome::Deposited(receipt))
    }

    async fn cross_chain_transfer(
        &self,
        from: Chain,
        to: Chain,
        amount: U256,
        recipient: Address,
    ) -> Result<TxReceipt> {
        if from == to {
            return Err(ChainError::SameChain);
        }

        let have = self.balance_on(from, self.agent).await?;
        if have < amount {
            return Err(ChainError::InsufficientBalance {
                chain: from,
                need: format_amount(amount),
                have: format_amount(have),
            });
        }

        let target = self.chain_config(to);
        tracing::info!(
            %from,
            %to,
            amount = %format_amount(amount),
            %recipient,
            "sending cross-chain transfer"
        );
        let gas_limit = U256::from(TRANSFER_GAS_LIMIT);
        let pending = match self.remote(from) {
            None => self
                .home
                .send(target.blockchain_id, target.contract_address, recipient, amount, gas_limit)
                .send()
                .await
                .map_err(ChainError::contract)?,
            Some(remote) => remote
                .send(target.blockchain_id, target.contract_address, recipient, amount, gas_limit)
                .send()
                .await
                .map_err(ChainError::contract)?,
        };
        let receipt = confirm("send", pending).await?;
        self.log_balance_distribution().await;
        Ok(receipt)
    }

    async fn user_balances(&self, user: Address) -> UserBalances {
        let (fuji, echo, dispatch) = tokio::join!(
            self.balance_on(Chain::Fuji, user),
            self.balance_on(Chain::Echo, user),
            self.balance_on(Chain::Dispatch, user),
        );
        let or_zero = |chain: Chain, result: Result<U256>| {
            result.unwrap_or_else(|e| {
                tracing::debug!(%chain, error = %e, "balance unavailable, counting zero");
                U256::ZERO
            })
        };
        UserBalances {
            fuji: or_zero(Chain::Fuji, fuji),
            echo: or_zero(Chain::Echo, echo),
            dispatch: or_zero(Chain::Dispatch, dispatch),
        }
    }

    async fn sip_progress(&self, user: Address) -> Result<SipProgress> {
        let progress = self
            .home
            .getSIPProgress(user)
            .call()
            .await
            .map_err(ChainError::contract)?;

        let next_deposit = u64::try_from(progress.nextDepositTime)
            .ok()
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or_default();

        Ok(SipProgress {
            monthly_amount: progress.monthlyAmount,
            total_target: progress.totalTarget,
            total_deposited: progress.totalDeposited,
            percent_complete: u64::try_from(progress.percentComplete).unwrap_or(u64::MAX),
            next_deposit_time: next_deposit,
            is_active: progress.isActive,
            automation_enabled: progress.automationEnabled,
            goal: progress.goal,
        })
    }

    async fn activate_emergency(&self, chain: Chain) -> Result<TxReceipt> {
        let remote = self
            .remote(chain)
            .ok_or(ChainError::EmergencyUnsupported(chain))?;
        tracing::warn!(%chain, "activating global emergency mode");
        let pending = remote
            .aiActivateGlobalEmergency()
            .send()
            .await
            .map_err(ChainError::contract)?;
        confirm("aiActivateGlobalEmergency", pending).await
    }
}

fn connect(config: &ChainConfig, wallet: &EthereumWallet) -> Result<DynProvider> {
    let url: Url = config
        .rpc_url
        .parse()
        .map_err(|e| ChainError::Config(format!("{} rpc url: {}", config.chain, e)))?;
    Ok(ProviderBuilder::new()
        .wallet(wallet.clone())
        .connect_http(url)
        .erased())
}

/// Waits for the transaction to be mined and fails on a revert.
async fn confirm(label: &str, pending: PendingTransactionBuilder<Ethereum>) -> Result<TxReceipt> {
    let hash = pending.tx_hash().to_string();
    tracing::debug!(call = label, %hash, "transaction sent");

    let receipt = pending.get_receipt().await.map_err(ChainError::contract)?;
    if !receipt.status() {
        tracing::error!(call = label, %hash, "transaction reverted");
        return Err(ChainError::Reverted(hash));
    }

    let receipt = TxReceipt {
        hash: receipt.transaction_hash().to_string(),
        block_number: receipt.block_number(),
        gas_used: receipt.gas_used(),
        status: true,
    };
    tracing::info!(call = label, hash = %receipt.hash, block = ?receipt.block_number, "transaction confirmed");
    Ok(receipt)
}
