//! Bot wallet custody and fund movement
//!
//! Derived pool wallets share custody with the primary bot wallet: anyone
//! holding its secret can re-derive the whole pool. They spread transaction
//! origins, they do not isolate funds.

use alloy::{
    primitives::{keccak256, Address, U256},
    signers::local::PrivateKeySigner,
    sol_types::SolCall,
};
use rand::seq::IndexedRandom;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{
    config::{MAX_DERIVED_WALLETS, NATIVE_TRANSFER_GAS},
    errors::{BotError, BotResult},
    execution::GasPolicy,
    network::{contracts::IERC20, ChainClient, TxReceipt, TxRequest},
    types::*,
    wallets::WalletStore,
};

pub struct WalletManager {
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn WalletStore>,
    gas: GasPolicy,
    bot_wallet: RwLock<Option<BotWallet>>,
    pool: RwLock<Vec<BotWallet>>,
}

impl WalletManager {
    pub fn new(chain: Arc<dyn ChainClient>, store: Arc<dyn WalletStore>, gas: GasPolicy) -> Self {
        Self {
            chain,
            store,
            gas,
            bot_wallet: RwLock::new(None),
            pool: RwLock::new(Vec::new()),
        }
    }

    pub async fn get_or_create_bot_wallet(&self) -> BotResult<BotWallet> {
        if let Some(wallet) = self.bot_wallet.read().await.clone() {
            return Ok(wallet);
        }

        let signer = match self.store.load().await? {
            Some(signer) => signer,
            None => {
                let signer = PrivateKeySigner::random();
                self.store.save(&signer).await?;
                info!("🆕 Created bot wallet {}", signer.address());
                signer
            }
        };

        let wallet = BotWallet::new(signer, None);
        *self.bot_wallet.write().await = Some(wallet.clone());
        Ok(wallet)
    }

    pub async fn bot_wallet(&self) -> Option<BotWallet> {
        self.bot_wallet.read().await.clone()
    }

    /// Wallet `i` uses `keccak256(primary_secret || i as big-endian u32)` as
    /// its secret, so the same primary always yields the same pool.
    pub async fn derive_wallets(&self, count: u32) -> BotResult<Vec<BotWallet>> {
        if count > MAX_DERIVED_WALLETS {
            return Err(BotError::config(format!(
                "cannot derive {} wallets, the limit is {}",
                count, MAX_DERIVED_WALLETS
            )));
        }

        let primary = self.get_or_create_bot_wallet().await?;
        let secret = primary.signer().to_bytes();

        let wallets = (0..count)
            .map(|index| {
                let mut material = secret.to_vec();
                material.extend_from_slice(&index.to_be_bytes());
                let derived = keccak256(&material);
                PrivateKeySigner::from_bytes(&derived)
                    .map(|signer| BotWallet::new(signer, Some(index)))
                    .map_err(|e| BotError::KeyDerivation {
                        index,
                        message: e.to_string(),
                    })
            })
            .collect::<BotResult<Vec<_>>>()?;

        info!("👛 Derived {} pool wallets from {}", wallets.len(), primary.label());
        *self.pool.write().await = wallets.clone();
        Ok(wallets)
    }

    pub async fn pool(&self) -> Vec<BotWallet> {
        self.pool.read().await.clone()
    }

    /// A uniformly random pool wallet in multi-wallet mode, the bot wallet
    /// otherwise.
    pub async fn pick_wallet(&self, multi_wallet: bool) -> BotResult<BotWallet> {
        if multi_wallet {
            let pool = self.pool.read().await;
            let picked = pool.choose(&mut rand::rng()).cloned();
            return picked.ok_or_else(|| BotError::config("multi-wallet mode without derived wallets"));
        }
        self.bot_wallet()
            .await
            .ok_or_else(|| BotError::config("bot wallet not loaded"))
    }

    /// Moves funds from the user's primary wallet into a bot wallet.
    pub async fn fund_wallet(
        &self,
        user: &PrivateKeySigner,
        wallet: &BotWallet,
        asset: Asset,
        amount: U256,
    ) -> BotResult<TxReceipt> {
        let available = self.balance_of(user.address(), asset).await?;
        if amount.is_zero() || available < amount {
            return Err(BotError::InsufficientFunds {
                asset,
                required: amount,
                available,
            });
        }

        let receipt = self.transfer(user, wallet.address, asset, amount, None).await?;
        info!("💸 Funded {} with {} {}", wallet.label(), amount, asset);
        Ok(receipt)
    }

    /// Moves funds out of a bot wallet. `None` withdraws everything; for the
    /// native asset that is the balance minus the transfer's own gas. Returns
    /// `None` when there is nothing to withdraw.
    pub async fn withdraw_from_wallet(
        &self,
        wallet: &BotWallet,
        to: Address,
        asset: Asset,
        amount: Option<U256>,
    ) -> BotResult<Option<TxReceipt>> {
        let balance = self.balance_of(wallet.address, asset).await?;

        let (amount, gas_price) = match (asset, amount) {
            (_, Some(amount)) => {
                if amount.is_zero() || balance < amount {
                    return Err(BotError::InsufficientFunds {
                        asset,
                        required: amount,
                        available: balance,
                    });
                }
                (amount, None)
            }
            (Asset::Native, None) => {
                let gas_price = self.gas.gas_price(self.network_gas_price().await?);
                let gas_cost = U256::from(gas_price) * U256::from(NATIVE_TRANSFER_GAS);
                if balance <= gas_cost {
                    return Ok(None);
                }
                (balance - gas_cost, Some(gas_price))
            }
            (Asset::Token(_), None) => {
                if balance.is_zero() {
                    return Ok(None);
                }
                (balance, None)
            }
        };

        let receipt = self.transfer(wallet.signer(), to, asset, amount, gas_price).await?;
        info!("🏧 Withdrew {} {} from {} to {}", amount, asset, wallet.label(), short_address(&to));
        Ok(Some(receipt))
    }

    /// Splits `total` native evenly across the derived pool, paid by the bot
    /// wallet. Any remainder of the division stays in the bot wallet.
    pub async fn fund_pool(&self, total: U256) -> BotResult<Vec<TxReceipt>> {
        let primary = self.get_or_create_bot_wallet().await?;
        let pool = self.pool().await;
        if pool.is_empty() {
            return Err(BotError::config("no derived wallets to fund"));
        }

        let share = total / U256::from(pool.len());
        if share.is_zero() {
            return Err(BotError::config(format!(
                "{} is too small to split across {} wallets",
                total,
                pool.len()
            )));
        }

        let available = self.balance_of(primary.address, Asset::Native).await?;
        if available < total {
            return Err(BotError::InsufficientFunds {
                asset: Asset::Native,
                required: total,
                available,
            });
        }

        let mut receipts = Vec::with_capacity(pool.len());
        for wallet in &pool {
            receipts.push(
                self.transfer(primary.signer(), wallet.address, Asset::Native, share, None)
                    .await?,
            );
        }
        info!("💸 Funded {} pool wallets with {} each", pool.len(), share);
        Ok(receipts)
    }

    /// Returns everything held by derived wallets to the bot wallet. A wallet
    /// that fails is logged and skipped. Returns the native amount swept.
    pub async fn sweep_pool(&self, token: Option<Address>) -> BotResult<U256> {
        let primary = self.get_or_create_bot_wallet().await?;
        let mut swept = U256::ZERO;

        for wallet in self.pool().await {
            if let Some(token) = token {
                if let Err(e) = self
                    .withdraw_from_wallet(&wallet, primary.address, Asset::Token(token), None)
                    .await
                {
                    warn!("⚠️ Could not sweep tokens from {}: {}", wallet.label(), e);
                }
            }

            let before = match self.balance_of(wallet.address, Asset::Native).await {
                Ok(balance) => balance,
                Err(e) => {
                    warn!("⚠️ Could not read balance of {}, skipping: {}", wallet.label(), e);
                    continue;
                }
            };
            match self
                .withdraw_from_wallet(&wallet, primary.address, Asset::Native, None)
                .await
            {
                Ok(Some(receipt)) => swept += before - receipt.gas_cost(),
                Ok(None) => {}
                Err(e) => warn!("⚠️ Could not sweep native from {}: {}", wallet.label(), e),
            }
        }

        info!("🧹 Swept {} native back to {}", swept, primary.label());
        Ok(swept)
    }

    /// Re-reads balances of the bot wallet and the pool.
    pub async fn refresh_balances(&self, token: Option<Address>) -> BotResult<Vec<WalletView>> {
        let mut views = Vec::new();

        let mut bot = self.bot_wallet.write().await;
        if let Some(wallet) = bot.as_mut() {
            self.refresh(wallet, token).await?;
            views.push(WalletView::from(&*wallet));
        }
        drop(bot);

        let mut pool = self.pool.write().await;
        for wallet in pool.iter_mut() {
            self.refresh(wallet, token).await?;
            views.push(WalletView::from(&*wallet));
        }

        Ok(views)
    }

    pub async fn views(&self) -> Vec<WalletView> {
        let mut views: Vec<WalletView> = self.bot_wallet.read().await.iter().map(WalletView::from).collect();
        views.extend(self.pool.read().await.iter().map(WalletView::from));
        views
    }

    async fn refresh(&self, wallet: &mut BotWallet, token: Option<Address>) -> BotResult<()> {
        wallet.native_balance = self.balance_of(wallet.address, Asset::Native).await?;
        if let Some(token) = token {
            wallet.token_balance = self.balance_of(wallet.address, Asset::Token(token)).await?;
        }
        Ok(())
    }

    pub async fn balance_of(&self, owner: Address, asset: Asset) -> BotResult<U256> {
        let balance = match asset {
            Asset::Native => self.chain.native_balance(owner).await,
            Asset::Token(token) => self.chain.token_balance(token, owner).await,
        };
        balance.map_err(|e| BotError::provider(format!("read {} balance of {}", asset, owner), e))
    }

    async fn network_gas_price(&self) -> BotResult<u128> {
        self.chain
            .gas_price()
            .await
            .map_err(|e| BotError::provider("read gas price", e))
    }

    async fn transfer(
        &self,
        signer: &PrivateKeySigner,
        to: Address,
        asset: Asset,
        amount: U256,
        gas_price: Option<u128>,
    ) -> BotResult<TxReceipt> {
        let from = signer.address();
        let gas_price = match gas_price {
            Some(price) => price,
            None => self.gas.gas_price(self.network_gas_price().await?),
        };

        let mut tx = match asset {
            Asset::Native => {
                let mut tx = TxRequest::call(from, to, Vec::new()).with_value(amount);
                tx.gas_limit = Some(NATIVE_TRANSFER_GAS);
                tx
            }
            Asset::Token(token) => {
                let data = IERC20::transferCall { to, amount }.abi_encode();
                let mut tx = TxRequest::call(from, token, data);
                let estimate = self.chain.estimate_gas(&tx).await.map_err(|e| BotError::Transaction {
                    tx_hash: None,
                    message: format!("transfer would revert: {}", e),
                })?;
                tx.gas_limit = Some(self.gas.gas_limit(estimate));
                tx
            }
        };
        tx.gas_price = Some(gas_price);

        let receipt = self.chain.submit(signer, tx).await.map_err(|e| BotError::Transaction {
            tx_hash: None,
            message: format!("transfer submission failed: {}", e),
        })?;

        if !receipt.success {
            return Err(BotError::Transaction {
                tx_hash: Some(receipt.tx_hash),
                message: format!("transfer of {} reverted", asset),
            });
        }
        Ok(receipt)
    }
}
