//! Swap execution engine
//!
//! One call executes one directional swap and never retries. Every failure is
//! folded into a [`SwapOutcome`] with a [`FailureCause`] so the scheduling
//! loop can record it and move on.

use alloy::{
    primitives::{
        aliases::{U160, U24},
        Address, B256, Bytes, U256,
    },
    sol_types::SolCall,
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    config::SWAP_DEADLINE_SECS,
    errors::{BotError, BotResult},
    execution::{min_output_after_slippage, GasPolicy},
    network::{
        contracts::{IERC20, ISwapRouter02, IUniswapV2Router},
        is_revert, ChainClient, TxReceipt, TxRequest,
    },
    pools::ExchangeRegistry,
    types::*,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOutcome {
    pub success: bool,
    pub tx_hash: Option<B256>,
    /// Total gas paid in wei, including a preceding approval.
    pub gas_cost: U256,
    pub amount_in: U256,
    pub min_amount_out: U256,
    pub failure: Option<FailureCause>,
    pub error: Option<String>,
}

impl SwapOutcome {
    pub fn failed(error: &BotError, amount_in: U256, gas_cost: U256, tx_hash: Option<B256>) -> Self {
        Self {
            success: false,
            tx_hash,
            gas_cost,
            amount_in,
            min_amount_out: U256::ZERO,
            failure: Some(FailureCause::from(error)),
            error: Some(error.to_string()),
        }
    }
}

/// A swap that made it on-chain, reverted or not.
struct Submitted {
    receipt: TxReceipt,
    approval_gas: U256,
    min_amount_out: U256,
}

pub struct SwapExecutor {
    chain: Arc<dyn ChainClient>,
    registry: Arc<ExchangeRegistry>,
    gas: GasPolicy,
}

impl SwapExecutor {
    pub fn new(chain: Arc<dyn ChainClient>, registry: Arc<ExchangeRegistry>, gas: GasPolicy) -> Self {
        Self { chain, registry, gas }
    }

    pub async fn execute_swap(
        &self,
        wallet: &BotWallet,
        direction: Direction,
        route: &LiquidityRoute,
        token: Address,
        amount: U256,
        slippage_pct: Decimal,
    ) -> SwapOutcome {
        info!(
            "🚀 {} via {} from {} (amount {})",
            direction, route, wallet.label(), amount
        );

        match self.try_swap(wallet, direction, route, token, amount, slippage_pct).await {
            Ok(submitted) => {
                let gas_cost = submitted.receipt.gas_cost() + submitted.approval_gas;
                if submitted.receipt.success {
                    info!("✅ {} confirmed: {}", direction, submitted.receipt.tx_hash);
                    SwapOutcome {
                        success: true,
                        tx_hash: Some(submitted.receipt.tx_hash),
                        gas_cost,
                        amount_in: amount,
                        min_amount_out: submitted.min_amount_out,
                        failure: None,
                        error: None,
                    }
                } else {
                    let error = BotError::Transaction {
                        tx_hash: Some(submitted.receipt.tx_hash),
                        message: format!("swap reverted in {}", submitted.receipt.tx_hash),
                    };
                    warn!("❌ {} {}", direction, error);
                    SwapOutcome {
                        min_amount_out: submitted.min_amount_out,
                        ..SwapOutcome::failed(&error, amount, gas_cost, Some(submitted.receipt.tx_hash))
                    }
                }
            }
            Err(error) => {
                warn!("❌ {} failed before confirmation: {}", direction, error);
                let tx_hash = match &error {
                    BotError::Transaction { tx_hash, .. } => *tx_hash,
                    _ => None,
                };
                SwapOutcome::failed(&error, amount, U256::ZERO, tx_hash)
            }
        }
    }

    async fn try_swap(
        &self,
        wallet: &BotWallet,
        direction: Direction,
        route: &LiquidityRoute,
        token: Address,
        amount: U256,
        slippage_pct: Decimal,
    ) -> BotResult<Submitted> {
        let capability = self.capability_for(route)?;
        let router = capability.router();

        self.check_balance(wallet.address, direction, token, amount).await?;

        let weth = self
            .chain
            .wrapped_native(router, route.protocol)
            .await
            .map_err(|e| BotError::provider(format!("read wrapped native of {}", router), e))?;

        let (token_in, token_out) = match direction {
            Direction::Buy => (weth, token),
            Direction::Sell => (token, weth),
        };

        let quote = self.quote(capability, route, token_in, token_out, amount).await?;
        if quote.is_zero() {
            return Err(BotError::NoRoute {
                exchange: route.exchange_id.clone(),
                reason: "router quoted zero output".to_string(),
            });
        }
        let min_amount_out = min_output_after_slippage(quote, slippage_pct);
        info!(
            "💱 Quote {} -> {} (min {} at {}% slippage)",
            amount, quote, min_amount_out, slippage_pct
        );

        let approval_gas = match direction {
            Direction::Sell => self.ensure_allowance(wallet, token, router, amount).await?,
            Direction::Buy => U256::ZERO,
        };

        let data = self.swap_calldata(route, direction, wallet.address, weth, token, amount, min_amount_out)?;
        let value = match direction {
            Direction::Buy => amount,
            Direction::Sell => U256::ZERO,
        };

        let tx = TxRequest::call(wallet.address, router, data).with_value(value);
        let receipt = self.send(wallet, tx).await?;

        Ok(Submitted {
            receipt,
            approval_gas,
            min_amount_out,
        })
    }

    fn capability_for(&self, route: &LiquidityRoute) -> BotResult<&ProtocolCapability> {
        let exchange = self.registry.get(&route.exchange_id).ok_or_else(|| BotError::NoRoute {
            exchange: route.exchange_id.clone(),
            reason: "exchange is not configured".to_string(),
        })?;

        exchange.capability(route.protocol).ok_or_else(|| BotError::NoRoute {
            exchange: route.exchange_id.clone(),
            reason: format!("no {} router", route.protocol),
        })
    }

    async fn check_balance(&self, owner: Address, direction: Direction, token: Address, amount: U256) -> BotResult<()> {
        let (asset, available) = match direction {
            Direction::Buy => (
                Asset::Native,
                self.chain
                    .native_balance(owner)
                    .await
                    .map_err(|e| BotError::provider("read native balance", e))?,
            ),
            Direction::Sell => (
                Asset::Token(token),
                self.chain
                    .token_balance(token, owner)
                    .await
                    .map_err(|e| BotError::provider("read token balance", e))?,
            ),
        };

        if amount.is_zero() || available < amount {
            return Err(BotError::InsufficientFunds {
                asset,
                required: amount.max(U256::from(1u8)),
                available,
            });
        }
        Ok(())
    }

    async fn quote(
        &self,
        capability: &ProtocolCapability,
        route: &LiquidityRoute,
        token_in: Address,
        token_out: Address,
        amount: U256,
    ) -> BotResult<U256> {
        let quote = match capability {
            ProtocolCapability::ConcentratedLiquidity { quoter, .. } => {
                let fee = route.fee_tier.ok_or_else(|| BotError::NoRoute {
                    exchange: route.exchange_id.clone(),
                    reason: "concentrated route without fee tier".to_string(),
                })?;
                self.chain
                    .quote_exact_input_single(*quoter, token_in, token_out, fee, amount)
                    .await
            }
            ProtocolCapability::ConstantProduct { router, .. } | ProtocolCapability::Aggregator { router } => {
                self.chain
                    .quote_amounts_out(*router, amount, &[token_in, token_out])
                    .await
            }
        };
        // A reverting quoter means the pool cannot fill this trade.
        quote.map_err(|e| {
            if is_revert(&e) {
                BotError::NoRoute {
                    exchange: route.exchange_id.clone(),
                    reason: format!("quote reverted: {}", e),
                }
            } else {
                BotError::provider(format!("quote on {}", route.exchange_id), e)
            }
        })
    }

    /// Approves `U256::MAX` once when the router cannot pull `amount`.
    /// Returns the gas spent on approval.
    async fn ensure_allowance(&self, wallet: &BotWallet, token: Address, router: Address, amount: U256) -> BotResult<U256> {
        let allowance = self
            .chain
            .allowance(token, wallet.address, router)
            .await
            .map_err(|e| BotError::provider("read allowance", e))?;

        if allowance >= amount {
            return Ok(U256::ZERO);
        }

        info!("🔓 Approving {} for router {}", short_address(&token), short_address(&router));
        let data = IERC20::approveCall {
            spender: router,
            amount: U256::MAX,
        }
        .abi_encode();

        let receipt = self
            .send(wallet, TxRequest::call(wallet.address, token, data))
            .await
            .map_err(|e| BotError::Approval {
                token,
                message: e.to_string(),
            })?;

        if !receipt.success {
            return Err(BotError::Approval {
                token,
                message: format!("approval reverted in {}", receipt.tx_hash),
            });
        }
        Ok(receipt.gas_cost())
    }

    #[allow(clippy::too_many_arguments)]
    fn swap_calldata(
        &self,
        route: &LiquidityRoute,
        direction: Direction,
        recipient: Address,
        weth: Address,
        token: Address,
        amount: U256,
        min_amount_out: U256,
    ) -> BotResult<Vec<u8>> {
        let deadline = U256::from(Utc::now().timestamp().max(0) as u64 + SWAP_DEADLINE_SECS);

        let data = match (route.protocol, direction) {
            (ProtocolVersion::ConstantProduct | ProtocolVersion::Aggregator, Direction::Buy) => {
                IUniswapV2Router::swapExactETHForTokensCall {
                    amountOutMin: min_amount_out,
                    path: vec![weth, token],
                    to: recipient,
                    deadline,
                }
                .abi_encode()
            }
            (ProtocolVersion::ConstantProduct | ProtocolVersion::Aggregator, Direction::Sell) => {
                IUniswapV2Router::swapExactTokensForETHCall {
                    amountIn: amount,
                    amountOutMin: min_amount_out,
                    path: vec![token, weth],
                    to: recipient,
                    deadline,
                }
                .abi_encode()
            }
            (ProtocolVersion::ConcentratedLiquidity, direction) => {
                let fee = route.fee_tier.ok_or_else(|| BotError::NoRoute {
                    exchange: route.exchange_id.clone(),
                    reason: "concentrated route without fee tier".to_string(),
                })?;
                let (token_in, token_out, swap_recipient) = match direction {
                    Direction::Buy => (weth, token, recipient),
                    // Output stays in the router until unwrapped to native.
                    Direction::Sell => (token, weth, ROUTER_ADDRESS_THIS),
                };

                let swap = ISwapRouter02::exactInputSingleCall {
                    params: ISwapRouter02::ExactInputSingleParams {
                        tokenIn: token_in,
                        tokenOut: token_out,
                        fee: U24::from(fee),
                        recipient: swap_recipient,
                        amountIn: amount,
                        amountOutMinimum: min_amount_out,
                        sqrtPriceLimitX96: U160::ZERO,
                    },
                }
                .abi_encode();

                let mut calls = vec![Bytes::from(swap)];
                if direction == Direction::Sell {
                    calls.push(Bytes::from(
                        ISwapRouter02::unwrapWETH9Call {
                            amountMinimum: min_amount_out,
                            recipient,
                        }
                        .abi_encode(),
                    ));
                }

                ISwapRouter02::multicallCall { deadline, data: calls }.abi_encode()
            }
        };

        Ok(data)
    }

    /// Applies the gas policy and submits.
    async fn send(&self, wallet: &BotWallet, mut tx: TxRequest) -> BotResult<TxReceipt> {
        let network_price = self
            .chain
            .gas_price()
            .await
            .map_err(|e| BotError::provider("read gas price", e))?;

        let estimate = self.chain.estimate_gas(&tx).await.map_err(|e| BotError::Transaction {
            tx_hash: None,
            message: format!("gas estimation failed, transaction would revert: {}", e),
        })?;

        tx.gas_price = Some(self.gas.gas_price(network_price));
        tx.gas_limit = Some(self.gas.gas_limit(estimate));

        self.chain
            .submit(wallet.signer(), tx)
            .await
            .map_err(|e| BotError::Transaction {
                tx_hash: None,
                message: format!("submission failed: {}", e),
            })
    }
}
