//! JSON-RPC implementation of [`ChainClient`]

use alloy::{
    eips::eip2718::Encodable2718,
    network::{EthereumWallet, TransactionBuilder},
    primitives::{
        aliases::{U160, U24},
        Address, Bytes, U256,
    },
    providers::Provider,
    rpc::types::eth::TransactionRequest,
    signers::local::PrivateKeySigner,
    sol_types::SolCall,
    transports::RpcError,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::{
    network::{
        chain::{CallReverted, ChainClient, TxReceipt, TxRequest},
        contracts::{
            IERC20, IQuoterV2, ISwapRouter02, IUniswapV2Factory, IUniswapV2Pair,
            IUniswapV2Router, IUniswapV3Factory,
        },
    },
    types::{ProtocolVersion, TokenInfo},
    ConcreteProvider,
};

pub struct RpcChainClient {
    provider: Arc<ConcreteProvider>,
    confirmation_timeout: Duration,
}

impl RpcChainClient {
    pub fn new(provider: Arc<ConcreteProvider>, confirmation_timeout: Duration) -> Self {
        Self {
            provider,
            confirmation_timeout,
        }
    }

    /// A JSON-RPC error response mentioning a revert becomes [`CallReverted`];
    /// everything else stays a transport error.
    async fn eth_call(&self, to: Address, data: Vec<u8>) -> Result<Bytes> {
        let tx = TransactionRequest::default().to(to).input(data.into());
        match self.provider.call(&tx).await {
            Ok(out) => Ok(out),
            Err(RpcError::ErrorResp(payload)) if payload.message.contains("revert") => {
                Err(CallReverted::new(to, payload.message.to_string()).into())
            }
            Err(e) => Err(anyhow::Error::new(e).context(format!("eth_call to {} failed", to))),
        }
    }

    /// Empty or malformed return data means `to` does not implement the call
    /// (an EOA, a typo, a different contract).
    fn decode<C: SolCall>(to: Address, out: &Bytes) -> Result<C::Return> {
        C::abi_decode_returns(out, true).map_err(|e| {
            CallReverted::new(
                to,
                format!("undecodable {} return data ({} bytes): {}", C::SIGNATURE, out.len(), e),
            )
            .into()
        })
    }

    fn to_request(tx: &TxRequest) -> TransactionRequest {
        let mut request = TransactionRequest::default()
            .with_from(tx.from)
            .with_to(tx.to)
            .with_value(tx.value)
            .with_input(tx.data.clone());
        if let Some(gas_limit) = tx.gas_limit {
            request = request.with_gas_limit(gas_limit.into());
        }
        if let Some(gas_price) = tx.gas_price {
            request = request.with_gas_price(gas_price);
        }
        request
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn chain_id(&self) -> Result<u64> {
        self.provider
            .get_chain_id()
            .await
            .context("Failed to get chain id")
    }

    async fn native_balance(&self, owner: Address) -> Result<U256> {
        self.provider
            .get_balance(owner)
            .await
            .with_context(|| format!("Failed to get balance of {}", owner))
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        let out = self
            .eth_call(token, IERC20::balanceOfCall { owner }.abi_encode())
            .await?;
        Ok(IERC20::balanceOfCall::abi_decode_returns(&out, true)
            .context("Failed to decode balanceOf")?
            ._0)
    }

    async fn token_info(&self, token: Address) -> Result<TokenInfo> {
        let name = self.eth_call(token, IERC20::nameCall {}.abi_encode()).await?;
        let symbol = self.eth_call(token, IERC20::symbolCall {}.abi_encode()).await?;
        let decimals = self
            .eth_call(token, IERC20::decimalsCall {}.abi_encode())
            .await?;
        let supply = self
            .eth_call(token, IERC20::totalSupplyCall {}.abi_encode())
            .await?;

        Ok(TokenInfo {
            address: token,
            name: IERC20::nameCall::abi_decode_returns(&name, true)
                .context("Failed to decode name")?
                ._0,
            symbol: IERC20::symbolCall::abi_decode_returns(&symbol, true)
                .context("Failed to decode symbol")?
                ._0,
            decimals: IERC20::decimalsCall::abi_decode_returns(&decimals, true)
                .context("Failed to decode decimals")?
                ._0,
            total_supply: IERC20::totalSupplyCall::abi_decode_returns(&supply, true)
                .context("Failed to decode totalSupply")?
                ._0,
        })
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        let out = self
            .eth_call(token, IERC20::allowanceCall { owner, spender }.abi_encode())
            .await?;
        Ok(IERC20::allowanceCall::abi_decode_returns(&out, true)
            .context("Failed to decode allowance")?
            ._0)
    }

    async fn wrapped_native(&self, router: Address, protocol: ProtocolVersion) -> Result<Address> {
        match protocol {
            ProtocolVersion::ConcentratedLiquidity => {
                let out = self
                    .eth_call(router, ISwapRouter02::WETH9Call {}.abi_encode())
                    .await?;
                Ok(ISwapRouter02::WETH9Call::abi_decode_returns(&out, true)
                    .context("Failed to decode WETH9")?
                    ._0)
            }
            ProtocolVersion::ConstantProduct | ProtocolVersion::Aggregator => {
                let out = self
                    .eth_call(router, IUniswapV2Router::WETHCall {}.abi_encode())
                    .await?;
                Ok(IUniswapV2Router::WETHCall::abi_decode_returns(&out, true)
                    .context("Failed to decode WETH")?
                    ._0)
            }
        }
    }

    async fn get_pair(&self, factory: Address, token_a: Address, token_b: Address) -> Result<Address> {
        let call = IUniswapV2Factory::getPairCall {
            tokenA: token_a,
            tokenB: token_b,
        };
        let out = self.eth_call(factory, call.abi_encode()).await?;
        Ok(IUniswapV2Factory::getPairCall::abi_decode_returns(&out, true)
            .context("Failed to decode getPair")?
            .pair)
    }

    async fn get_reserves(&self, pair: Address) -> Result<(U256, U256)> {
        let out = self
            .eth_call(pair, IUniswapV2Pair::getReservesCall {}.abi_encode())
            .await?;
        let reserves = Self::decode::<IUniswapV2Pair::getReservesCall>(pair, &out)?;
        Ok((reserves.reserve0, reserves.reserve1))
    }

    async fn pool_tokens(&self, pool: Address) -> Result<(Address, Address)> {
        let t0 = self
            .eth_call(pool, IUniswapV2Pair::token0Call {}.abi_encode())
            .await
            .context("Failed to get token0")?;
        let t1 = self
            .eth_call(pool, IUniswapV2Pair::token1Call {}.abi_encode())
            .await
            .context("Failed to get token1")?;
        Ok((
            Self::decode::<IUniswapV2Pair::token0Call>(pool, &t0)?._0,
            Self::decode::<IUniswapV2Pair::token1Call>(pool, &t1)?._0,
        ))
    }

    async fn get_pool(
        &self,
        factory: Address,
        token_a: Address,
        token_b: Address,
        fee: u32,
    ) -> Result<Address> {
        let call = IUniswapV3Factory::getPoolCall {
            tokenA: token_a,
            tokenB: token_b,
            fee: U24::from(fee),
        };
        let out = self.eth_call(factory, call.abi_encode()).await?;
        Ok(IUniswapV3Factory::getPoolCall::abi_decode_returns(&out, true)
            .context("Failed to decode getPool")?
            .pool)
    }

    async fn quote_amounts_out(&self, router: Address, amount_in: U256, path: &[Address]) -> Result<U256> {
        let call = IUniswapV2Router::getAmountsOutCall {
            amountIn: amount_in,
            path: path.to_vec(),
        };
        let out = self.eth_call(router, call.abi_encode()).await?;
        let amounts = Self::decode::<IUniswapV2Router::getAmountsOutCall>(router, &out)?.amounts;
        amounts
            .last()
            .copied()
            .ok_or_else(|| CallReverted::new(router, "getAmountsOut returned no amounts").into())
    }

    async fn quote_exact_input_single(
        &self,
        quoter: Address,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_in: U256,
    ) -> Result<U256> {
        let call = IQuoterV2::quoteExactInputSingleCall {
            params: IQuoterV2::QuoteExactInputSingleParams {
                tokenIn: token_in,
                tokenOut: token_out,
                amountIn: amount_in,
                fee: U24::from(fee),
                sqrtPriceLimitX96: U160::ZERO,
            },
        };
        let out = self.eth_call(quoter, call.abi_encode()).await?;
        Ok(Self::decode::<IQuoterV2::quoteExactInputSingleCall>(quoter, &out)?.amountOut)
    }

    async fn gas_price(&self) -> Result<u128> {
        let price = self
            .provider
            .get_gas_price()
            .await
            .context("Failed to get gas price")?;
        Ok(price as u128)
    }

    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64> {
        let gas = self
            .provider
            .estimate_gas(&Self::to_request(tx))
            .await
            .context("Gas estimation failed")?;
        Ok(gas as u64)
    }

    async fn submit(&self, signer: &PrivateKeySigner, tx: TxRequest) -> Result<TxReceipt> {
        let chain_id = self.chain_id().await?;
        let nonce = self
            .provider
            .get_transaction_count(tx.from)
            .await
            .context("Failed to get nonce")?;

        let request = Self::to_request(&tx)
            .with_nonce(nonce)
            .with_chain_id(chain_id);

        let wallet = EthereumWallet::from(signer.clone());
        let envelope = request
            .build(&wallet)
            .await
            .context("Failed to sign transaction")?;

        let pending_tx = self
            .provider
            .send_raw_transaction(&envelope.encoded_2718())
            .await
            .context("Failed to send transaction")?;

        let tx_hash = *pending_tx.tx_hash();
        debug!("📡 Transaction sent: {}", tx_hash);

        tokio::select! {
            result = pending_tx.get_receipt() => {
                let receipt = result.context("Failed to fetch receipt")?;
                info!("✅ Transaction mined: {:?} (status={})", receipt.transaction_hash, receipt.status());
                Ok(TxReceipt {
                    tx_hash: receipt.transaction_hash,
                    success: receipt.status(),
                    gas_used: receipt.gas_used as u64,
                    effective_gas_price: receipt.effective_gas_price as u128,
                })
            }
            _ = tokio::time::sleep(self.confirmation_timeout) => {
                Err(anyhow::anyhow!(
                    "Transaction {} not confirmed after {} seconds",
                    tx_hash,
                    self.confirmation_timeout.as_secs()
                ))
            }
        }
    }
}
