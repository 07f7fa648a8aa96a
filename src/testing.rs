//! In-memory chain used by unit tests across the crate

use alloy::{
    primitives::{keccak256, Address, B256, U256},
    signers::local::PrivateKeySigner,
    sol_types::SolCall,
};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::{
    config::{NATIVE_DECIMALS, NATIVE_TRANSFER_GAS},
    network::{
        contracts::{IERC20, ISwapRouter02, IUniswapV2Router},
        CallReverted, ChainClient, TxReceipt, TxRequest,
    },
    pools::ExchangeRegistry,
    types::*,
    utils::to_base_units,
};

pub const TOKEN: Address = Address::repeat_byte(0xa1);
pub const OTHER_TOKEN: Address = Address::repeat_byte(0xa2);
pub const PAIR: Address = Address::repeat_byte(0xb1);
pub const POOL_500: Address = Address::repeat_byte(0xb2);
pub const POOL_3000: Address = Address::repeat_byte(0xb3);
pub const V2_FACTORY: Address = Address::repeat_byte(0xc1);
pub const V2_ROUTER: Address = Address::repeat_byte(0xc2);
pub const V2_FACTORY_UNI: Address = Address::repeat_byte(0xc3);
pub const V2_ROUTER_UNI: Address = Address::repeat_byte(0xc4);
pub const V3_FACTORY: Address = Address::repeat_byte(0xd1);
pub const V3_ROUTER: Address = Address::repeat_byte(0xd2);
pub const V3_QUOTER: Address = Address::repeat_byte(0xd3);
pub const AGG_ROUTER: Address = Address::repeat_byte(0xe1);

pub const MOCK_GAS_PRICE: u128 = 1_000_000_000;
pub const MOCK_GAS_ESTIMATE: u64 = 100_000;

pub fn eth(amount: Decimal) -> U256 {
    to_base_units(amount, NATIVE_DECIMALS).unwrap()
}

pub fn signer(seed: u8) -> PrivateKeySigner {
    PrivateKeySigner::from_bytes(&B256::repeat_byte(seed)).unwrap()
}

pub fn test_wallet(seed: u8) -> BotWallet {
    BotWallet::new(signer(seed), Some(seed as u32))
}

pub fn sushi_profile() -> ExchangeProfile {
    ExchangeProfile {
        id: "sushiswap".into(),
        name: "SushiSwap".into(),
        capabilities: vec![ProtocolCapability::ConstantProduct {
            router: V2_ROUTER,
            factory: V2_FACTORY,
        }],
    }
}

pub fn uniswap_profile() -> ExchangeProfile {
    ExchangeProfile {
        id: "uniswap".into(),
        name: "Uniswap".into(),
        capabilities: vec![
            ProtocolCapability::ConcentratedLiquidity {
                router: V3_ROUTER,
                factory: V3_FACTORY,
                quoter: V3_QUOTER,
            },
            ProtocolCapability::ConstantProduct {
                router: V2_ROUTER_UNI,
                factory: V2_FACTORY_UNI,
            },
        ],
    }
}

pub fn aggregator_profile() -> ExchangeProfile {
    ExchangeProfile {
        id: "aggregator".into(),
        name: "Aggregator".into(),
        capabilities: vec![ProtocolCapability::Aggregator { router: AGG_ROUTER }],
    }
}

pub fn test_registry() -> ExchangeRegistry {
    ExchangeRegistry::new(vec![sushi_profile(), uniswap_profile(), aggregator_profile()])
}

pub fn v2_route() -> LiquidityRoute {
    LiquidityRoute {
        exchange_id: "sushiswap".into(),
        protocol: ProtocolVersion::ConstantProduct,
        pool_address: Some(PAIR),
        fee_tier: None,
        has_liquidity: true,
    }
}

pub fn v3_route(fee: u32) -> LiquidityRoute {
    LiquidityRoute {
        exchange_id: "uniswap".into(),
        protocol: ProtocolVersion::ConcentratedLiquidity,
        pool_address: Some(POOL_3000),
        fee_tier: Some(fee),
        has_liquidity: true,
    }
}

struct State {
    chain_id: u64,
    native: HashMap<Address, U256>,
    tokens: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    pairs: HashMap<(Address, Address, Address), Address>,
    reserves: HashMap<Address, (U256, U256)>,
    pools: HashMap<(Address, Address, Address, u32), Address>,
    pool_tokens: HashMap<Address, (Address, Address)>,
    known_tokens: HashSet<Address>,
    failing: HashSet<Address>,
    reverting: HashSet<Address>,
    provider_down: bool,
    revert_quotes: bool,
    revert_swaps: bool,
    revert_approvals: bool,
    submit_delay: Option<Duration>,
    /// Token base units per wei of native, both directions.
    tokens_per_native: U256,
    submissions: Vec<TxRequest>,
    nonce: u64,
}

/// A single-token, single-rate chain. Balances move only through submitted
/// transactions or the setters below.
pub struct MockChain {
    state: Mutex<State>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                chain_id: BASE_CHAIN_ID,
                native: HashMap::new(),
                tokens: HashMap::new(),
                allowances: HashMap::new(),
                pairs: HashMap::new(),
                reserves: HashMap::new(),
                pools: HashMap::new(),
                pool_tokens: HashMap::new(),
                known_tokens: [TOKEN, OTHER_TOKEN].into_iter().collect(),
                failing: HashSet::new(),
                reverting: HashSet::new(),
                provider_down: false,
                revert_quotes: false,
                submit_delay: None,
                revert_swaps: false,
                revert_approvals: false,
                tokens_per_native: U256::from(1000u64),
                submissions: Vec::new(),
                nonce: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Errors like a flaky node (transport) or a contract that rejects
    /// every call (revert).
    fn check(&self, contract: Option<Address>) -> Result<()> {
        let state = self.state();
        if state.provider_down {
            bail!("connection refused");
        }
        if let Some(contract) = contract {
            if state.failing.contains(&contract) {
                bail!("upstream timed out serving call to {}", contract);
            }
            if state.reverting.contains(&contract) {
                return Err(CallReverted::new(contract, "execution reverted").into());
            }
        }
        Ok(())
    }

    pub fn add_pair(&self, factory: Address, a: Address, b: Address, pair: Address, r0: U256, r1: U256) {
        let mut state = self.state();
        state.pairs.insert((factory, a, b), pair);
        state.reserves.insert(pair, (r0, r1));
        state.pool_tokens.insert(pair, (a, b));
    }

    pub fn add_pool(&self, factory: Address, a: Address, b: Address, fee: u32, pool: Address) {
        let mut state = self.state();
        state.pools.insert((factory, a, b, fee), pool);
        state.pool_tokens.insert(pool, (a, b));
    }

    pub fn set_pool_tokens(&self, pool: Address, token0: Address, token1: Address) {
        self.state().pool_tokens.insert(pool, (token0, token1));
    }

    pub fn fail_contract(&self, contract: Address) {
        self.state().failing.insert(contract);
    }

    pub fn revert_contract(&self, contract: Address) {
        self.state().reverting.insert(contract);
    }

    /// Quoters and `getAmountsOut` revert, as on a drained pool.
    pub fn set_quote_reverts(&self, revert: bool) {
        self.state().revert_quotes = revert;
    }

    /// Time each submission spends waiting for its receipt.
    pub fn set_submit_delay(&self, delay: Duration) {
        self.state().submit_delay = Some(delay);
    }

    pub fn set_provider_down(&self, down: bool) {
        self.state().provider_down = down;
    }

    pub fn set_revert_swaps(&self, revert: bool) {
        self.state().revert_swaps = revert;
    }

    pub fn set_revert_approvals(&self, revert: bool) {
        self.state().revert_approvals = revert;
    }

    pub fn set_tokens_per_native(&self, rate: U256) {
        self.state().tokens_per_native = rate;
    }

    pub fn set_chain_id(&self, chain_id: u64) {
        self.state().chain_id = chain_id;
    }

    pub fn set_native(&self, owner: Address, amount: U256) {
        self.state().native.insert(owner, amount);
    }

    pub fn set_token_balance(&self, token: Address, owner: Address, amount: U256) {
        self.state().tokens.insert((token, owner), amount);
    }

    pub fn native_of(&self, owner: Address) -> U256 {
        self.state().native.get(&owner).copied().unwrap_or_default()
    }

    pub fn token_balance_of(&self, token: Address, owner: Address) -> U256 {
        self.state().tokens.get(&(token, owner)).copied().unwrap_or_default()
    }

    pub fn submissions(&self) -> Vec<TxRequest> {
        self.state().submissions.clone()
    }
}

impl State {
    fn quote(&self, token_in: Address, amount: U256) -> U256 {
        if token_in == WETH_BASE {
            amount * self.tokens_per_native
        } else if self.tokens_per_native.is_zero() {
            U256::ZERO
        } else {
            amount / self.tokens_per_native
        }
    }

    fn native_mut(&mut self, owner: Address) -> &mut U256 {
        self.native.entry(owner).or_default()
    }

    fn token_mut(&mut self, token: Address, owner: Address) -> &mut U256 {
        self.tokens.entry((token, owner)).or_default()
    }

    /// Pulls `amount` of `token` from `owner` on behalf of `spender`.
    fn pull(&mut self, token: Address, owner: Address, spender: Address, amount: U256) -> bool {
        let allowance = self.allowances.get(&(token, owner, spender)).copied().unwrap_or_default();
        if allowance < amount || *self.token_mut(token, owner) < amount {
            return false;
        }
        if allowance != U256::MAX {
            self.allowances.insert((token, owner, spender), allowance - amount);
        }
        *self.token_mut(token, owner) -= amount;
        true
    }

    /// Applies a transaction; `false` means it reverted.
    fn apply(&mut self, tx: &TxRequest) -> bool {
        let data = tx.data.as_ref();
        if data.is_empty() {
            *self.native_mut(tx.from) -= tx.value;
            *self.native_mut(tx.to) += tx.value;
            return true;
        }
        if data.len() < 4 {
            return false;
        }
        let selector: [u8; 4] = [data[0], data[1], data[2], data[3]];

        if selector == IERC20::approveCall::SELECTOR {
            let Ok(call) = IERC20::approveCall::abi_decode(data, true) else {
                return false;
            };
            if self.revert_approvals {
                return false;
            }
            self.allowances.insert((tx.to, tx.from, call.spender), call.amount);
            return true;
        }

        if selector == IERC20::transferCall::SELECTOR {
            let Ok(call) = IERC20::transferCall::abi_decode(data, true) else {
                return false;
            };
            if *self.token_mut(tx.to, tx.from) < call.amount {
                return false;
            }
            *self.token_mut(tx.to, tx.from) -= call.amount;
            *self.token_mut(tx.to, call.to) += call.amount;
            return true;
        }

        if self.revert_swaps {
            return false;
        }

        if selector == IUniswapV2Router::swapExactETHForTokensCall::SELECTOR {
            let Ok(call) = IUniswapV2Router::swapExactETHForTokensCall::abi_decode(data, true) else {
                return false;
            };
            let out = self.quote(WETH_BASE, tx.value);
            if out < call.amountOutMin || call.path.len() != 2 {
                return false;
            }
            *self.native_mut(tx.from) -= tx.value;
            *self.token_mut(call.path[1], call.to) += out;
            return true;
        }

        if selector == IUniswapV2Router::swapExactTokensForETHCall::SELECTOR {
            let Ok(call) = IUniswapV2Router::swapExactTokensForETHCall::abi_decode(data, true) else {
                return false;
            };
            let out = self.quote(call.path[0], call.amountIn);
            if out < call.amountOutMin || !self.pull(call.path[0], tx.from, tx.to, call.amountIn) {
                return false;
            }
            *self.native_mut(call.to) += out;
            return true;
        }

        if selector == ISwapRouter02::multicallCall::SELECTOR {
            let Ok(call) = ISwapRouter02::multicallCall::abi_decode(data, true) else {
                return false;
            };
            let Some(Ok(swap)) = call
                .data
                .first()
                .map(|inner| ISwapRouter02::exactInputSingleCall::abi_decode(inner, true))
            else {
                return false;
            };
            let params = swap.params;
            let out = self.quote(params.tokenIn, params.amountIn);
            if out < params.amountOutMinimum {
                return false;
            }

            if params.tokenIn == WETH_BASE {
                if tx.value != params.amountIn {
                    return false;
                }
                *self.native_mut(tx.from) -= tx.value;
                *self.token_mut(params.tokenOut, params.recipient) += out;
                return true;
            }

            let Some(Ok(unwrap)) = call
                .data
                .get(1)
                .map(|inner| ISwapRouter02::unwrapWETH9Call::abi_decode(inner, true))
            else {
                return false;
            };
            if params.recipient != ROUTER_ADDRESS_THIS || !self.pull(params.tokenIn, tx.from, tx.to, params.amountIn) {
                return false;
            }
            *self.native_mut(unwrap.recipient) += out;
            return true;
        }

        false
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn chain_id(&self) -> Result<u64> {
        self.check(None)?;
        Ok(self.state().chain_id)
    }

    async fn native_balance(&self, owner: Address) -> Result<U256> {
        self.check(Some(owner))?;
        Ok(self.native_of(owner))
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        self.check(Some(token))?;
        Ok(self.token_balance_of(token, owner))
    }

    async fn token_info(&self, token: Address) -> Result<TokenInfo> {
        self.check(Some(token))?;
        if !self.state().known_tokens.contains(&token) {
            return Err(CallReverted::new(token, "not an ERC-20").into());
        }
        Ok(TokenInfo {
            address: token,
            name: "Volume Token".to_string(),
            symbol: "VOL".to_string(),
            decimals: 18,
            total_supply: U256::from(1_000_000_000u64) * U256::from(10u64).pow(U256::from(18u64)),
        })
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        self.check(Some(token))?;
        Ok(self
            .state()
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn wrapped_native(&self, router: Address, _protocol: ProtocolVersion) -> Result<Address> {
        self.check(Some(router))?;
        Ok(WETH_BASE)
    }

    async fn get_pair(&self, factory: Address, token_a: Address, token_b: Address) -> Result<Address> {
        self.check(Some(factory))?;
        Ok(self
            .state()
            .pairs
            .get(&(factory, token_a, token_b))
            .copied()
            .unwrap_or(Address::ZERO))
    }

    async fn get_reserves(&self, pair: Address) -> Result<(U256, U256)> {
        self.check(Some(pair))?;
        self.state()
            .reserves
            .get(&pair)
            .copied()
            .ok_or_else(|| CallReverted::new(pair, "empty return data").into())
    }

    async fn pool_tokens(&self, pool: Address) -> Result<(Address, Address)> {
        self.check(Some(pool))?;
        self.state()
            .pool_tokens
            .get(&pool)
            .copied()
            .ok_or_else(|| CallReverted::new(pool, "empty return data").into())
    }

    async fn get_pool(&self, factory: Address, token_a: Address, token_b: Address, fee: u32) -> Result<Address> {
        self.check(Some(factory))?;
        Ok(self
            .state()
            .pools
            .get(&(factory, token_a, token_b, fee))
            .copied()
            .unwrap_or(Address::ZERO))
    }

    async fn quote_amounts_out(&self, router: Address, amount_in: U256, path: &[Address]) -> Result<U256> {
        self.check(Some(router))?;
        let first = path.first().ok_or_else(|| anyhow!("empty path"))?;
        let state = self.state();
        if state.revert_quotes {
            return Err(CallReverted::new(router, "UniswapV2Library: INSUFFICIENT_LIQUIDITY").into());
        }
        Ok(state.quote(*first, amount_in))
    }

    async fn quote_exact_input_single(
        &self,
        quoter: Address,
        token_in: Address,
        _token_out: Address,
        _fee: u32,
        amount_in: U256,
    ) -> Result<U256> {
        self.check(Some(quoter))?;
        let state = self.state();
        if state.revert_quotes {
            return Err(CallReverted::new(quoter, "execution reverted").into());
        }
        Ok(state.quote(token_in, amount_in))
    }

    async fn gas_price(&self) -> Result<u128> {
        self.check(None)?;
        Ok(MOCK_GAS_PRICE)
    }

    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64> {
        self.check(Some(tx.to))?;
        if self.native_of(tx.from) < tx.value {
            bail!("insufficient funds for transfer");
        }
        Ok(if tx.data.is_empty() {
            NATIVE_TRANSFER_GAS
        } else {
            MOCK_GAS_ESTIMATE
        })
    }

    async fn submit(&self, signer: &PrivateKeySigner, tx: TxRequest) -> Result<TxReceipt> {
        self.check(Some(tx.to))?;
        if signer.address() != tx.from {
            bail!("signer {} does not match sender {}", signer.address(), tx.from);
        }
        let delay = self.state().submit_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        let gas_used = if tx.data.is_empty() {
            NATIVE_TRANSFER_GAS
        } else {
            MOCK_GAS_ESTIMATE
        };
        let price = tx.gas_price.unwrap_or(MOCK_GAS_PRICE);
        let gas_cost = U256::from(gas_used) * U256::from(price);

        if *state.native_mut(tx.from) < tx.value + gas_cost {
            bail!("insufficient funds for gas * price + value");
        }
        *state.native_mut(tx.from) -= gas_cost;

        let success = state.apply(&tx);
        state.nonce += 1;
        let tx_hash = keccak256(state.nonce.to_be_bytes());
        state.submissions.push(tx);

        Ok(TxReceipt {
            tx_hash,
            success,
            gas_used,
            effective_gas_price: price,
        })
    }
}
