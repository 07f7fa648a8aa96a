//! The blockchain boundary consumed by the bot core

use alloy::{
    primitives::{Address, B256, Bytes, U256},
    signers::local::PrivateKeySigner,
};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::types::{ProtocolVersion, TokenInfo};

/// An unsigned transaction; nonce and chain id are filled at submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: Option<u64>,
    pub gas_price: Option<u128>,
}

impl TxRequest {
    pub fn call(from: Address, to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            from,
            to,
            value: U256::ZERO,
            data: data.into(),
            gas_limit: None,
            gas_price: None,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub success: bool,
    pub gas_used: u64,
    pub effective_gas_price: u128,
}

impl TxReceipt {
    pub fn gas_cost(&self) -> U256 {
        U256::from(self.gas_used) * U256::from(self.effective_gas_price)
    }
}

/// The node answered, but the contract rejected the call or returned data
/// that does not decode. Anything else coming out of a [`ChainClient`] is a
/// transport failure.
#[derive(Error, Debug)]
#[error("call to {to} reverted: {reason}")]
pub struct CallReverted {
    pub to: Address,
    pub reason: String,
}

impl CallReverted {
    pub fn new(to: Address, reason: impl Into<String>) -> Self {
        Self {
            to,
            reason: reason.into(),
        }
    }
}

/// True when `err` (or anything it wraps) is a [`CallReverted`].
pub fn is_revert(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<CallReverted>())
}

/// Reads and writes against one EVM chain. Errors are transport failures
/// unless they carry a [`CallReverted`]; negative answers (no pair, zero
/// reserves) are values.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;

    async fn native_balance(&self, owner: Address) -> Result<U256>;

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256>;

    async fn token_info(&self, token: Address) -> Result<TokenInfo>;

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256>;

    /// The wrapped native token a router swaps through.
    async fn wrapped_native(&self, router: Address, protocol: ProtocolVersion) -> Result<Address>;

    /// `Address::ZERO` when the factory has no such pair.
    async fn get_pair(&self, factory: Address, token_a: Address, token_b: Address) -> Result<Address>;

    async fn get_reserves(&self, pair: Address) -> Result<(U256, U256)>;

    async fn pool_tokens(&self, pool: Address) -> Result<(Address, Address)>;

    /// `Address::ZERO` when no pool exists for the fee tier.
    async fn get_pool(
        &self,
        factory: Address,
        token_a: Address,
        token_b: Address,
        fee: u32,
    ) -> Result<Address>;

    /// Output of the last hop of `getAmountsOut`.
    async fn quote_amounts_out(&self, router: Address, amount_in: U256, path: &[Address]) -> Result<U256>;

    async fn quote_exact_input_single(
        &self,
        quoter: Address,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_in: U256,
    ) -> Result<U256>;

    async fn gas_price(&self) -> Result<u128>;

    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64>;

    /// Signs, sends and waits for the receipt.
    async fn submit(&self, signer: &PrivateKeySigner, tx: TxRequest) -> Result<TxReceipt>;
}
