//! Bot-controlled wallets

use alloy::{
    primitives::{Address, U256},
    signers::local::PrivateKeySigner,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A key pair controlled by the bot. The signer never leaves the crate; only
/// the address and cached balances are visible to callers.
#[derive(Clone)]
pub struct BotWallet {
    pub address: Address,
    signer: PrivateKeySigner,
    pub native_balance: U256,
    pub token_balance: U256,
    /// `None` for the primary bot wallet, the derivation index otherwise.
    pub index: Option<u32>,
}

impl BotWallet {
    pub fn new(signer: PrivateKeySigner, index: Option<u32>) -> Self {
        Self {
            address: signer.address(),
            signer,
            native_balance: U256::ZERO,
            token_balance: U256::ZERO,
            index,
        }
    }

    pub(crate) fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    pub fn is_primary(&self) -> bool {
        self.index.is_none()
    }

    pub fn label(&self) -> String {
        match self.index {
            None => format!("bot:{}", short_address(&self.address)),
            Some(i) => format!("pool#{}:{}", i, short_address(&self.address)),
        }
    }
}

impl fmt::Debug for BotWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotWallet")
            .field("address", &self.address)
            .field("signer", &"<redacted>")
            .field("native_balance", &self.native_balance)
            .field("token_balance", &self.token_balance)
            .field("index", &self.index)
            .finish()
    }
}

/// Read-only view of a wallet for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletView {
    pub address: Address,
    pub native_balance: U256,
    pub token_balance: U256,
    pub index: Option<u32>,
}

impl From<&BotWallet> for WalletView {
    fn from(wallet: &BotWallet) -> Self {
        Self {
            address: wallet.address,
            native_balance: wallet.native_balance,
            token_balance: wallet.token_balance,
            index: wallet.index,
        }
    }
}

/// What is being moved: the chain's base asset or an ERC-20 token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    Native,
    Token(Address),
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Token(addr) => write!(f, "token {}", short_address(addr)),
        }
    }
}

pub fn short_address(address: &Address) -> String {
    let s = address.to_string();
    format!("{}…{}", &s[..6], &s[s.len() - 4..])
}
