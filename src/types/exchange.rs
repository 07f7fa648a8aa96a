//! Exchange profiles and liquidity routes

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What an exchange can do, with the contracts needed to do it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "snake_case")]
pub enum ProtocolCapability {
    ConstantProduct {
        router: Address,
        factory: Address,
    },
    ConcentratedLiquidity {
        router: Address,
        factory: Address,
        quoter: Address,
    },
    /// Routes through other venues. The router must expose a
    /// UniswapV2-compatible swap/quote interface.
    Aggregator { router: Address },
}

impl ProtocolCapability {
    pub fn version(&self) -> ProtocolVersion {
        match self {
            Self::ConstantProduct { .. } => ProtocolVersion::ConstantProduct,
            Self::ConcentratedLiquidity { .. } => ProtocolVersion::ConcentratedLiquidity,
            Self::Aggregator { .. } => ProtocolVersion::Aggregator,
        }
    }

    pub fn router(&self) -> Address {
        match self {
            Self::ConstantProduct { router, .. }
            | Self::ConcentratedLiquidity { router, .. }
            | Self::Aggregator { router } => *router,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeProfile {
    pub id: String,
    pub name: String,
    pub capabilities: Vec<ProtocolCapability>,
}

impl ExchangeProfile {
    pub fn capability(&self, version: ProtocolVersion) -> Option<&ProtocolCapability> {
        self.capabilities.iter().find(|c| c.version() == version)
    }

    pub fn is_aggregator_only(&self) -> bool {
        !self.capabilities.is_empty()
            && self
                .capabilities
                .iter()
                .all(|c| matches!(c, ProtocolCapability::Aggregator { .. }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolVersion {
    ConstantProduct,
    ConcentratedLiquidity,
    Aggregator,
}

impl ProtocolVersion {
    /// Lower ranks win when picking between routes.
    pub fn preference_rank(&self) -> u8 {
        match self {
            Self::ConcentratedLiquidity => 0,
            Self::ConstantProduct => 1,
            Self::Aggregator => 2,
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConstantProduct => write!(f, "V2"),
            Self::ConcentratedLiquidity => write!(f, "V3"),
            Self::Aggregator => write!(f, "Aggregator"),
        }
    }
}

/// A confirmed (exchange, protocol, pool) tuple usable for a swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiquidityRoute {
    pub exchange_id: String,
    pub protocol: ProtocolVersion,
    /// Absent for aggregator routes, which have no pool of their own.
    pub pool_address: Option<Address>,
    pub fee_tier: Option<u32>,
    pub has_liquidity: bool,
}

impl fmt::Display for LiquidityRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.exchange_id, self.protocol)?;
        if let Some(fee) = self.fee_tier {
            write!(f, " fee={}", fee)?;
        }
        if let Some(pool) = self.pool_address {
            write!(f, " @ {}", pool)?;
        }
        Ok(())
    }
}
