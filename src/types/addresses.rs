//! Network addresses and protocol constants

use alloy::primitives::{Address, address};

pub const BASE_CHAIN_ID: u64 = 8453;
pub const WETH_BASE: Address = address!("4200000000000000000000000000000000000006");

// Uniswap on Base
pub const UNISWAP_V2_ROUTER_BASE: Address = address!("4752ba5dbc23f44d87826276bf6fd6b1c372ad24");
pub const UNISWAP_V2_FACTORY_BASE: Address = address!("8909dc15e40173ff4699343b6eb8132c65e18ec6");
pub const UNISWAP_V3_ROUTER_BASE: Address = address!("2626664c2603336e57b271c5c0b26f421741e481");
pub const UNISWAP_V3_FACTORY_BASE: Address = address!("33128a8fc17869897dce68ed026d694621f6fdfd");
pub const UNISWAP_V3_QUOTER_BASE: Address = address!("3d4e44eb1374240ce5f1b871ab261cd16335b76a");

// SushiSwap on Base
pub const SUSHI_V2_ROUTER_BASE: Address = address!("6bded42c6da8fbf0d2ba55b2fa120c5e0c8d7891");
pub const SUSHI_V2_FACTORY_BASE: Address = address!("71524b4f93c58fcbf659783284e38825f0622859");

// PancakeSwap on Base
pub const PANCAKE_V3_ROUTER_BASE: Address = address!("678aa4bf4e210cf2166753e054d5b7c31cc7fa86");
pub const PANCAKE_V3_FACTORY_BASE: Address = address!("0bfbcf9fa4f9c56b0f40a671ad40e0805a091865");
pub const PANCAKE_V3_QUOTER_BASE: Address = address!("b048bbc1ee6b733fffcfb9e9cef7375518e25997");

/// Fee tiers probed on concentrated-liquidity factories, in probe order.
pub const FEE_TIERS: &[u32] = &[100, 500, 2500, 3000, 10000];

/// SwapRouter02 sentinel recipient meaning "keep output in the router".
pub const ROUTER_ADDRESS_THIS: Address = address!("0000000000000000000000000000000000000002");
