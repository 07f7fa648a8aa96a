//! Exchange profiles known to the bot

use std::fs;
use tracing::info;

use crate::{
    errors::{BotError, BotResult},
    types::*,
};

#[derive(Debug, Clone, Default)]
pub struct ExchangeRegistry {
    exchanges: Vec<ExchangeProfile>,
}

impl ExchangeRegistry {
    pub fn new(exchanges: Vec<ExchangeProfile>) -> Self {
        Self { exchanges }
    }

    pub fn base_mainnet() -> Self {
        Self::new(vec![
            ExchangeProfile {
                id: "uniswap".to_string(),
                name: "Uniswap".to_string(),
                capabilities: vec![
                    ProtocolCapability::ConcentratedLiquidity {
                        router: UNISWAP_V3_ROUTER_BASE,
                        factory: UNISWAP_V3_FACTORY_BASE,
                        quoter: UNISWAP_V3_QUOTER_BASE,
                    },
                    ProtocolCapability::ConstantProduct {
                        router: UNISWAP_V2_ROUTER_BASE,
                        factory: UNISWAP_V2_FACTORY_BASE,
                    },
                ],
            },
            ExchangeProfile {
                id: "sushiswap".to_string(),
                name: "SushiSwap".to_string(),
                capabilities: vec![ProtocolCapability::ConstantProduct {
                    router: SUSHI_V2_ROUTER_BASE,
                    factory: SUSHI_V2_FACTORY_BASE,
                }],
            },
            ExchangeProfile {
                id: "pancakeswap".to_string(),
                name: "PancakeSwap".to_string(),
                capabilities: vec![ProtocolCapability::ConcentratedLiquidity {
                    router: PANCAKE_V3_ROUTER_BASE,
                    factory: PANCAKE_V3_FACTORY_BASE,
                    quoter: PANCAKE_V3_QUOTER_BASE,
                }],
            },
        ])
    }

    /// Built-in profiles, extended or overridden (by id) from a JSON array of
    /// `ExchangeProfile`s.
    pub fn load(extra_profiles_path: Option<&str>) -> BotResult<Self> {
        let mut registry = Self::base_mainnet();

        if let Some(path) = extra_profiles_path {
            let raw = fs::read_to_string(path).map_err(|e| {
                BotError::config(format!("cannot read exchange profiles {}: {}", path, e))
            })?;
            let extra: Vec<ExchangeProfile> = serde_json::from_str(&raw).map_err(|e| {
                BotError::config(format!("invalid exchange profiles in {}: {}", path, e))
            })?;
            info!("📚 Loaded {} exchange profiles from {}", extra.len(), path);
            for profile in extra {
                registry.upsert(profile);
            }
        }

        Ok(registry)
    }

    pub fn upsert(&mut self, profile: ExchangeProfile) {
        match self.exchanges.iter_mut().find(|e| e.id == profile.id) {
            Some(existing) => *existing = profile,
            None => self.exchanges.push(profile),
        }
    }

    pub fn get(&self, id: &str) -> Option<&ExchangeProfile> {
        self.exchanges.iter().find(|e| e.id == id)
    }

    pub fn all(&self) -> &[ExchangeProfile] {
        &self.exchanges
    }

    /// Resolves configured exchange ids; unknown ids are a configuration error.
    pub fn select(&self, ids: &[String]) -> BotResult<Vec<ExchangeProfile>> {
        ids.iter()
            .map(|id| {
                self.get(id)
                    .cloned()
                    .ok_or_else(|| BotError::config(format!("unknown exchange '{}'", id)))
            })
            .collect()
    }
}
