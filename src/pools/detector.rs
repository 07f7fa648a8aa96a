//! Liquidity discovery across exchanges and protocol versions
//!
//! A route is only reported when the chain positively confirmed it: non-zero
//! reserves for constant-product pairs, an existing pool for a
//! concentrated-liquidity fee tier. RPC failures surface as
//! `BotError::Provider` so they are never mistaken for "no liquidity".

use alloy::primitives::{Address, U256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::{
    errors::{BotError, BotResult},
    network::{is_revert, ChainClient},
    pools::ExchangeRegistry,
    types::*,
};

#[derive(Default)]
struct RouteCache {
    token: Option<Address>,
    routes: HashMap<String, Vec<LiquidityRoute>>,
}

/// Outcome of probing several exchanges for one token.
#[derive(Debug, Default)]
pub struct DetectionReport {
    pub routes: HashMap<String, Vec<LiquidityRoute>>,
    /// Exchanges whose provider failed; liquidity there is unknown.
    pub unavailable: HashMap<String, String>,
}

impl DetectionReport {
    pub fn has_liquidity(&self) -> bool {
        self.routes.values().any(|r| !r.is_empty())
    }

    pub fn exchanges_with_liquidity(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .routes
            .iter()
            .filter(|(_, routes)| !routes.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

pub struct LiquidityDetector {
    chain: Arc<dyn ChainClient>,
    registry: Arc<ExchangeRegistry>,
    wrapped_native: Address,
    cache: Mutex<RouteCache>,
}

impl LiquidityDetector {
    pub fn new(chain: Arc<dyn ChainClient>, registry: Arc<ExchangeRegistry>, wrapped_native: Address) -> Self {
        Self {
            chain,
            registry,
            wrapped_native,
            cache: Mutex::new(RouteCache::default()),
        }
    }

    pub fn registry(&self) -> &ExchangeRegistry {
        &self.registry
    }

    /// Drops cached routes when the target token changes.
    pub fn set_token(&self, token: Address) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if cache.token != Some(token) {
            cache.token = Some(token);
            cache.routes.clear();
        }
    }

    /// Forces the next detection to hit the chain again.
    pub fn invalidate(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.routes.clear();
    }

    fn cached(&self, token: Address, exchange_id: &str) -> Option<Vec<LiquidityRoute>> {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if cache.token == Some(token) {
            cache.routes.get(exchange_id).cloned()
        } else {
            None
        }
    }

    fn store(&self, token: Address, exchange_id: &str, routes: &[LiquidityRoute]) {
        self.set_token(token);
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.routes.insert(exchange_id.to_string(), routes.to_vec());
    }

    /// Routes for `token` on `exchange`, best first. Empty when nothing was
    /// found; `Err` only when the provider failed.
    pub async fn detect_routes(
        &self,
        token: Address,
        exchange: &ExchangeProfile,
    ) -> BotResult<Vec<LiquidityRoute>> {
        if let Some(routes) = self.cached(token, &exchange.id) {
            return Ok(routes);
        }

        let routes = self.discover(token, exchange).await?;
        self.store(token, &exchange.id, &routes);
        Ok(routes)
    }

    /// Like `detect_routes`, but trusts `pool` once it is shown to trade
    /// `token` on this exchange. Falls back to discovery otherwise.
    pub async fn detect_routes_with_pool(
        &self,
        token: Address,
        exchange: &ExchangeProfile,
        pool: Address,
    ) -> BotResult<Vec<LiquidityRoute>> {
        if let Some(routes) = self.cached(token, &exchange.id) {
            return Ok(routes);
        }

        let (token0, token1) = match self.chain.pool_tokens(pool).await {
            Ok(tokens) => tokens,
            Err(e) if is_revert(&e) => {
                warn!("⚠️ {} is not a pool ({}); ignoring it", pool, e);
                return self.detect_routes(token, exchange).await;
            }
            Err(e) => return Err(BotError::provider(format!("read tokens of pool {}", pool), e)),
        };

        if token0 != token && token1 != token {
            warn!(
                "⚠️ Pool {} trades {}/{}, not {}; ignoring it",
                pool, token0, token1, token
            );
            return self.detect_routes(token, exchange).await;
        }

        let mut routes = Vec::new();
        for capability in &exchange.capabilities {
            match capability {
                ProtocolCapability::ConcentratedLiquidity { factory, .. } => {
                    if let Some(fee) = self.fee_tier_of(*factory, token, pool).await? {
                        routes.push(self.route(exchange, ProtocolVersion::ConcentratedLiquidity, Some(pool), Some(fee)));
                    }
                }
                ProtocolCapability::ConstantProduct { factory, .. } => {
                    if self.is_pair_of(*factory, token, pool).await? && self.has_reserves(pool).await? {
                        routes.push(self.route(exchange, ProtocolVersion::ConstantProduct, Some(pool), None));
                    }
                }
                ProtocolCapability::Aggregator { .. } => {}
            }
        }

        if routes.is_empty() {
            debug!("Pool {} is not an {} pool, running discovery", pool, exchange.name);
            return self.detect_routes(token, exchange).await;
        }

        sort_routes(&mut routes);
        self.store(token, &exchange.id, &routes);
        Ok(routes)
    }

    /// Probes every exchange; provider failures are reported per exchange.
    pub async fn detect_all(&self, token: Address, exchanges: &[ExchangeProfile], pool: Option<Address>) -> DetectionReport {
        let mut report = DetectionReport::default();

        for exchange in exchanges {
            let result = match pool {
                Some(pool) => self.detect_routes_with_pool(token, exchange, pool).await,
                None => self.detect_routes(token, exchange).await,
            };
            match result {
                Ok(routes) => {
                    if routes.is_empty() {
                        info!("❌ {} - no liquidity for {}", exchange.name, token);
                    } else {
                        info!("✅ {} - {} route(s), best: {}", exchange.name, routes.len(), routes[0]);
                    }
                    report.routes.insert(exchange.id.clone(), routes);
                }
                Err(e) => {
                    warn!("⚠️ {} temporarily unavailable: {}", exchange.name, e);
                    report.unavailable.insert(exchange.id.clone(), e.to_string());
                }
            }
        }

        report
    }

    async fn discover(&self, token: Address, exchange: &ExchangeProfile) -> BotResult<Vec<LiquidityRoute>> {
        let mut routes = self.discover_direct(token, exchange).await?;

        if exchange.capability(ProtocolVersion::Aggregator).is_some() && self.aggregator_has_liquidity(token, exchange).await? {
            routes.push(self.route(exchange, ProtocolVersion::Aggregator, None, None));
        }

        sort_routes(&mut routes);
        Ok(routes)
    }

    /// Pools owned by the exchange itself.
    async fn discover_direct(&self, token: Address, exchange: &ExchangeProfile) -> BotResult<Vec<LiquidityRoute>> {
        let mut routes = Vec::new();

        for capability in &exchange.capabilities {
            match capability {
                ProtocolCapability::ConstantProduct { factory, .. } => {
                    if let Some(pair) = self.probe_constant_product(*factory, token).await? {
                        routes.push(self.route(exchange, ProtocolVersion::ConstantProduct, Some(pair), None));
                    }
                }
                ProtocolCapability::ConcentratedLiquidity { factory, .. } => {
                    for (pool, fee) in self.probe_concentrated(*factory, token).await? {
                        routes.push(self.route(exchange, ProtocolVersion::ConcentratedLiquidity, Some(pool), Some(fee)));
                    }
                }
                ProtocolCapability::Aggregator { .. } => {}
            }
        }

        Ok(routes)
    }

    /// An aggregator has liquidity if any other non-aggregator exchange does.
    async fn aggregator_has_liquidity(&self, token: Address, aggregator: &ExchangeProfile) -> BotResult<bool> {
        let mut provider_error = None;

        for other in self.registry.all() {
            if other.id == aggregator.id || other.is_aggregator_only() {
                continue;
            }
            match self.discover_direct(token, other).await {
                Ok(routes) if !routes.is_empty() => {
                    debug!("{} routes through {}", aggregator.name, other.name);
                    return Ok(true);
                }
                Ok(_) => {}
                Err(e) => provider_error = Some(e),
            }
        }

        match provider_error {
            Some(e) => Err(e),
            None => Ok(false),
        }
    }

    async fn probe_constant_product(&self, factory: Address, token: Address) -> BotResult<Option<Address>> {
        for (a, b) in [(token, self.wrapped_native), (self.wrapped_native, token)] {
            let pair = self
                .chain
                .get_pair(factory, a, b)
                .await
                .map_err(|e| BotError::provider(format!("getPair on {}", factory), e))?;
            if pair == Address::ZERO {
                continue;
            }
            if self.has_reserves(pair).await? {
                return Ok(Some(pair));
            }
            debug!("Pair {} exists but has empty reserves", pair);
        }
        Ok(None)
    }

    async fn probe_concentrated(&self, factory: Address, token: Address) -> BotResult<Vec<(Address, u32)>> {
        let mut found = Vec::new();

        for &fee in FEE_TIERS {
            for (a, b) in [(token, self.wrapped_native), (self.wrapped_native, token)] {
                let pool = self
                    .chain
                    .get_pool(factory, a, b, fee)
                    .await
                    .map_err(|e| BotError::provider(format!("getPool({}) on {}", fee, factory), e))?;
                if pool != Address::ZERO {
                    found.push((pool, fee));
                    break;
                }
            }
        }

        Ok(found)
    }

    async fn has_reserves(&self, pair: Address) -> BotResult<bool> {
        let (r0, r1) = self
            .chain
            .get_reserves(pair)
            .await
            .map_err(|e| BotError::provider(format!("getReserves on {}", pair), e))?;
        Ok(r0 > U256::ZERO && r1 > U256::ZERO)
    }

    async fn is_pair_of(&self, factory: Address, token: Address, pool: Address) -> BotResult<bool> {
        Ok(self.probe_pair_address(factory, token).await? == Some(pool))
    }

    async fn probe_pair_address(&self, factory: Address, token: Address) -> BotResult<Option<Address>> {
        for (a, b) in [(token, self.wrapped_native), (self.wrapped_native, token)] {
            let pair = self
                .chain
                .get_pair(factory, a, b)
                .await
                .map_err(|e| BotError::provider(format!("getPair on {}", factory), e))?;
            if pair != Address::ZERO {
                return Ok(Some(pair));
            }
        }
        Ok(None)
    }

    async fn fee_tier_of(&self, factory: Address, token: Address, pool: Address) -> BotResult<Option<u32>> {
        Ok(self
            .probe_concentrated(factory, token)
            .await?
            .into_iter()
            .find(|(p, _)| *p == pool)
            .map(|(_, fee)| fee))
    }

    fn route(
        &self,
        exchange: &ExchangeProfile,
        protocol: ProtocolVersion,
        pool_address: Option<Address>,
        fee_tier: Option<u32>,
    ) -> LiquidityRoute {
        LiquidityRoute {
            exchange_id: exchange.id.clone(),
            protocol,
            pool_address,
            fee_tier,
            has_liquidity: true,
        }
    }
}

/// Concentrated liquidity first, then constant product, then aggregators.
/// Stable, so the first fee tier found stays ahead among equals.
fn sort_routes(routes: &mut [LiquidityRoute]) {
    routes.sort_by_key(|r| r.protocol.preference_rank());
}

pub fn best_route(routes: &[LiquidityRoute]) -> Option<&LiquidityRoute> {
    routes
        .iter()
        .filter(|r| r.has_liquidity)
        .min_by_key(|r| r.protocol.preference_rank())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    fn detector(chain: &Arc<MockChain>) -> LiquidityDetector {
        LiquidityDetector::new(chain.clone(), Arc::new(test_registry()), WETH_BASE)
    }

    #[tokio::test]
    async fn finds_v2_pair_in_reverse_ordering() {
        let chain = Arc::new(MockChain::new());
        // Registered only as (WETH, TOKEN)
        chain.add_pair(V2_FACTORY, WETH_BASE, TOKEN, PAIR, U256::from(10u64), U256::from(5000u64));
        let detector = detector(&chain);

        let routes = detector.detect_routes(TOKEN, &sushi_profile()).await.unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].protocol, ProtocolVersion::ConstantProduct);
        assert_eq!(routes[0].pool_address, Some(PAIR));
    }

    #[tokio::test]
    async fn empty_reserves_are_not_liquidity() {
        let chain = Arc::new(MockChain::new());
        chain.add_pair(V2_FACTORY, TOKEN, WETH_BASE, PAIR, U256::ZERO, U256::from(5000u64));
        let routes = detector(&chain).detect_routes(TOKEN, &sushi_profile()).await.unwrap();
        assert!(routes.is_empty());
    }

    #[tokio::test]
    async fn records_every_fee_tier_and_prefers_concentrated() {
        let chain = Arc::new(MockChain::new());
        chain.add_pair(V2_FACTORY_UNI, TOKEN, WETH_BASE, PAIR, U256::from(1u64), U256::from(1u64));
        chain.add_pool(V3_FACTORY, TOKEN, WETH_BASE, 3000, POOL_3000);
        chain.add_pool(V3_FACTORY, WETH_BASE, TOKEN, 500, POOL_500);

        let routes = detector(&chain).detect_routes(TOKEN, &uniswap_profile()).await.unwrap();
        assert_eq!(routes.len(), 3);
        assert_eq!(routes[0].fee_tier, Some(500));
        assert_eq!(routes[1].fee_tier, Some(3000));
        assert_eq!(routes[2].protocol, ProtocolVersion::ConstantProduct);

        let best = best_route(&routes).unwrap();
        assert_eq!(best.pool_address, Some(POOL_500));
    }

    #[tokio::test]
    async fn provider_failure_differs_from_no_liquidity() {
        let chain = Arc::new(MockChain::new());
        let detector = detector(&chain);

        let none = detector.detect_routes(TOKEN, &sushi_profile()).await;
        assert!(matches!(none, Ok(ref r) if r.is_empty()));

        detector.invalidate();
        chain.set_provider_down(true);
        let err = detector.detect_routes(TOKEN, &sushi_profile()).await.unwrap_err();
        assert!(err.is_provider());
    }

    #[tokio::test]
    async fn provider_failures_are_not_cached() {
        let chain = Arc::new(MockChain::new());
        chain.add_pair(V2_FACTORY, TOKEN, WETH_BASE, PAIR, U256::from(1u64), U256::from(1u64));
        chain.set_provider_down(true);
        let detector = detector(&chain);

        assert!(detector.detect_routes(TOKEN, &sushi_profile()).await.is_err());
        chain.set_provider_down(false);
        assert_eq!(detector.detect_routes(TOKEN, &sushi_profile()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn detection_is_idempotent() {
        let chain = Arc::new(MockChain::new());
        chain.add_pool(V3_FACTORY, TOKEN, WETH_BASE, 10000, POOL_3000);
        let detector = detector(&chain);

        let first = detector.detect_routes(TOKEN, &uniswap_profile()).await.unwrap();
        detector.invalidate();
        let second = detector.detect_routes(TOKEN, &uniswap_profile()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn token_change_clears_cache() {
        let chain = Arc::new(MockChain::new());
        let detector = detector(&chain);
        assert!(detector.detect_routes(TOKEN, &sushi_profile()).await.unwrap().is_empty());

        chain.add_pair(V2_FACTORY, TOKEN, WETH_BASE, PAIR, U256::from(1u64), U256::from(1u64));
        // Still cached for the same token
        assert!(detector.detect_routes(TOKEN, &sushi_profile()).await.unwrap().is_empty());

        detector.set_token(OTHER_TOKEN);
        assert_eq!(detector.detect_routes(TOKEN, &sushi_profile()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn aggregator_available_when_another_exchange_has_liquidity() {
        let chain = Arc::new(MockChain::new());
        let detector = detector(&chain);
        assert!(detector.detect_routes(TOKEN, &aggregator_profile()).await.unwrap().is_empty());

        chain.add_pair(V2_FACTORY, TOKEN, WETH_BASE, PAIR, U256::from(1u64), U256::from(1u64));
        detector.invalidate();
        let routes = detector.detect_routes(TOKEN, &aggregator_profile()).await.unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].protocol, ProtocolVersion::Aggregator);
        assert_eq!(routes[0].pool_address, None);
    }

    #[tokio::test]
    async fn explicit_pool_must_reference_token() {
        let chain = Arc::new(MockChain::new());
        chain.add_pair(V2_FACTORY, TOKEN, WETH_BASE, PAIR, U256::from(1u64), U256::from(1u64));
        chain.set_pool_tokens(POOL_3000, OTHER_TOKEN, WETH_BASE);
        let detector = detector(&chain);

        // Wrong pool is ignored in favour of discovery
        let routes = detector
            .detect_routes_with_pool(TOKEN, &sushi_profile(), POOL_3000)
            .await
            .unwrap();
        assert_eq!(routes[0].pool_address, Some(PAIR));
    }

    #[tokio::test]
    async fn non_pool_address_falls_back_to_discovery() {
        let chain = Arc::new(MockChain::new());
        chain.add_pair(V2_FACTORY, TOKEN, WETH_BASE, PAIR, U256::from(1u64), U256::from(1u64));
        let detector = detector(&chain);

        // Nothing deployed at this address: token0() returns no data
        let routes = detector
            .detect_routes_with_pool(TOKEN, &sushi_profile(), Address::repeat_byte(0x99))
            .await
            .unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].pool_address, Some(PAIR));
    }

    #[tokio::test]
    async fn reverting_pool_contract_falls_back_to_discovery() {
        let chain = Arc::new(MockChain::new());
        chain.add_pair(V2_FACTORY, TOKEN, WETH_BASE, PAIR, U256::from(1u64), U256::from(1u64));
        chain.revert_contract(POOL_500);

        let routes = detector(&chain)
            .detect_routes_with_pool(TOKEN, &sushi_profile(), POOL_500)
            .await
            .unwrap();
        assert_eq!(routes[0].pool_address, Some(PAIR));
    }

    #[tokio::test]
    async fn explicit_pool_outage_is_a_provider_error() {
        let chain = Arc::new(MockChain::new());
        chain.add_pair(V2_FACTORY, TOKEN, WETH_BASE, PAIR, U256::from(1u64), U256::from(1u64));
        chain.fail_contract(POOL_500);

        let err = detector(&chain)
            .detect_routes_with_pool(TOKEN, &sushi_profile(), POOL_500)
            .await
            .unwrap_err();
        assert!(err.is_provider());
    }

    #[tokio::test]
    async fn explicit_concentrated_pool_resolves_fee_tier() {
        let chain = Arc::new(MockChain::new());
        chain.add_pool(V3_FACTORY, TOKEN, WETH_BASE, 500, POOL_500);
        chain.add_pool(V3_FACTORY, TOKEN, WETH_BASE, 3000, POOL_3000);
        chain.set_pool_tokens(POOL_3000, TOKEN, WETH_BASE);

        let routes = detector(&chain)
            .detect_routes_with_pool(TOKEN, &uniswap_profile(), POOL_3000)
            .await
            .unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].fee_tier, Some(3000));
    }

    #[tokio::test]
    async fn detect_all_separates_unavailable_exchanges() {
        let chain = Arc::new(MockChain::new());
        chain.add_pair(V2_FACTORY, TOKEN, WETH_BASE, PAIR, U256::from(1u64), U256::from(1u64));
        chain.fail_contract(V3_FACTORY);

        let report = detector(&chain)
            .detect_all(TOKEN, &[sushi_profile(), uniswap_profile()], None)
            .await;
        assert!(report.has_liquidity());
        assert_eq!(report.exchanges_with_liquidity(), vec!["sushiswap".to_string()]);
        assert!(report.unavailable.contains_key("uniswap"));
    }
}
