//! Network provider setup

use alloy::providers::{Provider, ProviderBuilder};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    config::Settings,
    network::retry::{retry_with_backoff, RetryConfig},
    ConcreteProvider,
};

pub async fn setup_provider(settings: &Settings) -> Result<Arc<ConcreteProvider>> {
    let rpc_url = settings
        .rpc_url
        .as_ref()
        .context("RPC_URL or ALCHEMY_API_KEY is required")?;

    let provider: Arc<ConcreteProvider> = Arc::new(
        ProviderBuilder::new()
            .on_http(rpc_url.parse()?)
            .boxed()
    );

    info!("🔗 Testing RPC connection...");
    let (block, chain_id) = retry_with_backoff(
        || async {
            let block = provider.get_block_number().await
                .context("Failed to get block number")?;
            let chain_id = provider.get_chain_id().await
                .context("Failed to get chain id")?;
            Ok((block, chain_id))
        },
        &RetryConfig {
            max_attempts: 5,
            initial_delay_ms: 500,
            max_delay_ms: 10000,
            exponential_base: 2.0,
        },
        "RPC connection",
    ).await
    .map_err(|e| {
        warn!("⚠️ Network connection attempt failed: {}", e);
        anyhow::anyhow!("Network connection failed: {}", e)
    })?;

    if chain_id != settings.chain_id {
        return Err(anyhow::anyhow!(
            "Wrong network: RPC reports chain {} but {} is configured",
            chain_id,
            settings.chain_id
        ));
    }

    info!("✅ Connected to chain {} at block {}", chain_id, block);
    Ok(provider)
}
