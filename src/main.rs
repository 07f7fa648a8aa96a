//! Volume Bot - Main Entry Point

use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use volume_bot::{
    config::NATIVE_DECIMALS,
    execution::{GasPolicy, SwapExecutor},
    network::{self, ChainClient, RpcChainClient},
    pools::{ExchangeRegistry, LiquidityDetector},
    scheduler::{ControllerOptions, ScheduleController},
    utils::{self, to_base_units},
    wallets::{JsonFileWalletStore, WalletManager},
    *,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    let _logging_guard = utils::setup_logging()?;
    let settings = SETTINGS.clone();
    utils::setup_output_directories(&settings.wallet_store_path)?;

    info!("🤖 Volume Bot v{}", env!("CARGO_PKG_VERSION"));
    let config = BotConfiguration::from_env()?;
    utils::print_configuration(&config);
    config.validate()?;

    // Setup network
    let provider = network::setup_provider(&settings).await?;
    let chain: Arc<dyn ChainClient> = Arc::new(RpcChainClient::new(
        provider,
        Duration::from_secs(settings.confirmation_timeout_secs),
    ));

    let registry = Arc::new(ExchangeRegistry::load(settings.exchanges_file.as_deref())?);
    let gas = GasPolicy::from_settings(&settings);

    // Wallets
    let wallets = Arc::new(WalletManager::new(
        chain.clone(),
        Arc::new(JsonFileWalletStore::new(&settings.wallet_store_path)),
        gas,
    ));
    let bot_wallet = wallets.get_or_create_bot_wallet().await?;
    info!("👛 Bot wallet: {}", bot_wallet.address);

    let user = settings
        .user_private_key
        .as_deref()
        .map(PrivateKeySigner::from_str)
        .transpose()
        .context("USER_PRIVATE_KEY is not a valid private key")?;

    if let (Some(user), Some(amount)) = (&user, settings.fund_amount) {
        info!("💸 Funding bot wallet with {} native from {}", amount, user.address());
        wallets
            .fund_wallet(user, &bot_wallet, Asset::Native, to_base_units(amount, NATIVE_DECIMALS)?)
            .await?;
    }

    if config.multi_wallet {
        wallets.derive_wallets(config.wallet_count).await?;
        if let Some(amount) = settings.pool_fund_amount {
            wallets.fund_pool(to_base_units(amount, NATIVE_DECIMALS)?).await?;
        }
    }

    let token = config.token;
    let detector = Arc::new(LiquidityDetector::new(chain.clone(), registry.clone(), WETH_BASE));
    let executor = Arc::new(SwapExecutor::new(chain.clone(), registry, gas));
    let controller = ScheduleController::new(
        chain,
        wallets.clone(),
        detector,
        executor,
        config,
        ControllerOptions::from_settings(&settings),
    );

    let start_time = Instant::now();
    controller.start().await?;

    let mut snapshots = controller.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("\n📛 Received shutdown signal (Ctrl+C)...");
                if let Err(e) = controller.stop().await {
                    warn!("⚠️ Stop failed: {}", e);
                }
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = snapshots.borrow_and_update().status;
                if matches!(status, BotStatus::Idle | BotStatus::Stopped) {
                    break;
                }
            }
        }
    }

    // Let the in-flight transaction finish
    controller.join().await;
    utils::print_session_stats(start_time, &controller.snapshot());

    if settings.withdraw_on_exit {
        match &user {
            Some(user) => {
                if let Err(e) = withdraw_all(&wallets, user.address(), token).await {
                    error!("❌ Withdrawal failed: {}", e);
                }
            }
            None => warn!("⚠️ WITHDRAW_ON_EXIT needs USER_PRIVATE_KEY to know where to send funds"),
        }
    }

    Ok(())
}

/// Sweeps the pool into the bot wallet, then empties the bot wallet into the
/// user's wallet.
async fn withdraw_all(
    wallets: &WalletManager,
    user: alloy::primitives::Address,
    token: Option<alloy::primitives::Address>,
) -> BotResult<()> {
    if !wallets.pool().await.is_empty() {
        wallets.sweep_pool(token).await?;
    }

    let bot_wallet = wallets.get_or_create_bot_wallet().await?;
    if let Some(token) = token {
        wallets
            .withdraw_from_wallet(&bot_wallet, user, Asset::Token(token), None)
            .await?;
    }
    wallets
        .withdraw_from_wallet(&bot_wallet, user, Asset::Native, None)
        .await?;

    info!("🏧 Returned funds to {}", user);
    Ok(())
}
