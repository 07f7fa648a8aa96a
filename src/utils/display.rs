//! Display and printing utilities

use std::time::Instant;
use tracing::{error, info, warn};

use crate::{
    config::{BotConfiguration, NATIVE_DECIMALS},
    types::{short_address, BotSnapshot, TransactionRecord, TransactionStatus},
    utils::from_base_units,
};

pub fn print_configuration(config: &BotConfiguration) {
    info!("📋 Configuration:");
    match config.token {
        Some(token) => info!("   Token: {}", token),
        None => info!("   Token: <none>"),
    }
    if let Some(pool) = config.pool_address {
        info!("   Pool: {}", pool);
    }
    info!("   Amount per tx: {} native", config.amount_per_tx);
    info!("   Total budget: {} native", config.total_budget);
    info!("   Transactions: {}", config.tx_count);
    info!(
        "   Interval: {}s - {}s",
        config.interval_min_secs, config.interval_max_secs
    );
    info!("   Buy/Sell: {}% / {}%", config.buy_ratio(), config.sell_ratio());
    info!("   Slippage: {}%", config.slippage_pct);
    info!("   Exchanges: {}", config.exchanges.join(", "));
    if config.multi_wallet {
        info!("   Wallets: {} derived", config.wallet_count);
    }
    if let Some(limit) = config.max_consecutive_failures {
        info!("   Stop after {} failures in a row", limit);
    }
}

pub fn print_transaction(record: &TransactionRecord) {
    match record.status() {
        TransactionStatus::Success => {
            warn!("\n✅ {} #{}", record.direction, record.id);
            warn!("   Exchange: {}", record.exchange_id);
            warn!("   Wallet: {}", short_address(&record.wallet));
            warn!("   Amount: {}", record.amount);
            if let Some(tx_hash) = &record.tx_hash {
                warn!("   Tx Hash: {}", tx_hash);
            }
            if let Some(gas) = record.gas_cost {
                warn!("   Gas: {} native", gas);
            }
        }
        TransactionStatus::Failed => {
            error!("\n❌ {} FAILED #{}", record.direction, record.id);
            if let Some(cause) = record.failure {
                error!("   Cause: {}", cause);
            }
            error!(
                "   Error: {}",
                record.error_message.as_deref().unwrap_or("Unknown")
            );
        }
        TransactionStatus::Pending => {
            info!("⏳ {} pending #{}", record.direction, record.id);
        }
    }
}

pub fn print_session_stats(start_time: Instant, snapshot: &BotSnapshot) {
    let runtime = start_time.elapsed().as_secs() / 60;
    let stats = &snapshot.stats;

    info!("\n📊 Session Statistics ({} minutes)", runtime);
    info!("   Status: {}", snapshot.status);
    info!(
        "   Progress: {}/{} ({:.0}%)",
        snapshot.completed,
        snapshot.target,
        snapshot.progress() * 100.0
    );
    info!("   Successful: {}", stats.successes);
    info!("   Failed: {}", stats.failures);
    info!("   Success rate: {:.1}%", stats.success_rate);
    info!("   Volume: {} native", stats.total_volume);
    info!("   Gas (running avg): {} native", stats.average_gas_cost);
    info!("   Gas (mean): {} native", stats.mean_gas_cost);
    info!("   Gas (total): {} native", stats.total_gas_cost);

    if !snapshot.wallets.is_empty() {
        info!("   👛 WALLETS:");
        for wallet in &snapshot.wallets {
            let label = match wallet.index {
                None => "bot".to_string(),
                Some(i) => format!("#{}", i),
            };
            info!(
                "     {} {}: {} native",
                label,
                short_address(&wallet.address),
                from_base_units(wallet.native_balance, NATIVE_DECIMALS)
            );
        }
    }

    if let Some(err) = &snapshot.last_error {
        warn!("   Last error: {}", err);
    }
    info!("");
}
