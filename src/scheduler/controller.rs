//! Bot lifecycle and the buy/sell scheduling loop
//!
//! The loop runs as a single spawned task and executes at most one
//! transaction at a time. Control calls only flip the shared status; the loop
//! honors it at the top of each iteration and after each delay, so an
//! in-flight transaction always completes first.

use alloy::primitives::U256;
use rand::{seq::IndexedRandom, Rng};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::{
    sync::{watch, Mutex as AsyncMutex, RwLock},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::{
    config::{BotConfiguration, Settings, NATIVE_DECIMALS},
    errors::{BotError, BotResult, CircuitBreaker},
    execution::{SwapExecutor, SwapOutcome},
    ledger::TransactionLedger,
    network::ChainClient,
    pools::{best_route, LiquidityDetector},
    scheduler::{cancellable_timer, CancellableTimer, TimerCanceller, TimerResult},
    storage::save_transaction,
    types::*,
    utils::{from_base_units, print_transaction, to_base_units},
    wallets::WalletManager,
};

#[derive(Debug, Clone, Copy)]
pub struct ControllerOptions {
    /// Chain the provider must report before trading starts.
    pub chain_id: u64,
    pub persist_transactions: bool,
}

impl ControllerOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            chain_id: settings.chain_id,
            persist_transactions: settings.persist_transactions,
        }
    }
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Token identity and the routes confirmed by the last `start`.
#[derive(Default)]
struct Session {
    token: Option<TokenInfo>,
    routes: HashMap<String, Vec<LiquidityRoute>>,
}

struct Shared {
    chain: Arc<dyn ChainClient>,
    wallets: Arc<WalletManager>,
    detector: Arc<LiquidityDetector>,
    executor: Arc<SwapExecutor>,
    options: ControllerOptions,
    config: RwLock<BotConfiguration>,
    session: RwLock<Session>,
    status: watch::Sender<BotStatus>,
    snapshot: watch::Sender<BotSnapshot>,
    ledger: Mutex<TransactionLedger>,
    canceller: Mutex<Option<TimerCanceller>>,
    last_error: Mutex<Option<String>>,
}

/// One planned swap.
struct Attempt {
    direction: Direction,
    wallet: BotWallet,
    route: LiquidityRoute,
    follow_up: bool,
}

pub struct ScheduleController {
    shared: Arc<Shared>,
    task: AsyncMutex<Option<JoinHandle<()>>>,
}

impl ScheduleController {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        wallets: Arc<WalletManager>,
        detector: Arc<LiquidityDetector>,
        executor: Arc<SwapExecutor>,
        config: BotConfiguration,
        options: ControllerOptions,
    ) -> Self {
        let (status, _) = watch::channel(BotStatus::Idle);
        let (snapshot, _) = watch::channel(BotSnapshot {
            target: config.tx_count,
            ..BotSnapshot::idle()
        });

        Self {
            shared: Arc::new(Shared {
                chain,
                wallets,
                detector,
                executor,
                options,
                config: RwLock::new(config),
                session: RwLock::new(Session::default()),
                status,
                snapshot,
                ledger: Mutex::new(TransactionLedger::default()),
                canceller: Mutex::new(None),
                last_error: Mutex::new(None),
            }),
            task: AsyncMutex::new(None),
        }
    }

    pub fn status(&self) -> BotStatus {
        *self.shared.status.borrow()
    }

    pub fn snapshot(&self) -> BotSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BotSnapshot> {
        self.shared.snapshot.subscribe()
    }

    pub async fn config(&self) -> BotConfiguration {
        self.shared.config.read().await.clone()
    }

    /// Validates everything trading depends on, then spawns the loop.
    /// Starting from `stopped` resets to `idle` first.
    pub async fn start(&self) -> BotResult<()> {
        let mut task = self.task.lock().await;

        match self.status() {
            BotStatus::Idle => {}
            BotStatus::Stopped => self.reset()?,
            current => {
                return Err(BotError::InvalidTransition {
                    from: current,
                    to: BotStatus::Running,
                })
            }
        }

        // A previous loop may still be finishing its last transaction.
        if let Some(previous) = task.take() {
            if let Err(e) = previous.await {
                warn!("⚠️ Previous scheduling loop ended abnormally: {}", e);
            }
        }

        let config = self.shared.config.read().await.clone();
        if let Err(e) = self.prepare(&config).await {
            error!("❌ Cannot start: {}", e);
            self.shared.set_last_error(Some(e.to_string()));
            self.shared.publish().await;
            return Err(e);
        }

        self.shared.ledger().begin_run();
        self.shared.set_last_error(None);
        self.shared.transition(BotStatus::Running)?;

        let (timer, canceller) = cancellable_timer();
        *self.shared.canceller.lock().unwrap_or_else(|e| e.into_inner()) = Some(canceller);

        info!(
            "🚀 Volume bot started: {} transactions of {} native, buy ratio {}%",
            config.tx_count,
            config.amount_per_tx,
            config.buy_ratio()
        );
        self.shared.publish().await;
        *task = Some(tokio::spawn(run(self.shared.clone(), timer)));
        Ok(())
    }

    async fn prepare(&self, config: &BotConfiguration) -> BotResult<()> {
        config.validate()?;
        let shared = &self.shared;

        let chain_id = shared
            .chain
            .chain_id()
            .await
            .map_err(|e| BotError::provider("read chain id", e))?;
        if chain_id != shared.options.chain_id {
            return Err(BotError::config(format!(
                "connected to chain {}, expected {}",
                chain_id, shared.options.chain_id
            )));
        }

        let token = config.token()?;
        let token_info = shared
            .chain
            .token_info(token)
            .await
            .map_err(|e| BotError::config(format!("no token selected: {} is not a readable token ({})", token, e)))?;
        info!("🪙 Trading {} ({}) at {}", token_info.name, token_info.symbol, token);

        shared.wallets.get_or_create_bot_wallet().await?;
        if config.multi_wallet && shared.wallets.pool().await.len() != config.wallet_count as usize {
            shared.wallets.derive_wallets(config.wallet_count).await?;
        }
        shared.wallets.refresh_balances(Some(token)).await?;

        let trading_wallets = if config.multi_wallet {
            shared.wallets.pool().await
        } else {
            shared.wallets.bot_wallet().await.into_iter().collect()
        };
        if !trading_wallets.iter().any(|w| !w.native_balance.is_zero()) {
            return Err(BotError::InsufficientFunds {
                asset: Asset::Native,
                required: to_base_units(config.amount_per_tx, NATIVE_DECIMALS)?,
                available: U256::ZERO,
            });
        }

        let exchanges = shared.detector.registry().select(&config.exchanges)?;
        // Routes are confirmed afresh on every start.
        shared.detector.set_token(token);
        shared.detector.invalidate();
        let report = shared
            .detector
            .detect_all(token, &exchanges, config.pool_address)
            .await;
        if !report.has_liquidity() {
            let details = if report.unavailable.is_empty() {
                format!("checked {}", config.exchanges.join(", "))
            } else {
                let mut down: Vec<_> = report.unavailable.keys().cloned().collect();
                down.sort();
                format!("unavailable: {}", down.join(", "))
            };
            return Err(BotError::Liquidity { token, details });
        }
        info!("✅ Liquidity confirmed on {}", report.exchanges_with_liquidity().join(", "));

        let mut session = shared.session.write().await;
        session.token = Some(token_info);
        session.routes = report
            .routes
            .into_iter()
            .filter(|(_, routes)| !routes.is_empty())
            .collect();
        Ok(())
    }

    /// `running -> paused`. A pending delay is not cancelled: it runs out,
    /// then the loop holds until `resume` or `stop`.
    pub async fn pause(&self) -> BotResult<()> {
        self.shared.transition_from(BotStatus::Running, BotStatus::Paused)?;
        info!("⏸️ Paused");
        self.shared.publish().await;
        Ok(())
    }

    pub async fn resume(&self) -> BotResult<()> {
        self.shared.transition_from(BotStatus::Paused, BotStatus::Running)?;
        info!("▶️ Resumed");
        self.shared.publish().await;
        Ok(())
    }

    /// Stops from any active state and cuts the pending delay short.
    /// Stopping a stopped bot is a no-op.
    pub async fn stop(&self) -> BotResult<()> {
        if self.status() == BotStatus::Stopped {
            return Ok(());
        }
        self.shared.transition(BotStatus::Stopped)?;
        self.shared.cancel_delay();
        info!("🛑 Stopped");
        self.shared.publish().await;
        Ok(())
    }

    /// `stopped -> idle`, the only way out of `stopped`.
    pub fn reset(&self) -> BotResult<()> {
        self.shared.transition(BotStatus::Idle)?;
        debug!("Controller reset to idle");
        Ok(())
    }

    /// Waits for the scheduling loop to exit.
    pub async fn join(&self) {
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("⚠️ Scheduling loop ended abnormally: {}", e);
            }
        }
    }

    /// Replaces the configuration after validation. Token, pool, exchanges
    /// and wallet mode are fixed while the bot is active; everything else is
    /// picked up at the next iteration.
    pub async fn update_config(&self, next: BotConfiguration) -> BotResult<()> {
        next.validate()?;

        let mut config = self.shared.config.write().await;
        let active = matches!(self.status(), BotStatus::Running | BotStatus::Paused);
        if active
            && (next.token != config.token
                || next.pool_address != config.pool_address
                || next.exchanges != config.exchanges
                || next.multi_wallet != config.multi_wallet
                || next.wallet_count != config.wallet_count)
        {
            return Err(BotError::config(
                "stop the bot before changing token, pool, exchanges or wallets",
            ));
        }

        if next.token != config.token {
            if let Some(token) = next.token {
                self.shared.detector.set_token(token);
            }
        }
        *config = next;
        drop(config);

        info!("⚙️ Configuration updated");
        self.shared.publish().await;
        Ok(())
    }
}

impl Shared {
    fn ledger(&self) -> std::sync::MutexGuard<'_, TransactionLedger> {
        self.ledger.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn current_status(&self) -> BotStatus {
        *self.status.borrow()
    }

    fn set_last_error(&self, message: Option<String>) {
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = message;
    }

    fn cancel_delay(&self) {
        if let Some(canceller) = self.canceller.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            canceller.cancel();
        }
    }

    fn transition(&self, to: BotStatus) -> BotResult<()> {
        let mut result = Ok(());
        self.status.send_if_modified(|current| {
            if current.can_transition_to(to) {
                *current = to;
                true
            } else {
                result = Err(BotError::InvalidTransition { from: *current, to });
                false
            }
        });
        result
    }

    fn transition_from(&self, expected: BotStatus, to: BotStatus) -> BotResult<()> {
        let mut result = Ok(());
        self.status.send_if_modified(|current| {
            if *current == expected && current.can_transition_to(to) {
                *current = to;
                true
            } else {
                result = Err(BotError::InvalidTransition { from: *current, to });
                false
            }
        });
        result
    }

    async fn publish(&self) {
        let target = self.config.read().await.tx_count;
        let wallets = self.wallets.views().await;
        let (stats, history) = {
            let ledger = self.ledger();
            (ledger.stats().clone(), ledger.history())
        };
        let last_error = self.last_error.lock().unwrap_or_else(|e| e.into_inner()).clone();

        self.snapshot.send_replace(BotSnapshot {
            status: self.current_status(),
            completed: stats.completed,
            target,
            stats,
            history,
            wallets,
            last_error,
        });
    }

    async fn plan_primary(&self, config: &BotConfiguration) -> BotResult<Attempt> {
        let direction = choose_direction(config.buy_ratio());
        let wallet = self.wallets.pick_wallet(config.multi_wallet).await?;

        let session = self.session.read().await;
        let candidates: Vec<&String> = config
            .exchanges
            .iter()
            .filter(|id| session.routes.contains_key(*id))
            .collect();
        let exchange_id = candidates
            .choose(&mut rand::rng())
            .map(|id| (*id).clone())
            .ok_or_else(|| BotError::NoRoute {
                exchange: config.exchanges.join(","),
                reason: "no selected exchange has a confirmed route".to_string(),
            })?;

        let route = session
            .routes
            .get(&exchange_id)
            .and_then(|routes| best_route(routes))
            .cloned()
            .ok_or_else(|| BotError::NoRoute {
                exchange: exchange_id.clone(),
                reason: "route disappeared".to_string(),
            })?;

        Ok(Attempt {
            direction,
            wallet,
            route,
            follow_up: false,
        })
    }

    /// Records, executes and finalizes one attempt.
    async fn execute(&self, attempt: &Attempt, config: &BotConfiguration) -> SwapOutcome {
        let token_info = self.session.read().await.token.clone();
        let Some(token_info) = token_info else {
            let error = BotError::config("no token selected");
            return SwapOutcome::failed(&error, U256::ZERO, U256::ZERO, None);
        };
        let token = token_info.address;

        // Sells always exit the full position held right now.
        let amount = match attempt.direction {
            Direction::Buy => to_base_units(config.amount_per_tx, NATIVE_DECIMALS),
            Direction::Sell => self
                .chain
                .token_balance(token, attempt.wallet.address)
                .await
                .map_err(|e| BotError::provider("read token balance before sell", e)),
        };
        let recorded_amount = match (&amount, attempt.direction) {
            (_, Direction::Buy) => config.amount_per_tx,
            (Ok(balance), Direction::Sell) => from_base_units(*balance, token_info.decimals),
            (Err(_), Direction::Sell) => rust_decimal::Decimal::ZERO,
        };

        let record = TransactionRecord::pending(
            attempt.direction,
            recorded_amount,
            attempt.route.exchange_id.clone(),
            attempt.wallet.address,
        );
        let id = record.id.clone();
        self.ledger().record(record);
        self.publish().await;

        let outcome = match amount {
            Ok(amount) => {
                self.executor
                    .execute_swap(
                        &attempt.wallet,
                        attempt.direction,
                        &attempt.route,
                        token,
                        amount,
                        config.slippage_pct,
                    )
                    .await
            }
            Err(e) => {
                warn!("❌ {} skipped: {}", attempt.direction, e);
                SwapOutcome::failed(&e, U256::ZERO, U256::ZERO, None)
            }
        };

        let finalized = self.ledger().complete(&id, &outcome, config.amount_per_tx);
        match finalized {
            Ok(record) => {
                print_transaction(&record);
                if self.options.persist_transactions {
                    if let Err(e) = save_transaction(&record) {
                        warn!("⚠️ Could not persist transaction {}: {}", record.id, e);
                    }
                }
            }
            Err(e) => error!("❌ Ledger rejected outcome of {}: {}", id, e),
        }

        if !outcome.success {
            self.set_last_error(outcome.error.clone());
        }
        if let Err(e) = self.wallets.refresh_balances(Some(token)).await {
            debug!("Balance refresh failed: {}", e);
        }
        self.publish().await;
        outcome
    }
}

fn choose_direction(buy_ratio: u8) -> Direction {
    if rand::rng().random_range(0..100u8) < buy_ratio {
        Direction::Buy
    } else {
        Direction::Sell
    }
}

fn draw_delay(config: &BotConfiguration) -> Duration {
    let secs = rand::rng().random_range(config.interval_min_secs..=config.interval_max_secs);
    Duration::from_secs(secs)
}

async fn run(shared: Arc<Shared>, mut timer: CancellableTimer) {
    let mut status_rx = shared.status.subscribe();
    let mut threshold = shared.config.read().await.max_consecutive_failures;
    let mut breaker = CircuitBreaker::new(threshold);
    let mut follow_up: Option<Attempt> = None;

    loop {
        // Armed before the status read: a stop landing after this point is
        // either seen below or cuts the next delay short.
        timer.arm();
        let status = status_rx
            .wait_for(|s| *s != BotStatus::Paused)
            .await
            .map(|s| *s);
        if !matches!(status, Ok(BotStatus::Running)) {
            break;
        }

        let config = shared.config.read().await.clone();
        if config.max_consecutive_failures != threshold {
            threshold = config.max_consecutive_failures;
            breaker = CircuitBreaker::new(threshold);
        }

        let stats = shared.ledger().stats().clone();
        if stats.completed >= config.tx_count {
            info!("🏁 Completed {} of {} transactions", stats.completed, config.tx_count);
            if let Err(e) = shared.transition(BotStatus::Idle) {
                debug!("Completion raced with a control call: {}", e);
            }
            break;
        }

        let attempt = match follow_up.take() {
            Some(attempt) => attempt,
            None => match shared.plan_primary(&config).await {
                Ok(attempt) => attempt,
                Err(e) => {
                    error!("❌ Cannot plan next transaction: {}", e);
                    shared.set_last_error(Some(e.to_string()));
                    let _ = shared.transition(BotStatus::Stopped);
                    break;
                }
            },
        };

        if attempt.direction == Direction::Buy && stats.total_volume + config.amount_per_tx > config.total_budget {
            info!(
                "🏁 Budget of {} reached ({} traded)",
                config.total_budget, stats.total_volume
            );
            if let Err(e) = shared.transition(BotStatus::Idle) {
                debug!("Completion raced with a control call: {}", e);
            }
            break;
        }

        let outcome = shared.execute(&attempt, &config).await;

        if outcome.success {
            breaker.record_success();
        } else if breaker.record_error() {
            let reason = format!(
                "{} consecutive failed transactions",
                breaker.consecutive_errors()
            );
            error!("🛑 Stopping: {}", reason);
            shared.set_last_error(Some(
                BotError::CircuitBreakerOpen { reason }.to_string(),
            ));
            let _ = shared.transition(BotStatus::Stopped);
            break;
        }

        // A successful primary leg is answered by the opposite leg right away.
        if outcome.success && !attempt.follow_up {
            follow_up = Some(Attempt {
                direction: attempt.direction.opposite(),
                follow_up: true,
                ..attempt
            });
            continue;
        }

        // Stopped mid-transaction: skip the delay and exit at the top.
        if shared.ledger().stats().completed >= config.tx_count
            || matches!(shared.current_status(), BotStatus::Stopped | BotStatus::Idle)
        {
            continue;
        }

        let delay = draw_delay(&config);
        debug!("Next transaction in {}s", delay.as_secs());
        if timer.sleep(delay).await == TimerResult::Cancelled {
            debug!("Delay cancelled");
        }
    }

    shared.publish().await;
    info!("👋 Scheduling loop finished ({})", shared.current_status());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        execution::GasPolicy,
        pools::ExchangeRegistry,
        testing::*,
        wallets::MemoryWalletStore,
    };
    use rust_decimal_macros::dec;

    struct Harness {
        chain: Arc<MockChain>,
        wallets: Arc<WalletManager>,
        controller: ScheduleController,
    }

    async fn harness(config: BotConfiguration) -> Harness {
        let chain = Arc::new(MockChain::new());
        chain.add_pair(V2_FACTORY, TOKEN, WETH_BASE, PAIR, U256::from(10u64), U256::from(10_000u64));

        let registry = Arc::new(test_registry());
        let wallets = Arc::new(WalletManager::new(
            chain.clone(),
            Arc::new(MemoryWalletStore::new()),
            GasPolicy::default(),
        ));
        let bot = wallets.get_or_create_bot_wallet().await.unwrap();
        chain.set_native(bot.address, eth(dec!(1)));

        let detector = Arc::new(LiquidityDetector::new(chain.clone(), registry.clone(), WETH_BASE));
        let executor = Arc::new(SwapExecutor::new(chain.clone(), registry, GasPolicy::default()));
        let controller = ScheduleController::new(
            chain.clone(),
            wallets.clone(),
            detector,
            executor,
            config,
            ControllerOptions::default(),
        );

        Harness {
            chain,
            wallets,
            controller,
        }
    }

    fn config(tx_count: u32, buy_ratio: u8) -> BotConfiguration {
        let mut config = BotConfiguration::default();
        config.token = Some(TOKEN);
        config.amount_per_tx = dec!(0.1);
        config.total_budget = dec!(10);
        config.tx_count = tx_count;
        config.interval_min_secs = 5;
        config.interval_max_secs = 10;
        config.exchanges = vec!["sushiswap".to_string()];
        config.set_buy_ratio(buy_ratio).unwrap();
        config
    }

    #[tokio::test(start_paused = true)]
    async fn buy_is_followed_by_full_exit_sell() {
        let h = harness(config(4, 100)).await;
        h.controller.start().await.unwrap();
        h.controller.join().await;

        let snapshot = h.controller.snapshot();
        assert_eq!(snapshot.status, BotStatus::Idle);
        let directions: Vec<Direction> = snapshot.history.iter().map(|r| r.direction).collect();
        assert_eq!(
            directions,
            vec![Direction::Buy, Direction::Sell, Direction::Buy, Direction::Sell]
        );
        assert!(snapshot.history.iter().all(|r| r.status() == TransactionStatus::Success));

        // 0.1 native buys 100 tokens at the mock rate; the sell exits all of it
        assert_eq!(snapshot.history[1].amount, dec!(100));
        let bot = h.wallets.bot_wallet().await.unwrap();
        assert_eq!(h.chain.token_balance_of(TOKEN, bot.address), U256::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn reaching_target_returns_to_idle() {
        let h = harness(config(10, 50)).await;
        h.controller.start().await.unwrap();
        h.controller.join().await;

        let snapshot = h.controller.snapshot();
        assert_eq!(snapshot.status, BotStatus::Idle);
        assert_eq!(snapshot.completed, 10);
        assert_eq!(snapshot.history.len(), 10);
        assert_eq!(snapshot.progress(), 1.0);

        let submitted = h.chain.submissions().len();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(h.chain.submissions().len(), submitted);
    }

    #[tokio::test(start_paused = true)]
    async fn provider_failures_are_recorded_and_loop_continues() {
        let h = harness(config(3, 100)).await;
        h.controller.start().await.unwrap();
        h.chain.set_provider_down(true);
        h.controller.join().await;

        let snapshot = h.controller.snapshot();
        assert_eq!(snapshot.status, BotStatus::Idle);
        assert_eq!(snapshot.stats.failures, 3);
        assert!(snapshot
            .history
            .iter()
            .all(|r| r.failure == Some(FailureCause::Provider)));
        assert!(snapshot.last_error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_failures_trip_the_breaker() {
        let mut cfg = config(10, 100);
        cfg.max_consecutive_failures = Some(2);
        let h = harness(cfg).await;
        h.chain.set_revert_swaps(true);

        h.controller.start().await.unwrap();
        h.controller.join().await;

        let snapshot = h.controller.snapshot();
        assert_eq!(snapshot.status, BotStatus::Stopped);
        assert_eq!(snapshot.completed, 2);
        assert!(snapshot.last_error.unwrap().contains("consecutive"));
    }

    #[tokio::test(start_paused = true)]
    async fn budget_ends_the_run() {
        let mut cfg = config(100, 100);
        cfg.total_budget = dec!(0.3);
        let h = harness(cfg).await;
        h.controller.start().await.unwrap();
        h.controller.join().await;

        let snapshot = h.controller.snapshot();
        assert_eq!(snapshot.status, BotStatus::Idle);
        // Only buys are gated: 0.2 + 0.1 still fits, 0.4 + 0.1 does not
        assert_eq!(snapshot.stats.total_volume, dec!(0.4));
        assert_eq!(snapshot.completed, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_holds_and_stop_is_terminal() {
        let mut cfg = config(50, 50);
        cfg.interval_min_secs = 60;
        cfg.interval_max_secs = 60;
        let h = harness(cfg).await;
        h.controller.start().await.unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        h.controller.pause().await.unwrap();
        assert_eq!(h.controller.status(), BotStatus::Paused);
        tokio::time::sleep(Duration::from_secs(61)).await;
        let held = h.chain.submissions().len();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(h.chain.submissions().len(), held);

        h.controller.resume().await.unwrap();
        h.controller.stop().await.unwrap();
        h.controller.join().await;
        assert_eq!(h.controller.status(), BotStatus::Stopped);
        assert!(h.controller.pause().await.is_err());
        assert!(h.controller.resume().await.is_err());

        // Starting again goes through idle
        h.controller.start().await.unwrap();
        assert_eq!(h.controller.status(), BotStatus::Running);
        assert_eq!(h.controller.snapshot().completed, 0);
        h.controller.stop().await.unwrap();
        h.controller.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_submission_skips_the_delay() {
        let mut cfg = config(50, 100);
        cfg.interval_min_secs = 600;
        cfg.interval_max_secs = 600;
        let h = harness(cfg).await;
        h.chain.set_revert_swaps(true);
        h.chain.set_submit_delay(Duration::from_secs(10));
        h.controller.start().await.unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        h.controller.stop().await.unwrap();
        let stopped_at = tokio::time::Instant::now();
        h.controller.join().await;

        // The in-flight swap finishes; the 600s delay never starts
        assert!(stopped_at.elapsed() < Duration::from_secs(60));
        assert_eq!(h.controller.status(), BotStatus::Stopped);
        assert_eq!(h.controller.snapshot().completed, 1);
    }

    #[tokio::test]
    async fn control_calls_from_idle_are_rejected() {
        let h = harness(config(3, 50)).await;
        assert!(matches!(
            h.controller.pause().await,
            Err(BotError::InvalidTransition { .. })
        ));
        assert!(h.controller.resume().await.is_err());
        assert!(h.controller.stop().await.is_err());
        assert!(h.controller.reset().is_err());
    }

    #[tokio::test]
    async fn start_requires_liquidity() {
        let mut cfg = config(3, 50);
        cfg.exchanges = vec!["uniswap".to_string()];
        let h = harness(cfg).await;

        let err = h.controller.start().await.unwrap_err();
        assert!(matches!(err, BotError::Liquidity { .. }));
        assert_eq!(h.controller.status(), BotStatus::Idle);
        assert!(h.controller.snapshot().last_error.is_some());
    }

    #[tokio::test]
    async fn start_checks_network_token_and_funding() {
        let h = harness(config(3, 50)).await;
        h.chain.set_chain_id(1);
        assert!(matches!(
            h.controller.start().await,
            Err(BotError::Configuration { .. })
        ));
        h.chain.set_chain_id(BASE_CHAIN_ID);

        let mut cfg = config(3, 50);
        cfg.token = Some(alloy::primitives::Address::repeat_byte(0x55));
        h.controller.update_config(cfg).await.unwrap();
        let err = h.controller.start().await.unwrap_err();
        assert!(err.to_string().contains("no token selected"));

        h.controller.update_config(config(3, 50)).await.unwrap();
        let bot = h.wallets.bot_wallet().await.unwrap();
        h.chain.set_native(bot.address, U256::ZERO);
        assert!(matches!(
            h.controller.start().await,
            Err(BotError::InsufficientFunds { .. })
        ));
        assert_eq!(h.controller.status(), BotStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn update_config_is_validated_and_scoped() {
        let mut cfg = config(20, 50);
        cfg.interval_min_secs = 60;
        cfg.interval_max_secs = 60;
        let h = harness(cfg.clone()).await;

        let mut invalid = cfg.clone();
        invalid.slippage_pct = dec!(90);
        assert!(h.controller.update_config(invalid).await.is_err());

        h.controller.start().await.unwrap();
        let mut other_token = cfg.clone();
        other_token.token = Some(OTHER_TOKEN);
        assert!(h.controller.update_config(other_token).await.is_err());

        let mut tuned = cfg.clone();
        tuned.set_buy_ratio(80).unwrap();
        h.controller.update_config(tuned).await.unwrap();
        assert_eq!(h.controller.config().await.buy_ratio(), 80);
        assert_eq!(h.controller.config().await.sell_ratio(), 20);

        h.controller.stop().await.unwrap();
        h.controller.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn multi_wallet_sells_from_the_buying_wallet() {
        let mut cfg = config(6, 100);
        cfg.multi_wallet = true;
        cfg.wallet_count = 3;
        let h = harness(cfg).await;
        let pool = h.wallets.derive_wallets(3).await.unwrap();
        for wallet in &pool {
            h.chain.set_native(wallet.address, eth(dec!(1)));
        }

        h.controller.start().await.unwrap();
        h.controller.join().await;

        let history = h.controller.snapshot().history;
        assert_eq!(history.len(), 6);
        let addresses: Vec<_> = pool.iter().map(|w| w.address).collect();
        for pair in history.chunks(2) {
            assert!(addresses.contains(&pair[0].wallet));
            assert_eq!(pair[0].wallet, pair[1].wallet);
            assert_eq!(pair[1].direction, Direction::Sell);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_observe_progress() {
        let h = harness(config(2, 100)).await;
        let mut rx = h.controller.subscribe();
        h.controller.start().await.unwrap();
        rx.wait_for(|s| s.completed == 2).await.unwrap();
        h.controller.join().await;
        assert_eq!(rx.borrow().target, 2);
    }
}
