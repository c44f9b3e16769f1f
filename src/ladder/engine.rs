//! Ladder engine — per-tick evaluation and the buy protocol.
//!
//! Each tick samples one price snapshot, picks at most one matching rung
//! and runs its protocol to completion while holding the trade gate:
//!
//! 1. submit the order (the gateway blocks through wallet confirmation)
//! 2. wait the settle delay, refresh the feed
//! 3. verify against the trade-history surface
//! 4. on failure back off and go again until confirmed or stopped
//!
//! Protective rungs hand over to the liquidation path in `liquidation.rs`.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use super::book::{validate_entry_price, LadderBook, Rung, Trigger};
use super::retry::{RetryPolicy, StopToken};
use super::stake::{StakeCalculator, StakePercents};
use super::verifier::TradeVerifier;
use crate::config::TimingConfig;
use crate::market::{MarketFeed, OrderGateway, TradeHistory};
use crate::notify::Notifier;
use crate::storage::LadderSnapshot;
use crate::types::{LadderError, PriceSnapshot, Side, TradeKind, TradeRecord};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineTiming {
    /// Wait after submitting an order before the feed is refreshed.
    pub settle_delay: Duration,
    /// Settle rounds (delay + refresh) after a sell.
    pub sell_settle_rounds: u32,
    /// Backoff between unconfirmed attempts.
    pub verify_backoff: Duration,
    /// Backoff between cash reads when the balance cannot be parsed.
    pub stake_retry: Duration,
    /// Bound on each trade-history read.
    pub history_timeout: Duration,
}

impl Default for EngineTiming {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(3),
            sell_settle_rounds: 4,
            verify_backoff: Duration::from_secs(2),
            stake_retry: Duration::from_secs(5),
            history_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&TimingConfig> for EngineTiming {
    fn from(cfg: &TimingConfig) -> Self {
        Self {
            settle_delay: Duration::from_millis(cfg.settle_delay_ms),
            sell_settle_rounds: cfg.sell_settle_rounds,
            verify_backoff: Duration::from_millis(cfg.verify_backoff_ms),
            stake_retry: Duration::from_millis(cfg.stake_retry_ms),
            history_timeout: Duration::from_millis(cfg.history_timeout_ms),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub default_entry_price: Decimal,
    pub percents: StakePercents,
    pub timing: EngineTiming,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Counters that survive cycle restarts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LadderState {
    pub cycle_id: u64,
    pub trade_count: u64,
    pub sell_count: u64,
    pub running: bool,
}

/// Mutual exclusion around the execute protocol. Held for the whole
/// protocol; a tick that finds it held is skipped.
#[derive(Debug, Clone, Default)]
pub struct TradeGate(Arc<Mutex<()>>);

impl TradeGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<OwnedMutexGuard<()>> {
        self.0.clone().try_lock_owned().ok()
    }

    pub fn is_busy(&self) -> bool {
        self.0.try_lock().is_err()
    }
}

/// External collaborators the engine drives.
#[derive(Clone)]
pub struct Collaborators {
    pub feed: Arc<dyn MarketFeed>,
    pub gateway: Arc<dyn OrderGateway>,
    pub history: Arc<dyn TradeHistory>,
    pub notifier: Arc<dyn Notifier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Stopped,
    Busy,
    NoPrices,
}

#[derive(Debug, Clone)]
pub enum TickOutcome {
    Skipped(SkipReason),
    NoMatch,
    Filled(TradeRecord),
    /// Both sides liquidated; the book has been reseeded for the next cycle.
    CycleComplete {
        cycle_id: u64,
        sells: Vec<TradeRecord>,
    },
    /// Stopped while a protocol was still unconfirmed.
    Aborted,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct LadderEngine {
    pub(super) collab: Collaborators,
    pub(super) verifier: TradeVerifier,
    pub(super) stakes: StakeCalculator,
    pub(super) settings: EngineSettings,
    pub(super) book: LadderBook,
    pub(super) state: LadderState,
    pub(super) gate: TradeGate,
    pub(super) stop: StopToken,
    last_prices: Option<PriceSnapshot>,
}

impl LadderEngine {
    pub fn new(
        collab: Collaborators,
        settings: EngineSettings,
        gate: TradeGate,
        stop: StopToken,
    ) -> Result<Self, LadderError> {
        validate_entry_price(settings.default_entry_price)?;
        let stakes = StakeCalculator::new(settings.percents)?;
        let verifier = TradeVerifier::new(collab.history.clone(), settings.timing.history_timeout);

        Ok(Self {
            book: LadderBook::seeded(settings.default_entry_price),
            collab,
            verifier,
            stakes,
            settings,
            state: LadderState::default(),
            gate,
            stop,
            last_prices: None,
        })
    }

    /// Resume from a persisted snapshot: book, counters and entry price.
    pub fn restore(&mut self, snapshot: &LadderSnapshot) {
        if validate_entry_price(snapshot.default_entry_price).is_ok() {
            self.settings.default_entry_price = snapshot.default_entry_price;
        } else {
            warn!(price = %snapshot.default_entry_price, "Ignoring invalid stored entry price");
        }
        self.book = snapshot.book.clone();
        self.state.cycle_id = snapshot.cycle_id;
        self.state.trade_count = snapshot.trade_count;
        self.state.sell_count = snapshot.sell_count;
        info!(
            cycle_id = snapshot.cycle_id,
            trade_count = snapshot.trade_count,
            sell_count = snapshot.sell_count,
            phase = %self.book.phase(),
            "Ladder restored"
        );
    }

    // ---- Accessors ----

    pub fn book(&self) -> &LadderBook {
        &self.book
    }

    pub fn state(&self) -> LadderState {
        self.state
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn default_entry_price(&self) -> Decimal {
        self.settings.default_entry_price
    }

    pub fn last_prices(&self) -> Option<PriceSnapshot> {
        self.last_prices
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collab
    }

    pub fn gate(&self) -> &TradeGate {
        &self.gate
    }

    pub fn stop_token(&self) -> &StopToken {
        &self.stop
    }

    pub fn set_running(&mut self, running: bool) {
        self.state.running = running;
    }

    pub fn reset_trade_count(&mut self) {
        self.state.trade_count = 0;
    }

    // ---- Control ----

    /// Change the default entry price. Tier 0 is reseeded only while the
    /// entry rung is armed; mid-cycle the new price applies from the next
    /// armed rung on.
    pub fn set_default_entry_price(&mut self, price: Decimal) -> Result<(), LadderError> {
        validate_entry_price(price)?;
        self.settings.default_entry_price = price;
        if self.book.entry_armed() {
            self.book.seed_entry(price);
        }
        info!(%price, phase = %self.book.phase(), "Default entry price set");
        Ok(())
    }

    /// Read cash and write the stake schedule into both sides. Retries
    /// indefinitely on unreadable cash; returns `false` only when stopped.
    pub async fn recompute_stakes(&mut self) -> bool {
        let policy = RetryPolicy::unbounded(self.settings.timing.stake_retry);
        let mut attempt = 0u32;

        loop {
            if self.stop.is_stopped() {
                warn!("Stopped before stakes were computed");
                return false;
            }
            attempt += 1;

            let schedule = match self.collab.feed.cash().await {
                Ok(cash) => self.stakes.schedule(cash).map(|s| (cash, s)),
                Err(e) => Err(LadderError::CashUnavailable(e.to_string())),
            };

            match schedule {
                Ok((cash, stakes)) => {
                    self.book.set_stakes(&stakes);
                    info!(
                        %cash,
                        tier0 = %stakes[0],
                        tier5 = %stakes[5],
                        "Stakes recomputed"
                    );
                    return true;
                }
                Err(e) => warn!(attempt, error = %e, "Stake computation failed, retrying"),
            }

            if !policy.pause(attempt, &self.stop).await {
                return false;
            }
        }
    }

    // ---- Tick ----

    /// Evaluate one price snapshot and act on at most one rung.
    pub async fn tick(&mut self) -> TickOutcome {
        if self.stop.is_stopped() || !self.state.running {
            return TickOutcome::Skipped(SkipReason::Stopped);
        }

        let Some(prices) = self.collab.feed.prices().await else {
            debug!("Prices unavailable, skipping tick");
            return TickOutcome::Skipped(SkipReason::NoPrices);
        };
        self.last_prices = Some(prices);

        let Some(trigger) = self.book.find_trigger(&prices) else {
            return TickOutcome::NoMatch;
        };

        let Some(_guard) = self.gate.try_acquire() else {
            debug!(side = %trigger.side, "Trade in progress, skipping tick");
            return TickOutcome::Skipped(SkipReason::Busy);
        };

        match trigger.rung {
            Rung::Tier(tier) => self.execute_buy(trigger, tier).await,
            Rung::Protective => self.liquidate(trigger).await,
        }
    }

    async fn execute_buy(&mut self, trigger: Trigger, tier: usize) -> TickOutcome {
        let side = trigger.side;
        let amount = self.book.tier(side, tier).stake_amount;
        let policy = RetryPolicy::unbounded(self.settings.timing.verify_backoff);

        info!(
            side = %side,
            tier,
            price = %trigger.price,
            target = %trigger.target,
            %amount,
            "Tier matched, buying"
        );

        let mut attempt = 0u32;
        loop {
            if self.stop.is_stopped() {
                warn!(side = %side, tier, attempt, "Stopped before buy was confirmed");
                return TickOutcome::Aborted;
            }
            attempt += 1;

            match self.collab.gateway.buy(side, amount).await {
                Ok(conf) => {
                    debug!(order_id = %conf.order_id, attempt, "Buy submitted");
                    self.settle_once().await;
                    if let Some(confirmed) = self.verifier.confirmed_buy(side).await {
                        return TickOutcome::Filled(self.settle_buy(trigger, tier, confirmed));
                    }
                    warn!(side = %side, tier, attempt, "Buy not confirmed, retrying");
                }
                Err(e) => warn!(side = %side, tier, attempt, error = %e, "Buy submission failed"),
            }

            if !policy.pause(attempt, &self.stop).await {
                warn!(side = %side, tier, attempt, "Stopped before buy was confirmed");
                return TickOutcome::Aborted;
            }
        }
    }

    /// One settle round: fixed delay, then a feed refresh.
    pub(super) async fn settle_once(&self) {
        tokio::time::sleep(self.settings.timing.settle_delay).await;
        if let Err(e) = self.collab.feed.refresh().await {
            warn!(error = %e, "Feed refresh failed");
        }
    }

    fn settle_buy(&mut self, trigger: Trigger, tier: usize, confirmed: Decimal) -> TradeRecord {
        let side = trigger.side;
        self.state.trade_count += 1;
        self.book
            .apply_fill(side, tier, self.settings.default_entry_price);

        let record = TradeRecord {
            side,
            kind: TradeKind::Buy,
            tier: Some(tier),
            price: trigger.price,
            amount: confirmed,
            sequence: self.state.trade_count,
            cycle_id: self.state.cycle_id,
            trade_count: self.state.trade_count,
            sell_count: self.state.sell_count,
            timestamp: Utc::now(),
        };

        info!(
            trade = %record.label(),
            price = %record.price,
            amount = %record.amount,
            trade_count = self.state.trade_count,
            phase = %self.book.phase(),
            "Buy confirmed"
        );
        self.dispatch(&record);
        record
    }

    /// Hand a record to the notifier without waiting on it.
    pub(super) fn dispatch(&self, record: &TradeRecord) {
        let notifier = self.collab.notifier.clone();
        let record = record.clone();
        tokio::spawn(async move {
            notifier.notify(&record).await;
        });
    }

    pub(super) fn price_of(&self, side: Side) -> Option<Decimal> {
        self.last_prices.map(|p| p.price(side))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ladder::book::{PROTECT_HIGH, TIER_COUNT};
    use crate::market::paper::{ManualQuotes, PaperExchange};
    use crate::market::Confirmation;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};

    pub(crate) type Paper = PaperExchange<ManualQuotes>;

    /// Collects notified records.
    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub records: std::sync::Mutex<Vec<TradeRecord>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, record: &TradeRecord) {
            self.records.lock().unwrap().push(record.clone());
        }
    }

    /// History surface whose first `failures` reads error out.
    pub(crate) struct FlakyHistory {
        inner: Arc<Paper>,
        failures: AtomicU32,
    }

    impl FlakyHistory {
        pub fn new(inner: Arc<Paper>, failures: u32) -> Self {
            Self {
                inner,
                failures: AtomicU32::new(failures),
            }
        }
    }

    #[async_trait]
    impl TradeHistory for FlakyHistory {
        async fn latest_entry(&self) -> anyhow::Result<Option<String>> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                anyhow::bail!("history not rendered yet");
            }
            self.inner.latest_entry().await
        }

        async fn has_position_label(&self, side: Side) -> anyhow::Result<bool> {
            self.inner.has_position_label(side).await
        }
    }

    /// Keeps showing the `side` position label for `sticky` reads after the
    /// paper position is gone, and counts sells submitted for that side.
    pub(crate) struct StickyLabel {
        inner: Arc<Paper>,
        side: Side,
        sticky: AtomicU32,
        sells: AtomicU32,
    }

    impl StickyLabel {
        pub fn new(inner: Arc<Paper>, side: Side, sticky: u32) -> Self {
            Self {
                inner,
                side,
                sticky: AtomicU32::new(sticky),
                sells: AtomicU32::new(0),
            }
        }

        pub fn sells(&self) -> u32 {
            self.sells.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OrderGateway for StickyLabel {
        async fn buy(&self, side: Side, amount: Decimal) -> anyhow::Result<Confirmation> {
            self.inner.buy(side, amount).await
        }

        async fn sell(&self, side: Side) -> anyhow::Result<Confirmation> {
            if side == self.side {
                self.sells.fetch_add(1, Ordering::SeqCst);
            }
            self.inner.sell(side).await
        }
    }

    #[async_trait]
    impl TradeHistory for StickyLabel {
        async fn latest_entry(&self) -> anyhow::Result<Option<String>> {
            self.inner.latest_entry().await
        }

        async fn has_position_label(&self, side: Side) -> anyhow::Result<bool> {
            if self.inner.has_position_label(side).await? {
                return Ok(true);
            }
            if side != self.side {
                return Ok(false);
            }
            let left = self.sticky.load(Ordering::SeqCst);
            if left == 0 {
                return Ok(false);
            }
            self.sticky.store(left - 1, Ordering::SeqCst);
            Ok(true)
        }
    }

    pub(crate) struct Rig {
        pub paper: Arc<Paper>,
        pub notifier: Arc<RecordingNotifier>,
        pub engine: LadderEngine,
    }

    /// Rig whose gateway and history are chosen by `wire`; the feed is
    /// always the paper exchange.
    pub(crate) fn rig_with(
        wire: impl FnOnce(&Arc<Paper>) -> (Arc<dyn OrderGateway>, Arc<dyn TradeHistory>),
    ) -> Rig {
        let paper = Arc::new(
            PaperExchange::new(
                ManualQuotes::new(Some(PriceSnapshot::new(dec!(0.50), dec!(0.50)))),
                dec!(1000),
                "https://polymarket.com/event/test",
            )
            .with_wallet_confirm(Duration::from_millis(3200)),
        );
        let notifier = Arc::new(RecordingNotifier::default());
        let (gateway, history) = wire(&paper);
        let collab = Collaborators {
            feed: paper.clone(),
            gateway,
            history,
            notifier: notifier.clone(),
        };
        let settings = EngineSettings {
            default_entry_price: dec!(0.54),
            percents: StakePercents::default(),
            timing: EngineTiming::default(),
        };
        let mut engine =
            LadderEngine::new(collab, settings, TradeGate::new(), StopToken::new()).unwrap();
        engine.set_running(true);
        Rig {
            paper,
            notifier,
            engine,
        }
    }

    pub(crate) fn rig_with_history(history_failures: u32) -> Rig {
        rig_with(|paper| {
            let gateway: Arc<dyn OrderGateway> = paper.clone();
            let history: Arc<dyn TradeHistory> = if history_failures > 0 {
                Arc::new(FlakyHistory::new(paper.clone(), history_failures))
            } else {
                paper.clone()
            };
            (gateway, history)
        })
    }

    pub(crate) fn rig() -> Rig {
        rig_with_history(0)
    }

    pub(crate) fn quote(paper: &Paper, yes: Decimal, no: Decimal) {
        paper.quotes().set(PriceSnapshot::new(yes, no));
    }

    async fn let_spawned_run() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recompute_stakes_from_cash() {
        let mut rig = rig();
        assert!(rig.engine.recompute_stakes().await);
        let expected = [
            dec!(42.00),
            dec!(92.40),
            dec!(124.74),
            dec!(168.40),
            dec!(227.34),
            dec!(306.91),
        ];
        assert_eq!(rig.engine.book().stakes(Side::Yes), expected);
        assert_eq!(rig.engine.book().stakes(Side::No), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recompute_stakes_observes_stop() {
        let rig = rig();
        let mut engine = rig.engine;
        engine.stop_token().stop();
        assert!(!engine.recompute_stakes().await);
        assert!(engine.book().stakes(Side::Yes).iter().all(|s| s.is_zero()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_skipped_when_not_running() {
        let mut rig = rig();
        rig.engine.set_running(false);
        assert!(matches!(
            rig.engine.tick().await,
            TickOutcome::Skipped(SkipReason::Stopped)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_without_prices() {
        let mut rig = rig();
        rig.paper.quotes().clear();
        assert!(matches!(
            rig.engine.tick().await,
            TickOutcome::Skipped(SkipReason::NoPrices)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_price_above_band_does_not_fire() {
        let mut rig = rig();
        rig.engine.recompute_stakes().await;
        quote(&rig.paper, dec!(0.59), dec!(0.41));
        assert!(matches!(rig.engine.tick().await, TickOutcome::NoMatch));
        assert_eq!(rig.paper.order_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_yes_entry_fill() {
        let mut rig = rig();
        rig.engine.recompute_stakes().await;
        quote(&rig.paper, dec!(0.56), dec!(0.45));

        let TickOutcome::Filled(record) = rig.engine.tick().await else {
            panic!("expected a fill");
        };
        assert_eq!(record.label(), "Buy Yes 0");
        assert_eq!(record.amount, dec!(42.00));
        assert_eq!(record.price, dec!(0.56));

        let book = rig.engine.book();
        assert_eq!(book.tier(Side::Yes, 0).target_price, Decimal::ZERO);
        assert_eq!(book.tier(Side::No, 0).target_price, Decimal::ZERO);
        assert_eq!(book.tier(Side::No, 1).target_price, dec!(0.54));
        assert_eq!(book.protective(Side::Yes), PROTECT_HIGH);
        assert_eq!(rig.engine.state().trade_count, 1);
        assert_eq!(rig.paper.order_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_rung_per_tick() {
        let mut rig = rig();
        rig.engine.recompute_stakes().await;
        // Both entry rungs match; only Yes fires.
        quote(&rig.paper, dec!(0.55), dec!(0.56));
        assert!(matches!(rig.engine.tick().await, TickOutcome::Filled(_)));
        assert_eq!(rig.paper.order_count().await, 1);
        assert!(rig.paper.position(Side::No).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_verification_retries_count_once() {
        let mut rig = rig_with_history(3);
        rig.engine.recompute_stakes().await;
        quote(&rig.paper, dec!(0.56), dec!(0.45));

        let outcome = rig.engine.tick().await;
        assert!(matches!(outcome, TickOutcome::Filled(_)));
        assert_eq!(rig.engine.state().trade_count, 1);
        // Each failed verification resubmitted the buy.
        assert_eq!(rig.paper.order_count().await, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_aborts_unconfirmed_buy() {
        let mut rig = rig_with_history(u32::MAX);
        rig.engine.recompute_stakes().await;
        quote(&rig.paper, dec!(0.56), dec!(0.45));

        let stop = rig.engine.stop_token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            stop.stop();
        });

        assert!(matches!(rig.engine.tick().await, TickOutcome::Aborted));
        assert_eq!(rig.engine.state().trade_count, 0);
        assert_eq!(rig.engine.book().tier(Side::Yes, 0).target_price, dec!(0.54));
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_gate_skips_tick() {
        let mut rig = rig();
        rig.engine.recompute_stakes().await;
        quote(&rig.paper, dec!(0.56), dec!(0.45));

        let gate = rig.engine.gate().clone();
        let _held = gate.try_acquire().unwrap();
        assert!(gate.is_busy());
        assert!(matches!(
            rig.engine.tick().await,
            TickOutcome::Skipped(SkipReason::Busy)
        ));
        assert_eq!(rig.paper.order_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_is_notified() {
        let mut rig = rig();
        rig.engine.recompute_stakes().await;
        quote(&rig.paper, dec!(0.45), dec!(0.55));
        rig.engine.tick().await;
        let_spawned_run().await;

        let records = rig.notifier.records.lock().unwrap().clone();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].label(), "Buy No 0");
        assert_eq!(records[0].trade_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zig_zag_through_ticks() {
        let mut rig = rig();
        rig.engine.recompute_stakes().await;

        quote(&rig.paper, dec!(0.56), dec!(0.45));
        rig.engine.tick().await;
        quote(&rig.paper, dec!(0.46), dec!(0.55));
        let TickOutcome::Filled(second) = rig.engine.tick().await else {
            panic!("expected No tier 1 fill");
        };
        assert_eq!(second.label(), "Buy No 1");
        assert_eq!(second.amount, dec!(92.40));

        let book = rig.engine.book();
        assert_eq!(book.tier(Side::Yes, 2).target_price, dec!(0.54));
        assert_eq!(book.armed_count(), 1);
        assert_eq!(rig.engine.state().trade_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_default_entry_price() {
        let mut rig = rig();
        rig.engine.set_default_entry_price(dec!(0.55)).unwrap();
        assert_eq!(rig.engine.book().tier(Side::Yes, 0).target_price, dec!(0.55));
        assert_eq!(rig.engine.book().tier(Side::No, 0).target_price, dec!(0.55));

        assert!(rig.engine.set_default_entry_price(dec!(1.2)).is_err());
        assert!(rig.engine.set_default_entry_price(Decimal::ZERO).is_err());
        assert_eq!(rig.engine.default_entry_price(), dec!(0.55));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_default_price_mid_cycle_keeps_entry_disarmed() {
        let mut rig = rig();
        rig.engine.recompute_stakes().await;
        quote(&rig.paper, dec!(0.56), dec!(0.45));
        rig.engine.tick().await;

        rig.engine.set_default_entry_price(dec!(0.55)).unwrap();
        let book = rig.engine.book();
        assert_eq!(book.tier(Side::Yes, 0).target_price, Decimal::ZERO);
        assert_eq!(book.tier(Side::No, 1).target_price, dec!(0.54));
        for tier in 2..TIER_COUNT {
            assert_eq!(book.tier(Side::Yes, tier).target_price, Decimal::ZERO);
        }
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let rig_settings = |price| EngineSettings {
            default_entry_price: price,
            percents: StakePercents::default(),
            timing: EngineTiming::default(),
        };
        let paper = Arc::new(PaperExchange::new(ManualQuotes::default(), dec!(10), "u"));
        let collab = Collaborators {
            feed: paper.clone(),
            gateway: paper.clone(),
            history: paper,
            notifier: Arc::new(RecordingNotifier::default()),
        };
        assert!(LadderEngine::new(
            collab,
            rig_settings(dec!(1.5)),
            TradeGate::new(),
            StopToken::new()
        )
        .is_err());
    }
}
