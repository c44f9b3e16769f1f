//! Session — the single owner of the ladder engine.
//!
//! Control commands arrive on an mpsc queue and are applied between ticks.
//! The session publishes a [`SessionView`] on a watch channel after every
//! change so the control API and health monitor can read state without
//! touching the engine.
//!
//! Stop and force-restart flip the shared [`StopToken`] before queueing,
//! so an in-flight retry loop exits at its next iteration boundary instead
//! of waiting for the queue to drain.

pub mod health;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::ladder::book::validate_entry_price;
use crate::ladder::{LadderBook, LadderEngine, LadderPhase, StopToken, TickOutcome, TradeGate};
use crate::storage::{LadderSnapshot, LadderStore};
use crate::types::{LadderError, PriceSnapshot, SessionStatus, TradeRecord};

/// Trades kept in the published view.
pub const RECENT_TRADES: usize = 50;

const COMMAND_QUEUE: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Start,
    Stop,
    /// Rebuild the engine from the store and auto-start, keeping the
    /// market connection.
    ForceRestart,
    SetDefaultPrice(Decimal),
    SetMarketUrl(String),
    ConnectivityLost(String),
    Shutdown,
}

/// Read-only session state published after every change.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub status: SessionStatus,
    pub phase: LadderPhase,
    pub cycle_id: u64,
    pub trade_count: u64,
    pub sell_count: u64,
    pub default_entry_price: Decimal,
    pub market_url: String,
    pub url_history: Vec<String>,
    pub last_prices: Option<PriceSnapshot>,
    pub book: LadderBook,
    pub recent_trades: Vec<TradeRecord>,
    /// Restarts since the process started (cycle completions and forced).
    pub restarts: u64,
    pub updated_at: DateTime<Utc>,
}

impl SessionView {
    pub fn new(market_url: impl Into<String>) -> Self {
        Self {
            status: SessionStatus::Idle,
            phase: LadderPhase::Idle,
            cycle_id: 0,
            trade_count: 0,
            sell_count: 0,
            default_entry_price: Decimal::ZERO,
            market_url: market_url.into(),
            url_history: Vec::new(),
            last_prices: None,
            book: LadderBook::default(),
            recent_trades: Vec::new(),
            restarts: 0,
            updated_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable control surface for a running session.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
    view: watch::Receiver<SessionView>,
    stop: StopToken,
    gate: TradeGate,
}

/// Build the command queue and view channel shared by a session and its
/// handles.
pub fn session_channel(
    initial: SessionView,
    stop: StopToken,
    gate: TradeGate,
) -> (
    SessionHandle,
    mpsc::Receiver<SessionCommand>,
    watch::Sender<SessionView>,
) {
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
    let (view_tx, view_rx) = watch::channel(initial);
    let handle = SessionHandle {
        tx,
        view: view_rx,
        stop,
        gate,
    };
    (handle, rx, view_tx)
}

impl SessionHandle {
    async fn send(&self, cmd: SessionCommand) -> Result<()> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| anyhow::anyhow!("Session is not running"))
    }

    pub async fn start(&self) -> Result<()> {
        self.send(SessionCommand::Start).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.stop.stop();
        self.send(SessionCommand::Stop).await
    }

    pub async fn force_restart(&self) -> Result<()> {
        self.stop.stop();
        self.send(SessionCommand::ForceRestart).await
    }

    /// Rejects prices outside (0, 1) before they reach the queue.
    pub async fn set_default_price(&self, price: Decimal) -> Result<()> {
        validate_entry_price(price)?;
        self.send(SessionCommand::SetDefaultPrice(price)).await
    }

    pub async fn set_market_url(&self, url: &str) -> Result<()> {
        let url = url.trim();
        if url.is_empty() {
            return Err(LadderError::Config("market url is empty".into()).into());
        }
        self.send(SessionCommand::SetMarketUrl(url.to_string())).await
    }

    pub async fn connectivity_lost(&self, reason: impl Into<String>) -> Result<()> {
        self.stop.stop();
        self.send(SessionCommand::ConnectivityLost(reason.into())).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.stop.stop();
        self.send(SessionCommand::Shutdown).await
    }

    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// True while an execute protocol holds the trade gate.
    pub fn is_trading(&self) -> bool {
        self.gate.is_busy()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct Session {
    engine: LadderEngine,
    store: Arc<dyn LadderStore>,
    inbox: mpsc::Receiver<SessionCommand>,
    view_tx: watch::Sender<SessionView>,
    status: SessionStatus,
    /// Configured market, used when the stored one cannot be opened.
    default_url: String,
    market_url: String,
    url_history: Vec<String>,
    recent: VecDeque<TradeRecord>,
    restarts: u64,
    tick_interval: Duration,
}

impl Session {
    /// Wire a session around `engine`, restoring any persisted ladder.
    /// A stored market URL takes precedence over `default_url`.
    pub fn new(
        mut engine: LadderEngine,
        store: Arc<dyn LadderStore>,
        default_url: impl Into<String>,
        tick_interval: Duration,
    ) -> (Self, SessionHandle) {
        let default_url = default_url.into();
        let mut market_url = default_url.clone();
        let mut url_history = Vec::new();
        engine.set_running(false);

        match store.load() {
            Ok(Some(snapshot)) => {
                if snapshot.percents != engine.settings().percents {
                    info!("Stake percentages from config replace the stored ones");
                }
                engine.restore(&snapshot);
                if !snapshot.market_url.trim().is_empty() {
                    market_url = snapshot.market_url;
                }
                url_history = snapshot.url_history;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Stored ladder unreadable, starting fresh"),
        }

        let (handle, inbox, view_tx) = session_channel(
            SessionView::new(market_url.clone()),
            engine.stop_token().clone(),
            engine.gate().clone(),
        );

        let mut session = Self {
            engine,
            store,
            inbox,
            view_tx,
            status: SessionStatus::Idle,
            default_url,
            market_url: String::new(),
            url_history,
            recent: VecDeque::with_capacity(RECENT_TRADES),
            restarts: 0,
            tick_interval,
        };
        session.record_market_url(&market_url);
        session.publish();
        (session, handle)
    }

    pub async fn run(mut self) {
        self.open_initial_market().await;

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(market = %self.market_url, "Session ready");

        loop {
            tokio::select! {
                cmd = self.inbox.recv() => match cmd {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle(cmd).await,
                },
                _ = ticker.tick(), if self.status == SessionStatus::Running => {
                    let outcome = self.engine.tick().await;
                    self.on_outcome(outcome).await;
                }
            }
        }

        self.engine.stop_token().stop();
        self.engine.set_running(false);
        self.status = SessionStatus::Stopped;
        self.persist();
        self.publish();
        info!("Session shut down");
    }

    async fn handle(&mut self, cmd: SessionCommand) {
        debug!(?cmd, "Session command");
        match cmd {
            SessionCommand::Start => self.start(true).await,
            SessionCommand::Stop => {
                self.engine.stop_token().stop();
                self.engine.set_running(false);
                self.status = SessionStatus::Stopped;
                info!("Ladder stopped");
                self.persist();
            }
            SessionCommand::ForceRestart => {
                info!("Force restart requested");
                self.restart().await;
            }
            SessionCommand::SetDefaultPrice(price) => {
                match self.engine.set_default_entry_price(price) {
                    Ok(()) => self.persist(),
                    Err(e) => warn!(error = %e, "Default price rejected"),
                }
            }
            SessionCommand::SetMarketUrl(url) => {
                let phase = self.engine.book().phase();
                if phase != LadderPhase::EntryArmed && phase != LadderPhase::Idle {
                    warn!(url = %url, phase = %phase, "Switching market mid-cycle");
                }
                if self.open_market(&url).await {
                    self.record_market_url(&url);
                    info!(url = %url, "Market URL set");
                    self.persist();
                }
            }
            SessionCommand::ConnectivityLost(reason) => {
                self.engine.stop_token().stop();
                self.engine.set_running(false);
                self.status = SessionStatus::Disconnected;
                error!(reason = %reason, "Connectivity lost, ladder disarmed");
                self.persist();
            }
            SessionCommand::Shutdown => {}
        }
        self.publish();
    }

    /// Arm the ladder. A fresh start zeroes the trade counter; a restart
    /// hand-off keeps it.
    async fn start(&mut self, fresh: bool) {
        if self.status == SessionStatus::Running {
            debug!("Already running");
            return;
        }
        self.engine.stop_token().reset();
        if fresh {
            self.engine.reset_trade_count();
        }
        self.engine.set_running(true);
        self.status = SessionStatus::Running;
        self.publish();

        if self.engine.recompute_stakes().await {
            info!(
                phase = %self.engine.book().phase(),
                entry_price = %self.engine.default_entry_price(),
                "Ladder started"
            );
        }
        self.persist();
    }

    /// Persist, rebuild the engine from the store with the same
    /// collaborators, and auto-start.
    async fn restart(&mut self) {
        self.status = SessionStatus::Restarting;
        self.engine.set_running(false);
        self.publish();

        let current = self.snapshot();
        if let Err(e) = self.store.save(&current) {
            warn!(error = %e, "Failed to persist ladder before restart");
        }
        let snapshot = match self.store.load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => current,
            Err(e) => {
                warn!(error = %e, "Reload failed, restarting from memory");
                current
            }
        };

        let rebuilt = LadderEngine::new(
            self.engine.collaborators().clone(),
            self.engine.settings().clone(),
            self.engine.gate().clone(),
            self.engine.stop_token().clone(),
        );
        match rebuilt {
            Ok(mut engine) => {
                engine.restore(&snapshot);
                self.engine = engine;
            }
            Err(e) => {
                error!(error = %e, "Engine rebuild failed, keeping current engine");
            }
        }

        self.restarts += 1;
        self.status = SessionStatus::Stopped;
        self.start(false).await;
        info!(cycle_id = self.engine.state().cycle_id, "Session restarted");
    }

    async fn on_outcome(&mut self, outcome: TickOutcome) {
        match outcome {
            TickOutcome::Filled(record) => {
                self.push_trade(record);
                self.persist();
            }
            TickOutcome::CycleComplete { cycle_id, sells } => {
                for record in sells {
                    self.push_trade(record);
                }
                info!(cycle_id, "Cycle closed, restarting session");
                self.restart().await;
            }
            TickOutcome::Aborted => {
                info!(phase = %self.engine.book().phase(), "Protocol aborted by stop");
                self.persist();
            }
            TickOutcome::Skipped(_) | TickOutcome::NoMatch => {}
        }
        self.publish();
    }

    /// Open the stored market, falling back to the configured one.
    async fn open_initial_market(&mut self) {
        let stored = self.market_url.clone();
        if self.open_market(&stored).await || stored == self.default_url {
            return;
        }
        let fallback = self.default_url.clone();
        if self.open_market(&fallback).await {
            warn!(stored = %stored, url = %fallback, "Stored market unusable, using configured market");
            self.record_market_url(&fallback);
            self.persist();
            self.publish();
        }
    }

    async fn open_market(&self, url: &str) -> bool {
        match self.engine.collaborators().feed.open_market(url).await {
            Ok(()) => true,
            Err(e) => {
                warn!(url = %url, error = %e, "Market not opened");
                false
            }
        }
    }

    fn push_trade(&mut self, record: TradeRecord) {
        if self.recent.len() == RECENT_TRADES {
            self.recent.pop_front();
        }
        self.recent.push_back(record);
    }

    fn record_market_url(&mut self, url: &str) {
        let mut snapshot = self.snapshot();
        snapshot.push_url_history(url);
        self.market_url = snapshot.market_url;
        self.url_history = snapshot.url_history;
    }

    fn snapshot(&self) -> LadderSnapshot {
        let state = self.engine.state();
        LadderSnapshot {
            book: self.engine.book().clone(),
            percents: self.engine.settings().percents,
            default_entry_price: self.engine.default_entry_price(),
            cycle_id: state.cycle_id,
            trade_count: state.trade_count,
            sell_count: state.sell_count,
            market_url: self.market_url.clone(),
            url_history: self.url_history.clone(),
            saved_at: Utc::now(),
        }
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.snapshot()) {
            warn!(error = %e, "Failed to persist ladder");
        }
    }

    fn publish(&self) {
        let state = self.engine.state();
        let book = self.engine.book();
        self.view_tx.send_replace(SessionView {
            status: self.status,
            phase: book.phase(),
            cycle_id: state.cycle_id,
            trade_count: state.trade_count,
            sell_count: state.sell_count,
            default_entry_price: self.engine.default_entry_price(),
            market_url: self.market_url.clone(),
            url_history: self.url_history.clone(),
            last_prices: self.engine.last_prices(),
            book: book.clone(),
            recent_trades: self.recent.iter().cloned().collect(),
            restarts: self.restarts,
            updated_at: Utc::now(),
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
