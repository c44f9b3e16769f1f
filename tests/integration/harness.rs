//! Test harness for integration testing.
//!
//! Wires a paper exchange with hand-set quotes, a recording notifier and a
//! JSON store in a temp file into a real session. Everything is in-process
//! and deterministic under a paused tokio clock.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ladderbot::ladder::{
    Collaborators, EngineSettings, EngineTiming, LadderEngine, StakePercents, StopToken,
    TradeGate,
};
use ladderbot::market::paper::{ManualQuotes, PaperExchange};
use ladderbot::notify::Notifier;
use ladderbot::session::{Session, SessionHandle, SessionView};
use ladderbot::storage::JsonLadderStore;
use ladderbot::types::{PriceSnapshot, TradeRecord};

pub type Paper = PaperExchange<ManualQuotes>;

pub const MARKET_URL: &str = "https://polymarket.com/event/btc-up-or-down";
pub const ENTRY: Decimal = dec!(0.54);

/// Collects every notified trade.
#[derive(Default)]
pub struct RecordingNotifier {
    records: Mutex<Vec<TradeRecord>>,
}

impl RecordingNotifier {
    pub fn labels(&self) -> Vec<String> {
        self.records.lock().unwrap().iter().map(|r| r.label()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, record: &TradeRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

/// Fresh temp path for a store file.
pub fn temp_store_path() -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("ladderbot_it_{}.json", uuid::Uuid::new_v4()));
    p
}

pub struct Harness {
    pub exchange: Arc<Paper>,
    pub notifier: Arc<RecordingNotifier>,
    pub store: Arc<JsonLadderStore>,
}

impl Harness {
    /// Paper account holding $1,000 with both sides quoted at 0.50.
    pub fn new(store_path: PathBuf) -> Self {
        let exchange = Arc::new(PaperExchange::new(
            ManualQuotes::new(Some(PriceSnapshot::new(dec!(0.50), dec!(0.50)))),
            dec!(1000),
            MARKET_URL,
        ));
        Self {
            exchange,
            notifier: Arc::new(RecordingNotifier::default()),
            store: Arc::new(JsonLadderStore::new(store_path)),
        }
    }

    pub fn quote(&self, yes: Decimal, no: Decimal) {
        self.exchange.quotes().set(PriceSnapshot::new(yes, no));
    }

    /// Build a session over this harness and spawn its run loop.
    pub fn spawn_session(&self) -> (SessionHandle, tokio::task::JoinHandle<()>) {
        let collab = Collaborators {
            feed: self.exchange.clone(),
            gateway: self.exchange.clone(),
            history: self.exchange.clone(),
            notifier: self.notifier.clone(),
        };
        let settings = EngineSettings {
            default_entry_price: ENTRY,
            percents: StakePercents::default(),
            timing: EngineTiming::default(),
        };
        let engine = LadderEngine::new(collab, settings, TradeGate::new(), StopToken::new())
            .expect("engine settings are valid");
        let (session, handle) = Session::new(
            engine,
            self.store.clone(),
            MARKET_URL,
            Duration::from_secs(1),
        );
        let task = tokio::spawn(session.run());
        (handle, task)
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = self.store.delete();
    }
}

/// Wait (in virtual time) until the published view satisfies `pred`.
pub async fn wait_until(handle: &SessionHandle, pred: impl Fn(&SessionView) -> bool) {
    let mut rx = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(900), rx.wait_for(|v| pred(v)))
        .await
        .expect("timed out waiting for session view")
        .expect("session view channel closed");
}

/// Let spawned notifier tasks run.
pub async fn drain_tasks() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
