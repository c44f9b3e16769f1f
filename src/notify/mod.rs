//! Trade notifications.
//!
//! Notifiers are fire-and-forget from the engine's point of view: the
//! engine spawns the call and never waits on it. Implementations own their
//! own retries and only log failures.

pub mod telegram;

use async_trait::async_trait;
use tracing::info;

use crate::types::TradeRecord;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, record: &TradeRecord);
}

/// Labels that identify where a notification came from.
#[derive(Debug, Clone, Default)]
pub struct NotifyContext {
    /// Machine or account label ("host" in the message).
    pub account_label: String,
    /// Market being traded ("pair" in the message).
    pub market: String,
}

/// Render the plain-text body sent for every settled trade.
pub fn render_message(ctx: &NotifyContext, record: &TradeRecord) -> String {
    format!(
        "Host: {}\nPair: {}\nType: {}\nPrice: ${:.2}\nAmount: ${:.2}\nTime: {}\nTrade count: {}\nSell count: {}",
        ctx.account_label,
        ctx.market,
        record.label(),
        record.price,
        record.amount,
        record.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        record.trade_count,
        record.sell_count,
    )
}

/// Subject line with the buy or sell sequence, e.g.
/// "[ladderbot] #3 Buy Yes 2 @ 0.55".
pub fn render_subject(record: &TradeRecord) -> String {
    format!(
        "[ladderbot] #{} {} @ {}",
        record.sequence,
        record.label(),
        record.price.normalize()
    )
}

/// Writes each trade to the log. Used when no remote channel is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    ctx: NotifyContext,
}

impl LogNotifier {
    pub fn new(ctx: NotifyContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, record: &TradeRecord) {
        info!(
            host = %self.ctx.account_label,
            market = %self.ctx.market,
            trade = %record.label(),
            price = %record.price,
            amount = %record.amount,
            trade_count = record.trade_count,
            sell_count = record.sell_count,
            "Trade settled"
        );
    }
}
