//! Trade verification against the market's trade-history surface.
//!
//! Each check is a single bounded read; callers own the retry loop.

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::stake::parse_cash;
use crate::market::TradeHistory;
use crate::types::Side;

pub struct TradeVerifier {
    history: Arc<dyn TradeHistory>,
    read_timeout: Duration,
}

impl TradeVerifier {
    pub fn new(history: Arc<dyn TradeHistory>, read_timeout: Duration) -> Self {
        Self {
            history,
            read_timeout,
        }
    }

    /// True when the latest history entry records a buy of `side`.
    pub async fn confirm_buy(&self, side: Side) -> bool {
        self.confirmed_buy(side).await.is_some()
    }

    /// Like [`confirm_buy`](Self::confirm_buy) but returns the dollar amount
    /// shown on the confirming entry.
    pub async fn confirmed_buy(&self, side: Side) -> Option<Decimal> {
        let entry = self.latest_entry().await?;
        let amount = parse_buy_entry(&entry, side);
        if amount.is_none() {
            debug!(side = %side, entry = %entry, "Latest history entry does not confirm buy");
        }
        amount
    }

    /// True when no position label for `side` is shown.
    pub async fn confirm_sell_absence(&self, side: Side) -> bool {
        match tokio::time::timeout(self.read_timeout, self.history.has_position_label(side)).await
        {
            Ok(Ok(present)) => !present,
            Ok(Err(e)) => {
                warn!(side = %side, error = %e, "Position label read failed");
                false
            }
            Err(_) => {
                warn!(side = %side, "Position label read timed out");
                false
            }
        }
    }

    /// Dollar value on the latest history entry, if that entry concerns `side`.
    pub async fn position_value(&self, side: Side) -> Option<Decimal> {
        let entry = self.latest_entry().await?;
        if !has_word(&entry, side.token()) {
            return None;
        }
        dollar_amount(&entry)
    }

    async fn latest_entry(&self) -> Option<String> {
        match tokio::time::timeout(self.read_timeout, self.history.latest_entry()).await {
            Ok(Ok(entry)) => entry,
            Ok(Err(e)) => {
                warn!(error = %e, "Trade history read failed");
                None
            }
            Err(_) => {
                warn!("Trade history read timed out");
                None
            }
        }
    }
}

/// A buy entry contains the whole word `Bought`, the whole side token and
/// a `$amount`. Returns the amount.
pub fn parse_buy_entry(entry: &str, side: Side) -> Option<Decimal> {
    if !has_word(entry, "Bought") || !has_word(entry, side.token()) {
        return None;
    }
    dollar_amount(entry)
}

/// Whole-word match, so "No" does not match "Nobody" or "Noted".
pub fn has_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|token| token == word)
}

/// First `$<number>` in the text. A `$` not followed by a digit is skipped.
pub fn dollar_amount(text: &str) -> Option<Decimal> {
    text.match_indices('$')
        .map(|(i, _)| &text[i + 1..])
        .filter(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
        .find_map(|rest| parse_cash(rest).ok())
}
