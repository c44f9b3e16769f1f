//! Sell/reset cycle.
//!
//! A protective rung match sells the matched side, then the opposite side.
//! Each sell is confirmed by the position label disappearing. Once both
//! sides are flat the book is reseeded for the next cycle.
//!
//! A stop is honoured only until the first leg is confirmed; after that the
//! remaining leg is always submitted once. If the close still cannot finish,
//! the escalation rungs are disarmed so only the protective pair can act
//! on the half-closed book.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::book::Trigger;
use super::engine::{LadderEngine, TickOutcome};
use super::retry::RetryPolicy;
use crate::market::Confirmation;
use crate::types::{Side, TradeKind, TradeRecord};

enum SellOutcome {
    Sold(TradeRecord),
    NothingHeld,
    /// Stopped before the label cleared. `submitted` when at least one sell
    /// went out for this side.
    Aborted { submitted: bool },
}

impl LadderEngine {
    pub(super) async fn liquidate(&mut self, trigger: Trigger) -> TickOutcome {
        info!(
            side = %trigger.side,
            price = %trigger.price,
            target = %trigger.target,
            "Protective target matched, liquidating"
        );

        let mut sells = Vec::with_capacity(2);
        let mut committed = false;
        for side in [trigger.side, trigger.side.opposite()] {
            match self.sell_until_absent(side, committed).await {
                SellOutcome::Sold(record) => {
                    sells.push(record);
                    committed = true;
                }
                SellOutcome::NothingHeld => {}
                SellOutcome::Aborted { submitted } => {
                    if committed || submitted {
                        self.book.disarm_escalation();
                        warn!(
                            side = %side,
                            sold = sells.len(),
                            phase = %self.book.phase(),
                            "Liquidation interrupted, escalation disarmed until the close completes"
                        );
                    }
                    return TickOutcome::Aborted;
                }
            }
        }

        self.complete_cycle(sells)
    }

    /// Sell `side` until its position label is gone. With `committed` the
    /// first submission goes out even when stopped; retries still observe
    /// the stop.
    async fn sell_until_absent(&mut self, side: Side, committed: bool) -> SellOutcome {
        if self.verifier.confirm_sell_absence(side).await {
            debug!(side = %side, "No position held, nothing to sell");
            return SellOutcome::NothingHeld;
        }

        let policy = RetryPolicy::unbounded(self.settings.timing.verify_backoff);
        let mut attempt = 0u32;
        loop {
            if self.stop.is_stopped() && (attempt > 0 || !committed) {
                warn!(side = %side, attempt, "Stopped before sell was confirmed");
                return SellOutcome::Aborted {
                    submitted: attempt > 0,
                };
            }
            attempt += 1;

            match self.collab.gateway.sell(side).await {
                Ok(conf) => {
                    for _ in 0..self.settings.timing.sell_settle_rounds {
                        self.settle_once().await;
                    }
                    if self.verifier.confirm_sell_absence(side).await {
                        return SellOutcome::Sold(self.settle_sell(side, &conf).await);
                    }
                    warn!(side = %side, attempt, "Position still shown after sell, retrying");
                }
                Err(e) => warn!(side = %side, attempt, error = %e, "Sell submission failed"),
            }

            if !policy.pause(attempt, &self.stop).await {
                warn!(side = %side, attempt, "Stopped before sell was confirmed");
                return SellOutcome::Aborted { submitted: true };
            }
        }
    }

    async fn settle_sell(&mut self, side: Side, conf: &Confirmation) -> TradeRecord {
        self.state.sell_count += 1;

        let amount = match self.verifier.position_value(side).await {
            Some(value) => value,
            None => conf.amount,
        };
        let price = if conf.price > Decimal::ZERO {
            conf.price
        } else {
            self.price_of(side).unwrap_or_default()
        };

        let record = TradeRecord {
            side,
            kind: TradeKind::Sell,
            tier: None,
            price,
            amount,
            sequence: self.state.sell_count,
            cycle_id: self.state.cycle_id,
            trade_count: self.state.trade_count,
            sell_count: self.state.sell_count,
            timestamp: Utc::now(),
        };

        info!(
            trade = %record.label(),
            price = %record.price,
            amount = %record.amount,
            sell_count = self.state.sell_count,
            "Sell confirmed"
        );
        self.dispatch(&record);
        record
    }

    /// Reseed the book. Stakes are recomputed by the restart hand-off.
    fn complete_cycle(&mut self, sells: Vec<TradeRecord>) -> TickOutcome {
        let finished = self.state.cycle_id;
        self.book.reset_for_cycle(self.settings.default_entry_price);
        self.state.cycle_id += 1;

        info!(
            cycle_id = finished,
            next_cycle = self.state.cycle_id,
            sells = sells.len(),
            entry_price = %self.settings.default_entry_price,
            "Cycle complete, ladder reseeded"
        );
        TickOutcome::CycleComplete {
            cycle_id: finished,
            sells,
        }
    }
}
