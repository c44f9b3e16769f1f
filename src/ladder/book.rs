//! Ladder book — the six-tier Yes/No ladder plus the protective close pair.
//!
//! Pure state: no I/O, no clocks. The engine decides *when* a rung fires;
//! the book decides *which* rung matches a snapshot and how the ladder
//! cascades after a confirmed fill.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{LadderError, PriceSnapshot, Side};

/// Number of escalation rungs per side (tier 0 entry + tiers 1..5).
pub const TIER_COUNT: usize = 6;

/// Index of the terminal escalation rung.
pub const TERMINAL_TIER: usize = TIER_COUNT - 1;

/// Width of the one-sided match band above a target.
pub const MATCH_BAND: Decimal = dec!(0.04);

/// Protective close target on the side that filled (or both sides after entry).
pub const PROTECT_HIGH: Decimal = dec!(0.85);

/// Protective close target on the side opposite a terminal fill.
pub const PROTECT_LOW: Decimal = dec!(0.50);

/// Match rule: `target > 0 && 0 <= price - target <= 0.04`.
///
/// Fires only when price sits inside the band at or above the target. A
/// price that jumps past the band between ticks never fires.
pub fn price_matches(price: Decimal, target: Decimal) -> bool {
    if target <= Decimal::ZERO {
        return false;
    }
    let diff = price - target;
    diff >= Decimal::ZERO && diff <= MATCH_BAND
}

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

/// One rung of the ladder for one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tier {
    /// 0 means inactive.
    pub target_price: Decimal,
    pub stake_amount: Decimal,
}

impl Tier {
    pub fn is_armed(&self) -> bool {
        self.target_price > Decimal::ZERO
    }

    pub fn matches(&self, price: Decimal) -> bool {
        price_matches(price, self.target_price)
    }

    fn validate(&self, side: Side, tier: usize) -> Result<(), LadderError> {
        let invalid = |reason: &str| LadderError::InvalidTier {
            side,
            tier,
            reason: reason.to_string(),
        };
        if self.target_price < Decimal::ZERO {
            return Err(invalid("negative target"));
        }
        if self.target_price >= Decimal::ONE {
            return Err(invalid("target must be below 1"));
        }
        if self.is_armed() && self.stake_amount <= Decimal::ZERO {
            return Err(invalid("armed with no stake"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Triggers and phases
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rung {
    Tier(usize),
    Protective,
}

/// The single rung selected for action on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub side: Side,
    pub rung: Rung,
    pub price: Decimal,
    pub target: Decimal,
}

/// Where the current cycle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum LadderPhase {
    Idle,
    EntryArmed,
    Escalating { side: Side, tier: usize },
    AwaitingClose,
}

impl fmt::Display for LadderPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LadderPhase::Idle => write!(f, "IDLE"),
            LadderPhase::EntryArmed => write!(f, "TIER0_ARMED"),
            LadderPhase::Escalating { side, tier } => write!(f, "TIER{tier}_ARMED({side})"),
            LadderPhase::AwaitingClose => write!(f, "AWAITING_CLOSE"),
        }
    }
}

// ---------------------------------------------------------------------------
// Book
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LadderBook {
    yes: [Tier; TIER_COUNT],
    no: [Tier; TIER_COUNT],
    protect_yes: Decimal,
    protect_no: Decimal,
}

impl LadderBook {
    /// A fresh book with tier 0 armed on both sides at `entry_price`.
    pub fn seeded(entry_price: Decimal) -> Self {
        let mut book = Self::default();
        book.seed_entry(entry_price);
        book
    }

    pub fn tiers(&self, side: Side) -> &[Tier; TIER_COUNT] {
        match side {
            Side::Yes => &self.yes,
            Side::No => &self.no,
        }
    }

    fn tiers_mut(&mut self, side: Side) -> &mut [Tier; TIER_COUNT] {
        match side {
            Side::Yes => &mut self.yes,
            Side::No => &mut self.no,
        }
    }

    pub fn tier(&self, side: Side, tier: usize) -> Tier {
        self.tiers(side)[tier]
    }

    pub fn set_target(&mut self, side: Side, tier: usize, target: Decimal) {
        self.tiers_mut(side)[tier].target_price = target;
    }

    pub fn protective(&self, side: Side) -> Decimal {
        match side {
            Side::Yes => self.protect_yes,
            Side::No => self.protect_no,
        }
    }

    pub fn set_protective(&mut self, side: Side, target: Decimal) {
        match side {
            Side::Yes => self.protect_yes = target,
            Side::No => self.protect_no = target,
        }
    }

    /// Write the same stake schedule to both sides.
    pub fn set_stakes(&mut self, stakes: &[Decimal; TIER_COUNT]) {
        for (i, stake) in stakes.iter().enumerate() {
            self.yes[i].stake_amount = *stake;
            self.no[i].stake_amount = *stake;
        }
    }

    pub fn stakes(&self, side: Side) -> [Decimal; TIER_COUNT] {
        let mut out = [Decimal::ZERO; TIER_COUNT];
        for (slot, tier) in out.iter_mut().zip(self.tiers(side)) {
            *slot = tier.stake_amount;
        }
        out
    }

    pub fn seed_entry(&mut self, entry_price: Decimal) {
        self.yes[0].target_price = entry_price;
        self.no[0].target_price = entry_price;
    }

    pub fn entry_armed(&self) -> bool {
        self.yes[0].is_armed() || self.no[0].is_armed()
    }

    /// Zero every target (twelve rungs plus the protective pair).
    pub fn clear_targets(&mut self) {
        for tier in self.yes.iter_mut().chain(self.no.iter_mut()) {
            tier.target_price = Decimal::ZERO;
        }
        self.protect_yes = Decimal::ZERO;
        self.protect_no = Decimal::ZERO;
    }

    /// End-of-cycle reset: everything zero, tier 0 reseeded on both sides.
    pub fn reset_for_cycle(&mut self, entry_price: Decimal) {
        self.clear_targets();
        self.seed_entry(entry_price);
    }

    /// Zero all twelve rungs and keep the protective pair, so the only
    /// remaining action is the close.
    pub fn disarm_escalation(&mut self) {
        for tier in self.yes.iter_mut().chain(self.no.iter_mut()) {
            tier.target_price = Decimal::ZERO;
        }
    }

    /// Count of armed escalation rungs across both sides.
    pub fn armed_count(&self) -> usize {
        self.yes
            .iter()
            .chain(self.no.iter())
            .filter(|t| t.is_armed())
            .count()
    }

    pub fn phase(&self) -> LadderPhase {
        for tier in (1..TIER_COUNT).rev() {
            for side in Side::ALL {
                if self.tier(side, tier).is_armed() {
                    return LadderPhase::Escalating { side, tier };
                }
            }
        }
        if self.entry_armed() {
            LadderPhase::EntryArmed
        } else if self.protect_yes > Decimal::ZERO || self.protect_no > Decimal::ZERO {
            LadderPhase::AwaitingClose
        } else {
            LadderPhase::Idle
        }
    }

    /// Scan tiers 0→5 (Yes before No), then the protective pair, and return
    /// the first rung whose target matches. Misconfigured rungs are logged
    /// and skipped for this tick.
    pub fn find_trigger(&self, prices: &PriceSnapshot) -> Option<Trigger> {
        for tier in 0..TIER_COUNT {
            for side in Side::ALL {
                let rung = self.tier(side, tier);
                if !rung.is_armed() {
                    continue;
                }
                if let Err(e) = rung.validate(side, tier) {
                    tracing::warn!(error = %e, "Skipping misconfigured tier this tick");
                    continue;
                }
                let price = prices.price(side);
                if rung.matches(price) {
                    return Some(Trigger {
                        side,
                        rung: Rung::Tier(tier),
                        price,
                        target: rung.target_price,
                    });
                }
            }
        }

        Side::ALL.into_iter().find_map(|side| {
            let target = self.protective(side);
            let price = prices.price(side);
            price_matches(price, target).then_some(Trigger {
                side,
                rung: Rung::Protective,
                price,
                target,
            })
        })
    }

    /// Cascade after a confirmed buy on `side` at `tier`.
    ///
    /// The fired tier is zeroed on both sides. Tier 0 arms the opposite
    /// tier 1 and the 0.85/0.85 take-profit pair; tiers 1..4 arm the
    /// opposite next tier; tier 5 arms the 0.85 (filled side) / 0.50
    /// (opposite) protective close instead of a seventh rung.
    pub fn apply_fill(&mut self, side: Side, tier: usize, entry_price: Decimal) {
        self.yes[tier].target_price = Decimal::ZERO;
        self.no[tier].target_price = Decimal::ZERO;

        match tier {
            0 => {
                self.set_target(side.opposite(), 1, entry_price);
                self.protect_yes = PROTECT_HIGH;
                self.protect_no = PROTECT_HIGH;
            }
            TERMINAL_TIER => {
                self.set_protective(side, PROTECT_HIGH);
                self.set_protective(side.opposite(), PROTECT_LOW);
            }
            _ => self.set_target(side.opposite(), tier + 1, entry_price),
        }
    }
}

/// Entry prices must sit strictly inside (0, 1).
pub fn validate_entry_price(price: Decimal) -> Result<(), LadderError> {
    if price <= Decimal::ZERO || price >= Decimal::ONE {
        return Err(LadderError::InvalidPrice(price));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
