//! Shared types for the ladder agent.
//!
//! These types form the data model used across all modules so that the
//! market adapters, the ladder engine and the session layer can depend on
//! them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// Outcome side of a binary market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Yes,
    No,
}

impl Side {
    /// Fixed evaluation order: Yes is always checked before No.
    pub const ALL: [Side; 2] = [Side::Yes, Side::No];

    /// The opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }

    /// Token as it appears on the market's trade-history surface.
    pub fn token(&self) -> &'static str {
        match self {
            Side::Yes => "Yes",
            Side::No => "No",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

// ---------------------------------------------------------------------------
// Prices
// ---------------------------------------------------------------------------

/// Yes/No prices sampled once per evaluation tick, both in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub yes: Decimal,
    pub no: Decimal,
}

impl PriceSnapshot {
    pub fn new(yes: Decimal, no: Decimal) -> Self {
        Self { yes, no }
    }

    pub fn price(&self, side: Side) -> Decimal {
        match side {
            Side::Yes => self.yes,
            Side::No => self.no,
        }
    }

}

impl fmt::Display for PriceSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Yes: {}¢ | No: {}¢",
            (self.yes * Decimal::ONE_HUNDRED).normalize(),
            (self.no * Decimal::ONE_HUNDRED).normalize(),
        )
    }
}

// ---------------------------------------------------------------------------
// Trade records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeKind {
    Buy,
    Sell,
}

impl fmt::Display for TradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeKind::Buy => write!(f, "Buy"),
            TradeKind::Sell => write!(f, "Sell"),
        }
    }
}

/// A confirmed fill, produced by the engine and consumed by notifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub side: Side,
    pub kind: TradeKind,
    /// Ladder rung that fired; `None` for liquidation sells.
    pub tier: Option<usize>,
    pub price: Decimal,
    pub amount: Decimal,
    /// Buy sequence for buys, sell sequence for sells.
    pub sequence: u64,
    pub cycle_id: u64,
    /// Counters at the time of the fill, for reporting.
    pub trade_count: u64,
    pub sell_count: u64,
    pub timestamp: DateTime<Utc>,
}

impl TradeRecord {
    /// Human label such as "Buy Yes 3" or "Sell No".
    pub fn label(&self) -> String {
        match self.tier {
            Some(tier) => format!("{} {} {}", self.kind, self.side, tier),
            None => format!("{} {}", self.kind, self.side),
        }
    }
}

impl fmt::Display for TradeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} @ ${:.2} for ${:.2} (cycle {})",
            self.sequence,
            self.label(),
            self.price,
            self.amount,
            self.cycle_id,
        )
    }
}

// ---------------------------------------------------------------------------
// Session status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Idle,
    Running,
    Restarting,
    Stopped,
    /// Gateway unreachable; the ladder was disarmed.
    Disconnected,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "IDLE"),
            SessionStatus::Running => write!(f, "RUNNING"),
            SessionStatus::Restarting => write!(f, "RESTARTING"),
            SessionStatus::Stopped => write!(f, "STOPPED"),
            SessionStatus::Disconnected => write!(f, "DISCONNECTED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LadderError {
    #[error("Invalid tier {side} {tier}: {reason}")]
    InvalidTier {
        side: Side,
        tier: usize,
        reason: String,
    },

    #[error("Invalid stake percentage {name}: {value}")]
    InvalidPercent { name: &'static str, value: Decimal },

    #[error("Invalid entry price: {0}")]
    InvalidPrice(Decimal),

    #[error("Cash unavailable: {0}")]
    CashUnavailable(String),

    #[error("Connectivity lost: {0}")]
    Connectivity(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
