//! Stake sizing — the per-tier martingale schedule.
//!
//! `stake[0] = cash × initial`, `stake[1] = stake[0] × first_rebound`,
//! `stake[k] = stake[k-1] × n_rebound` for the remaining tiers. Every step
//! is rounded to cents before it feeds the next one.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::book::TIER_COUNT;
use crate::types::LadderError;

/// Stake percentages, expressed in percent (4.2 means 4.2%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakePercents {
    #[serde(default = "default_initial")]
    pub initial: Decimal,
    #[serde(default = "default_first_rebound")]
    pub first_rebound: Decimal,
    #[serde(default = "default_n_rebound")]
    pub n_rebound: Decimal,
}

fn default_initial() -> Decimal {
    dec!(4.2)
}

fn default_first_rebound() -> Decimal {
    dec!(220)
}

fn default_n_rebound() -> Decimal {
    dec!(135)
}

impl Default for StakePercents {
    fn default() -> Self {
        Self {
            initial: default_initial(),
            first_rebound: default_first_rebound(),
            n_rebound: default_n_rebound(),
        }
    }
}

impl StakePercents {
    pub fn validate(&self) -> Result<(), LadderError> {
        for (name, value) in [
            ("initial", self.initial),
            ("first_rebound", self.first_rebound),
            ("n_rebound", self.n_rebound),
        ] {
            if value <= Decimal::ZERO {
                return Err(LadderError::InvalidPercent { name, value });
            }
        }
        Ok(())
    }
}

fn cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub struct StakeCalculator {
    percents: StakePercents,
}

impl StakeCalculator {
    pub fn new(percents: StakePercents) -> Result<Self, LadderError> {
        percents.validate()?;
        Ok(Self { percents })
    }

    pub fn percents(&self) -> StakePercents {
        self.percents
    }

    /// Full six-tier schedule for the given cash balance.
    pub fn schedule(&self, cash: Decimal) -> Result<[Decimal; TIER_COUNT], LadderError> {
        if cash < Decimal::ZERO {
            return Err(LadderError::CashUnavailable(format!("negative cash {cash}")));
        }
        let hundred = Decimal::ONE_HUNDRED;
        let mut stakes = [Decimal::ZERO; TIER_COUNT];

        stakes[0] = cents(cash * (self.percents.initial / hundred));
        stakes[1] = cents(stakes[0] * (self.percents.first_rebound / hundred));
        for k in 2..TIER_COUNT {
            stakes[k] = cents(stakes[k - 1] * (self.percents.n_rebound / hundred));
        }
        Ok(stakes)
    }
}

/// Extract a cash amount from a formatted label such as `"Cash $1,234.56"`.
///
/// Takes the first run of digits (thousands separators and one decimal
/// point allowed) and strips the separators.
pub fn parse_cash(text: &str) -> Result<Decimal, LadderError> {
    let unavailable = || LadderError::CashUnavailable(format!("unparseable cash label {text:?}"));

    let start = text.find(|c: char| c.is_ascii_digit()).ok_or_else(unavailable)?;
    let mut seen_point = false;
    let mut token = String::new();
    for c in text[start..].chars() {
        match c {
            '0'..='9' => token.push(c),
            ',' if !seen_point => {}
            '.' if !seen_point => {
                seen_point = true;
                token.push(c);
            }
            _ => break,
        }
    }
    let token = token.trim_end_matches('.');
    Decimal::from_str(token).map_err(|_| unavailable())
}
