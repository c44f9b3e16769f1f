//! Market collaborators.
//!
//! The ladder engine only talks to the market through the narrow traits
//! below. Two implementations ship with the crate:
//! - `polymarket` — read-only Gamma API quote source (no auth required)
//! - `paper` — paper exchange that fills orders against any quote source
//!   and exposes a trade-history surface and position labels

pub mod paper;
pub mod polymarket;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{PriceSnapshot, Side, TradeKind};

/// Receipt returned once the wallet-confirmation step has completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Confirmation {
    pub order_id: String,
    pub side: Side,
    pub kind: TradeKind,
    pub amount: Decimal,
    pub price: Decimal,
    pub confirmed_at: DateTime<Utc>,
}

/// Live price and cash source.
#[async_trait]
pub trait MarketFeed: Send + Sync {
    /// Current Yes/No prices. `None` when either side is unavailable.
    async fn prices(&self) -> Option<PriceSnapshot>;

    /// Account cash available for staking.
    async fn cash(&self) -> Result<Decimal>;

    /// Refresh the underlying view so the next read reflects recent fills.
    async fn refresh(&self) -> Result<()>;

    /// Point the feed at another market page. Fails when the URL does not
    /// name a market the feed can quote.
    async fn open_market(&self, url: &str) -> Result<()>;
}

/// Order submission. Both calls block through the wallet-confirmation step.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn buy(&self, side: Side, amount: Decimal) -> Result<Confirmation>;

    /// Close the whole position on `side`.
    async fn sell(&self, side: Side) -> Result<Confirmation>;
}

/// Trade-history surface inspected by the verifier.
#[async_trait]
pub trait TradeHistory: Send + Sync {
    /// Text of the most recent history entry, if any.
    async fn latest_entry(&self) -> Result<Option<String>>;

    /// Whether a position label for `side` is currently shown.
    async fn has_position_label(&self, side: Side) -> Result<bool>;
}

/// Connection health checks, run independently of trading.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn current_url(&self) -> Result<String>;
    async fn navigate(&self, url: &str) -> Result<()>;
    async fn is_logged_in(&self) -> Result<bool>;
    async fn login(&self) -> Result<()>;
    async fn reload(&self) -> Result<()>;
}
