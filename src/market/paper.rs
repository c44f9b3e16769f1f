//! Paper exchange.
//!
//! Fills orders against a [`QuoteSource`] with a local cash ledger. The
//! exchange renders the same surfaces a live market page exposes: a
//! formatted cash label, a trade-history list ("Bought 77.78 Yes at 54¢
//! ($42.00)") and per-side position labels. The ladder never sees the
//! ledger directly, only those surfaces.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{Confirmation, HealthCheck, MarketFeed, OrderGateway, TradeHistory};
use crate::ladder::stake::parse_cash;
use crate::types::{PriceSnapshot, Side, TradeKind};

/// Anything that can produce a live Yes/No quote.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn quote(&self) -> Result<PriceSnapshot>;

    /// Switch to the market behind `url`. Sources without a notion of
    /// market accept anything.
    fn open_market(&self, _url: &str) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Manual quotes
// ---------------------------------------------------------------------------

/// Settable quote source for dry runs and tests.
#[derive(Debug, Default)]
pub struct ManualQuotes {
    current: StdMutex<Option<PriceSnapshot>>,
}

impl ManualQuotes {
    pub fn new(initial: Option<PriceSnapshot>) -> Self {
        Self {
            current: StdMutex::new(initial),
        }
    }

    pub fn set(&self, snapshot: PriceSnapshot) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(snapshot);
    }

    pub fn clear(&self) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

#[async_trait]
impl QuoteSource for ManualQuotes {
    async fn quote(&self) -> Result<PriceSnapshot> {
        let current = *self.current.lock().unwrap_or_else(|e| e.into_inner());
        current.context("No quote set")
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaperPosition {
    pub shares: Decimal,
    pub cost: Decimal,
}

#[derive(Debug)]
struct PaperBook {
    cash: Decimal,
    last_quote: Option<PriceSnapshot>,
    positions: HashMap<Side, PaperPosition>,
    history: Vec<String>,
    orders: u64,
    /// Market page the exchange trades on.
    market_url: String,
    /// Page currently shown; drifts away from `market_url` on navigation.
    url: String,
    logged_in: bool,
}

fn cents_label(price: Decimal) -> Decimal {
    (price * Decimal::ONE_HUNDRED).round_dp(1).normalize()
}

/// Render cash the way the market header shows it: `$12,345.67`.
pub fn format_cash(cash: Decimal) -> String {
    let fixed = format!("{:.2}", cash.round_dp(2));
    let (int, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let digits: Vec<char> = int.chars().collect();
    let mut grouped = String::new();
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }
    format!("${grouped}.{frac}")
}

// ---------------------------------------------------------------------------
// Exchange
// ---------------------------------------------------------------------------

pub struct PaperExchange<Q: QuoteSource> {
    quotes: Q,
    book: Mutex<PaperBook>,
    wallet_confirm: Duration,
}

impl<Q: QuoteSource> PaperExchange<Q> {
    pub fn new(quotes: Q, initial_cash: Decimal, market_url: impl Into<String>) -> Self {
        let market_url = market_url.into();
        Self {
            quotes,
            book: Mutex::new(PaperBook {
                cash: initial_cash,
                last_quote: None,
                positions: HashMap::new(),
                history: Vec::new(),
                orders: 0,
                url: market_url.clone(),
                market_url,
                logged_in: true,
            }),
            wallet_confirm: Duration::from_millis(3200),
        }
    }

    /// Nominal duration of the wallet-confirmation step.
    pub fn with_wallet_confirm(mut self, wallet_confirm: Duration) -> Self {
        self.wallet_confirm = wallet_confirm;
        self
    }

    pub fn quotes(&self) -> &Q {
        &self.quotes
    }

    pub async fn market_url(&self) -> String {
        self.book.lock().await.market_url.clone()
    }

    pub async fn order_count(&self) -> u64 {
        self.book.lock().await.orders
    }

    pub async fn position(&self, side: Side) -> Option<PaperPosition> {
        self.book.lock().await.positions.get(&side).copied()
    }

    pub async fn history(&self) -> Vec<String> {
        self.book.lock().await.history.clone()
    }

    pub async fn cash_label(&self) -> String {
        format_cash(self.book.lock().await.cash)
    }

    /// Simulate the page wandering off the market (redirect, stray click).
    pub async fn simulate_navigation(&self, url: &str) {
        self.book.lock().await.url = url.to_string();
    }

    pub async fn simulate_logout(&self) {
        self.book.lock().await.logged_in = false;
    }

    async fn fill_price(&self, side: Side) -> Result<Decimal> {
        let quote = match self.quotes.quote().await {
            Ok(q) => {
                self.book.lock().await.last_quote = Some(q);
                q
            }
            Err(e) => {
                let cached = self.book.lock().await.last_quote;
                warn!(error = %e, "Live quote unavailable, using last quote");
                cached.context("No quote available to fill against")?
            }
        };
        let price = quote.price(side);
        if price <= Decimal::ZERO {
            anyhow::bail!("Cannot fill {side} at price {price}");
        }
        Ok(price)
    }

    fn next_order_id(book: &mut PaperBook) -> String {
        book.orders += 1;
        format!("paper-{}-{}", book.orders, uuid::Uuid::new_v4().simple())
    }
}

#[async_trait]
impl<Q: QuoteSource> MarketFeed for PaperExchange<Q> {
    async fn prices(&self) -> Option<PriceSnapshot> {
        match self.quotes.quote().await {
            Ok(q) => {
                self.book.lock().await.last_quote = Some(q);
                Some(q)
            }
            Err(e) => {
                debug!(error = %e, "Quote unavailable");
                None
            }
        }
    }

    async fn cash(&self) -> Result<Decimal> {
        let label = self.cash_label().await;
        Ok(parse_cash(&label)?)
    }

    async fn refresh(&self) -> Result<()> {
        let quote = self.quotes.quote().await.context("Refresh failed")?;
        self.book.lock().await.last_quote = Some(quote);
        Ok(())
    }

    async fn open_market(&self, url: &str) -> Result<()> {
        self.quotes
            .open_market(url)
            .with_context(|| format!("Cannot open market {url}"))?;

        let mut book = self.book.lock().await;
        if book.positions.values().any(|p| p.shares > Decimal::ZERO) {
            warn!(url = %url, "Switching market with open positions");
        }
        book.market_url = url.to_string();
        book.url = url.to_string();
        book.last_quote = None;
        info!(url = %url, "Market opened");
        Ok(())
    }
}

#[async_trait]
impl<Q: QuoteSource> OrderGateway for PaperExchange<Q> {
    async fn buy(&self, side: Side, amount: Decimal) -> Result<Confirmation> {
        if amount <= Decimal::ZERO {
            anyhow::bail!("Buy amount must be positive, got {amount}");
        }
        let price = self.fill_price(side).await?;

        // Wallet confirmation.
        tokio::time::sleep(self.wallet_confirm).await;

        let mut book = self.book.lock().await;
        if amount > book.cash {
            anyhow::bail!("Insufficient cash: need {amount}, have {}", book.cash);
        }
        let shares = (amount / price).round_dp(2);
        book.cash -= amount;
        let position = book.positions.entry(side).or_default();
        position.shares += shares;
        position.cost += amount;
        book.history.push(format!(
            "Bought {shares:.2} {side} at {}¢ (${:.2})",
            cents_label(price),
            amount
        ));
        let order_id = Self::next_order_id(&mut book);

        info!(order_id = %order_id, side = %side, %amount, %price, "Paper buy filled");
        Ok(Confirmation {
            order_id,
            side,
            kind: TradeKind::Buy,
            amount,
            price,
            confirmed_at: Utc::now(),
        })
    }

    async fn sell(&self, side: Side) -> Result<Confirmation> {
        let held = self.book.lock().await.positions.get(&side).copied();
        let Some(position) = held else {
            debug!(side = %side, "No position to sell");
            return Ok(Confirmation {
                order_id: String::new(),
                side,
                kind: TradeKind::Sell,
                amount: Decimal::ZERO,
                price: Decimal::ZERO,
                confirmed_at: Utc::now(),
            });
        };
        let price = self.fill_price(side).await?;

        tokio::time::sleep(self.wallet_confirm).await;

        let mut book = self.book.lock().await;
        let value = (position.shares * price).round_dp(2);
        book.cash += value;
        book.positions.remove(&side);
        book.history.push(format!(
            "Sold {:.2} {side} at {}¢ (${:.2})",
            position.shares,
            cents_label(price),
            value
        ));
        let order_id = Self::next_order_id(&mut book);

        info!(order_id = %order_id, side = %side, %value, %price, "Paper sell filled");
        Ok(Confirmation {
            order_id,
            side,
            kind: TradeKind::Sell,
            amount: value,
            price,
            confirmed_at: Utc::now(),
        })
    }
}

#[async_trait]
impl<Q: QuoteSource> TradeHistory for PaperExchange<Q> {
    async fn latest_entry(&self) -> Result<Option<String>> {
        Ok(self.book.lock().await.history.last().cloned())
    }

    async fn has_position_label(&self, side: Side) -> Result<bool> {
        Ok(self.book.lock().await.positions.contains_key(&side))
    }
}

#[async_trait]
impl<Q: QuoteSource> HealthCheck for PaperExchange<Q> {
    async fn current_url(&self) -> Result<String> {
        Ok(self.book.lock().await.url.clone())
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.book.lock().await.url = url.to_string();
        Ok(())
    }

    async fn is_logged_in(&self) -> Result<bool> {
        Ok(self.book.lock().await.logged_in)
    }

    async fn login(&self) -> Result<()> {
        self.book.lock().await.logged_in = true;
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.refresh().await
    }
}
