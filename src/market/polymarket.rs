//! Polymarket quote source.
//!
//! Uses the Gamma API (no auth required) to sample the Yes/No prices of a
//! single market identified by its slug.
//!
//! Gamma API: https://gamma-api.polymarket.com
//!
//! The Yes price is the best ask (what a Yes buy pays); the No price is
//! `1 - best bid`. When the book is empty the outcome prices are used.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Mutex as StdMutex;
use tracing::{debug, info};

use crate::market::paper::QuoteSource;
use crate::types::PriceSnapshot;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const GAMMA_API_URL: &str = "https://gamma-api.polymarket.com";
const PRICE_DP: u32 = 4;

// ---------------------------------------------------------------------------
// Gamma API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct GammaMarket {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub closed: bool,
    /// Outcome prices as JSON string: "[\"0.65\",\"0.35\"]"
    #[serde(default, rename = "outcomePrices")]
    pub outcome_prices: Option<String>,
    #[serde(default, rename = "bestBid")]
    pub best_bid: Option<f64>,
    #[serde(default, rename = "bestAsk")]
    pub best_ask: Option<f64>,
}

impl GammaMarket {
    /// Derive a Yes/No snapshot from the order book, falling back to the
    /// displayed outcome prices.
    pub fn snapshot(&self) -> Option<PriceSnapshot> {
        let book = self
            .best_ask
            .zip(self.best_bid)
            .filter(|(ask, bid)| *ask > 0.0 && *bid > 0.0)
            .and_then(|(ask, bid)| {
                let yes = Decimal::from_f64(ask)?.round_dp(PRICE_DP);
                let no = (Decimal::ONE - Decimal::from_f64(bid)?).round_dp(PRICE_DP);
                Some(PriceSnapshot::new(yes, no))
            });

        book.or_else(|| {
            let (yes, no) = parse_outcome_prices(self.outcome_prices.as_deref()?)?;
            Some(PriceSnapshot::new(yes, no))
        })
    }
}

/// Parse outcome prices from Gamma's string format.
/// Handles: "[\"0.65\",\"0.35\"]", "0.65, 0.35", etc.
pub fn parse_outcome_prices(s: &str) -> Option<(Decimal, Decimal)> {
    let cleaned = s.replace(['[', ']', '"', '\\'], "");
    let parts: Vec<&str> = cleaned.split(',').map(|p| p.trim()).collect();
    if parts.len() >= 2 {
        let yes = Decimal::from_str(parts[0]).ok()?;
        let no = Decimal::from_str(parts[1]).ok()?;
        Some((yes, no))
    } else {
        None
    }
}

/// Build the public market URL for a slug.
pub fn market_url(slug: &str) -> String {
    format!("https://polymarket.com/event/{slug}")
}

/// Slug from an `.../event/<slug>` market URL. Query string and fragment
/// are ignored.
pub fn slug_from_url(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("/event/")?;
    let slug = rest.split(['/', '?', '#']).next().unwrap_or_default();
    (!slug.is_empty()).then(|| slug.to_string())
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct GammaQuotes {
    http: Client,
    slug: StdMutex<String>,
}

impl GammaQuotes {
    pub fn new(slug: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build Polymarket HTTP client")?;

        Ok(Self {
            http,
            slug: StdMutex::new(slug.into()),
        })
    }

    pub fn slug(&self) -> String {
        self.slug.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Fetch the tracked market from the Gamma API.
    pub async fn fetch_market(&self) -> Result<GammaMarket> {
        let url = format!("{GAMMA_API_URL}/markets");
        let slug = self.slug();
        debug!(slug = %slug, "Fetching Polymarket quote from Gamma API");

        let resp = self
            .http
            .get(&url)
            .query(&[("slug", slug.as_str())])
            .send()
            .await
            .context("Gamma API request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Gamma API error {status}: {body}");
        }

        let markets: Vec<GammaMarket> = resp
            .json()
            .await
            .context("Failed to parse Gamma markets response")?;

        markets
            .into_iter()
            .next()
            .with_context(|| format!("No Gamma market for slug {slug}"))
    }
}

#[async_trait]
impl QuoteSource for GammaQuotes {
    async fn quote(&self) -> Result<PriceSnapshot> {
        let market = self.fetch_market().await?;
        if market.closed {
            anyhow::bail!("Market {} is closed", market.slug);
        }
        market
            .snapshot()
            .with_context(|| format!("No usable prices for {}", market.slug))
    }

    fn open_market(&self, url: &str) -> Result<()> {
        let slug = slug_from_url(url).with_context(|| format!("No market slug in {url}"))?;
        info!(slug = %slug, "Tracking Polymarket market");
        *self.slug.lock().unwrap_or_else(|e| e.into_inner()) = slug;
        Ok(())
    }
}
