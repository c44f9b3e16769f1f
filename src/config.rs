//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (bot tokens) are referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;

use crate::ladder::book::validate_entry_price;
use crate::ladder::StakePercents;
use crate::types::LadderError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub session: SessionConfig,
    #[serde(default)]
    pub stakes: StakePercents,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub paper: PaperConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub name: String,
    /// Gamma slug of the traded market.
    pub market_slug: String,
    /// Page URL the health monitor keeps the session on. Derived from the
    /// slug when omitted.
    #[serde(default)]
    pub market_url: Option<String>,
    #[serde(default = "default_entry_price")]
    pub default_entry_price: Decimal,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default)]
    pub autostart: bool,
}

fn default_entry_price() -> Decimal {
    dec!(0.54)
}

fn default_tick_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TimingConfig {
    pub settle_delay_ms: u64,
    pub sell_settle_rounds: u32,
    pub verify_backoff_ms: u64,
    pub stake_retry_ms: u64,
    pub wallet_confirm_ms: u64,
    pub history_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 3000,
            sell_settle_rounds: 4,
            verify_backoff_ms: 2000,
            stake_retry_ms: 5000,
            wallet_confirm_ms: 3200,
            history_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PaperConfig {
    pub initial_cash: Decimal,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            initial_cash: dec!(1000),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct HealthConfig {
    pub url_check_secs: u64,
    pub login_check_secs: u64,
    pub refresh_interval_secs: u64,
    /// Consecutive health check failures before the session is disarmed.
    pub max_connection_failures: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            url_check_secs: 1,
            login_check_secs: 10,
            refresh_interval_secs: 600,
            max_connection_failures: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ControlConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AlertsConfig {
    pub telegram_bot_token_env: Option<String>,
    pub telegram_chat_id_env: Option<String>,
    /// Label shown as the host in notifications.
    pub account_label: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: crate::storage::DEFAULT_STATE_FILE.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid config file: {path}"))
    }

    /// Parse and validate configuration text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LadderError> {
        self.stakes.validate()?;
        validate_entry_price(self.session.default_entry_price)?;
        if self.session.market_slug.trim().is_empty() {
            return Err(LadderError::Config("session.market_slug is empty".into()));
        }
        if self.session.tick_interval_ms == 0 {
            return Err(LadderError::Config("session.tick_interval_ms must be > 0".into()));
        }
        if self.health.url_check_secs == 0
            || self.health.login_check_secs == 0
            || self.health.refresh_interval_secs == 0
        {
            return Err(LadderError::Config("health intervals must be > 0".into()));
        }
        Ok(())
    }

    /// Market page URL, derived from the slug when not configured.
    pub fn market_url(&self) -> String {
        self.session
            .market_url
            .clone()
            .unwrap_or_else(|| crate::market::polymarket::market_url(&self.session.market_slug))
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
