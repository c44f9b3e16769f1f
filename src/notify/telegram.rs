//! Telegram Bot API notifier.
//!
//! Sends each settled trade via `sendMessage`. Three attempts, fixed 5 s
//! delay between them; a final failure is logged and dropped. Pending
//! retries are abandoned once the shutdown token fires.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::{render_message, render_subject, Notifier, NotifyContext};
use crate::ladder::{RetryPolicy, StopToken};
use crate::types::TradeRecord;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Attempts per notification.
const MAX_ATTEMPTS: u32 = 3;

/// Fixed delay between attempts.
const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    disable_web_page_preview: bool,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct TelegramNotifier {
    http: Client,
    base_url: String,
    bot_token: SecretString,
    chat_id: String,
    ctx: NotifyContext,
    retry_delay: Duration,
    stop: StopToken,
}

impl TelegramNotifier {
    pub fn new(bot_token: SecretString, chat_id: String, ctx: NotifyContext) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to build Telegram HTTP client")?;

        Ok(Self {
            http,
            base_url: TELEGRAM_API_URL.to_string(),
            bot_token,
            chat_id,
            ctx,
            retry_delay: RETRY_DELAY,
            stop: StopToken::new(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Abandon pending retries once `stop` fires (process shutdown).
    pub fn with_stop(mut self, stop: StopToken) -> Self {
        self.stop = stop;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.base_url,
            self.bot_token.expose_secret()
        )
    }

    fn body(&self, record: &TradeRecord) -> String {
        format!(
            "{}\n\n{}",
            render_subject(record),
            render_message(&self.ctx, record)
        )
    }

    async fn send_once(&self, text: &str) -> Result<()> {
        let request = SendMessage {
            chat_id: &self.chat_id,
            text: text.to_string(),
            disable_web_page_preview: true,
        };

        let resp = self
            .http
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .context("Telegram request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Telegram API error {status}: {body}");
        }
        Ok(())
    }

    /// Send with bounded retries. Returns the number of attempts used on
    /// success.
    pub async fn send(&self, text: &str) -> Result<u32> {
        let policy = RetryPolicy::bounded(MAX_ATTEMPTS, self.retry_delay);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.send_once(text).await {
                Ok(()) => return Ok(attempt),
                Err(e) => {
                    warn!(attempt, error = %e, "Telegram send failed");
                    if !policy.pause(attempt, &self.stop).await {
                        return Err(
                            e.context(format!("Telegram send failed after {attempt} attempts"))
                        );
                    }
                    debug!(
                        attempt,
                        delay_ms = self.retry_delay.as_millis() as u64,
                        "Retrying Telegram send"
                    );
                }
            }
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, record: &TradeRecord) {
        let text = self.body(record);
        if let Err(e) = self.send(&text).await {
            error!(
                trade = %record.label(),
                error = %e,
                "Giving up on trade notification"
            );
        }
    }
}
