//! Connection health monitor.
//!
//! Runs beside the session and never trades. Three independent checks:
//! - URL integrity (1 s): navigate back when the page drifted off the market
//! - login state (10 s): log back in when logged out
//! - page refresh (10 min): reload, skipped while a trade is in progress
//!
//! Consecutive check errors past the configured limit are reported to the
//! session as lost connectivity, which disarms the ladder.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::SessionHandle;
use crate::config::HealthConfig;
use crate::ladder::StopToken;
use crate::market::HealthCheck;
use crate::types::LadderError;

pub struct HealthMonitor {
    conn: Arc<dyn HealthCheck>,
    handle: SessionHandle,
    config: HealthConfig,
    failures: u32,
    reported: bool,
}

impl HealthMonitor {
    pub fn new(conn: Arc<dyn HealthCheck>, handle: SessionHandle, config: HealthConfig) -> Self {
        Self {
            conn,
            handle,
            config,
            failures: 0,
            reported: false,
        }
    }

    /// Run until `shutdown` is stopped.
    pub async fn run(mut self, shutdown: StopToken) {
        let mut url_tick = interval(Duration::from_secs(self.config.url_check_secs));
        let mut login_tick = interval(Duration::from_secs(self.config.login_check_secs));
        let refresh = Duration::from_secs(self.config.refresh_interval_secs);
        let mut reload_tick = interval_at(Instant::now() + refresh, refresh);
        for tick in [&mut url_tick, &mut login_tick, &mut reload_tick] {
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        }

        info!(
            url_check_secs = self.config.url_check_secs,
            login_check_secs = self.config.login_check_secs,
            refresh_interval_secs = self.config.refresh_interval_secs,
            "Health monitor started"
        );

        loop {
            let result = tokio::select! {
                _ = shutdown.stopped() => break,
                _ = url_tick.tick() => self.check_url().await,
                _ = login_tick.tick() => self.check_login().await,
                _ = reload_tick.tick() => self.reload().await,
            };
            self.record(result).await;
        }
        debug!("Health monitor stopped");
    }

    pub async fn check_url(&self) -> anyhow::Result<()> {
        let target = self.handle.view().market_url;
        if target.is_empty() {
            return Ok(());
        }
        let current = self.conn.current_url().await?;
        if current != target {
            warn!(current = %current, target = %target, "Page drifted off market, navigating back");
            self.conn.navigate(&target).await?;
        }
        Ok(())
    }

    pub async fn check_login(&self) -> anyhow::Result<()> {
        if !self.conn.is_logged_in().await? {
            warn!("Session logged out, logging back in");
            self.conn.login().await?;
            info!("Logged back in");
        }
        Ok(())
    }

    pub async fn reload(&self) -> anyhow::Result<()> {
        if self.handle.is_trading() {
            debug!("Trade in progress, skipping page refresh");
            return Ok(());
        }
        self.conn.reload().await?;
        debug!("Page refreshed");
        Ok(())
    }

    async fn record(&mut self, result: anyhow::Result<()>) {
        match result {
            Ok(()) => {
                if self.failures > 0 {
                    info!(failures = self.failures, "Connection recovered");
                }
                self.failures = 0;
                self.reported = false;
            }
            Err(e) => {
                self.failures += 1;
                warn!(failures = self.failures, error = %e, "Health check failed");
                if self.failures >= self.config.max_connection_failures && !self.reported {
                    self.reported = true;
                    let lost = LadderError::Connectivity(format!(
                        "{} consecutive health check failures: {e}",
                        self.failures
                    ));
                    error!(error = %lost, "Reporting connectivity loss");
                    if let Err(e) = self.handle.connectivity_lost(lost.to_string()).await {
                        warn!(error = %e, "Session gone, connectivity loss not delivered");
                    }
                }
            }
        }
    }
}
