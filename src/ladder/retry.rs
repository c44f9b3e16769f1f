//! Retry discipline: a cancellation token plus fixed-backoff retry policy.
//!
//! Every retry loop in the engine checks the [`StopToken`] at its head and
//! sleeps through it, so a stop request ends the loop at the next iteration
//! boundary without interrupting a half-finished protocol step.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Shared, cloneable stop flag observed by retry loops and the tick loop.
#[derive(Debug, Clone)]
pub struct StopToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for StopToken {
    fn default() -> Self {
        Self::new()
    }
}

impl StopToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    /// Re-arm after a stop (used on start and restart).
    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the token is stopped.
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    /// Sleep for `duration` unless stopped first.
    ///
    /// Returns `true` when the full duration elapsed, `false` if the token
    /// was (or became) stopped.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let mut rx = self.tx.subscribe();
        if *rx.borrow_and_update() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.is_stopped(),
            _ = rx.wait_for(|stopped| *stopped) => false,
        }
    }
}

/// Fixed-backoff retry policy. `max_attempts: None` retries until stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: Option<u32>,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn unbounded(backoff: Duration) -> Self {
        Self {
            max_attempts: None,
            backoff,
        }
    }

    pub fn bounded(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            backoff,
        }
    }

    /// Called after failed attempt number `attempt` (1-based). Waits the
    /// backoff and reports whether another attempt should be made.
    pub async fn pause(&self, attempt: u32, stop: &StopToken) -> bool {
        if let Some(max) = self.max_attempts {
            if attempt >= max {
                return false;
            }
        }
        stop.sleep(self.backoff).await
    }
}
