//! Persistence layer.
//!
//! Saves and loads the ladder snapshot to/from a JSON file: tier targets
//! and stakes, stake percentages, default entry price, counters and the
//! recent market URL history.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::ladder::{LadderBook, StakePercents};
use crate::types::LadderError;

/// Default state file path.
pub const DEFAULT_STATE_FILE: &str = "ladder_state.json";

/// Number of market URLs remembered, most recent first.
pub const URL_HISTORY_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LadderSnapshot {
    pub book: LadderBook,
    pub percents: StakePercents,
    pub default_entry_price: Decimal,
    #[serde(default)]
    pub cycle_id: u64,
    #[serde(default)]
    pub trade_count: u64,
    #[serde(default)]
    pub sell_count: u64,
    #[serde(default)]
    pub market_url: String,
    #[serde(default)]
    pub url_history: Vec<String>,
    pub saved_at: DateTime<Utc>,
}

impl LadderSnapshot {
    /// Record `url` as the active market, keeping the history deduplicated,
    /// most recent first, at most [`URL_HISTORY_LEN`] entries.
    pub fn push_url_history(&mut self, url: &str) {
        let url = url.trim();
        if url.is_empty() {
            return;
        }
        self.url_history.retain(|u| u != url);
        self.url_history.insert(0, url.to_string());
        self.url_history.truncate(URL_HISTORY_LEN);
        self.market_url = url.to_string();
    }
}

/// Snapshot storage. Synchronous: writes are small and infrequent.
#[cfg_attr(test, mockall::automock)]
pub trait LadderStore: Send + Sync {
    fn load(&self) -> Result<Option<LadderSnapshot>>;
    fn save(&self, snapshot: &LadderSnapshot) -> Result<()>;
}

/// Pretty-printed JSON file store.
#[derive(Debug, Clone)]
pub struct JsonLadderStore {
    path: PathBuf,
}

impl JsonLadderStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the state file (for testing or reset).
    pub fn delete(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to delete state file {}", self.path.display()))?;
        }
        Ok(())
    }
}

impl Default for JsonLadderStore {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_FILE)
    }
}

impl LadderStore for JsonLadderStore {
    fn load(&self) -> Result<Option<LadderSnapshot>> {
        let path = self.path.display().to_string();

        if !self.path.exists() {
            info!(path, "No saved ladder found, starting fresh");
            return Ok(None);
        }

        let json = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read ladder from {path}"))?;

        let snapshot: LadderSnapshot = serde_json::from_str(&json)
            .map_err(|e| LadderError::Storage(format!("corrupt ladder file {path}: {e}")))?;

        info!(
            path,
            cycle_id = snapshot.cycle_id,
            trade_count = snapshot.trade_count,
            entry_price = %snapshot.default_entry_price,
            "Ladder loaded from disk"
        );

        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &LadderSnapshot) -> Result<()> {
        let path = self.path.display().to_string();
        let json =
            serde_json::to_string_pretty(snapshot).context("Failed to serialise ladder snapshot")?;

        std::fs::write(&self.path, &json)
            .with_context(|| format!("Failed to write ladder to {path}"))?;

        debug!(path, cycle_id = snapshot.cycle_id, "Ladder saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
