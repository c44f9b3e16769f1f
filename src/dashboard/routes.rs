//! Control API route handlers.
//!
//! Reads come from the session's published view; writes are forwarded to
//! the session queue. All endpoints return JSON.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::ladder::book::{LadderPhase, TIER_COUNT};
use crate::session::SessionHandle;
use crate::types::{PriceSnapshot, Side, TradeRecord};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct ControlState {
    pub session: SessionHandle,
    pub started_at: DateTime<Utc>,
}

impl ControlState {
    pub fn new(session: SessionHandle) -> Self {
        Self {
            session,
            started_at: Utc::now(),
        }
    }
}

pub type AppState = Arc<ControlState>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Session unavailable: {0}")]
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = Json(json!({
            "ok": false,
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub phase: String,
    pub is_trading: bool,
    pub cycle_id: u64,
    pub trade_count: u64,
    pub sell_count: u64,
    pub restarts: u64,
    pub default_entry_price: Decimal,
    pub market_url: String,
    pub url_history: Vec<String>,
    pub last_prices: Option<PriceSnapshot>,
    pub uptime_secs: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TierRow {
    pub tier: usize,
    pub yes_target: Decimal,
    pub yes_stake: Decimal,
    pub no_target: Decimal,
    pub no_stake: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct LadderResponse {
    pub phase: LadderPhase,
    pub tiers: Vec<TierRow>,
    pub protective_yes: Decimal,
    pub protective_no: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    pub ok: bool,
    pub command: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefaultPriceRequest {
    pub price: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketUrlRequest {
    pub url: String,
}

fn accepted(command: &'static str) -> Json<CommandResponse> {
    Json(CommandResponse { ok: true, command })
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let view = state.session.view();
    Json(StatusResponse {
        status: view.status.to_string(),
        phase: view.phase.to_string(),
        is_trading: state.session.is_trading(),
        cycle_id: view.cycle_id,
        trade_count: view.trade_count,
        sell_count: view.sell_count,
        restarts: view.restarts,
        default_entry_price: view.default_entry_price,
        market_url: view.market_url,
        url_history: view.url_history,
        last_prices: view.last_prices,
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

/// GET /api/ladder
pub async fn get_ladder(State(state): State<AppState>) -> Json<LadderResponse> {
    let view = state.session.view();
    let book = &view.book;
    let tiers = (0..TIER_COUNT)
        .map(|tier| {
            let yes = book.tier(Side::Yes, tier);
            let no = book.tier(Side::No, tier);
            TierRow {
                tier,
                yes_target: yes.target_price,
                yes_stake: yes.stake_amount,
                no_target: no.target_price,
                no_stake: no.stake_amount,
            }
        })
        .collect();

    Json(LadderResponse {
        phase: view.phase,
        tiers,
        protective_yes: book.protective(Side::Yes),
        protective_no: book.protective(Side::No),
    })
}

/// GET /api/trades
pub async fn get_trades(State(state): State<AppState>) -> Json<Vec<TradeRecord>> {
    Json(state.session.view().recent_trades)
}

/// POST /api/start
pub async fn post_start(
    State(state): State<AppState>,
) -> Result<Json<CommandResponse>, ApiError> {
    state
        .session
        .start()
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    Ok(accepted("start"))
}

/// POST /api/stop
pub async fn post_stop(State(state): State<AppState>) -> Result<Json<CommandResponse>, ApiError> {
    state
        .session
        .stop()
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    Ok(accepted("stop"))
}

/// POST /api/restart
pub async fn post_restart(
    State(state): State<AppState>,
) -> Result<Json<CommandResponse>, ApiError> {
    state
        .session
        .force_restart()
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    Ok(accepted("restart"))
}

/// POST /api/default-price  `{"price": 0.55}`
pub async fn post_default_price(
    State(state): State<AppState>,
    Json(req): Json<DefaultPriceRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    if req.price <= Decimal::ZERO || req.price >= Decimal::ONE {
        return Err(ApiError::BadRequest(format!(
            "price must be between 0 and 1, got {}",
            req.price
        )));
    }
    state
        .session
        .set_default_price(req.price)
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    Ok(accepted("default-price"))
}

/// POST /api/market  `{"url": "https://polymarket.com/event/..."}`
pub async fn post_market(
    State(state): State<AppState>,
    Json(req): Json<MarketUrlRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    if !req.url.trim().starts_with("http") {
        return Err(ApiError::BadRequest(format!("not a URL: {}", req.url)));
    }
    state
        .session
        .set_market_url(&req.url)
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    Ok(accepted("market"))
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
