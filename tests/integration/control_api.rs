//! Control API over a live session.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use rust_decimal_macros::dec;
use std::sync::Arc;
use tower::ServiceExt;

use ladderbot::dashboard::build_router;
use ladderbot::dashboard::routes::ControlState;
use ladderbot::types::SessionStatus;

use crate::harness::{temp_store_path, wait_until, Harness};

async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_start_and_status_through_api() {
    let h = Harness::new(temp_store_path());
    let (handle, _task) = h.spawn_session();
    let app = build_router(Arc::new(ControlState::new(handle.clone())));

    let resp = app.clone().oneshot(post("/api/start", "")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    wait_until(&handle, |v| v.status == SessionStatus::Running).await;

    let resp = app.clone().oneshot(get("/api/status")).await.unwrap();
    let json = json_body(resp).await;
    assert_eq!(json["status"], "RUNNING");
    assert_eq!(json["phase"], "TIER0_ARMED");
    assert_eq!(json["trade_count"], 0);

    let resp = app.oneshot(get("/api/ladder")).await.unwrap();
    let json = json_body(resp).await;
    assert_eq!(json["tiers"][0]["yes_stake"], 42.0);
    assert_eq!(json["tiers"][5]["no_stake"], 306.91);
}

#[tokio::test(start_paused = true)]
async fn test_trades_listed_after_fill() {
    let h = Harness::new(temp_store_path());
    let (handle, _task) = h.spawn_session();
    let app = build_router(Arc::new(ControlState::new(handle.clone())));

    app.clone().oneshot(post("/api/start", "")).await.unwrap();
    wait_until(&handle, |v| v.status == SessionStatus::Running).await;
    h.quote(dec!(0.56), dec!(0.45));
    wait_until(&handle, |v| v.trade_count == 1).await;

    let resp = app.oneshot(get("/api/trades")).await.unwrap();
    let json = json_body(resp).await;
    let trades = json.as_array().unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0]["side"], "Yes");
    assert_eq!(trades[0]["tier"], 0);
}

#[tokio::test(start_paused = true)]
async fn test_market_url_and_price_updates() {
    let h = Harness::new(temp_store_path());
    let (handle, _task) = h.spawn_session();
    let app = build_router(Arc::new(ControlState::new(handle.clone())));

    let resp = app
        .clone()
        .oneshot(post(
            "/api/market",
            r#"{"url": "https://polymarket.com/event/eth-up-or-down"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    wait_until(&handle, |v| v.market_url.ends_with("eth-up-or-down")).await;

    let resp = app
        .clone()
        .oneshot(post("/api/default-price", r#"{"price": 0.58}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    wait_until(&handle, |v| v.default_entry_price == dec!(0.58)).await;

    let resp = app
        .oneshot(post("/api/default-price", r#"{"price": 1.2}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = json_body(resp).await;
    assert_eq!(json["ok"], false);
}
