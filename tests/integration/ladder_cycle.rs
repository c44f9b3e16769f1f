//! Full ladder cycles through a live session.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use ladderbot::ladder::book::{PROTECT_HIGH, PROTECT_LOW};
use ladderbot::ladder::LadderPhase;
use ladderbot::storage::LadderStore;
use ladderbot::types::{SessionStatus, Side};

use crate::harness::{drain_tasks, temp_store_path, wait_until, Harness, ENTRY};

/// Quote that fires an armed Yes rung at the entry price.
const YES_UP: (Decimal, Decimal) = (dec!(0.56), dec!(0.45));
/// Quote that fires an armed No rung at the entry price.
const NO_UP: (Decimal, Decimal) = (dec!(0.46), dec!(0.55));

#[tokio::test(start_paused = true)]
async fn test_zig_zag_cycle_closes_on_take_profit() {
    let h = Harness::new(temp_store_path());
    let (handle, _task) = h.spawn_session();

    handle.start().await.unwrap();
    wait_until(&handle, |v| {
        v.status == SessionStatus::Running && v.phase == LadderPhase::EntryArmed
    })
    .await;

    h.quote(YES_UP.0, YES_UP.1);
    wait_until(&handle, |v| v.trade_count == 1).await;
    let view = handle.view();
    assert_eq!(view.phase, LadderPhase::Escalating { side: Side::No, tier: 1 });
    assert_eq!(view.book.protective(Side::Yes), PROTECT_HIGH);
    assert_eq!(view.book.protective(Side::No), PROTECT_HIGH);

    h.quote(NO_UP.0, NO_UP.1);
    wait_until(&handle, |v| v.trade_count == 2).await;
    assert_eq!(
        handle.view().phase,
        LadderPhase::Escalating { side: Side::Yes, tier: 2 }
    );

    // Yes runs to the take-profit line.
    h.quote(dec!(0.87), dec!(0.14));
    wait_until(&handle, |v| v.cycle_id == 1 && v.status == SessionStatus::Running).await;

    let view = handle.view();
    assert_eq!(view.sell_count, 2);
    assert_eq!(view.phase, LadderPhase::EntryArmed);
    assert_eq!(view.book.tier(Side::Yes, 0).target_price, ENTRY);
    assert_eq!(view.book.tier(Side::No, 0).target_price, ENTRY);
    assert!(h.exchange.position(Side::Yes).await.is_none());
    assert!(h.exchange.position(Side::No).await.is_none());

    drain_tasks().await;
    let mut labels = h.notifier.labels();
    labels.sort();
    assert_eq!(labels, vec!["Buy No 1", "Buy Yes 0", "Sell No", "Sell Yes"]);

    let saved = h.store.load().unwrap().unwrap();
    assert_eq!(saved.cycle_id, 1);
    assert_eq!(saved.sell_count, 2);
    assert_eq!(saved.book.armed_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_tier_arms_asymmetric_close() {
    let h = Harness::new(temp_store_path());
    let (handle, _task) = h.spawn_session();

    handle.start().await.unwrap();
    wait_until(&handle, |v| v.status == SessionStatus::Running).await;

    // Yes 0, No 1, Yes 2, No 3, Yes 4, No 5.
    for n in 1..=6u64 {
        let (yes, no) = if n % 2 == 1 { YES_UP } else { NO_UP };
        h.quote(yes, no);
        wait_until(&handle, |v| v.trade_count == n).await;
    }

    let view = handle.view();
    assert_eq!(view.phase, LadderPhase::AwaitingClose);
    assert_eq!(view.book.protective(Side::No), PROTECT_HIGH);
    assert_eq!(view.book.protective(Side::Yes), PROTECT_LOW);
    assert_eq!(view.book.armed_count(), 0);

    // Yes recovers to the low protective line: everything is sold.
    h.quote(dec!(0.52), dec!(0.49));
    wait_until(&handle, |v| v.cycle_id == 1 && v.status == SessionStatus::Running).await;
    assert_eq!(handle.view().sell_count, 2);
    assert!(h.exchange.position(Side::Yes).await.is_none());
    assert!(h.exchange.position(Side::No).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_ladder_survives_process_restart() {
    let path = temp_store_path();
    let first = Harness::new(path.clone());
    let (handle, task) = first.spawn_session();

    handle.start().await.unwrap();
    wait_until(&handle, |v| v.status == SessionStatus::Running).await;
    first.quote(YES_UP.0, YES_UP.1);
    wait_until(&handle, |v| v.trade_count == 1).await;

    handle.shutdown().await.unwrap();
    task.await.unwrap();

    // Same state file, new process.
    let second = Harness::new(path);
    let (handle, _task) = second.spawn_session();
    let view = handle.view();
    assert_eq!(view.status, SessionStatus::Idle);
    assert_eq!(view.trade_count, 1);
    assert_eq!(view.phase, LadderPhase::Escalating { side: Side::No, tier: 1 });
    assert_eq!(view.default_entry_price, ENTRY);
    drop(first);
}

#[tokio::test(start_paused = true)]
async fn test_stop_halts_trading() {
    let h = Harness::new(temp_store_path());
    let (handle, _task) = h.spawn_session();

    handle.start().await.unwrap();
    wait_until(&handle, |v| v.status == SessionStatus::Running).await;
    handle.stop().await.unwrap();
    wait_until(&handle, |v| v.status == SessionStatus::Stopped).await;

    h.quote(YES_UP.0, YES_UP.1);
    tokio::time::sleep(std::time::Duration::from_secs(30)).await;
    assert_eq!(handle.view().trade_count, 0);
    assert_eq!(h.exchange.order_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_default_price_change_moves_entry() {
    let h = Harness::new(temp_store_path());
    let (handle, _task) = h.spawn_session();

    handle.set_default_price(dec!(0.60)).await.unwrap();
    wait_until(&handle, |v| v.default_entry_price == dec!(0.60)).await;
    handle.start().await.unwrap();
    wait_until(&handle, |v| v.status == SessionStatus::Running).await;

    // Old entry price no longer fires.
    h.quote(YES_UP.0, YES_UP.1);
    tokio::time::sleep(std::time::Duration::from_secs(10)).await;
    assert_eq!(handle.view().trade_count, 0);

    h.quote(dec!(0.61), dec!(0.40));
    wait_until(&handle, |v| v.trade_count == 1).await;
    assert_eq!(
        handle.view().book.tier(Side::No, 1).target_price,
        dec!(0.60)
    );
}
