//! Poller lifecycle under a paused clock: terminal stop conditions, error
//! tolerance, cancellation, and the 30-minute auto-cancel.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::sleep;

use naira_bridge::domain::TransactionStatus;
use naira_bridge::ports::TransactionStore;
use naira_bridge::services::PollerConfig;

use common::{harness_with_poller_config, insert_crypto_to_cash};

fn poller_config() -> PollerConfig {
    PollerConfig {
        interval: Duration::from_secs(15),
        timeout: Duration::from_secs(30 * 60),
    }
}

#[tokio::test(start_paused = true)]
async fn never_confirmed_transfer_is_auto_cancelled() {
    // Scenario E: the provider never reports anything but pending.
    let h = harness_with_poller_config(poller_config());
    let tx = insert_crypto_to_cash(&h, "tr_stale").await;

    h.pollers.spawn("tr_stale".to_string()).await;

    // Just before the deadline nothing has changed.
    sleep(Duration::from_secs(29 * 60)).await;
    assert_eq!(
        h.store.get(tx.id).await.unwrap().status,
        TransactionStatus::Pending
    );

    // Past the deadline the transaction is cancelled and annotated.
    sleep(Duration::from_secs(61 + 15)).await;
    let tx = h.store.get(tx.id).await.unwrap();
    assert_eq!(tx.status, TransactionStatus::Cancelled);
    assert_eq!(tx.metadata.unwrap()["auto_cancelled"], true);

    assert_eq!(h.pollers.active_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn poller_stops_after_settlement() {
    let h = harness_with_poller_config(poller_config());
    let tx = insert_crypto_to_cash(&h, "tr_ok").await;
    h.provider.set_status("funds_received");

    h.pollers.spawn("tr_ok".to_string()).await;
    sleep(Duration::from_secs(16)).await;

    let tx = h.store.get(tx.id).await.unwrap();
    assert_eq!(tx.status, TransactionStatus::Successful);
    assert_eq!(h.pollers.active_count().await, 0);

    // No further polling once the task stopped.
    let polls = h.provider.status_calls.load(Ordering::SeqCst);
    sleep(Duration::from_secs(60)).await;
    assert_eq!(h.provider.status_calls.load(Ordering::SeqCst), polls);
}

#[tokio::test(start_paused = true)]
async fn provider_errors_do_not_stop_the_task() {
    let h = harness_with_poller_config(poller_config());
    let tx = insert_crypto_to_cash(&h, "tr_flaky").await;
    h.provider.fail_status_lookups(true);

    h.pollers.spawn("tr_flaky".to_string()).await;
    sleep(Duration::from_secs(46)).await;

    // Several failed ticks, transaction untouched, task still alive.
    assert!(h.provider.status_calls.load(Ordering::SeqCst) >= 3);
    assert_eq!(
        h.store.get(tx.id).await.unwrap().status,
        TransactionStatus::Pending
    );
    assert_eq!(h.pollers.active_count().await, 1);

    // Once the provider recovers, the next tick settles.
    h.provider.fail_status_lookups(false);
    h.provider.set_status("funds_received");
    sleep(Duration::from_secs(16)).await;

    assert_eq!(
        h.store.get(tx.id).await.unwrap().status,
        TransactionStatus::Successful
    );
    assert_eq!(h.pollers.active_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_the_task_early() {
    let h = harness_with_poller_config(poller_config());
    insert_crypto_to_cash(&h, "tr_webhooked").await;

    h.pollers.spawn("tr_webhooked".to_string()).await;
    sleep(Duration::from_secs(1)).await;
    assert_eq!(h.pollers.active_count().await, 1);

    h.pollers.cancel("tr_webhooked").await;
    sleep(Duration::from_secs(1)).await;
    assert_eq!(h.pollers.active_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn cancelled_provider_status_stops_polling() {
    let h = harness_with_poller_config(poller_config());
    let tx = insert_crypto_to_cash(&h, "tr_cxl").await;
    h.provider.set_status("cancelled");

    h.pollers.spawn("tr_cxl".to_string()).await;
    sleep(Duration::from_secs(16)).await;

    let tx = h.store.get(tx.id).await.unwrap();
    assert_eq!(tx.status, TransactionStatus::Cancelled);
    // Auto-cancel annotation is only for deadline expiry, not provider
    // cancellations.
    assert!(tx
        .metadata
        .map(|m| m.get("auto_cancelled").is_none())
        .unwrap_or(true));
    assert_eq!(h.pollers.active_count().await, 0);
}
