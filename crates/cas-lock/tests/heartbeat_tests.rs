//! Integration tests for heartbeat behavior of Fail-Open handles.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use cas_lock::FailOpenClient;
use cas_lock_core::record::Guid;
use cas_lock_memory::MemoryLockStore;

fn client(
    store: &Arc<MemoryLockStore>,
    lease: Duration,
    heartbeat: Duration,
) -> FailOpenClient<MemoryLockStore> {
    FailOpenClient::builder(store.clone())
        .owner("tester@host")
        .lease_duration(lease)
        .heartbeat_period(heartbeat)
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn heartbeat_rotates_guid_and_keeps_token_and_owner() {
    let store = Arc::new(MemoryLockStore::new());
    let client = client(&store, Duration::from_millis(100), Duration::from_millis(20));

    let handle = client.acquire("H").await.unwrap();
    tokio::time::sleep(Duration::from_millis(70)).await;

    let writes = store.writes("H");
    let distinct_guids: HashSet<_> = writes.iter().map(|r| r.guid.clone()).collect();
    assert!(
        distinct_guids.len() >= 3,
        "expected at least 3 distinct guids, saw {}",
        distinct_guids.len()
    );
    for write in &writes {
        assert_eq!(write.fencing_token, Some(1));
        assert_eq!(write.owner, "tester@host");
    }

    // The handle tracks the latest rotation.
    assert_eq!(store.record("H").unwrap().guid, handle.guid());
}

#[tokio::test(start_paused = true)]
async fn release_stops_the_heartbeat_and_neutralizes_the_lease() {
    let store = Arc::new(MemoryLockStore::new());
    let client = client(&store, Duration::from_millis(100), Duration::from_millis(20));

    let handle = client.acquire("H").await.unwrap();
    tokio::time::sleep(Duration::from_millis(70)).await;

    handle.release().await.unwrap();
    assert_eq!(store.record("H").unwrap().lease_duration_ms, Some(1));

    // A released handle is quiet: no store operation originates from it
    // after the release returns.
    let operations_after_release = store.operation_count();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(store.operation_count(), operations_after_release);

    // The next configuration takes over immediately with the next token.
    let other = FailOpenClient::builder(store.clone())
        .owner("other@host")
        .lease_duration(Duration::from_millis(100))
        .build()
        .unwrap();
    let next = other.acquire("H").await.unwrap();
    assert_eq!(next.fencing_token(), 2);
}

#[tokio::test(start_paused = true)]
async fn dropped_handle_stops_heartbeating() {
    let store = Arc::new(MemoryLockStore::new());
    let client = client(&store, Duration::from_millis(100), Duration::from_millis(20));

    let handle = client.acquire("H").await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    drop(handle);

    let operations_after_drop = store.operation_count();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(store.operation_count(), operations_after_drop);
}

#[tokio::test(start_paused = true)]
async fn external_rotation_surfaces_lost_ownership() {
    let store = Arc::new(MemoryLockStore::new());
    let client = client(&store, Duration::from_millis(100), Duration::from_millis(20));

    let handle = client.acquire("H").await.unwrap();

    // Another process rotates the witness out from under the holder.
    let mut stolen = store.record("H").unwrap();
    stolen.guid = Guid::generate();
    stolen.fencing_token = Some(2);
    store.insert(stolen);

    let mut lost = handle.lost_token().clone();
    lost.changed().await.unwrap();
    let failure = lost.borrow().clone().unwrap();
    assert!(failure.lost_ownership);

    // The heartbeat has stopped for good.
    let operations_after_failure = store.operation_count();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(store.operation_count(), operations_after_failure);

    // Release after a lost lease is a best-effort no-op.
    handle.release().await.unwrap();
    assert_eq!(store.operation_count(), operations_after_failure);
    assert_eq!(store.record("H").unwrap().fencing_token, Some(2));
}

#[tokio::test(start_paused = true)]
async fn transport_failure_surfaces_without_lost_ownership() {
    let store = Arc::new(MemoryLockStore::new());
    let client = client(&store, Duration::from_millis(100), Duration::from_millis(20));

    let handle = client.acquire("H").await.unwrap();
    store.set_fail_puts(true);

    let mut lost = handle.lost_token().clone();
    lost.changed().await.unwrap();
    let failure = lost.borrow().clone().unwrap();
    assert!(!failure.lost_ownership);

    store.set_fail_puts(false);
    handle.release().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn heartbeat_writes_never_advance_the_token() {
    let store = Arc::new(MemoryLockStore::new());
    let client = client(&store, Duration::from_millis(60), Duration::from_millis(10));

    // Second acquisition of the same id: token 2.
    let first = client.acquire("H").await.unwrap();
    first.release().await.unwrap();
    let handle = client.acquire("H").await.unwrap();
    assert_eq!(handle.fencing_token(), 2);

    tokio::time::sleep(Duration::from_millis(45)).await;

    let tokens: HashSet<_> = store
        .writes("H")
        .iter()
        .skip(2) // first acquisition and its release
        .map(|r| r.fencing_token)
        .collect();
    assert_eq!(tokens, HashSet::from([Some(2)]));
}
