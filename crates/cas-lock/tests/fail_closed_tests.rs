//! Integration tests for the Fail-Closed client against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use cas_lock::{FailClosedClient, LockError};
use cas_lock_core::record::{Guid, LockRecord};
use cas_lock_memory::MemoryLockStore;

fn client(
    store: &Arc<MemoryLockStore>,
    retry_count: u32,
    acquire_period: Duration,
) -> FailClosedClient<MemoryLockStore> {
    FailClosedClient::builder(store.clone())
        .owner("tester@host")
        .retry_count(retry_count)
        .acquire_period(acquire_period)
        .build()
        .unwrap()
}

fn foreign_record(id: &str) -> LockRecord {
    LockRecord {
        id: id.to_string(),
        owner: "someone-else@elsewhere".to_string(),
        guid: Guid::generate(),
        fencing_token: None,
        lease_duration_ms: None,
        lock_acquired_time_unix_ms: None,
        expires_at: None,
    }
}

#[tokio::test]
async fn uncontested_acquire_and_release() {
    let store = Arc::new(MemoryLockStore::new());
    let client = client(&store, 1, Duration::from_millis(10));

    let handle = client.acquire("A").await.unwrap();

    let record = store.record("A").unwrap();
    assert_eq!(record.guid, *handle.guid());
    assert_eq!(record.owner, "tester@host");
    assert_eq!(record.fencing_token, None);
    assert_eq!(record.lease_duration_ms, None);
    assert!(record.expires_at.is_some());

    handle.release().await.unwrap();
    assert!(store.record("A").is_none());
}

#[tokio::test(start_paused = true)]
async fn contention_exhausts_retries_with_acquire_period_between() {
    let store = Arc::new(MemoryLockStore::new());
    store.insert(foreign_record("A"));

    let client = client(&store, 2, Duration::from_millis(10));

    let start = tokio::time::Instant::now();
    let err = client.acquire("A").await.unwrap_err();
    let elapsed = start.elapsed();

    // Three attempts, two sleeps of the acquire period between them.
    assert!(matches!(err, LockError::FailedToAcquireLock { .. }));
    assert!(elapsed >= Duration::from_millis(20), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(40), "elapsed {elapsed:?}");

    // Still the stranger's record.
    assert_eq!(store.record("A").unwrap().owner, "someone-else@elsewhere");
}

#[tokio::test]
async fn zero_retries_fail_on_first_contention() {
    let store = Arc::new(MemoryLockStore::new());
    store.insert(foreign_record("A"));

    let client = client(&store, 0, Duration::from_millis(10));
    let operations_before = store.operation_count();
    let err = client.acquire("A").await.unwrap_err();

    assert!(matches!(err, LockError::FailedToAcquireLock { .. }));
    assert_eq!(store.operation_count(), operations_before + 1);
}

#[tokio::test]
async fn release_of_stolen_lock_is_reported() {
    let store = Arc::new(MemoryLockStore::new());
    let client = client(&store, 1, Duration::from_millis(10));

    let handle = client.acquire("A").await.unwrap();

    // A reaper removed the record and a stranger re-acquired it.
    store.insert(foreign_record("A"));

    let err = handle.release().await.unwrap_err();
    assert!(matches!(err, LockError::FailedToReleaseLock { .. }));
}

#[tokio::test]
async fn backend_errors_are_not_retried() {
    let store = Arc::new(MemoryLockStore::new());
    store.set_fail_puts(true);

    let client = client(&store, 3, Duration::from_millis(10));
    let operations_before = store.operation_count();
    let err = client.acquire("A").await.unwrap_err();

    assert!(matches!(err, LockError::Backend(_)));
    assert_eq!(store.operation_count(), operations_before + 1);
}

#[tokio::test]
async fn per_acquire_ttl_overrides_configured_default() {
    let store = Arc::new(MemoryLockStore::new());
    let client = client(&store, 1, Duration::from_millis(10));

    let handle = client
        .acquire_with_ttl("A", Duration::from_secs(60))
        .await
        .unwrap();

    let expires_at = store.record("A").unwrap().expires_at.unwrap();
    let now_secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    assert!(expires_at >= now_secs + 55 && expires_at <= now_secs + 65);

    handle.release().await.unwrap();
}

#[test]
fn builder_requires_acquire_period() {
    let store = Arc::new(MemoryLockStore::new());
    let err = FailClosedClient::builder(store).build().unwrap_err();
    assert!(matches!(err, LockError::Configuration(_)));
}

#[test]
fn builder_rejects_empty_owner() {
    let store = Arc::new(MemoryLockStore::new());
    let err = FailClosedClient::builder(store)
        .acquire_period(Duration::from_millis(10))
        .owner("")
        .build()
        .unwrap_err();
    assert!(matches!(err, LockError::Configuration(_)));
}

#[test]
fn builder_rejects_zero_acquire_period() {
    let store = Arc::new(MemoryLockStore::new());
    let err = FailClosedClient::builder(store)
        .acquire_period(Duration::ZERO)
        .build()
        .unwrap_err();
    assert!(matches!(err, LockError::Configuration(_)));
}
