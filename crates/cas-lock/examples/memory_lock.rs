//! Fail-Open locking against the in-memory store.
//!
//! Run with: cargo run --example memory_lock

use std::sync::Arc;
use std::time::Duration;

use cas_lock::FailOpenClient;
use cas_lock_memory::MemoryLockStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryLockStore::new());

    let client = FailOpenClient::builder(store.clone())
        .lease_duration(Duration::from_secs(2))
        .heartbeat_period(Duration::from_millis(500))
        .build()?;

    let handle = client.acquire("demo-resource").await?;
    println!(
        "acquired '{}' as {} with fencing token {}",
        handle.id(),
        handle.owner(),
        handle.fencing_token()
    );

    // Hold the lock across a couple of heartbeats.
    tokio::time::sleep(Duration::from_millis(1200)).await;
    println!(
        "store saw {} writes while holding",
        store.writes("demo-resource").len()
    );

    handle.release().await?;
    println!("released");

    // The next acquisition proceeds immediately with the next token.
    let next = client.acquire("demo-resource").await?;
    println!("re-acquired with fencing token {}", next.fencing_token());
    next.release().await?;

    Ok(())
}
