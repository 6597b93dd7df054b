//! Distributed mutual exclusion on conditionally-updatable key-value stores.
//!
//! This crate implements a lease- and witness-based distributed lock over any
//! table with per-item compare-and-set semantics (DynamoDB and equivalents).
//! A caller asks to acquire a named lock; the library returns a handle that
//! may be released and, depending on mode, automatically extended while
//! held.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use cas_lock::FailOpenClient;
//! use cas_lock_memory::MemoryLockStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryLockStore::new());
//!
//!     let client = FailOpenClient::builder(store)
//!         .lease_duration(Duration::from_secs(10))
//!         .heartbeat_period(Duration::from_secs(3))
//!         .build()?;
//!
//!     let handle = client.acquire("my-resource").await?;
//!
//!     // Critical section; stamp downstream writes with the fencing token
//!     // so the resource can reject stale holders.
//!     println!("holding token {}", handle.fencing_token());
//!
//!     handle.release().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modes
//!
//! ## Fail-Closed
//!
//! A lock, once written, remains in the store until explicitly released. A
//! crashed holder keeps the lock until the table's TTL reaper removes the
//! record (the client writes an `expiresAt` hint, one day by default).
//! Correctness is preferred over liveness.
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use std::time::Duration;
//! use cas_lock::FailClosedClient;
//! # use cas_lock_memory::MemoryLockStore;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let store = Arc::new(MemoryLockStore::new());
//! let client = FailClosedClient::builder(store)
//!     .acquire_period(Duration::from_millis(250))
//!     .retry_count(3)
//!     .build()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Fail-Open
//!
//! A lock carries a lease, extended by heartbeat. If the holder stops
//! heartbeating, another acquirer succeeds after the lease elapses by
//! stealing the record with a guid+token compare-and-set. Each successful
//! acquisition advances a monotonic fencing token. Heartbeat failures are
//! surfaced on the handle's [`lost_token`](FailOpenHandle::lost_token)
//! channel and mean the lock must be treated as lost.
//!
//! # Stores
//!
//! Any [`LockStore`] works: `cas-lock-dynamo` adapts DynamoDB,
//! `cas-lock-memory` keeps the table in process memory for tests and
//! single-process use. The trait needs only a conditional put, a strongly
//! consistent get, and a conditional delete.
//!
//! # Cancellation
//!
//! Acquisition is an ordinary future: dropping it aborts pending waits and
//! retries without observing their I/O. A released handle never schedules
//! further heartbeats, even if one is in flight at the moment of release.

pub mod fail_closed;
pub mod fail_open;
pub mod handle;
mod owner;

pub use cas_lock_core::prelude::*;
pub use fail_closed::{DEFAULT_TTL, FailClosedClient, FailClosedClientBuilder, FailClosedHandle};
pub use fail_open::{FailOpenClient, FailOpenClientBuilder};
pub use handle::{FailOpenHandle, HeartbeatFailure};
