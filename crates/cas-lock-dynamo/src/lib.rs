//! DynamoDB store adapter for distributed locks.
//!
//! Maps the conditional put / consistent get / conditional delete contract
//! onto a single DynamoDB table: conditions become condition expressions,
//! the guid witness is stored as a binary attribute, and
//! `ConditionalCheckFailedException` is reported as the distinguished
//! condition-failed outcome.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use cas_lock::FailOpenClient;
//! use cas_lock_dynamo::DynamoLockStore;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
//! let client = aws_sdk_dynamodb::Client::new(&config);
//!
//! let store = Arc::new(
//!     DynamoLockStore::builder(client)
//!         .table_name("distributed-locks")
//!         .partition_key("key")
//!         .build()?,
//! );
//!
//! let locks = FailOpenClient::builder(store)
//!     .lease_duration(Duration::from_secs(10))
//!     .heartbeat_period(Duration::from_secs(3))
//!     .build()?;
//!
//! let handle = locks.acquire("my-resource").await?;
//! handle.release().await?;
//! # Ok(())
//! # }
//! ```

mod codec;
mod store;

pub use codec::DecodeError;
pub use store::{DynamoLockStore, DynamoLockStoreBuilder};
