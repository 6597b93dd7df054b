//! Fail-Open locking against a real DynamoDB table.
//!
//! Expects AWS credentials in the environment and a pre-created table with a
//! string partition key named "key":
//!
//!   aws dynamodb create-table \
//!     --table-name distributed-locks \
//!     --attribute-definitions AttributeName=key,AttributeType=S \
//!     --key-schema AttributeName=key,KeyType=HASH \
//!     --billing-mode PAY_PER_REQUEST
//!
//! Run with: cargo run --example dynamo_lock

use std::sync::Arc;
use std::time::Duration;

use cas_lock::FailOpenClient;
use cas_lock_dynamo::DynamoLockStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let client = aws_sdk_dynamodb::Client::new(&config);

    let store = Arc::new(
        DynamoLockStore::builder(client)
            .table_name("distributed-locks")
            .partition_key("key")
            .build()?,
    );

    let locks = FailOpenClient::builder(store)
        .lease_duration(Duration::from_secs(10))
        .heartbeat_period(Duration::from_secs(3))
        .build()?;

    let handle = locks.acquire("example-resource").await?;
    println!(
        "acquired 'example-resource' with fencing token {}",
        handle.fencing_token()
    );

    tokio::time::sleep(Duration::from_secs(7)).await;

    handle.release().await?;
    println!("released");

    Ok(())
}
