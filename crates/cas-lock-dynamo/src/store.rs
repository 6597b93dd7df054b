//! DynamoDB-backed lock store.

use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::AttributeValue;
use cas_lock_core::error::{LockError, LockResult, StoreError, StoreResult};
use cas_lock_core::record::LockRecord;
use cas_lock_core::store::{DeleteCondition, LockStore, PutCondition};

use crate::codec::{
    item_to_record, record_to_item, render_delete_condition, render_put_condition,
};

/// Builder for [`DynamoLockStore`].
pub struct DynamoLockStoreBuilder {
    client: Client,
    table_name: Option<String>,
    partition_key: Option<String>,
}

impl DynamoLockStoreBuilder {
    fn new(client: Client) -> Self {
        Self {
            client,
            table_name: None,
            partition_key: None,
        }
    }

    /// Sets the table holding the lock records. Required; the table must
    /// pre-exist with the configured partition key.
    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// Sets the name of the table's partition key attribute. Required.
    pub fn partition_key(mut self, partition_key: impl Into<String>) -> Self {
        self.partition_key = Some(partition_key.into());
        self
    }

    /// Validates the configuration and builds the store.
    pub fn build(self) -> LockResult<DynamoLockStore> {
        let table_name = self
            .table_name
            .filter(|t| !t.is_empty())
            .ok_or_else(|| LockError::Configuration("table name is required".to_string()))?;
        let partition_key = self
            .partition_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LockError::Configuration("partition key is required".to_string()))?;

        Ok(DynamoLockStore {
            client: self.client,
            table_name,
            partition_key,
        })
    }
}

/// A [`LockStore`] backed by a single DynamoDB table.
///
/// Lock records live under the configured partition key; the table may
/// additionally declare `expiresAt` as its TTL attribute so that abandoned
/// Fail-Closed locks are eventually reaped.
#[derive(Debug)]
pub struct DynamoLockStore {
    client: Client,
    table_name: String,
    partition_key: String,
}

impl DynamoLockStore {
    /// Returns a builder for the store.
    pub fn builder(client: Client) -> DynamoLockStoreBuilder {
        DynamoLockStoreBuilder::new(client)
    }

    /// The configured table name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// The configured partition key attribute.
    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }
}

impl LockStore for DynamoLockStore {
    async fn put(&self, record: &LockRecord, condition: &PutCondition) -> StoreResult<()> {
        let expression = render_put_condition(&self.partition_key, condition);
        let values = (!expression.values.is_empty()).then_some(expression.values);

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(record_to_item(&self.partition_key, record)))
            .condition_expression(expression.condition)
            .set_expression_attribute_names(Some(expression.names))
            .set_expression_attribute_values(values)
            .send()
            .await
            .map_err(classify_put_error)?;

        Ok(())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<LockRecord>> {
        let response = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(&self.partition_key, AttributeValue::S(id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| StoreError::Backend(Box::new(e)))?;

        match response.item() {
            None => Ok(None),
            Some(item) => item_to_record(&self.partition_key, item)
                .map(Some)
                .map_err(|e| StoreError::Backend(Box::new(e))),
        }
    }

    async fn delete(&self, id: &str, condition: &DeleteCondition) -> StoreResult<()> {
        let expression = render_delete_condition(&self.partition_key, condition);

        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key(&self.partition_key, AttributeValue::S(id.to_string()))
            .condition_expression(expression.condition)
            .set_expression_attribute_names(Some(expression.names))
            .set_expression_attribute_values(Some(expression.values))
            .send()
            .await
            .map_err(classify_delete_error)?;

        Ok(())
    }
}

// ── DynamoDB error classification ───────────────────────────────────

fn classify_put_error(
    err: aws_sdk_dynamodb::error::SdkError<aws_sdk_dynamodb::operation::put_item::PutItemError>,
) -> StoreError {
    use aws_sdk_dynamodb::error::SdkError;
    use aws_sdk_dynamodb::operation::put_item::PutItemError;

    match &err {
        SdkError::ServiceError(se)
            if matches!(se.err(), PutItemError::ConditionalCheckFailedException(_)) =>
        {
            StoreError::ConditionFailed(Box::new(err))
        }
        _ => StoreError::Backend(Box::new(err)),
    }
}

fn classify_delete_error(
    err: aws_sdk_dynamodb::error::SdkError<
        aws_sdk_dynamodb::operation::delete_item::DeleteItemError,
    >,
) -> StoreError {
    use aws_sdk_dynamodb::error::SdkError;
    use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;

    match &err {
        SdkError::ServiceError(se)
            if matches!(
                se.err(),
                DeleteItemError::ConditionalCheckFailedException(_)
            ) =>
        {
            StoreError::ConditionFailed(Box::new(err))
        }
        _ => StoreError::Backend(Box::new(err)),
    }
}
