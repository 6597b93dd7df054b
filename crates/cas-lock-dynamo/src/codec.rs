//! Mapping between lock records and DynamoDB items, and rendering of the
//! conditional-write predicates as condition expressions.

use std::collections::HashMap;

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;
use cas_lock_core::record::{Guid, LockRecord};
use cas_lock_core::store::{DeleteCondition, PutCondition};
use thiserror::Error;

pub(crate) const ATTR_OWNER: &str = "owner";
pub(crate) const ATTR_GUID: &str = "guid";
pub(crate) const ATTR_FENCING_TOKEN: &str = "fencingToken";
pub(crate) const ATTR_LEASE_DURATION_MS: &str = "leaseDurationMs";
pub(crate) const ATTR_LOCK_ACQUIRED_TIME_UNIX_MS: &str = "lockAcquiredTimeUnixMs";
pub(crate) const ATTR_EXPIRES_AT: &str = "expiresAt";

/// An item read back from the table did not look like a lock record.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("item is missing attribute '{0}'")]
    MissingAttribute(&'static str),
    #[error("attribute '{0}' is malformed")]
    MalformedAttribute(&'static str),
}

/// A rendered condition expression with its attribute names and values.
pub(crate) struct Expression {
    pub condition: String,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

pub(crate) fn record_to_item(
    partition_key: &str,
    record: &LockRecord,
) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::new();
    item.insert(
        partition_key.to_string(),
        AttributeValue::S(record.id.clone()),
    );
    item.insert(
        ATTR_OWNER.to_string(),
        AttributeValue::S(record.owner.clone()),
    );
    item.insert(
        ATTR_GUID.to_string(),
        AttributeValue::B(Blob::new(record.guid.as_bytes())),
    );
    if let Some(token) = record.fencing_token {
        item.insert(
            ATTR_FENCING_TOKEN.to_string(),
            AttributeValue::N(token.to_string()),
        );
    }
    if let Some(lease) = record.lease_duration_ms {
        item.insert(
            ATTR_LEASE_DURATION_MS.to_string(),
            AttributeValue::N(lease.to_string()),
        );
    }
    if let Some(acquired) = record.lock_acquired_time_unix_ms {
        item.insert(
            ATTR_LOCK_ACQUIRED_TIME_UNIX_MS.to_string(),
            AttributeValue::N(acquired.to_string()),
        );
    }
    if let Some(expires_at) = record.expires_at {
        item.insert(
            ATTR_EXPIRES_AT.to_string(),
            AttributeValue::N(expires_at.to_string()),
        );
    }
    item
}

pub(crate) fn item_to_record(
    partition_key: &str,
    item: &HashMap<String, AttributeValue>,
) -> Result<LockRecord, DecodeError> {
    let id = item
        .get(partition_key)
        .ok_or(DecodeError::MissingAttribute("partition key"))?
        .as_s()
        .map_err(|_| DecodeError::MalformedAttribute("partition key"))?
        .clone();

    let owner = item
        .get(ATTR_OWNER)
        .ok_or(DecodeError::MissingAttribute(ATTR_OWNER))?
        .as_s()
        .map_err(|_| DecodeError::MalformedAttribute(ATTR_OWNER))?
        .clone();

    let guid_bytes = item
        .get(ATTR_GUID)
        .ok_or(DecodeError::MissingAttribute(ATTR_GUID))?
        .as_b()
        .map_err(|_| DecodeError::MalformedAttribute(ATTR_GUID))?;
    let guid = Guid::from_bytes(guid_bytes.as_ref())
        .ok_or(DecodeError::MalformedAttribute(ATTR_GUID))?;

    Ok(LockRecord {
        id,
        owner,
        guid,
        fencing_token: optional_number(item, ATTR_FENCING_TOKEN)?,
        lease_duration_ms: optional_number(item, ATTR_LEASE_DURATION_MS)?,
        lock_acquired_time_unix_ms: optional_number(item, ATTR_LOCK_ACQUIRED_TIME_UNIX_MS)?,
        expires_at: optional_number(item, ATTR_EXPIRES_AT)?,
    })
}

fn optional_number(
    item: &HashMap<String, AttributeValue>,
    attr: &'static str,
) -> Result<Option<u64>, DecodeError> {
    match item.get(attr) {
        None => Ok(None),
        Some(value) => value
            .as_n()
            .map_err(|_| DecodeError::MalformedAttribute(attr))?
            .parse::<u64>()
            .map(Some)
            .map_err(|_| DecodeError::MalformedAttribute(attr)),
    }
}

pub(crate) fn render_put_condition(partition_key: &str, condition: &PutCondition) -> Expression {
    let names = HashMap::from([("#pk".to_string(), partition_key.to_string())]);
    match condition {
        PutCondition::KeyAbsent => Expression {
            condition: "attribute_not_exists(#pk)".to_string(),
            names,
            values: HashMap::new(),
        },
        PutCondition::GuidMatches(guid) => Expression {
            condition: format!("attribute_exists(#pk) AND {ATTR_GUID} = :guid"),
            names,
            values: HashMap::from([(
                ":guid".to_string(),
                AttributeValue::B(Blob::new(guid.as_bytes())),
            )]),
        },
        PutCondition::KeyAbsentOrWitnessMatches {
            guid,
            fencing_token,
        } => Expression {
            condition: format!(
                "attribute_not_exists(#pk) OR ({ATTR_GUID} = :guid AND {ATTR_FENCING_TOKEN} = :token)"
            ),
            names,
            values: HashMap::from([
                (
                    ":guid".to_string(),
                    AttributeValue::B(Blob::new(guid.as_bytes())),
                ),
                (
                    ":token".to_string(),
                    AttributeValue::N(fencing_token.to_string()),
                ),
            ]),
        },
    }
}

pub(crate) fn render_delete_condition(
    partition_key: &str,
    condition: &DeleteCondition,
) -> Expression {
    match condition {
        DeleteCondition::GuidMatches(guid) => Expression {
            condition: format!("attribute_exists(#pk) AND {ATTR_GUID} = :guid"),
            names: HashMap::from([("#pk".to_string(), partition_key.to_string())]),
            values: HashMap::from([(
                ":guid".to_string(),
                AttributeValue::B(Blob::new(guid.as_bytes())),
            )]),
        },
    }
}
