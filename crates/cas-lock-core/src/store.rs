//! The store adapter contract.
//!
//! Every other component of this library depends only on [`LockStore`]: three
//! operations against a single configured table, with conditional-write
//! semantics strong enough to make the lock protocols safe under concurrent
//! acquirers and process failure.

use std::future::Future;

use crate::error::StoreResult;
use crate::record::{Guid, LockRecord};

/// Predicate for a conditional put.
///
/// Adapters must evaluate the predicate atomically with the write and report
/// a false predicate as [`StoreError::ConditionFailed`], distinguished from
/// transport failure.
///
/// [`StoreError::ConditionFailed`]: crate::error::StoreError::ConditionFailed
#[derive(Debug, Clone, PartialEq)]
pub enum PutCondition {
    /// No record exists under the key.
    KeyAbsent,
    /// A record exists and its guid equals the witness.
    GuidMatches(Guid),
    /// No record exists, or the record carries exactly this witness pair.
    ///
    /// This is the steal condition: the disjunction covers the old record
    /// being reaped between the acquirer's read and its write, while the
    /// guid+token pair ensures at most one of several racing stealers can
    /// observe the exact prior witness.
    KeyAbsentOrWitnessMatches {
        /// Guid observed on the read.
        guid: Guid,
        /// Fencing token observed on the read.
        fencing_token: u64,
    },
}

/// Predicate for a conditional delete.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteCondition {
    /// A record exists and its guid equals the witness.
    GuidMatches(Guid),
}

/// A conditionally-updatable key-value store holding lock records.
///
/// Implementations exist for DynamoDB (`cas-lock-dynamo`) and process memory
/// (`cas-lock-memory`). An adapter is bound to a single table; correctness of
/// the lock protocols relies solely on the store serializing conditional
/// writes per item.
///
/// # Example
///
/// ```rust,ignore
/// let record = store.get("orders-job").await?;
/// if record.is_none() {
///     store.put(&fresh_record, &PutCondition::KeyAbsent).await?;
/// }
/// ```
pub trait LockStore: Send + Sync {
    /// Writes `record` under its id iff `condition` holds.
    fn put(
        &self,
        record: &LockRecord,
        condition: &PutCondition,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Returns the current record for `id`, or `None` if absent.
    ///
    /// The read must be strongly consistent: a record written by a completed
    /// `put` is visible to every subsequent `get`.
    fn get(&self, id: &str) -> impl Future<Output = StoreResult<Option<LockRecord>>> + Send;

    /// Removes the record for `id` iff `condition` holds.
    fn delete(
        &self,
        id: &str,
        condition: &DeleteCondition,
    ) -> impl Future<Output = StoreResult<()>> + Send;
}
