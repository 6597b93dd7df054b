//! In-memory store adapter.
//!
//! Backs the lock clients with a process-local table: a mutexed map evaluated
//! under the same conditional-write semantics the DynamoDB adapter gets from
//! the service. Useful for tests, benches, and single-process use.
//!
//! Beyond the [`LockStore`] contract, the store keeps a journal of successful
//! writes and an operation counter, and can inject put failures: enough
//! instrumentation to assert protocol properties (guid rotation, quiescence
//! after release, error paths) without a network.

use std::collections::HashMap;
use std::io::{Error as IoError, ErrorKind};
use std::sync::Mutex;

use cas_lock_core::error::{StoreError, StoreResult};
use cas_lock_core::record::LockRecord;
use cas_lock_core::store::{DeleteCondition, LockStore, PutCondition};

#[derive(Debug, Default)]
struct Inner {
    items: HashMap<String, LockRecord>,
    journal: Vec<LockRecord>,
    operations: u64,
    fail_puts: bool,
}

/// A [`LockStore`] held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryLockStore {
    inner: Mutex<Inner>,
}

impl MemoryLockStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current record for `id`.
    pub fn record(&self, id: &str) -> Option<LockRecord> {
        self.inner.lock().unwrap().items.get(id).cloned()
    }

    /// Every successfully written record for `id`, in write order.
    pub fn writes(&self, id: &str) -> Vec<LockRecord> {
        self.inner
            .lock()
            .unwrap()
            .journal
            .iter()
            .filter(|r| r.id == id)
            .cloned()
            .collect()
    }

    /// Total store operations attempted (puts, gets, deletes), successful or
    /// not.
    pub fn operation_count(&self) -> u64 {
        self.inner.lock().unwrap().operations
    }

    /// When set, every subsequent put fails with a backend error.
    pub fn set_fail_puts(&self, fail: bool) {
        self.inner.lock().unwrap().fail_puts = fail;
    }

    /// Seeds a record directly, bypassing conditions. Test setup only.
    pub fn insert(&self, record: LockRecord) {
        self.inner
            .lock()
            .unwrap()
            .items
            .insert(record.id.clone(), record);
    }
}

impl LockStore for MemoryLockStore {
    async fn put(&self, record: &LockRecord, condition: &PutCondition) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations += 1;

        if inner.fail_puts {
            return Err(StoreError::Backend(Box::new(IoError::other(
                "injected put failure",
            ))));
        }

        let existing = inner.items.get(&record.id);
        let satisfied = match condition {
            PutCondition::KeyAbsent => existing.is_none(),
            PutCondition::GuidMatches(guid) => existing.is_some_and(|r| r.guid == *guid),
            PutCondition::KeyAbsentOrWitnessMatches {
                guid,
                fencing_token,
            } => match existing {
                None => true,
                Some(r) => r.guid == *guid && r.fencing_token == Some(*fencing_token),
            },
        };

        if !satisfied {
            return Err(StoreError::ConditionFailed(Box::new(IoError::new(
                ErrorKind::AlreadyExists,
                format!("conditional put rejected for '{}'", record.id),
            ))));
        }

        inner.items.insert(record.id.clone(), record.clone());
        inner.journal.push(record.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<LockRecord>> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations += 1;
        Ok(inner.items.get(id).cloned())
    }

    async fn delete(&self, id: &str, condition: &DeleteCondition) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations += 1;

        let existing = inner.items.get(id);
        let satisfied = match condition {
            DeleteCondition::GuidMatches(guid) => existing.is_some_and(|r| r.guid == *guid),
        };

        if !satisfied {
            return Err(StoreError::ConditionFailed(Box::new(IoError::new(
                ErrorKind::NotFound,
                format!("conditional delete rejected for '{id}'"),
            ))));
        }

        inner.items.remove(id);
        Ok(())
    }
}
