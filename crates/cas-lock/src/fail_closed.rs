//! Fail-Closed lock client.
//!
//! A Fail-Closed lock, once written, stays in the store until its holder
//! explicitly releases it. A crashed holder keeps the lock until an external
//! TTL reaper removes the record. Correctness over liveness: retries survive
//! contention bursts but never displace a live holder.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cas_lock_core::error::{LockError, LockResult, StoreError};
use cas_lock_core::record::{Guid, LockRecord, now_unix_secs};
use cas_lock_core::store::{DeleteCondition, LockStore, PutCondition};
use tracing::{Span, instrument};

use crate::owner::derive_owner;

/// Default TTL hint written with every Fail-Closed lock: one day.
pub const DEFAULT_TTL: Duration = Duration::from_secs(86_400);

/// Builder for [`FailClosedClient`].
pub struct FailClosedClientBuilder<S> {
    store: Arc<S>,
    owner: Option<String>,
    retry_count: u32,
    acquire_period: Option<Duration>,
    ttl: Duration,
}

impl<S: LockStore> FailClosedClientBuilder<S> {
    fn new(store: Arc<S>) -> Self {
        Self {
            store,
            owner: None,
            retry_count: 1,
            acquire_period: None,
            ttl: DEFAULT_TTL,
        }
    }

    /// Sets the owner string recorded with every write.
    ///
    /// When absent, one is synthesized per acquisition from the library
    /// identity, user, and host.
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Number of additional attempts after a contended first write.
    /// Defaults to 1.
    pub fn retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Delay between acquisition attempts. Required.
    pub fn acquire_period(mut self, period: Duration) -> Self {
        self.acquire_period = Some(period);
        self
    }

    /// TTL hint stored as `expiresAt` for the table's background reaper.
    /// Defaults to one day.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Validates the configuration and builds the client.
    pub fn build(self) -> LockResult<FailClosedClient<S>> {
        let acquire_period = self.acquire_period.ok_or_else(|| {
            LockError::Configuration("acquire period is required".to_string())
        })?;
        if acquire_period.is_zero() {
            return Err(LockError::Configuration(
                "acquire period must be non-zero".to_string(),
            ));
        }
        if self.ttl.is_zero() {
            return Err(LockError::Configuration(
                "ttl must be non-zero".to_string(),
            ));
        }
        if let Some(owner) = &self.owner
            && owner.is_empty()
        {
            return Err(LockError::Configuration(
                "owner must be non-empty".to_string(),
            ));
        }

        Ok(FailClosedClient {
            store: self.store,
            owner: self.owner,
            retry_count: self.retry_count,
            acquire_period,
            ttl: self.ttl,
        })
    }
}

/// A Fail-Closed distributed lock client.
///
/// # Example
///
/// ```rust,ignore
/// let client = FailClosedClient::builder(store)
///     .acquire_period(Duration::from_millis(250))
///     .build()?;
///
/// let handle = client.acquire("nightly-report").await?;
/// run_report().await;
/// handle.release().await?;
/// ```
#[derive(Debug)]
pub struct FailClosedClient<S> {
    store: Arc<S>,
    owner: Option<String>,
    retry_count: u32,
    acquire_period: Duration,
    ttl: Duration,
}

impl<S: LockStore> FailClosedClient<S> {
    /// Returns a builder for the client.
    pub fn builder(store: Arc<S>) -> FailClosedClientBuilder<S> {
        FailClosedClientBuilder::new(store)
    }

    /// Acquires the lock `id` with the configured TTL hint.
    pub async fn acquire(&self, id: &str) -> LockResult<FailClosedHandle<S>> {
        self.acquire_inner(id, self.ttl).await
    }

    /// Acquires the lock `id` with a per-acquisition TTL hint.
    pub async fn acquire_with_ttl(
        &self,
        id: &str,
        ttl: Duration,
    ) -> LockResult<FailClosedHandle<S>> {
        self.acquire_inner(id, ttl).await
    }

    #[instrument(
        skip(self, ttl),
        fields(lock.id = %id, mode = "fail-closed", acquired = tracing::field::Empty)
    )]
    async fn acquire_inner(&self, id: &str, ttl: Duration) -> LockResult<FailClosedHandle<S>> {
        let owner = derive_owner(self.owner.as_deref());
        let record = LockRecord {
            id: id.to_string(),
            owner,
            guid: Guid::generate(),
            fencing_token: None,
            lease_duration_ms: None,
            lock_acquired_time_unix_ms: None,
            expires_at: Some(now_unix_secs() + ttl.as_secs()),
        };

        let mut attempts_left = self.retry_count + 1;
        loop {
            match self.store.put(&record, &PutCondition::KeyAbsent).await {
                Ok(()) => {
                    Span::current().record("acquired", true);
                    return Ok(FailClosedHandle {
                        store: self.store.clone(),
                        id: record.id.clone(),
                        owner: record.owner.clone(),
                        guid: record.guid.clone(),
                    });
                }
                Err(StoreError::ConditionFailed(source)) => {
                    attempts_left -= 1;
                    if attempts_left == 0 {
                        Span::current().record("acquired", false);
                        return Err(LockError::FailedToAcquireLock {
                            id: id.to_string(),
                            source,
                        });
                    }
                    tokio::time::sleep(self.acquire_period).await;
                }
                Err(StoreError::Backend(source)) => return Err(LockError::Backend(source)),
            }
        }
    }
}

/// Handle to a held Fail-Closed lock.
///
/// Carries no lease and no heartbeat; the record represents indefinite
/// ownership until [`release`](FailClosedHandle::release) deletes it.
pub struct FailClosedHandle<S: LockStore> {
    store: Arc<S>,
    id: String,
    owner: String,
    guid: Guid,
}

impl<S: LockStore> fmt::Debug for FailClosedHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailClosedHandle")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl<S: LockStore> FailClosedHandle<S> {
    /// The lock id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The owner string written with the lock.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The witness installed by this acquisition.
    pub fn guid(&self) -> &Guid {
        &self.guid
    }

    /// Releases the lock by deleting its record.
    ///
    /// Only the rightful holder may remove the record: a condition failure
    /// means the lock was stolen or reaped and is reported as
    /// [`LockError::FailedToReleaseLock`].
    #[instrument(skip(self), fields(lock.id = %self.id, mode = "fail-closed"))]
    pub async fn release(self) -> LockResult<()> {
        match self
            .store
            .delete(&self.id, &DeleteCondition::GuidMatches(self.guid.clone()))
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::ConditionFailed(source)) => Err(LockError::FailedToReleaseLock {
                id: self.id.clone(),
                source,
            }),
            Err(StoreError::Backend(source)) => Err(LockError::Backend(source)),
        }
    }
}
