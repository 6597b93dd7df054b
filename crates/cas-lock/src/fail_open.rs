//! Fail-Open lock client.
//!
//! A Fail-Open lock carries a lease: the holder extends it by heartbeat, and
//! an acquirer that finds an existing record waits out its lease before
//! stealing it with a guid+token compare-and-set. Every successful
//! acquisition advances the fencing token.

use std::sync::Arc;
use std::time::Duration;

use cas_lock_core::error::{LockError, LockResult, StoreError};
use cas_lock_core::record::{Guid, LockRecord, now_unix_ms, now_unix_secs};
use cas_lock_core::store::{LockStore, PutCondition};
use tracing::{Span, debug, instrument};

use crate::handle::FailOpenHandle;
use crate::owner::derive_owner;

/// Builder for [`FailOpenClient`].
pub struct FailOpenClientBuilder<S> {
    store: Arc<S>,
    owner: Option<String>,
    retry_count: u32,
    lease_duration: Option<Duration>,
    heartbeat_period: Option<Duration>,
    trust_local_time: bool,
    ttl: Option<Duration>,
}

impl<S: LockStore> FailOpenClientBuilder<S> {
    fn new(store: Arc<S>) -> Self {
        Self {
            store,
            owner: None,
            retry_count: 1,
            lease_duration: None,
            heartbeat_period: None,
            trust_local_time: false,
            ttl: None,
        }
    }

    /// Sets the owner string recorded with every write.
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Number of additional attempts after a failed conditional write.
    /// Defaults to 1.
    pub fn retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Intended validity window of each write. Required.
    pub fn lease_duration(mut self, lease: Duration) -> Self {
        self.lease_duration = Some(lease);
        self
    }

    /// Cadence of the lease-extending heartbeat.
    ///
    /// Zero or absent disables the heartbeat; the lock then lapses one lease
    /// duration after acquisition unless released earlier.
    pub fn heartbeat_period(mut self, period: Duration) -> Self {
        self.heartbeat_period = Some(period);
        self
    }

    /// Trusts the local clock to age existing leases.
    ///
    /// When set, the wait before a steal is shortened by the apparent age of
    /// the existing lock as computed from its recorded write time and the
    /// local clock; faster, but assumes bounded skew. When unset (the
    /// default), acquirers wait the full lease duration unconditionally,
    /// which is safe under arbitrary skew.
    pub fn trust_local_time(mut self, trust: bool) -> Self {
        self.trust_local_time = trust;
        self
    }

    /// TTL hint stored as `expiresAt` for the table's background reaper.
    /// Absent by default.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Validates the configuration and builds the client.
    pub fn build(self) -> LockResult<FailOpenClient<S>> {
        let lease_duration = self.lease_duration.ok_or_else(|| {
            LockError::Configuration("lease duration is required".to_string())
        })?;
        if lease_duration.is_zero() {
            return Err(LockError::Configuration(
                "lease duration must be non-zero".to_string(),
            ));
        }

        // Zero means disabled, same as absent.
        let heartbeat_period = self.heartbeat_period.filter(|p| !p.is_zero());
        if let Some(period) = heartbeat_period
            && period >= lease_duration
        {
            return Err(LockError::Configuration(
                "heartbeat period must be shorter than the lease duration".to_string(),
            ));
        }

        if let Some(owner) = &self.owner
            && owner.is_empty()
        {
            return Err(LockError::Configuration(
                "owner must be non-empty".to_string(),
            ));
        }

        Ok(FailOpenClient {
            store: self.store,
            owner: self.owner,
            retry_count: self.retry_count,
            lease_duration,
            heartbeat_period,
            trust_local_time: self.trust_local_time,
            ttl: self.ttl,
        })
    }
}

/// A Fail-Open distributed lock client.
///
/// # Example
///
/// ```rust,ignore
/// let client = FailOpenClient::builder(store)
///     .lease_duration(Duration::from_secs(10))
///     .heartbeat_period(Duration::from_secs(3))
///     .build()?;
///
/// let handle = client.acquire("ingest-partition-4").await?;
/// write_downstream(handle.fencing_token()).await;
/// handle.release().await?;
/// ```
#[derive(Debug)]
pub struct FailOpenClient<S> {
    store: Arc<S>,
    owner: Option<String>,
    retry_count: u32,
    lease_duration: Duration,
    heartbeat_period: Option<Duration>,
    trust_local_time: bool,
    ttl: Option<Duration>,
}

impl<S: LockStore + 'static> FailOpenClient<S> {
    /// Returns a builder for the client.
    pub fn builder(store: Arc<S>) -> FailOpenClientBuilder<S> {
        FailOpenClientBuilder::new(store)
    }

    /// Acquires the lock `id`, waiting out an existing lease if necessary.
    pub async fn acquire(&self, id: &str) -> LockResult<FailOpenHandle<S>> {
        self.acquire_inner(id, self.ttl).await
    }

    /// Acquires the lock `id` with a per-acquisition TTL hint.
    pub async fn acquire_with_ttl(
        &self,
        id: &str,
        ttl: Duration,
    ) -> LockResult<FailOpenHandle<S>> {
        self.acquire_inner(id, Some(ttl)).await
    }

    #[instrument(
        skip(self, ttl),
        fields(
            lock.id = %id,
            mode = "fail-open",
            acquired = tracing::field::Empty,
            fencing_token = tracing::field::Empty,
        )
    )]
    async fn acquire_inner(
        &self,
        id: &str,
        ttl: Option<Duration>,
    ) -> LockResult<FailOpenHandle<S>> {
        let owner = derive_owner(self.owner.as_deref());
        let lease_duration_ms = self.lease_duration.as_millis() as u64;
        let mut attempts_left = self.retry_count + 1;

        loop {
            // CheckExisting: the read supplies the next fencing token and the
            // steal witness, and tells us how long the current lease may
            // still be live.
            let existing = self.store.get(id).await.map_err(LockError::from_store)?;

            let (fencing_token, condition, wait) = match existing {
                None => (1, PutCondition::KeyAbsent, Duration::ZERO),
                Some(prior) => {
                    let prior_token = prior.fencing_token.unwrap_or(0);
                    let prior_lease_ms = prior.lease_duration_ms.unwrap_or(0);
                    let wait_ms = if self.trust_local_time {
                        match prior.lock_acquired_time_unix_ms {
                            Some(acquired_ms) => prior_lease_ms
                                .saturating_sub(now_unix_ms().saturating_sub(acquired_ms)),
                            None => prior_lease_ms,
                        }
                    } else {
                        prior_lease_ms
                    };
                    (
                        prior_token + 1,
                        PutCondition::KeyAbsentOrWitnessMatches {
                            guid: prior.guid,
                            fencing_token: prior_token,
                        },
                        Duration::from_millis(wait_ms),
                    )
                }
            };

            // WaitLease.
            if !wait.is_zero() {
                debug!(
                    lock.id = %id,
                    wait_ms = wait.as_millis() as u64,
                    "waiting out existing lease"
                );
                tokio::time::sleep(wait).await;
            }

            // AcquireNew / AcquireExisting.
            let record = LockRecord {
                id: id.to_string(),
                owner: owner.clone(),
                guid: Guid::generate(),
                fencing_token: Some(fencing_token),
                lease_duration_ms: Some(lease_duration_ms),
                lock_acquired_time_unix_ms: self.trust_local_time.then(now_unix_ms),
                expires_at: ttl.map(|t| now_unix_secs() + t.as_secs()),
            };

            match self.store.put(&record, &condition).await {
                Ok(()) => {
                    Span::current().record("acquired", true);
                    Span::current().record("fencing_token", fencing_token);
                    return Ok(FailOpenHandle::new(
                        self.store.clone(),
                        record.id,
                        record.owner,
                        record.guid,
                        fencing_token,
                        self.lease_duration,
                        self.heartbeat_period,
                        self.trust_local_time,
                    ));
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
                    // No inter-retry delay: the next round re-reads the
                    // record and waits out whatever lease it observes.
                }
                Err(StoreError::Backend(source)) => return Err(LockError::Backend(source)),
            }
        }
    }
}
