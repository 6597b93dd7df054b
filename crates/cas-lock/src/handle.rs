//! Fail-Open lock handle and its heartbeat task.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cas_lock_core::error::{LockError, LockResult, StoreError};
use cas_lock_core::record::{Guid, LockRecord, now_unix_ms};
use cas_lock_core::store::{LockStore, PutCondition};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, instrument, warn};

/// A heartbeat failure, published once on the handle's lost-lock channel.
///
/// Heartbeat errors are not retried: whether the conditional check failed or
/// the network did, ownership can no longer be proven and the caller must
/// treat the lock as lost.
#[derive(Debug, Clone)]
pub struct HeartbeatFailure {
    /// True when the conditional check failed, i.e. another process rotated
    /// or removed the record and ownership is definitively gone. False for
    /// transport failures, where ownership is merely unprovable.
    pub lost_ownership: bool,
    /// Rendered error from the failed store operation.
    pub message: String,
}

/// State shared between a handle and its heartbeat task.
struct HandleState {
    id: String,
    owner: String,
    guid: Mutex<Guid>,
    released: AtomicBool,
}

/// Handle to a held Fail-Open lock.
///
/// Owns, exclusively, the heartbeat task that rewrites the record with a
/// fresh guid every heartbeat period. Rotation reestablishes holder authority
/// at each renewal; the fencing token never changes while the lock is held.
///
/// Dropping the handle without releasing stops the heartbeat and lets the
/// lease lapse naturally.
pub struct FailOpenHandle<S: LockStore + 'static> {
    store: Arc<S>,
    state: Arc<HandleState>,
    fencing_token: u64,
    lease_duration: Duration,
    trust_local_time: bool,
    lost_rx: watch::Receiver<Option<HeartbeatFailure>>,
    heartbeat_task: Option<tokio::task::JoinHandle<()>>,
}

impl<S: LockStore + 'static> FailOpenHandle<S> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        store: Arc<S>,
        id: String,
        owner: String,
        guid: Guid,
        fencing_token: u64,
        lease_duration: Duration,
        heartbeat_period: Option<Duration>,
        trust_local_time: bool,
    ) -> Self {
        let state = Arc::new(HandleState {
            id,
            owner,
            guid: Mutex::new(guid),
            released: AtomicBool::new(false),
        });
        let (lost_tx, lost_rx) = watch::channel(None);

        let heartbeat_task = heartbeat_period.map(|period| {
            tokio::spawn(heartbeat_loop(
                store.clone(),
                state.clone(),
                lost_tx,
                period,
                fencing_token,
                lease_duration.as_millis() as u64,
                trust_local_time,
            ))
        });

        Self {
            store,
            state,
            fencing_token,
            lease_duration,
            trust_local_time,
            lost_rx,
            heartbeat_task,
        }
    }

    /// The lock id.
    pub fn id(&self) -> &str {
        &self.state.id
    }

    /// The owner string written with the lock.
    pub fn owner(&self) -> &str {
        &self.state.owner
    }

    /// The fencing token of this acquisition, to propagate to downstream
    /// writes so that stale holders are rejected by the protected resource.
    pub fn fencing_token(&self) -> u64 {
        self.fencing_token
    }

    /// Snapshot of the current witness (the heartbeat rotates it).
    pub fn guid(&self) -> Guid {
        self.state.guid.lock().unwrap().clone()
    }

    /// Returns a receiver that signals when the lock is lost.
    ///
    /// The receiver yields `Some(failure)` after a heartbeat fails, at which
    /// point the heartbeat has stopped and the caller must stop mutating the
    /// protected resource.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// tokio::select! {
    ///     _ = handle.lost_token().clone().changed() => {
    ///         eprintln!("lock was lost");
    ///     }
    ///     _ = do_work() => {}
    /// }
    /// ```
    pub fn lost_token(&self) -> &watch::Receiver<Option<HeartbeatFailure>> {
        &self.lost_rx
    }

    /// Releases the lock.
    ///
    /// Cancels any pending heartbeat, then overwrites the record with a lease
    /// of 1 ms so the next waiter proceeds almost immediately without needing
    /// delete permission. A conditional failure is success: another process
    /// has already taken over. After a heartbeat failure the lease is already
    /// implicitly lost and release returns without touching the store.
    #[instrument(skip(self), fields(lock.id = %self.state.id, mode = "fail-open"))]
    pub async fn release(mut self) -> LockResult<()> {
        self.state.released.store(true, Ordering::Release);
        if let Some(task) = self.heartbeat_task.take() {
            task.abort();
        }

        if self.lost_rx.borrow().is_some() {
            debug!("lease already lost; skipping release write");
            return Ok(());
        }

        let guid = self.state.guid.lock().unwrap().clone();
        let record = LockRecord {
            id: self.state.id.clone(),
            owner: self.state.owner.clone(),
            guid: guid.clone(),
            fencing_token: Some(self.fencing_token),
            lease_duration_ms: Some(1),
            lock_acquired_time_unix_ms: self.trust_local_time.then(now_unix_ms),
            expires_at: None,
        };

        match self
            .store
            .put(&record, &PutCondition::GuidMatches(guid))
            .await
        {
            Ok(()) => Ok(()),
            // Another process already took over; our release is moot.
            Err(StoreError::ConditionFailed(_)) => Ok(()),
            Err(StoreError::Backend(source)) => Err(LockError::Backend(source)),
        }
    }
}

impl<S: LockStore + 'static> fmt::Debug for FailOpenHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailOpenHandle")
            .field("id", &self.state.id)
            .field("owner", &self.state.owner)
            .field("fencing_token", &self.fencing_token)
            .field("lease_duration", &self.lease_duration)
            .finish_non_exhaustive()
    }
}

impl<S: LockStore + 'static> Drop for FailOpenHandle<S> {
    fn drop(&mut self) {
        self.state.released.store(true, Ordering::Release);
        if let Some(task) = self.heartbeat_task.take() {
            task.abort();
        }
        // No store write here; the lease lapses naturally. Call release()
        // explicitly to let the next waiter in immediately.
    }
}

async fn heartbeat_loop<S: LockStore>(
    store: Arc<S>,
    state: Arc<HandleState>,
    lost_tx: watch::Sender<Option<HeartbeatFailure>>,
    period: Duration,
    fencing_token: u64,
    lease_duration_ms: u64,
    trust_local_time: bool,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; the first rewrite should land one
    // period after acquisition.
    interval.tick().await;

    loop {
        interval.tick().await;

        if state.released.load(Ordering::Acquire) {
            break;
        }

        let current = state.guid.lock().unwrap().clone();
        let next = Guid::generate();
        let record = LockRecord {
            id: state.id.clone(),
            owner: state.owner.clone(),
            guid: next.clone(),
            fencing_token: Some(fencing_token),
            lease_duration_ms: Some(lease_duration_ms),
            lock_acquired_time_unix_ms: trust_local_time.then(now_unix_ms),
            expires_at: None,
        };

        match store
            .put(&record, &PutCondition::GuidMatches(current))
            .await
        {
            Ok(()) => {
                *state.guid.lock().unwrap() = next;
                debug!(lock.id = %state.id, "heartbeat renewed lease");
                if state.released.load(Ordering::Acquire) {
                    break;
                }
            }
            Err(err) => {
                if !state.released.load(Ordering::Acquire) {
                    let lost_ownership = matches!(err, StoreError::ConditionFailed(_));
                    warn!(
                        lock.id = %state.id,
                        lost_ownership,
                        error = %err,
                        "heartbeat failed; stopping"
                    );
                    let _ = lost_tx.send(Some(HeartbeatFailure {
                        lost_ownership,
                        message: err.to_string(),
                    }));
                }
                break;
            }
        }
    }
}
