//! Coordination service for all-or-nothing resource leasing.

use crate::lock::{
    domain::AcquireOutcome,
    ports::{LockTable, LockTableResult},
};
use crate::task::domain::{ResourcePath, TaskId};
use chrono::{DateTime, Duration, Utc};
use mockable::Clock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Lease coordination service.
///
/// Canonicalizes requested path sets (sorted, deduplicated) before handing
/// them to the table, so overlapping acquisitions always evaluate paths in
/// one order, and stamps each call with the wall clock for lazy expiry.
#[derive(Clone)]
pub struct LockCoordinator<L, C>
where
    L: LockTable,
    C: Clock + Send + Sync,
{
    table: Arc<L>,
    clock: Arc<C>,
}

impl<L, C> LockCoordinator<L, C>
where
    L: LockTable,
    C: Clock + Send + Sync,
{
    /// Creates a new lock coordinator.
    #[must_use]
    pub const fn new(table: Arc<L>, clock: Arc<C>) -> Self {
        Self { table, clock }
    }

    /// Attempts to lease every requested path for `task_id` with the given
    /// time-to-live.
    ///
    /// # Errors
    ///
    /// Returns a table error when lease storage cannot be accessed.
    pub async fn acquire(
        &self,
        task_id: TaskId,
        paths: Vec<ResourcePath>,
        ttl: Duration,
    ) -> LockTableResult<AcquireOutcome> {
        let canonical = canonicalize(paths);
        let now = self.clock.utc();
        let expires_at = expiry(now, ttl);
        self.table.acquire(task_id, &canonical, now, expires_at).await
    }

    /// Removes every lease owned by `task_id` and returns the released
    /// paths. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a table error when lease storage cannot be accessed.
    pub async fn release(&self, task_id: TaskId) -> LockTableResult<Vec<ResourcePath>> {
        self.table.release(task_id).await
    }

    /// Pushes the expiry of every live lease owned by `task_id` out by
    /// `ttl` from now and returns how many leases were extended.
    ///
    /// # Errors
    ///
    /// Returns a table error when lease storage cannot be accessed.
    pub async fn extend(&self, task_id: TaskId, ttl: Duration) -> LockTableResult<usize> {
        let now = self.clock.utc();
        let new_expires_at = expiry(now, ttl);
        self.table.extend(task_id, now, new_expires_at).await
    }

    /// Maps each requested path to its live holder, omitting unheld paths.
    ///
    /// # Errors
    ///
    /// Returns a table error when lease storage cannot be accessed.
    pub async fn holders(
        &self,
        paths: &[ResourcePath],
    ) -> LockTableResult<BTreeMap<ResourcePath, TaskId>> {
        self.table.holders(paths, self.clock.utc()).await
    }

    /// Returns the paths currently leased to `task_id`, sorted.
    ///
    /// # Errors
    ///
    /// Returns a table error when lease storage cannot be accessed.
    pub async fn held_by(&self, task_id: TaskId) -> LockTableResult<Vec<ResourcePath>> {
        self.table.held_by(task_id, self.clock.utc()).await
    }
}

/// Sorts and deduplicates a requested path set.
fn canonicalize(mut paths: Vec<ResourcePath>) -> Vec<ResourcePath> {
    paths.sort();
    paths.dedup();
    paths
}

/// Computes an expiry instant, saturating at the far end of the calendar.
fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
