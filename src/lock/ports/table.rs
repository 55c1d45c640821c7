//! Table port for lease storage and atomic multi-path acquisition.

use crate::lock::domain::AcquireOutcome;
use crate::task::domain::{ResourcePath, TaskId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Result type for lock table operations.
pub type LockTableResult<T> = Result<T, LockTableError>;

/// Lease storage contract.
///
/// Implementations evaluate each call as one atomic section over the whole
/// path set, so two overlapping acquisitions can never interleave partial
/// grants. Expiry is lazy: expired leases are treated as absent wherever a
/// `now` instant is supplied, and acquisition over an expired incumbent
/// replaces it.
#[async_trait]
pub trait LockTable: Send + Sync {
    /// Attempts to lease every path in `paths` for `holder`.
    ///
    /// All-or-nothing: when any path carries a live lease owned by a
    /// different task, nothing is leased and the full conflict set is
    /// returned. Paths already leased by `holder` are refreshed to the new
    /// expiry rather than conflicting.
    ///
    /// # Errors
    ///
    /// Returns [`LockTableError::Persistence`] when the table cannot be
    /// accessed.
    async fn acquire(
        &self,
        holder: TaskId,
        paths: &[ResourcePath],
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> LockTableResult<AcquireOutcome>;

    /// Removes every lease owned by `holder` and returns the released paths.
    ///
    /// Idempotent: releasing a holder with no leases returns an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`LockTableError::Persistence`] when the table cannot be
    /// accessed.
    async fn release(&self, holder: TaskId) -> LockTableResult<Vec<ResourcePath>>;

    /// Moves the expiry of every live lease owned by `holder` to
    /// `new_expires_at` and returns how many leases were extended.
    ///
    /// Expired leases are left alone; they are already absent to readers.
    ///
    /// # Errors
    ///
    /// Returns [`LockTableError::Persistence`] when the table cannot be
    /// accessed.
    async fn extend(
        &self,
        holder: TaskId,
        now: DateTime<Utc>,
        new_expires_at: DateTime<Utc>,
    ) -> LockTableResult<usize>;

    /// Maps each requested path to its live holder, omitting unheld paths.
    ///
    /// # Errors
    ///
    /// Returns [`LockTableError::Persistence`] when the table cannot be
    /// accessed.
    async fn holders(
        &self,
        paths: &[ResourcePath],
        now: DateTime<Utc>,
    ) -> LockTableResult<BTreeMap<ResourcePath, TaskId>>;

    /// Returns the paths currently leased to `holder`, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`LockTableError::Persistence`] when the table cannot be
    /// accessed.
    async fn held_by(&self, holder: TaskId, now: DateTime<Utc>)
    -> LockTableResult<Vec<ResourcePath>>;
}

/// Errors returned by lock table implementations.
#[derive(Debug, Clone, Error)]
pub enum LockTableError {
    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl LockTableError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
