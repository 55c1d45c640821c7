//! In-memory lock table backing tests and single-process runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use crate::lock::{
    domain::{AcquireOutcome, LockConflict, LockLease},
    ports::{LockTable, LockTableError, LockTableResult},
};
use crate::task::domain::{ResourcePath, TaskId};

/// Thread-safe in-memory lock table.
///
/// Every operation takes the table's write or read guard once, so each call
/// is one atomic section over the whole path set.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLockTable {
    state: Arc<RwLock<HashMap<ResourcePath, LockLease>>>,
}

impl InMemoryLockTable {
    /// Creates an empty in-memory lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockTable for InMemoryLockTable {
    async fn acquire(
        &self,
        holder: TaskId,
        paths: &[ResourcePath],
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> LockTableResult<AcquireOutcome> {
        let mut leases = self
            .state
            .write()
            .map_err(|err| LockTableError::persistence(std::io::Error::other(err.to_string())))?;

        let mut conflicts = Vec::new();
        for path in paths {
            if let Some(lease) = leases.get(path)
                && lease.holder() != holder
                && !lease.is_expired(now)
            {
                conflicts.push(LockConflict {
                    path: path.clone(),
                    holder: lease.holder(),
                });
            }
        }
        if !conflicts.is_empty() {
            return Ok(AcquireOutcome::Conflicted(conflicts));
        }

        for path in paths {
            leases.insert(
                path.clone(),
                LockLease::new(path.clone(), holder, now, expires_at),
            );
        }
        Ok(AcquireOutcome::Granted)
    }

    async fn release(&self, holder: TaskId) -> LockTableResult<Vec<ResourcePath>> {
        let mut leases = self
            .state
            .write()
            .map_err(|err| LockTableError::persistence(std::io::Error::other(err.to_string())))?;

        let mut released = Vec::new();
        leases.retain(|path, lease| {
            if lease.holder() == holder {
                released.push(path.clone());
                false
            } else {
                true
            }
        });
        released.sort();
        Ok(released)
    }

    async fn extend(
        &self,
        holder: TaskId,
        now: DateTime<Utc>,
        new_expires_at: DateTime<Utc>,
    ) -> LockTableResult<usize> {
        let mut leases = self
            .state
            .write()
            .map_err(|err| LockTableError::persistence(std::io::Error::other(err.to_string())))?;

        let mut extended = 0usize;
        for lease in leases.values_mut() {
            if lease.holder() == holder && !lease.is_expired(now) {
                lease.extend_to(new_expires_at);
                extended = extended.saturating_add(1);
            }
        }
        Ok(extended)
    }

    async fn holders(
        &self,
        paths: &[ResourcePath],
        now: DateTime<Utc>,
    ) -> LockTableResult<BTreeMap<ResourcePath, TaskId>> {
        let leases = self
            .state
            .read()
            .map_err(|err| LockTableError::persistence(std::io::Error::other(err.to_string())))?;

        let mut held = BTreeMap::new();
        for path in paths {
            if let Some(lease) = leases.get(path)
                && !lease.is_expired(now)
            {
                held.insert(path.clone(), lease.holder());
            }
        }
        Ok(held)
    }

    async fn held_by(
        &self,
        holder: TaskId,
        now: DateTime<Utc>,
    ) -> LockTableResult<Vec<ResourcePath>> {
        let leases = self
            .state
            .read()
            .map_err(|err| LockTableError::persistence(std::io::Error::other(err.to_string())))?;

        let mut held: Vec<ResourcePath> = leases
            .values()
            .filter(|lease| lease.holder() == holder && !lease.is_expired(now))
            .map(|lease| lease.path().clone())
            .collect();
        held.sort();
        Ok(held)
    }
}
