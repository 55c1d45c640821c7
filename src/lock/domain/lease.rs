//! Lease records and acquisition outcomes for the lock table.

use crate::task::domain::{ResourcePath, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A lease on one resource path held by one task.
///
/// Leases carry a hard expiry. A lease is live strictly before
/// `expires_at`; at and after that instant it is treated as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockLease {
    path: ResourcePath,
    holder: TaskId,
    granted_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl LockLease {
    /// Creates a lease.
    #[must_use]
    pub const fn new(
        path: ResourcePath,
        holder: TaskId,
        granted_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            path,
            holder,
            granted_at,
            expires_at,
        }
    }

    /// Returns the leased path.
    #[must_use]
    pub const fn path(&self) -> &ResourcePath {
        &self.path
    }

    /// Returns the holding task.
    #[must_use]
    pub const fn holder(&self) -> TaskId {
        self.holder
    }

    /// Returns when the lease was granted.
    #[must_use]
    pub const fn granted_at(&self) -> DateTime<Utc> {
        self.granted_at
    }

    /// Returns when the lease expires.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns whether the lease is expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Moves the expiry to a later instant.
    pub const fn extend_to(&mut self, expires_at: DateTime<Utc>) {
        self.expires_at = expires_at;
    }
}

/// One path that blocked an acquisition, with its live holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConflict {
    /// Requested path that is already leased.
    pub path: ResourcePath,
    /// Task holding the live lease.
    pub holder: TaskId,
}

/// Result of an all-or-nothing acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Every requested path was leased to the requester.
    Granted,
    /// No path was leased; the listed paths are held by other live tasks.
    Conflicted(Vec<LockConflict>),
}

impl AcquireOutcome {
    /// Returns whether the full set was granted.
    #[must_use]
    pub const fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }

    /// Returns the conflict set, empty when granted.
    #[must_use]
    pub fn conflicts(&self) -> &[LockConflict] {
        match self {
            Self::Granted => &[],
            Self::Conflicted(conflicts) => conflicts,
        }
    }
}
