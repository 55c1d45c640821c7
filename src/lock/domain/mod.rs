//! Domain model for resource leasing.

mod lease;

pub use lease::{AcquireOutcome, LockConflict, LockLease};
