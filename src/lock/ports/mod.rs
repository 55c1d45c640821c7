//! Port contracts for resource leasing.

pub mod table;

pub use table::{LockTable, LockTableError, LockTableResult};
