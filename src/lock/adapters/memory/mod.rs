//! In-memory adapters for resource leasing.

mod table;

pub use table::InMemoryLockTable;
