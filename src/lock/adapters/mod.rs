//! Adapter implementations of the lock ports.

pub mod memory;

pub use memory::InMemoryLockTable;
