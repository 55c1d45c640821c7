//! Application services for resource leasing.

mod coordinator;

pub use coordinator::LockCoordinator;
