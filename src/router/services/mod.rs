//! Orchestration services for event routing.

mod router;

pub use router::{RouterError, RouterResult, TaskRouter};
