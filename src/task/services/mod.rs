//! Application services for task lifecycle orchestration.

mod lifecycle;
mod publisher;

pub use lifecycle::{
    DEFAULT_VERSION_RETRY_LIMIT, TaskLifecycleError, TaskLifecycleResult, TaskLifecycleService,
    TransitionRequest,
};
pub use publisher::TransitionPublisher;
