//! Domain model for the task lifecycle.
//!
//! Pure types and validation with no I/O: identifier and version newtypes,
//! the lifecycle state machine, resource paths, plan records, the decision
//! log, and the [`Task`] aggregate that ties them together.

mod decision;
mod error;
mod event;
mod ids;
mod plan;
mod resource;
mod state;
mod task;

pub use decision::{DecisionAction, DecisionActor, DecisionEntry};
pub use error::{ParseTaskStateError, TaskDomainError};
pub use event::TransitionEvent;
pub use ids::{ExternalNumber, RepoName, TaskId, TaskVersion, TriggerOrigin};
pub use plan::PlanRecord;
pub use resource::ResourcePath;
pub use state::TaskState;
pub use task::{metadata_keys, ArchivedTask, Task, TaskSnapshot, TransitionMetadata};
