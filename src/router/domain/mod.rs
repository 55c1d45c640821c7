//! Domain model for event routing.

mod command;
mod event;

pub use command::CommandKind;
pub use event::{CommandEvent, Disposition, EngineEvent, TriggerEvent, WorkerResult};
