//! Port contracts for event routing.

pub mod archive;
pub mod scope;
pub mod worker;

pub use archive::{ArchiveSink, ArchiveSinkError, ArchiveSinkResult};
pub use scope::{ScopeAnalyzer, ScopeAnalyzerError, ScopeAnalyzerResult};
pub use worker::{
    WorkerCapability, WorkerCapabilityError, WorkerCapabilityResult, WorkerDirective,
};
