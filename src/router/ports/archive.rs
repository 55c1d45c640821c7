//! Archive sink port receiving finalized tasks.

use crate::task::domain::ArchivedTask;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for archive sink operations.
pub type ArchiveSinkResult<T> = Result<T, ArchiveSinkError>;

/// Contract for handing finalized tasks to an external archive.
///
/// Delivery is best-effort from the engine's perspective; the task remains
/// archived in the store whether or not the sink accepts it.
#[async_trait]
pub trait ArchiveSink: Send + Sync {
    /// Delivers one finalized task record.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveSinkError`] when the record could not be delivered.
    async fn deliver(&self, record: &ArchivedTask) -> ArchiveSinkResult<()>;
}

/// Errors returned by archive sink implementations.
#[derive(Debug, Clone, Error)]
pub enum ArchiveSinkError {
    /// The record could not be delivered.
    #[error("archive delivery failed: {0}")]
    Delivery(Arc<dyn std::error::Error + Send + Sync>),
}

impl ArchiveSinkError {
    /// Wraps a delivery error.
    pub fn delivery(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Delivery(Arc::new(err))
    }
}
