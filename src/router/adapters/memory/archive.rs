//! In-memory archive sink backing tests and single-process runs.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::router::ports::{ArchiveSink, ArchiveSinkError, ArchiveSinkResult};
use crate::task::domain::ArchivedTask;

/// Thread-safe in-memory archive sink.
///
/// Records are serialized on delivery, matching what an external archive
/// would receive.
#[derive(Debug, Clone, Default)]
pub struct InMemoryArchiveSink {
    records: Arc<RwLock<Vec<serde_json::Value>>>,
}

impl InMemoryArchiveSink {
    /// Creates an empty in-memory archive sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every delivered record.
    #[must_use]
    pub fn delivered(&self) -> Vec<serde_json::Value> {
        self.records
            .read()
            .map_or_else(|_| Vec::new(), |records| records.clone())
    }
}

#[async_trait]
impl ArchiveSink for InMemoryArchiveSink {
    async fn deliver(&self, record: &ArchivedTask) -> ArchiveSinkResult<()> {
        let value = serde_json::to_value(record).map_err(ArchiveSinkError::delivery)?;
        let mut records = self
            .records
            .write()
            .map_err(|err| ArchiveSinkError::delivery(std::io::Error::other(err.to_string())))?;
        records.push(value);
        Ok(())
    }
}
