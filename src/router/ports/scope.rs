//! Scope analysis port predicting the resource footprint of a trigger.

use crate::router::domain::TriggerEvent;
use crate::task::domain::ResourcePath;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for scope analysis operations.
pub type ScopeAnalyzerResult<T> = Result<T, ScopeAnalyzerError>;

/// Contract for predicting which resource paths a trigger will touch.
///
/// The prediction feeds pre-execution lease acquisition. An empty
/// prediction is valid and means the work is not expected to contend on
/// any guarded resource.
#[async_trait]
pub trait ScopeAnalyzer: Send + Sync {
    /// Predicts the resource paths work on `trigger` will modify.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeAnalyzerError`] when the analysis could not run.
    async fn predict(&self, trigger: &TriggerEvent) -> ScopeAnalyzerResult<Vec<ResourcePath>>;
}

/// Errors returned by scope analyzer implementations.
#[derive(Debug, Clone, Error)]
pub enum ScopeAnalyzerError {
    /// The analysis backend failed.
    #[error("scope analysis failed: {0}")]
    Analysis(Arc<dyn std::error::Error + Send + Sync>),
}

impl ScopeAnalyzerError {
    /// Wraps an analysis backend error.
    pub fn analysis(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Analysis(Arc::new(err))
    }
}
