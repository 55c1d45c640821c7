//! Normalized resource paths used for lock claims.

use super::TaskDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized repository-relative path naming a lockable resource.
///
/// Normalization trims surrounding whitespace and strips leading `./`
/// segments; comparison thereafter is exact string equality. Prefix and glob
/// matching are deliberately unsupported.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourcePath(String);

impl ResourcePath {
    /// Creates a validated, normalized resource path.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidResourcePath`] when the value is
    /// empty after normalization, is absolute, or ends with a slash.
    pub fn new(value: impl Into<String>) -> Result<Self, TaskDomainError> {
        let raw = value.into();
        let mut normalized = raw.trim();
        while let Some(stripped) = normalized.strip_prefix("./") {
            normalized = stripped;
        }
        if normalized.is_empty() || normalized.starts_with('/') || normalized.ends_with('/') {
            return Err(TaskDomainError::InvalidResourcePath(raw));
        }
        Ok(Self(normalized.to_owned()))
    }

    /// Parses a newline- or comma-separated path list, skipping blanks.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidResourcePath`] for the first entry
    /// that fails validation.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>, TaskDomainError> {
        raw.split(['\n', ','])
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(Self::new)
            .collect()
    }

    /// Returns the normalized path as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ResourcePath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
