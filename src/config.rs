//! Engine configuration.
//!
//! All knobs carry defaults, so `EngineConfig::default()` is a working
//! configuration and a deserialized config file only needs to name the
//! fields it overrides.

use serde::{Deserialize, Serialize};

/// Tunable parameters for the coordination engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_qualifying_labels")]
    qualifying_labels: Vec<String>,
    #[serde(default = "default_lock_ttl_seconds")]
    lock_ttl_seconds: u32,
    #[serde(default = "default_executing_timeout_seconds")]
    executing_timeout_seconds: u32,
    #[serde(default = "default_max_fixer_attempts")]
    max_fixer_attempts: u32,
    #[serde(default = "default_version_retry_limit")]
    version_retry_limit: u32,
    #[serde(default = "default_observer_channel_capacity")]
    observer_channel_capacity: usize,
}

impl EngineConfig {
    /// Returns the labels that qualify a trigger for task creation.
    #[must_use]
    pub fn qualifying_labels(&self) -> &[String] {
        &self.qualifying_labels
    }

    /// Returns whether any of `labels` qualifies a trigger.
    ///
    /// Matching is case-insensitive.
    #[must_use]
    pub fn qualifies(&self, labels: &[String]) -> bool {
        labels.iter().any(|label| {
            self.qualifying_labels
                .iter()
                .any(|qualifying| qualifying.eq_ignore_ascii_case(label))
        })
    }

    /// Returns the lease time-to-live in seconds.
    #[must_use]
    pub const fn lock_ttl_seconds(&self) -> u32 {
        self.lock_ttl_seconds
    }

    /// Returns the wall-clock bound on time spent executing, in seconds.
    #[must_use]
    pub const fn executing_timeout_seconds(&self) -> u32 {
        self.executing_timeout_seconds
    }

    /// Returns how many fixer-approved retries a task gets before
    /// escalation.
    #[must_use]
    pub const fn max_fixer_attempts(&self) -> u32 {
        self.max_fixer_attempts
    }

    /// Returns the bound on conditional-write retries.
    #[must_use]
    pub const fn version_retry_limit(&self) -> u32 {
        self.version_retry_limit
    }

    /// Returns the buffer size of observer channels.
    #[must_use]
    pub const fn observer_channel_capacity(&self) -> usize {
        self.observer_channel_capacity
    }

    /// Replaces the qualifying label set.
    #[must_use]
    pub fn with_qualifying_labels(mut self, labels: impl IntoIterator<Item = String>) -> Self {
        self.qualifying_labels = labels.into_iter().collect();
        self
    }

    /// Sets the lease time-to-live in seconds.
    #[must_use]
    pub const fn with_lock_ttl_seconds(mut self, seconds: u32) -> Self {
        self.lock_ttl_seconds = seconds;
        self
    }

    /// Sets the wall-clock bound on time spent executing, in seconds.
    #[must_use]
    pub const fn with_executing_timeout_seconds(mut self, seconds: u32) -> Self {
        self.executing_timeout_seconds = seconds;
        self
    }

    /// Sets how many fixer-approved retries a task gets before escalation.
    #[must_use]
    pub const fn with_max_fixer_attempts(mut self, attempts: u32) -> Self {
        self.max_fixer_attempts = attempts;
        self
    }

    /// Sets the bound on conditional-write retries.
    #[must_use]
    pub const fn with_version_retry_limit(mut self, limit: u32) -> Self {
        self.version_retry_limit = limit;
        self
    }

    /// Sets the buffer size of observer channels.
    #[must_use]
    pub const fn with_observer_channel_capacity(mut self, capacity: usize) -> Self {
        self.observer_channel_capacity = capacity;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            qualifying_labels: default_qualifying_labels(),
            lock_ttl_seconds: default_lock_ttl_seconds(),
            executing_timeout_seconds: default_executing_timeout_seconds(),
            max_fixer_attempts: default_max_fixer_attempts(),
            version_retry_limit: default_version_retry_limit(),
            observer_channel_capacity: default_observer_channel_capacity(),
        }
    }
}

fn default_qualifying_labels() -> Vec<String> {
    vec!["agent-ok".to_owned(), "good-first-issue".to_owned()]
}

const fn default_lock_ttl_seconds() -> u32 {
    1800
}

const fn default_executing_timeout_seconds() -> u32 {
    3600
}

const fn default_max_fixer_attempts() -> u32 {
    2
}

const fn default_version_retry_limit() -> u32 {
    3
}

const fn default_observer_channel_capacity() -> usize {
    16
}
