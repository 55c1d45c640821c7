//! Task lifecycle states and the transition validity table.

use super::ParseTaskStateError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task lifecycle state.
///
/// A task starts in [`TaskState::Queued`] and only ever moves along the edges
/// encoded in [`TaskState::can_transition_to`]. The three terminal states
/// ([`TaskState::Completed`], [`TaskState::Archived`],
/// [`TaskState::HumanEscalation`]) admit no further transitions; reopening an
/// escalated task is a fresh creation, not a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Task has been created and awaits planning.
    Queued,
    /// A planning worker is producing a plan.
    Planning,
    /// A plan is awaiting human review.
    PlanReview,
    /// The plan has been approved for execution.
    Approved,
    /// An implementation worker is executing the plan.
    Executing,
    /// A change request is open for the task's work.
    PrOpen,
    /// A review worker is examining the open change request.
    PrAgentReview,
    /// A worker is applying review feedback to the change request.
    PrAgentFix,
    /// The most recent worker run reported failure.
    Failed,
    /// The fixer is assessing the failure.
    FixerReview,
    /// The fixer cleared the failure; execution will be retried.
    Retry,
    /// Automation is exhausted; a human must take over.
    HumanEscalation,
    /// The change request was merged.
    Completed,
    /// The task was closed without a merge.
    Archived,
}

impl TaskState {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Planning => "planning",
            Self::PlanReview => "plan_review",
            Self::Approved => "approved",
            Self::Executing => "executing",
            Self::PrOpen => "pr_open",
            Self::PrAgentReview => "pr_agent_review",
            Self::PrAgentFix => "pr_agent_fix",
            Self::Failed => "failed",
            Self::FixerReview => "fixer_review",
            Self::Retry => "retry",
            Self::HumanEscalation => "human_escalation",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }

    /// Returns whether a direct edge from `self` to `to` exists in the
    /// transition table.
    ///
    /// The table is exhaustive; any pair it does not list is rejected by
    /// [`Task::apply_transition`](super::Task::apply_transition).
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        match self {
            Self::Queued => matches!(to, Self::Planning),
            Self::Planning => matches!(to, Self::PlanReview | Self::Failed),
            Self::PlanReview => matches!(to, Self::Approved | Self::Planning),
            Self::Approved => matches!(to, Self::Executing),
            Self::Executing => matches!(to, Self::PrOpen | Self::Failed),
            Self::PrOpen => matches!(
                to,
                Self::PrAgentReview | Self::PrAgentFix | Self::Completed | Self::Archived
            ),
            Self::PrAgentReview | Self::PrAgentFix => matches!(to, Self::PrOpen),
            Self::Failed => matches!(to, Self::FixerReview),
            Self::FixerReview => matches!(to, Self::Retry | Self::HumanEscalation),
            Self::Retry => matches!(to, Self::Executing),
            Self::HumanEscalation | Self::Completed | Self::Archived => false,
        }
    }

    /// Returns whether the state admits no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::HumanEscalation | Self::Completed | Self::Archived
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskState {
    type Error = ParseTaskStateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "queued" => Ok(Self::Queued),
            "planning" => Ok(Self::Planning),
            "plan_review" => Ok(Self::PlanReview),
            "approved" => Ok(Self::Approved),
            "executing" => Ok(Self::Executing),
            "pr_open" => Ok(Self::PrOpen),
            "pr_agent_review" => Ok(Self::PrAgentReview),
            "pr_agent_fix" => Ok(Self::PrAgentFix),
            "failed" => Ok(Self::Failed),
            "fixer_review" => Ok(Self::FixerReview),
            "retry" => Ok(Self::Retry),
            "human_escalation" => Ok(Self::HumanEscalation),
            "completed" => Ok(Self::Completed),
            "archived" => Ok(Self::Archived),
            _ => Err(ParseTaskStateError(value.to_owned())),
        }
    }
}
