//! Task aggregate root and related lifecycle types.

use super::{
    DecisionAction, DecisionActor, DecisionEntry, ExternalNumber, PlanRecord, ResourcePath,
    TaskDomainError, TaskId, TaskState, TaskVersion, TriggerOrigin,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata map supplied with a transition and recorded in the decision log.
pub type TransitionMetadata = BTreeMap<String, String>;

/// Well-known transition metadata keys with structural effects.
pub mod metadata_keys {
    /// Plan body produced by a planning worker.
    pub const PLAN: &str = "plan";
    /// Newline- or comma-separated resource paths a plan expects to touch.
    pub const FILES: &str = "files";
    /// Working branch name opened for the task.
    pub const BRANCH: &str = "branch";
    /// Change-request number opened for the task.
    pub const CHANGE_REQUEST: &str = "change_request";
    /// Error text from a failed worker run.
    pub const ERROR: &str = "error";
    /// Diff accompanying a failed worker run.
    pub const DIFF: &str = "diff";
    /// Fixer assessment attached to retry and escalation decisions.
    pub const DIAGNOSIS: &str = "diagnosis";
    /// Review verdict attached when an agent review concludes.
    pub const REVIEW: &str = "review";
    /// Free-form worker output attached to a transition.
    pub const OUTPUT: &str = "output";
    /// Trigger title carried into escalation context.
    pub const TRIGGER: &str = "trigger";
    /// Reason recorded when a task is cancelled.
    pub const CANCELLED: &str = "cancelled";
    /// Conflicting `path=holder` pairs recorded on a lock conflict.
    pub const CONFLICTS: &str = "conflicts";
}

/// Task aggregate root.
///
/// A task tracks one external trigger through the lifecycle state machine.
/// All mutation goes through validated methods that append to the decision
/// log and bump [`TaskVersion`], so a conditional store write can detect
/// racing writers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    origin: TriggerOrigin,
    title: String,
    state: TaskState,
    locked_files: Vec<ResourcePath>,
    plan_versions: Vec<PlanRecord>,
    decision_log: Vec<DecisionEntry>,
    retry_count: u32,
    branch: Option<String>,
    change_request: Option<ExternalNumber>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: TaskVersion,
}

/// Staged structural effects parsed from transition metadata.
#[derive(Debug, Default)]
struct StagedChanges {
    plan: Option<(String, Vec<ResourcePath>)>,
    branch: Option<String>,
    change_request: Option<ExternalNumber>,
}

impl StagedChanges {
    /// Validates well-known metadata keys against the current task state.
    fn parse(metadata: &TransitionMetadata, task: &Task) -> Result<Self, TaskDomainError> {
        let mut staged = Self::default();

        if let Some(body) = metadata.get(metadata_keys::PLAN) {
            let paths = metadata
                .get(metadata_keys::FILES)
                .map(|raw| ResourcePath::parse_list(raw))
                .transpose()?
                .unwrap_or_default();
            staged.plan = Some((body.clone(), paths));
        }

        if let Some(branch) = metadata.get(metadata_keys::BRANCH) {
            if task.branch.is_some() {
                return Err(TaskDomainError::BranchAlreadyAssociated(task.id));
            }
            staged.branch = Some(branch.clone());
        }

        if let Some(raw_number) = metadata.get(metadata_keys::CHANGE_REQUEST) {
            if task.change_request.is_some() {
                return Err(TaskDomainError::ChangeRequestAlreadyAssociated(task.id));
            }
            let parsed =
                raw_number
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| TaskDomainError::InvalidMetadataValue {
                        key: metadata_keys::CHANGE_REQUEST.to_owned(),
                        value: raw_number.clone(),
                    })?;
            staged.change_request = Some(ExternalNumber::new(parsed)?);
        }

        Ok(staged)
    }

    /// Applies the staged effects. Must only run after `parse` succeeded.
    fn apply(self, task: &mut Task, timestamp: DateTime<Utc>) {
        if let Some((body, paths)) = self.plan {
            task.plan_versions.push(PlanRecord::new(body, paths, timestamp));
        }
        if let Some(branch) = self.branch {
            task.branch = Some(branch);
        }
        if let Some(number) = self.change_request {
            task.change_request = Some(number);
        }
    }
}

impl Task {
    /// Creates a task from a qualifying external trigger.
    ///
    /// The task starts in [`TaskState::Queued`] at [`TaskVersion::initial`]
    /// with empty lock, plan, and decision histories.
    #[must_use]
    pub fn new_from_trigger(
        origin: TriggerOrigin,
        title: impl Into<String>,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        Self {
            id: TaskId::new(),
            origin,
            title: title.into(),
            state: TaskState::Queued,
            locked_files: Vec::new(),
            plan_versions: Vec::new(),
            decision_log: Vec::new(),
            retry_count: 0,
            branch: None,
            change_request: None,
            created_at: timestamp,
            updated_at: timestamp,
            version: TaskVersion::initial(),
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the external origin the task tracks.
    #[must_use]
    pub const fn origin(&self) -> &TriggerOrigin {
        &self.origin
    }

    /// Returns the trigger title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> TaskState {
        self.state
    }

    /// Returns the resource paths recorded as held by this task.
    #[must_use]
    pub fn locked_files(&self) -> &[ResourcePath] {
        &self.locked_files
    }

    /// Returns the append-only plan history.
    #[must_use]
    pub fn plan_versions(&self) -> &[PlanRecord] {
        &self.plan_versions
    }

    /// Returns the most recently recorded plan, if any.
    #[must_use]
    pub fn current_plan(&self) -> Option<&PlanRecord> {
        self.plan_versions.last()
    }

    /// Returns the append-only decision log.
    #[must_use]
    pub fn decision_log(&self) -> &[DecisionEntry] {
        &self.decision_log
    }

    /// Returns the number of fixer-approved retries performed.
    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Returns the associated working branch, if any.
    #[must_use]
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    /// Returns the associated change-request number, if any.
    #[must_use]
    pub const fn change_request(&self) -> Option<ExternalNumber> {
        self.change_request
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest mutation timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the optimistic-concurrency version.
    #[must_use]
    pub const fn version(&self) -> TaskVersion {
        self.version
    }

    /// Applies a validated transition to `to`.
    ///
    /// Sets the state, applies structural metadata effects (plan recording,
    /// branch and change-request association, retry counting on entering
    /// [`TaskState::Retry`]), appends the decision entry carrying the full
    /// metadata map, and bumps the version. Entering a terminal state clears
    /// the recorded resource paths, so the record never outlives the lease
    /// release that follows finalization. Fails without mutating anything.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] when the edge is not in
    /// the transition table, or a metadata validation error when a well-known
    /// key carries an unusable value or re-associates a reference.
    pub fn apply_transition(
        &mut self,
        to: TaskState,
        actor: DecisionActor,
        metadata: TransitionMetadata,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        if !self.state.can_transition_to(to) {
            return Err(TaskDomainError::InvalidTransition {
                task_id: self.id,
                from: self.state,
                to,
            });
        }
        let staged = StagedChanges::parse(&metadata, self)?;

        let previous = self.state;
        let timestamp = clock.utc();
        self.state = to;
        if to == TaskState::Retry {
            self.retry_count = self.retry_count.saturating_add(1);
        }
        if to.is_terminal() {
            self.locked_files.clear();
        }
        staged.apply(self, timestamp);
        self.decision_log.push(DecisionEntry::new(
            timestamp,
            actor,
            DecisionAction::Transition { from: previous, to },
            metadata,
        ));
        self.bump(timestamp);
        Ok(())
    }

    /// Appends a decision entry without changing state.
    pub fn record_decision(
        &mut self,
        actor: DecisionActor,
        action: DecisionAction,
        detail: TransitionMetadata,
        clock: &impl Clock,
    ) {
        let timestamp = clock.utc();
        self.decision_log
            .push(DecisionEntry::new(timestamp, actor, action, detail));
        self.bump(timestamp);
    }

    /// Cancels the task, forcing it to [`TaskState::Archived`].
    ///
    /// Cancellation is administrative: it bypasses the per-edge table (a stop
    /// must reach a safe terminal state from any live state) but is recorded
    /// and versioned exactly like a validated transition.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::AlreadyTerminal`] when the task already
    /// reached a terminal state.
    pub fn cancel(
        &mut self,
        actor: DecisionActor,
        reason: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        if self.state.is_terminal() {
            return Err(TaskDomainError::AlreadyTerminal {
                task_id: self.id,
                state: self.state,
            });
        }
        let previous = self.state;
        let timestamp = clock.utc();
        self.state = TaskState::Archived;
        self.locked_files.clear();
        let mut detail = TransitionMetadata::new();
        detail.insert(metadata_keys::CANCELLED.to_owned(), reason.into());
        self.decision_log.push(DecisionEntry::new(
            timestamp,
            actor,
            DecisionAction::Transition {
                from: previous,
                to: TaskState::Archived,
            },
            detail,
        ));
        self.bump(timestamp);
        Ok(())
    }

    /// Records the resource paths granted to this task.
    pub fn record_locked_files(&mut self, paths: Vec<ResourcePath>, clock: &impl Clock) {
        self.locked_files = paths;
        self.bump(clock.utc());
    }

    /// Returns the newest decision entry that transitioned into `state`.
    #[must_use]
    pub fn last_entry_for(&self, state: TaskState) -> Option<&DecisionEntry> {
        self.decision_log
            .iter()
            .rev()
            .find(|entry| entry.transition_target() == Some(state))
    }

    /// Returns when the task last entered `state`, per the decision log.
    #[must_use]
    pub fn last_entered(&self, state: TaskState) -> Option<DateTime<Utc>> {
        self.last_entry_for(state).map(DecisionEntry::timestamp)
    }

    /// Returns a lightweight point-in-time view of the task.
    #[must_use]
    pub const fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id,
            state: self.state,
            version: self.version,
            retry_count: self.retry_count,
            updated_at: self.updated_at,
        }
    }

    /// Bumps the version and mutation timestamp.
    fn bump(&mut self, timestamp: DateTime<Utc>) {
        self.version = self.version.next();
        self.updated_at = timestamp;
    }
}

/// Point-in-time view of a task returned by mutating operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    id: TaskId,
    state: TaskState,
    version: TaskVersion,
    retry_count: u32,
    updated_at: DateTime<Utc>,
}

impl TaskSnapshot {
    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the lifecycle state at snapshot time.
    #[must_use]
    pub const fn state(&self) -> TaskState {
        self.state
    }

    /// Returns the version at snapshot time.
    #[must_use]
    pub const fn version(&self) -> TaskVersion {
        self.version
    }

    /// Returns the retry count at snapshot time.
    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Returns the mutation timestamp at snapshot time.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Immutable record of a task that reached a terminal state.
///
/// The decision log inside is frozen; archived records are retained for
/// audit and never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedTask {
    task: Task,
    archived_at: DateTime<Utc>,
}

impl ArchivedTask {
    /// Creates an archived record from a finalized task.
    #[must_use]
    pub const fn new(task: Task, archived_at: DateTime<Utc>) -> Self {
        Self { task, archived_at }
    }

    /// Returns the finalized task.
    #[must_use]
    pub const fn task(&self) -> &Task {
        &self.task
    }

    /// Returns when the task was archived.
    #[must_use]
    pub const fn archived_at(&self) -> DateTime<Utc> {
        self.archived_at
    }
}
