//! Event router orchestrating tasks, leases, and worker invocations.

use crate::config::EngineConfig;
use crate::lock::{
    domain::{AcquireOutcome, LockConflict},
    ports::{LockTable, LockTableError},
    services::LockCoordinator,
};
use crate::router::{
    domain::{CommandEvent, CommandKind, Disposition, EngineEvent, TriggerEvent, WorkerResult},
    ports::{ArchiveSink, ScopeAnalyzer, ScopeAnalyzerError, WorkerCapability, WorkerDirective},
};
use crate::task::{
    domain::{
        metadata_keys, DecisionAction, DecisionActor, DecisionEntry, ResourcePath, Task,
        TaskDomainError, TaskId, TaskState, TransitionMetadata, TriggerOrigin,
    },
    ports::TaskStoreError,
    services::{TaskLifecycleError, TaskLifecycleService, TransitionRequest},
};
use crate::task::ports::TaskStore;
use chrono::Duration;
use mockable::Clock;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Result type for router operations.
pub type RouterResult<T> = Result<T, RouterError>;

/// Errors returned by the router.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Task lifecycle operation failed.
    #[error(transparent)]
    Lifecycle(#[from] TaskLifecycleError),

    /// Lease operation failed.
    #[error(transparent)]
    Lock(#[from] LockTableError),

    /// Scope analysis failed.
    #[error(transparent)]
    Scope(#[from] ScopeAnalyzerError),

    /// Domain validation failed outside a lifecycle operation.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),
}

/// A task waiting out a lease conflict, with the paths it still needs.
#[derive(Debug, Clone)]
struct PendingGate {
    task_id: TaskId,
    paths: Vec<ResourcePath>,
}

/// What the drive loop should do for a task in its current state.
enum DriveStep {
    /// Invoke the worker with this directive.
    Invoke(WorkerDirective),
    /// Take the automatic edge to this state.
    Auto(TaskState),
    /// Nothing to do; the task waits on an external actor.
    Settle,
}

/// Outcome of one gated start attempt.
enum GateOutcome {
    Started(Disposition),
    Conflicted(Vec<LockConflict>),
}

/// Central event router.
///
/// Consumes engine events, keeps exactly one live task per trigger origin,
/// gates work-starting transitions behind lease acquisition, drives worker
/// invocations to a settled state, and finalizes tasks that reach a
/// terminal state. Conflicted tasks wait on a FIFO queue that is pumped
/// once after every handled event, so released leases are handed to the
/// longest-waiting task first.
pub struct TaskRouter<S, L, W, P, A, C>
where
    S: TaskStore,
    L: LockTable,
    W: WorkerCapability,
    P: ScopeAnalyzer,
    A: ArchiveSink,
    C: Clock + Send + Sync,
{
    lifecycle: TaskLifecycleService<S, C>,
    locks: LockCoordinator<L, C>,
    worker: Arc<W>,
    scope: Arc<P>,
    archive_sink: Arc<A>,
    clock: Arc<C>,
    config: EngineConfig,
    pending: Mutex<VecDeque<PendingGate>>,
}

impl<S, L, W, P, A, C> TaskRouter<S, L, W, P, A, C>
where
    S: TaskStore,
    L: LockTable,
    W: WorkerCapability,
    P: ScopeAnalyzer,
    A: ArchiveSink,
    C: Clock + Send + Sync,
{
    /// Creates a new router.
    #[must_use]
    pub const fn new(
        lifecycle: TaskLifecycleService<S, C>,
        locks: LockCoordinator<L, C>,
        worker: Arc<W>,
        scope: Arc<P>,
        archive_sink: Arc<A>,
        clock: Arc<C>,
        config: EngineConfig,
    ) -> Self {
        Self {
            lifecycle,
            locks,
            worker,
            scope,
            archive_sink,
            clock,
            config,
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Returns the lifecycle service the router drives.
    #[must_use]
    pub const fn lifecycle(&self) -> &TaskLifecycleService<S, C> {
        &self.lifecycle
    }

    /// Returns how many tasks are waiting out a lease conflict.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().map_or(0, |queue| queue.len())
    }

    /// Walks the pending queue once on host demand.
    ///
    /// Hosts call this from a timer so queued tasks can move when leases
    /// expire without any event arriving.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError`] when a store or lease operation fails.
    pub async fn pump(&self) -> RouterResult<()> {
        self.pump_pending().await
    }

    /// Handles one engine event and reports what became of it.
    ///
    /// Handling is idempotent: replayed events find their implied transition
    /// already taken and are discarded rather than failing. A transition
    /// invalidated by an earlier event is likewise discarded, not raised.
    /// After the event is dispatched, the pending queue gets one pass so
    /// tasks waiting on freed leases can move.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError`] when a store, lease, or scope operation
    /// fails.
    pub async fn handle_event(&self, event: EngineEvent) -> RouterResult<Disposition> {
        let disposition = match self.dispatch(event).await {
            Ok(disposition) => disposition,
            Err(RouterError::Lifecycle(TaskLifecycleError::Domain(err))) if is_stale(&err) => {
                tracing::warn!(error = %err, "stale event discarded");
                Disposition::Discarded {
                    reason: err.to_string(),
                }
            }
            Err(err) => return Err(err),
        };
        self.pump_pending().await?;
        Ok(disposition)
    }

    async fn dispatch(&self, event: EngineEvent) -> RouterResult<Disposition> {
        match event {
            EngineEvent::Trigger(trigger) => self.handle_trigger(&trigger).await,
            EngineEvent::Command { origin, command } => {
                self.handle_command(&origin, command).await
            }
            EngineEvent::WorkerFinished { task_id, result } => {
                self.handle_worker_finished(task_id, result).await
            }
            EngineEvent::TimeoutTick { task_id } => self.handle_timeout(task_id).await,
            EngineEvent::ChangeResolved { origin, merged } => {
                self.handle_change_resolved(&origin, merged).await
            }
        }
    }

    async fn handle_trigger(&self, trigger: &TriggerEvent) -> RouterResult<Disposition> {
        if !self.config.qualifies(&trigger.labels) {
            return Ok(Disposition::Discarded {
                reason: "no qualifying label on trigger".to_owned(),
            });
        }
        let origin = TriggerOrigin::from_parts(&trigger.repo, trigger.external_ref)?;
        if self.lifecycle.find_by_origin(&origin).await?.is_some() {
            return Ok(Disposition::Discarded {
                reason: format!("origin {origin} already tracked"),
            });
        }
        let task = match self
            .lifecycle
            .create_from_trigger(origin.clone(), trigger.title.clone())
            .await
        {
            Ok(task) => task,
            Err(TaskLifecycleError::Store(TaskStoreError::DuplicateOrigin(_))) => {
                return Ok(Disposition::Discarded {
                    reason: format!("origin {origin} already tracked"),
                });
            }
            Err(err) => return Err(err.into()),
        };
        tracing::info!(task_id = %task.id(), origin = %origin, "task created from trigger");

        let predicted = self.scope.predict(trigger).await?;
        match self
            .gate_and_start(task.id(), &predicted, TaskState::Planning)
            .await?
        {
            GateOutcome::Started(Disposition::Advanced(snapshot)) => {
                Ok(Disposition::Created(snapshot))
            }
            GateOutcome::Started(other) => Ok(other),
            GateOutcome::Conflicted(conflicts) => {
                self.note_conflict(task.id(), &conflicts).await?;
                self.enqueue_pending(task.id(), predicted);
                Ok(Disposition::Requeued(task.id()))
            }
        }
    }

    async fn handle_command(
        &self,
        origin: &TriggerOrigin,
        command: CommandEvent,
    ) -> RouterResult<Disposition> {
        let Some(kind) = CommandKind::parse(&command.body) else {
            return Ok(Disposition::Discarded {
                reason: "no recognized command in comment".to_owned(),
            });
        };
        let Some(task) = self.lifecycle.find_by_origin(origin).await? else {
            return Ok(Disposition::Discarded {
                reason: format!("no live task for origin {origin}"),
            });
        };
        let actor = DecisionActor::human(command.actor);
        tracing::info!(
            task_id = %task.id(),
            command = %kind,
            actor = %actor,
            "command received"
        );
        match kind {
            CommandKind::Approve => self.handle_approve(&task, actor).await,
            CommandKind::Revise => {
                self.advance_and_drive(&task, TaskState::Planning, actor).await
            }
            CommandKind::Review => {
                self.advance_and_drive(&task, TaskState::PrAgentReview, actor)
                    .await
            }
            CommandKind::Fix => {
                self.advance_and_drive(&task, TaskState::PrAgentFix, actor)
                    .await
            }
            CommandKind::Stop => self.handle_stop(&task, actor).await,
        }
    }

    async fn handle_approve(
        &self,
        task: &Task,
        actor: DecisionActor,
    ) -> RouterResult<Disposition> {
        self.lifecycle
            .transition(TransitionRequest::new(task.id(), TaskState::Approved).with_actor(actor))
            .await?;
        let paths = execution_paths(task);
        match self
            .gate_and_start(task.id(), &paths, TaskState::Executing)
            .await?
        {
            GateOutcome::Started(disposition) => Ok(disposition),
            GateOutcome::Conflicted(conflicts) => {
                self.note_conflict(task.id(), &conflicts).await?;
                self.enqueue_pending(task.id(), paths);
                Ok(Disposition::Requeued(task.id()))
            }
        }
    }

    async fn advance_and_drive(
        &self,
        task: &Task,
        to: TaskState,
        actor: DecisionActor,
    ) -> RouterResult<Disposition> {
        self.lifecycle
            .transition(TransitionRequest::new(task.id(), to).with_actor(actor))
            .await?;
        self.drive_worker(task.id()).await
    }

    async fn handle_stop(&self, task: &Task, actor: DecisionActor) -> RouterResult<Disposition> {
        let snapshot = self.lifecycle.cancel(task.id(), actor, "stop command").await?;
        self.finalize(task.id()).await?;
        tracing::info!(task_id = %task.id(), "task stopped and archived");
        Ok(Disposition::Finalized(snapshot))
    }

    async fn handle_worker_finished(
        &self,
        task_id: TaskId,
        result: WorkerResult,
    ) -> RouterResult<Disposition> {
        let task = match self.lifecycle.get_task(task_id).await {
            Ok(task) => task,
            Err(TaskLifecycleError::TaskNotFound(_)) => {
                return Ok(Disposition::Discarded {
                    reason: format!("no live task {task_id}"),
                });
            }
            Err(err) => return Err(err.into()),
        };
        let DriveStep::Invoke(directive) = step_for(&task) else {
            return Ok(Disposition::Discarded {
                reason: format!("no worker invocation outstanding in state {}", task.state()),
            });
        };
        let disposition = self.apply_result(&task, &directive, result).await?;
        match disposition {
            Disposition::Advanced(_) => self.drive_worker(task_id).await,
            other => Ok(other),
        }
    }

    async fn handle_timeout(&self, task_id: TaskId) -> RouterResult<Disposition> {
        let task = match self.lifecycle.get_task(task_id).await {
            Ok(task) => task,
            Err(TaskLifecycleError::TaskNotFound(_)) => {
                return Ok(Disposition::Discarded {
                    reason: format!("no live task {task_id}"),
                });
            }
            Err(err) => return Err(err.into()),
        };
        if task.state() != TaskState::Executing {
            return Ok(Disposition::Discarded {
                reason: format!("task {task_id} not executing"),
            });
        }
        let Some(entered) = task.last_entered(TaskState::Executing) else {
            return Ok(Disposition::Discarded {
                reason: format!("task {task_id} has no execution record"),
            });
        };
        let bound = Duration::seconds(i64::from(self.config.executing_timeout_seconds()));
        let elapsed = self.clock.utc().signed_duration_since(entered);
        if elapsed < bound {
            return Ok(Disposition::Discarded {
                reason: format!("task {task_id} within execution bound"),
            });
        }
        tracing::warn!(
            task_id = %task_id,
            elapsed_seconds = elapsed.num_seconds(),
            "execution exceeded wall-clock bound"
        );
        self.lifecycle
            .transition(
                TransitionRequest::new(task_id, TaskState::Failed).with_metadata_entry(
                    metadata_keys::ERROR,
                    format!(
                        "execution exceeded {}s wall-clock bound",
                        self.config.executing_timeout_seconds()
                    ),
                ),
            )
            .await?;
        self.drive_worker(task_id).await
    }

    async fn handle_change_resolved(
        &self,
        origin: &TriggerOrigin,
        merged: bool,
    ) -> RouterResult<Disposition> {
        let Some(task) = self.lifecycle.find_by_origin(origin).await? else {
            return Ok(Disposition::Discarded {
                reason: format!("no live task for origin {origin}"),
            });
        };
        let to = if merged {
            TaskState::Completed
        } else {
            TaskState::Archived
        };
        let snapshot = self
            .lifecycle
            .transition(TransitionRequest::new(task.id(), to))
            .await?;
        self.finalize(task.id()).await?;
        tracing::info!(
            task_id = %task.id(),
            state = %snapshot.state(),
            "change request resolved, task finalized"
        );
        Ok(Disposition::Finalized(snapshot))
    }

    /// Acquires the leases for `paths`, then takes the work-starting
    /// transition and drives the worker. On conflict nothing moves.
    async fn gate_and_start(
        &self,
        task_id: TaskId,
        paths: &[ResourcePath],
        to: TaskState,
    ) -> RouterResult<GateOutcome> {
        let ttl = Duration::seconds(i64::from(self.config.lock_ttl_seconds()));
        match self.locks.acquire(task_id, paths.to_vec(), ttl).await? {
            AcquireOutcome::Granted => {
                let held = self.locks.held_by(task_id).await?;
                self.lifecycle.record_locked_files(task_id, held).await?;
                self.lifecycle
                    .transition(TransitionRequest::new(task_id, to))
                    .await?;
                let disposition = self.drive_worker(task_id).await?;
                Ok(GateOutcome::Started(disposition))
            }
            AcquireOutcome::Conflicted(conflicts) => {
                tracing::info!(
                    task_id = %task_id,
                    conflicts = conflicts.len(),
                    "lease conflict, task queued"
                );
                Ok(GateOutcome::Conflicted(conflicts))
            }
        }
    }

    /// Advances the task until it settles: automatic edges are taken
    /// directly, worker states invoke the worker and interpret its result.
    ///
    /// The loop is bounded by the fixer retry budget; every pass either
    /// settles the task, finalizes it, or consumes one worker invocation.
    async fn drive_worker(&self, task_id: TaskId) -> RouterResult<Disposition> {
        let mut disposition: Option<Disposition> = None;
        loop {
            let task = match self.lifecycle.get_task(task_id).await {
                Ok(task) => task,
                Err(TaskLifecycleError::TaskNotFound(_)) => {
                    return Ok(disposition.unwrap_or_else(|| Disposition::Discarded {
                        reason: format!("task {task_id} no longer live"),
                    }));
                }
                Err(err) => return Err(err.into()),
            };
            match step_for(&task) {
                DriveStep::Settle => {
                    return Ok(disposition
                        .unwrap_or_else(|| Disposition::Advanced(task.snapshot())));
                }
                DriveStep::Auto(to) => {
                    let snapshot = self
                        .lifecycle
                        .transition(TransitionRequest::new(task_id, to))
                        .await?;
                    disposition = Some(Disposition::Advanced(snapshot));
                }
                DriveStep::Invoke(directive) => {
                    let applied = self.invoke_and_interpret(&task, directive).await?;
                    if !matches!(applied, Disposition::Advanced(_)) {
                        return Ok(applied);
                    }
                    disposition = Some(applied);
                }
            }
        }
    }

    /// Invokes the worker, then re-reads the task and discards the result
    /// when the task changed underneath the invocation.
    async fn invoke_and_interpret(
        &self,
        task: &Task,
        directive: WorkerDirective,
    ) -> RouterResult<Disposition> {
        let observed_version = task.version();
        tracing::debug!(task_id = %task.id(), state = %task.state(), "invoking worker");
        let result = match self.worker.execute(task, directive.clone()).await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(task_id = %task.id(), error = %err, "worker invocation failed");
                WorkerResult::failure(err.to_string())
            }
        };
        let current = match self.lifecycle.get_task(task.id()).await {
            Ok(current) => current,
            Err(TaskLifecycleError::TaskNotFound(_)) => {
                return Ok(Disposition::Discarded {
                    reason: format!("task {} finalized during worker execution", task.id()),
                });
            }
            Err(err) => return Err(err.into()),
        };
        if current.version() != observed_version {
            tracing::info!(
                task_id = %task.id(),
                "task changed during worker execution, result discarded"
            );
            return Ok(Disposition::Discarded {
                reason: format!("task {} changed during worker execution", task.id()),
            });
        }
        self.apply_result(&current, &directive, result).await
    }

    async fn apply_result(
        &self,
        task: &Task,
        directive: &WorkerDirective,
        result: WorkerResult,
    ) -> RouterResult<Disposition> {
        match directive {
            WorkerDirective::Plan => self.conclude_planning(task, result).await,
            WorkerDirective::Implement => self.conclude_implementation(task, result).await,
            WorkerDirective::Review | WorkerDirective::ApplyReview => {
                self.conclude_change_review(task, result).await
            }
            WorkerDirective::Fix { .. } => self.conclude_fixer(task, result).await,
        }
    }

    async fn conclude_planning(
        &self,
        task: &Task,
        result: WorkerResult,
    ) -> RouterResult<Disposition> {
        if !result.success {
            return self.record_failure(task, &result).await;
        }
        let mut request = TransitionRequest::new(task.id(), TaskState::PlanReview)
            .with_metadata_entry(metadata_keys::PLAN, result.output);
        if !result.diagnostics.is_empty() {
            request = request
                .with_metadata_entry(metadata_keys::FILES, result.diagnostics.join("\n"));
        }
        let snapshot = self.lifecycle.transition(request).await?;
        Ok(Disposition::Advanced(snapshot))
    }

    async fn conclude_implementation(
        &self,
        task: &Task,
        result: WorkerResult,
    ) -> RouterResult<Disposition> {
        if !result.success {
            return self.record_failure(task, &result).await;
        }
        let mut metadata = metadata_from_diagnostics(&result.diagnostics);
        if !result.output.is_empty() {
            metadata.insert(metadata_keys::OUTPUT.to_owned(), result.output);
        }
        let snapshot = self
            .lifecycle
            .transition(TransitionRequest::new(task.id(), TaskState::PrOpen).with_metadata(metadata))
            .await?;
        Ok(Disposition::Advanced(snapshot))
    }

    /// Review and review-fix results both settle back on the open change
    /// request; a failed pass is recorded there rather than failing the
    /// task.
    async fn conclude_change_review(
        &self,
        task: &Task,
        result: WorkerResult,
    ) -> RouterResult<Disposition> {
        let key = if result.success {
            metadata_keys::REVIEW
        } else {
            metadata_keys::ERROR
        };
        let snapshot = self
            .lifecycle
            .transition(
                TransitionRequest::new(task.id(), TaskState::PrOpen)
                    .with_metadata_entry(key, result.output),
            )
            .await?;
        Ok(Disposition::Advanced(snapshot))
    }

    /// Chooses between another retry and human escalation once the fixer
    /// has spoken.
    async fn conclude_fixer(
        &self,
        task: &Task,
        result: WorkerResult,
    ) -> RouterResult<Disposition> {
        let diagnosis = if result.success {
            result.output
        } else {
            format!("fixer failed: {}", result.output)
        };
        if result.success && task.retry_count() < self.config.max_fixer_attempts() {
            let snapshot = self
                .lifecycle
                .transition(
                    TransitionRequest::new(task.id(), TaskState::Retry)
                        .with_metadata_entry(metadata_keys::DIAGNOSIS, diagnosis),
                )
                .await?;
            return Ok(Disposition::Advanced(snapshot));
        }
        self.escalate(task, diagnosis).await
    }

    async fn record_failure(
        &self,
        task: &Task,
        result: &WorkerResult,
    ) -> RouterResult<Disposition> {
        let snapshot = self
            .lifecycle
            .transition(
                TransitionRequest::new(task.id(), TaskState::Failed)
                    .with_metadata(failure_metadata(result)),
            )
            .await?;
        tracing::warn!(task_id = %task.id(), "worker reported failure");
        Ok(Disposition::Advanced(snapshot))
    }

    /// Escalates to a human with the full failure context and finalizes.
    async fn escalate(&self, task: &Task, diagnosis: String) -> RouterResult<Disposition> {
        let mut request = TransitionRequest::new(task.id(), TaskState::HumanEscalation)
            .with_metadata_entry(metadata_keys::DIAGNOSIS, diagnosis)
            .with_metadata_entry(metadata_keys::TRIGGER, task.title());
        if let Some(plan) = task.current_plan() {
            request = request.with_metadata_entry(metadata_keys::PLAN, plan.body());
        }
        if let Some(entry) = task.last_entry_for(TaskState::Failed) {
            for key in [metadata_keys::ERROR, metadata_keys::DIFF] {
                if let Some(value) = entry.detail().get(key) {
                    request = request.with_metadata_entry(key, value.clone());
                }
            }
        }
        let snapshot = self.lifecycle.transition(request).await?;
        self.finalize(task.id()).await?;
        tracing::warn!(task_id = %task.id(), "task escalated to human");
        Ok(Disposition::Escalated(snapshot))
    }

    /// Releases the task's leases, archives it, and hands the record to the
    /// sink. Sink failures are logged and swallowed; the archive in the
    /// store is authoritative.
    async fn finalize(&self, task_id: TaskId) -> RouterResult<()> {
        let released = self.locks.release(task_id).await?;
        if !released.is_empty() {
            tracing::debug!(task_id = %task_id, released = released.len(), "leases released");
        }
        let task = self.lifecycle.get_task(task_id).await?;
        let record = self.lifecycle.archive(task).await?;
        if let Err(err) = self.archive_sink.deliver(&record).await {
            tracing::warn!(task_id = %task_id, error = %err, "archive sink delivery failed");
        }
        Ok(())
    }

    async fn note_conflict(
        &self,
        task_id: TaskId,
        conflicts: &[LockConflict],
    ) -> RouterResult<()> {
        let mut detail = TransitionMetadata::new();
        detail.insert(metadata_keys::CONFLICTS.to_owned(), format_conflicts(conflicts));
        self.lifecycle
            .record_decision(
                task_id,
                DecisionActor::System,
                DecisionAction::Note {
                    summary: "lease conflict, queued for retry".to_owned(),
                },
                detail,
            )
            .await?;
        Ok(())
    }

    fn enqueue_pending(&self, task_id: TaskId, paths: Vec<ResourcePath>) {
        let Ok(mut queue) = self.pending.lock() else {
            tracing::warn!(task_id = %task_id, "pending queue poisoned, dropping requeue");
            return;
        };
        if queue.iter().any(|entry| entry.task_id == task_id) {
            return;
        }
        queue.push_back(PendingGate { task_id, paths });
    }

    /// Walks the pending queue once in arrival order. Progressed and stale
    /// entries leave the queue; conflicted entries keep their position.
    async fn pump_pending(&self) -> RouterResult<()> {
        let entries: Vec<PendingGate> = {
            let Ok(mut queue) = self.pending.lock() else {
                return Ok(());
            };
            queue.drain(..).collect()
        };
        if entries.is_empty() {
            return Ok(());
        }
        let mut retained = Vec::new();
        for entry in entries {
            match self.retry_gate(&entry).await {
                Ok(true) => {}
                Ok(false) => retained.push(entry),
                Err(err) => {
                    tracing::warn!(
                        task_id = %entry.task_id,
                        error = %err,
                        "requeue attempt failed, keeping task queued"
                    );
                    retained.push(entry);
                }
            }
        }
        if !retained.is_empty() {
            let Ok(mut queue) = self.pending.lock() else {
                return Ok(());
            };
            for entry in retained.into_iter().rev() {
                queue.push_front(entry);
            }
        }
        Ok(())
    }

    /// Retries one queued gate. Returns `true` when the entry is done with
    /// the queue, `false` when it should keep waiting.
    async fn retry_gate(&self, entry: &PendingGate) -> RouterResult<bool> {
        let task = match self.lifecycle.get_task(entry.task_id).await {
            Ok(task) => task,
            Err(TaskLifecycleError::TaskNotFound(_)) => return Ok(true),
            Err(err) => return Err(err.into()),
        };
        let to = match task.state() {
            TaskState::Queued => TaskState::Planning,
            TaskState::Approved => TaskState::Executing,
            _ => return Ok(true),
        };
        match self.gate_and_start(entry.task_id, &entry.paths, to).await? {
            GateOutcome::Started(_) => Ok(true),
            GateOutcome::Conflicted(_) => Ok(false),
        }
    }
}

/// Returns true for domain errors that mean the event arrived late rather
/// than that handling is broken.
const fn is_stale(err: &TaskDomainError) -> bool {
    matches!(
        err,
        TaskDomainError::InvalidTransition { .. } | TaskDomainError::AlreadyTerminal { .. }
    )
}

fn step_for(task: &Task) -> DriveStep {
    match task.state() {
        TaskState::Planning => DriveStep::Invoke(WorkerDirective::Plan),
        TaskState::Executing => DriveStep::Invoke(WorkerDirective::Implement),
        TaskState::PrAgentReview => DriveStep::Invoke(WorkerDirective::Review),
        TaskState::PrAgentFix => DriveStep::Invoke(WorkerDirective::ApplyReview),
        TaskState::FixerReview => DriveStep::Invoke(fixer_directive(task)),
        TaskState::Failed => DriveStep::Auto(TaskState::FixerReview),
        TaskState::Retry => DriveStep::Auto(TaskState::Executing),
        TaskState::Queued
        | TaskState::PlanReview
        | TaskState::Approved
        | TaskState::PrOpen
        | TaskState::HumanEscalation
        | TaskState::Completed
        | TaskState::Archived => DriveStep::Settle,
    }
}

/// Builds the fixer directive from the newest recorded failure.
fn fixer_directive(task: &Task) -> WorkerDirective {
    let detail = task
        .last_entry_for(TaskState::Failed)
        .map(DecisionEntry::detail);
    let diff = detail
        .and_then(|d| d.get(metadata_keys::DIFF))
        .cloned()
        .unwrap_or_default();
    let error = detail
        .and_then(|d| d.get(metadata_keys::ERROR))
        .cloned()
        .unwrap_or_default();
    WorkerDirective::Fix { diff, error }
}

/// Paths the execution gate should lease: the latest plan's declared paths
/// when present, otherwise whatever the task already holds.
fn execution_paths(task: &Task) -> Vec<ResourcePath> {
    task.current_plan()
        .map(|plan| plan.resource_paths().to_vec())
        .filter(|paths| !paths.is_empty())
        .unwrap_or_else(|| task.locked_files().to_vec())
}

fn format_conflicts(conflicts: &[LockConflict]) -> String {
    conflicts
        .iter()
        .map(|conflict| format!("{}={}", conflict.path, conflict.holder))
        .collect::<Vec<_>>()
        .join(",")
}

/// Copies `key=value` diagnostics lines into transition metadata.
fn metadata_from_diagnostics(diagnostics: &[String]) -> TransitionMetadata {
    let mut metadata = TransitionMetadata::new();
    for line in diagnostics {
        if let Some((raw_key, raw_value)) = line.split_once('=') {
            let key = raw_key.trim();
            if key.is_empty() {
                continue;
            }
            metadata.insert(key.to_owned(), raw_value.trim().to_owned());
        }
    }
    metadata
}

fn failure_metadata(result: &WorkerResult) -> TransitionMetadata {
    let mut metadata = TransitionMetadata::new();
    metadata.insert(metadata_keys::ERROR.to_owned(), result.output.clone());
    let diff = result.diagnostics.join("\n");
    if !diff.is_empty() {
        metadata.insert(metadata_keys::DIFF.to_owned(), diff);
    }
    metadata
}
