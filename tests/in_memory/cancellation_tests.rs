//! Stop-command finalization and late-event discard tests.

use crate::in_memory::helpers::{engine, paths, qualifying_trigger, Engine};
use rstest::rstest;
use signalbox::router::domain::{
    CommandEvent, Disposition, EngineEvent, WorkerResult,
};
use signalbox::task::domain::{
    metadata_keys, DecisionActor, Task, TaskState, TriggerOrigin,
};
use signalbox::task::services::TransitionRequest;

fn origin(external_ref: u64) -> TriggerOrigin {
    TriggerOrigin::from_parts("owner/repo", external_ref).expect("valid origin")
}

fn stop_command(external_ref: u64) -> EngineEvent {
    EngineEvent::Command {
        origin: origin(external_ref),
        command: CommandEvent::new("/stop", "alice"),
    }
}

/// Drives a fresh trigger through planning to `PLAN_REVIEW`.
async fn park_in_plan_review(engine: &Engine, external_ref: u64) -> Task {
    engine
        .scope
        .predict_for(external_ref, paths(&["src/parser.rs"]));
    engine
        .worker
        .enqueue(WorkerResult::success("1. fix the parser"));
    let disposition = engine
        .router
        .handle_event(EngineEvent::Trigger(qualifying_trigger(
            external_ref,
            "Fix parser edge case",
        )))
        .await
        .expect("trigger handling should succeed");
    assert!(
        matches!(disposition, Disposition::Created(_)),
        "expected creation, got {disposition:?}"
    );
    engine
        .router
        .lifecycle()
        .find_by_origin(&origin(external_ref))
        .await
        .expect("lookup should succeed")
        .expect("task should be live")
}

/// Creates a task and rests it in `PLANNING`, as an embedder dispatching to
/// an out-of-process worker pool would.
async fn park_in_planning(engine: &Engine, external_ref: u64) -> Task {
    let lifecycle = engine.router.lifecycle();
    let task = lifecycle
        .create_from_trigger(origin(external_ref), "Fix parser edge case")
        .await
        .expect("creation should succeed");
    lifecycle
        .transition(TransitionRequest::new(task.id(), TaskState::Planning))
        .await
        .expect("transition should succeed");
    lifecycle
        .get_task(task.id())
        .await
        .expect("task should be live")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stop_command_finalizes_the_task() {
    let engine = engine();
    let task = park_in_plan_review(&engine, 42).await;

    let disposition = engine
        .router
        .handle_event(stop_command(42))
        .await
        .expect("stop handling should succeed");

    let Disposition::Finalized(snapshot) = disposition else {
        panic!("expected finalization, got {disposition:?}");
    };
    assert_eq!(snapshot.state(), TaskState::Archived);
    let live = engine
        .router
        .lifecycle()
        .find_by_origin(&origin(42))
        .await
        .expect("lookup should succeed");
    assert_eq!(live, None);
    let archived = engine
        .router
        .lifecycle()
        .find_archived(task.id())
        .await
        .expect("archive lookup should succeed")
        .expect("archived record should exist");
    assert_eq!(archived.task().state(), TaskState::Archived);
    assert!(archived.task().locked_files().is_empty());
    let cancelled = archived
        .task()
        .last_entry_for(TaskState::Archived)
        .expect("cancellation should be logged");
    assert_eq!(cancelled.actor(), &DecisionActor::human("alice"));
    assert_eq!(
        cancelled
            .detail()
            .get(metadata_keys::CANCELLED)
            .map(String::as_str),
        Some("stop command")
    );
    let held = engine
        .locks
        .held_by(task.id())
        .await
        .expect("table access should succeed");
    assert!(held.is_empty(), "stopping must release every lease");
    assert_eq!(engine.sink.delivered().len(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn origin_is_free_for_a_new_task_after_stop() {
    let engine = engine();
    let stopped = park_in_plan_review(&engine, 42).await;
    engine
        .router
        .handle_event(stop_command(42))
        .await
        .expect("stop handling should succeed");

    engine.worker.enqueue(WorkerResult::success("fresh plan"));
    let disposition = engine
        .router
        .handle_event(EngineEvent::Trigger(qualifying_trigger(
            42,
            "Fix parser edge case, second attempt",
        )))
        .await
        .expect("trigger handling should succeed");

    let Disposition::Created(snapshot) = disposition else {
        panic!("freed origin should accept a new task, got {disposition:?}");
    };
    assert_ne!(snapshot.id(), stopped.id());
    let replacement = engine
        .router
        .lifecycle()
        .find_by_origin(&origin(42))
        .await
        .expect("lookup should succeed")
        .expect("replacement task should be live");
    assert_eq!(replacement.state(), TaskState::PlanReview);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stop_after_finalization_is_discarded() {
    let engine = engine();
    park_in_plan_review(&engine, 42).await;
    engine
        .router
        .handle_event(stop_command(42))
        .await
        .expect("stop handling should succeed");

    let disposition = engine
        .router
        .handle_event(stop_command(42))
        .await
        .expect("replayed stop should not error");

    let Disposition::Discarded { reason } = disposition else {
        panic!("expected discard, got {disposition:?}");
    };
    assert!(reason.contains("no live task"), "unexpected reason: {reason}");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn worker_result_for_a_parked_task_applies_out_of_band() {
    let engine = engine();
    let task = park_in_planning(&engine, 42).await;

    let disposition = engine
        .router
        .handle_event(EngineEvent::WorkerFinished {
            task_id: task.id(),
            result: WorkerResult::success("1. fix the parser").with_diagnostics([
                "src/parser.rs".to_owned(),
            ]),
        })
        .await
        .expect("result handling should succeed");

    assert!(matches!(disposition, Disposition::Advanced(_)));
    let advanced = engine
        .router
        .lifecycle()
        .get_task(task.id())
        .await
        .expect("task should be live");
    assert_eq!(advanced.state(), TaskState::PlanReview);
    let plan = advanced.current_plan().expect("plan should be recorded");
    assert_eq!(plan.body(), "1. fix the parser");
    assert_eq!(plan.resource_paths(), paths(&["src/parser.rs"]));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn late_worker_result_after_stop_is_discarded() {
    let engine = engine();
    let task = park_in_planning(&engine, 42).await;
    engine
        .router
        .handle_event(stop_command(42))
        .await
        .expect("stop handling should succeed");

    let disposition = engine
        .router
        .handle_event(EngineEvent::WorkerFinished {
            task_id: task.id(),
            result: WorkerResult::success("1. fix the parser"),
        })
        .await
        .expect("late result should not error");

    let Disposition::Discarded { reason } = disposition else {
        panic!("expected discard, got {disposition:?}");
    };
    assert!(reason.contains("no live task"), "unexpected reason: {reason}");
    let archived = engine
        .router
        .lifecycle()
        .find_archived(task.id())
        .await
        .expect("archive lookup should succeed")
        .expect("archived record should exist");
    assert_eq!(archived.task().state(), TaskState::Archived);
    assert!(
        archived.task().plan_versions().is_empty(),
        "a late result must not reach the archived record"
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stopping_a_queued_task_clears_its_pending_entry() {
    let engine = engine();
    engine.scope.predict_for(1, paths(&["src/shared.py"]));
    engine.scope.predict_for(2, paths(&["src/shared.py"]));
    engine.worker.enqueue(WorkerResult::success("plan for task one"));
    engine
        .router
        .handle_event(EngineEvent::Trigger(qualifying_trigger(1, "First claim")))
        .await
        .expect("first trigger should succeed");
    engine
        .router
        .handle_event(EngineEvent::Trigger(qualifying_trigger(2, "Second claim")))
        .await
        .expect("second trigger should succeed");
    assert_eq!(engine.router.pending_count(), 1);

    let disposition = engine
        .router
        .handle_event(stop_command(2))
        .await
        .expect("stop handling should succeed");

    assert!(matches!(disposition, Disposition::Finalized(_)));
    assert_eq!(
        engine.router.pending_count(),
        0,
        "a stopped task must leave the queue"
    );
    let survivor = engine
        .router
        .lifecycle()
        .find_by_origin(&origin(1))
        .await
        .expect("lookup should succeed")
        .expect("first task should be live");
    assert_eq!(survivor.state(), TaskState::PlanReview);
    let held = engine
        .locks
        .held_by(survivor.id())
        .await
        .expect("table access should succeed");
    assert_eq!(held, paths(&["src/shared.py"]));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn resolution_after_stop_is_discarded() {
    let engine = engine();
    park_in_plan_review(&engine, 42).await;
    engine
        .router
        .handle_event(stop_command(42))
        .await
        .expect("stop handling should succeed");

    let disposition = engine
        .router
        .handle_event(EngineEvent::ChangeResolved {
            origin: origin(42),
            merged: true,
        })
        .await
        .expect("late resolution should not error");

    let Disposition::Discarded { reason } = disposition else {
        panic!("expected discard, got {disposition:?}");
    };
    assert!(reason.contains("no live task"), "unexpected reason: {reason}");
    assert_eq!(engine.sink.delivered().len(), 1, "only the stop archived");
}
