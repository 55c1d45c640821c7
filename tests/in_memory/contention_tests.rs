//! Lease contention, requeue ordering, and expiry takeover tests.

use crate::in_memory::helpers::{
    engine, engine_with_config, paths, qualifying_trigger, Engine,
};
use chrono::Duration;
use rstest::rstest;
use signalbox::config::EngineConfig;
use signalbox::router::domain::{CommandEvent, Disposition, EngineEvent, WorkerResult};
use signalbox::task::domain::{
    metadata_keys, DecisionAction, Task, TaskState, TriggerOrigin,
};

fn origin(external_ref: u64) -> TriggerOrigin {
    TriggerOrigin::from_parts("owner/repo", external_ref).expect("valid origin")
}

async fn live_task(engine: &Engine, external_ref: u64) -> Task {
    engine
        .router
        .lifecycle()
        .find_by_origin(&origin(external_ref))
        .await
        .expect("lookup should succeed")
        .expect("task should be live")
}

async fn stop(engine: &Engine, external_ref: u64) {
    let disposition = engine
        .router
        .handle_event(EngineEvent::Command {
            origin: origin(external_ref),
            command: CommandEvent::new("/stop", "alice"),
        })
        .await
        .expect("stop handling should succeed");
    assert!(
        matches!(disposition, Disposition::Finalized(_)),
        "expected finalization, got {disposition:?}"
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn overlapping_trigger_is_requeued_with_nothing_leased() {
    let engine = engine();
    engine.scope.predict_for(1, paths(&["src/a.py", "src/b.py"]));
    engine.scope.predict_for(2, paths(&["src/b.py", "src/c.py"]));
    engine.worker.enqueue(WorkerResult::success("plan for task one"));
    engine
        .router
        .handle_event(EngineEvent::Trigger(qualifying_trigger(1, "Refactor a and b")))
        .await
        .expect("first trigger should succeed");
    let first = live_task(&engine, 1).await;

    let disposition = engine
        .router
        .handle_event(EngineEvent::Trigger(qualifying_trigger(2, "Refactor b and c")))
        .await
        .expect("second trigger should succeed");

    let second = live_task(&engine, 2).await;
    assert_eq!(disposition, Disposition::Requeued(second.id()));
    assert_eq!(second.state(), TaskState::Queued);
    let held = engine
        .locks
        .held_by(second.id())
        .await
        .expect("table access should succeed");
    assert!(held.is_empty(), "a conflicted acquisition must lease nothing");
    let note = second
        .decision_log()
        .last()
        .expect("conflict should be logged");
    assert!(matches!(note.action(), DecisionAction::Note { .. }));
    let conflicts = note
        .detail()
        .get(metadata_keys::CONFLICTS)
        .expect("conflict detail should name the paths");
    assert!(
        conflicts.contains(&format!("src/b.py={}", first.id())),
        "unexpected conflict detail: {conflicts}"
    );
    assert_eq!(engine.router.pending_count(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn released_leases_are_handed_to_the_waiting_task() {
    let engine = engine();
    engine.scope.predict_for(1, paths(&["src/a.py", "src/b.py"]));
    engine.scope.predict_for(2, paths(&["src/b.py", "src/c.py"]));
    engine.worker.enqueue(WorkerResult::success("plan for task one"));
    engine
        .router
        .handle_event(EngineEvent::Trigger(qualifying_trigger(1, "Refactor a and b")))
        .await
        .expect("first trigger should succeed");
    engine
        .router
        .handle_event(EngineEvent::Trigger(qualifying_trigger(2, "Refactor b and c")))
        .await
        .expect("second trigger should succeed");
    let second = live_task(&engine, 2).await;

    engine.worker.enqueue(WorkerResult::success("plan for task two"));
    stop(&engine, 1).await;

    let resumed = engine
        .router
        .lifecycle()
        .get_task(second.id())
        .await
        .expect("task should be live");
    assert_eq!(resumed.state(), TaskState::PlanReview);
    let held = engine
        .locks
        .held_by(second.id())
        .await
        .expect("table access should succeed");
    assert_eq!(held, paths(&["src/b.py", "src/c.py"]));
    assert_eq!(engine.router.pending_count(), 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn waiting_tasks_resume_in_arrival_order() {
    let engine = engine();
    engine.scope.predict_for(1, paths(&["src/shared.py"]));
    engine.scope.predict_for(2, paths(&["src/shared.py"]));
    engine.scope.predict_for(3, paths(&["src/shared.py"]));
    engine.worker.enqueue(WorkerResult::success("plan for task one"));
    for external_ref in 1..=3 {
        engine
            .router
            .handle_event(EngineEvent::Trigger(qualifying_trigger(
                external_ref,
                "Touch the shared module",
            )))
            .await
            .expect("trigger should succeed");
    }
    assert_eq!(engine.router.pending_count(), 2);
    let second = live_task(&engine, 2).await;
    let third = live_task(&engine, 3).await;

    engine.worker.enqueue(WorkerResult::success("plan for task two"));
    stop(&engine, 1).await;

    assert_eq!(
        engine
            .router
            .lifecycle()
            .get_state(second.id())
            .await
            .expect("task should be live"),
        TaskState::PlanReview,
        "the longest-waiting task moves first"
    );
    assert_eq!(
        engine
            .router
            .lifecycle()
            .get_state(third.id())
            .await
            .expect("task should be live"),
        TaskState::Queued
    );
    assert_eq!(engine.router.pending_count(), 1);

    engine.worker.enqueue(WorkerResult::success("plan for task three"));
    stop(&engine, 2).await;

    assert_eq!(
        engine
            .router
            .lifecycle()
            .get_state(third.id())
            .await
            .expect("task should be live"),
        TaskState::PlanReview
    );
    assert_eq!(engine.router.pending_count(), 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn host_pump_moves_the_queue_without_an_event() {
    let engine = engine_with_config(EngineConfig::default().with_lock_ttl_seconds(1));
    engine.scope.predict_for(1, paths(&["src/b.py"]));
    engine.scope.predict_for(2, paths(&["src/b.py"]));
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
    let second = live_task(&engine, 2).await;

    engine.clock.advance(Duration::seconds(2));
    engine.worker.enqueue(WorkerResult::success("plan for task two"));
    engine.router.pump().await.expect("pump should succeed");

    assert_eq!(
        engine
            .router
            .lifecycle()
            .get_state(second.id())
            .await
            .expect("task should be live"),
        TaskState::PlanReview,
        "a timer-driven pump claims expired leases"
    );
    assert_eq!(engine.router.pending_count(), 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn expired_lease_is_taken_over_by_the_waiting_task() {
    let engine = engine_with_config(EngineConfig::default().with_lock_ttl_seconds(1));
    engine.scope.predict_for(1, paths(&["src/b.py"]));
    engine.scope.predict_for(2, paths(&["src/b.py"]));
    engine.worker.enqueue(WorkerResult::success("plan for task one"));
    engine
        .router
        .handle_event(EngineEvent::Trigger(qualifying_trigger(1, "First claim")))
        .await
        .expect("first trigger should succeed");
    let first = live_task(&engine, 1).await;
    let requeued = engine
        .router
        .handle_event(EngineEvent::Trigger(qualifying_trigger(2, "Second claim")))
        .await
        .expect("second trigger should succeed");
    assert!(matches!(requeued, Disposition::Requeued(_)));
    let second = live_task(&engine, 2).await;

    engine.clock.advance(Duration::seconds(2));
    engine.worker.enqueue(WorkerResult::success("plan for task two"));
    engine
        .router
        .handle_event(EngineEvent::TimeoutTick { task_id: first.id() })
        .await
        .expect("tick handling should succeed");

    let taken_over = engine
        .router
        .lifecycle()
        .get_task(second.id())
        .await
        .expect("task should be live");
    assert_eq!(taken_over.state(), TaskState::PlanReview);
    let first_held = engine
        .locks
        .held_by(first.id())
        .await
        .expect("table access should succeed");
    assert!(first_held.is_empty(), "the expired lease is gone");
    let second_held = engine
        .locks
        .held_by(second.id())
        .await
        .expect("table access should succeed");
    assert_eq!(second_held, paths(&["src/b.py"]));
    assert_eq!(engine.router.pending_count(), 0);
}
