//! Trigger intake, command handling, and worker flow tests.

use crate::in_memory::helpers::{engine, paths, qualifying_trigger, Engine};
use rstest::rstest;
use signalbox::router::domain::{
    CommandEvent, Disposition, EngineEvent, TriggerEvent, WorkerResult,
};
use signalbox::router::ports::WorkerDirective;
use signalbox::router::services::RouterError;
use signalbox::task::domain::{
    metadata_keys, DecisionActor, Task, TaskDomainError, TaskState, TriggerOrigin,
};

fn origin(external_ref: u64) -> TriggerOrigin {
    TriggerOrigin::from_parts("owner/repo", external_ref).expect("valid origin")
}

fn command(external_ref: u64, body: &str) -> EngineEvent {
    EngineEvent::Command {
        origin: origin(external_ref),
        command: CommandEvent::new(body, "alice"),
    }
}

/// Drives a fresh trigger through planning to `PLAN_REVIEW`.
async fn park_in_plan_review(engine: &Engine, external_ref: u64) -> Task {
    engine
        .scope
        .predict_for(external_ref, paths(&["src/parser.rs"]));
    engine.worker.enqueue(
        WorkerResult::success("1. fix the parser\n2. add a regression test").with_diagnostics([
            "src/parser.rs".to_owned(),
            "tests/parser.rs".to_owned(),
        ]),
    );
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

/// Drives a parked task through approval to `PR_OPEN`.
async fn park_in_pr_open(engine: &Engine, external_ref: u64) -> Task {
    let task = park_in_plan_review(engine, external_ref).await;
    engine.worker.enqueue(
        WorkerResult::success("opened change request").with_diagnostics([
            "branch=task/parser-fix".to_owned(),
            "change_request=88".to_owned(),
        ]),
    );
    let disposition = engine
        .router
        .handle_event(command(external_ref, "/approve"))
        .await
        .expect("approve handling should succeed");
    assert!(
        matches!(disposition, Disposition::Advanced(_)),
        "expected advance, got {disposition:?}"
    );
    engine
        .router
        .lifecycle()
        .get_task(task.id())
        .await
        .expect("task should be live")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unlabelled_trigger_is_discarded() {
    let engine = engine();
    let trigger = TriggerEvent::new("owner/repo", 42, "Fix parser edge case")
        .with_labels(vec!["bug".to_owned()]);

    let disposition = engine
        .router
        .handle_event(EngineEvent::Trigger(trigger))
        .await
        .expect("trigger handling should succeed");

    let Disposition::Discarded { reason } = disposition else {
        panic!("expected discard, got {disposition:?}");
    };
    assert_eq!(reason, "no qualifying label on trigger");
    let live = engine
        .router
        .lifecycle()
        .list_active()
        .await
        .expect("listing should succeed");
    assert!(live.is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn invalid_repository_name_is_an_error_not_a_discard() {
    let engine = engine();
    let trigger = TriggerEvent::new("not-a-repo", 42, "Fix parser edge case")
        .with_labels(vec!["agent-ok".to_owned()]);

    let result = engine.router.handle_event(EngineEvent::Trigger(trigger)).await;

    assert!(matches!(
        result,
        Err(RouterError::Domain(TaskDomainError::InvalidRepoName(_)))
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn qualifying_trigger_plans_and_parks_for_review() {
    let engine = engine();

    let task = park_in_plan_review(&engine, 42).await;

    assert_eq!(task.state(), TaskState::PlanReview);
    assert_eq!(task.locked_files(), paths(&["src/parser.rs"]));
    let plan = task.current_plan().expect("plan should be recorded");
    assert_eq!(plan.body(), "1. fix the parser\n2. add a regression test");
    assert_eq!(
        plan.resource_paths(),
        paths(&["src/parser.rs", "tests/parser.rs"])
    );
    let held = engine
        .locks
        .held_by(task.id())
        .await
        .expect("table access should succeed");
    assert_eq!(held, paths(&["src/parser.rs"]));
    let invocations = engine.worker.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations.first(), Some(&(task.id(), WorkerDirective::Plan)));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn trigger_for_tracked_origin_is_discarded() {
    let engine = engine();
    park_in_plan_review(&engine, 42).await;

    let disposition = engine
        .router
        .handle_event(EngineEvent::Trigger(qualifying_trigger(
            42,
            "Fix parser edge case",
        )))
        .await
        .expect("trigger handling should succeed");

    let Disposition::Discarded { reason } = disposition else {
        panic!("expected discard, got {disposition:?}");
    };
    assert!(reason.contains("already tracked"), "unexpected reason: {reason}");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn approve_executes_the_plan_and_opens_a_change_request() {
    let engine = engine();

    let task = park_in_pr_open(&engine, 42).await;

    assert_eq!(task.state(), TaskState::PrOpen);
    assert_eq!(task.branch(), Some("task/parser-fix"));
    assert_eq!(task.change_request().map(|number| number.value()), Some(88));
    assert_eq!(
        task.locked_files(),
        paths(&["src/parser.rs", "tests/parser.rs"]),
        "execution leases follow the plan's declared paths"
    );
    let approved = task
        .last_entry_for(TaskState::Approved)
        .expect("approval should be logged");
    assert_eq!(approved.actor(), &DecisionActor::human("alice"));
    let opened = task
        .last_entry_for(TaskState::PrOpen)
        .expect("change request should be logged");
    assert_eq!(
        opened.detail().get(metadata_keys::OUTPUT).map(String::as_str),
        Some("opened change request")
    );
    let directives: Vec<WorkerDirective> = engine
        .worker
        .invocations()
        .into_iter()
        .map(|(_, directive)| directive)
        .collect();
    assert_eq!(directives, [WorkerDirective::Plan, WorkerDirective::Implement]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn revise_returns_the_task_for_another_planning_pass() {
    let engine = engine();
    let task = park_in_plan_review(&engine, 42).await;
    engine
        .worker
        .enqueue(WorkerResult::success("revised plan").with_diagnostics([
            "src/parser.rs".to_owned(),
        ]));

    let disposition = engine
        .router
        .handle_event(command(42, "needs another angle, /revise"))
        .await
        .expect("revise handling should succeed");

    assert!(matches!(disposition, Disposition::Advanced(_)));
    let revised = engine
        .router
        .lifecycle()
        .get_task(task.id())
        .await
        .expect("task should be live");
    assert_eq!(revised.state(), TaskState::PlanReview);
    assert_eq!(revised.plan_versions().len(), 2);
    let plan = revised.current_plan().expect("plan should be recorded");
    assert_eq!(plan.body(), "revised plan");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn review_command_records_the_verdict_on_the_change_request() {
    let engine = engine();
    let task = park_in_pr_open(&engine, 42).await;
    engine
        .worker
        .enqueue(WorkerResult::success("approved with nits"));

    let disposition = engine
        .router
        .handle_event(command(42, "/review"))
        .await
        .expect("review handling should succeed");

    assert!(matches!(disposition, Disposition::Advanced(_)));
    let reviewed = engine
        .router
        .lifecycle()
        .get_task(task.id())
        .await
        .expect("task should be live");
    assert_eq!(reviewed.state(), TaskState::PrOpen);
    let entry = reviewed
        .last_entry_for(TaskState::PrOpen)
        .expect("review should be logged");
    assert_eq!(
        entry.detail().get(metadata_keys::REVIEW).map(String::as_str),
        Some("approved with nits")
    );
    let directives: Vec<WorkerDirective> = engine
        .worker
        .invocations()
        .into_iter()
        .map(|(_, directive)| directive)
        .collect();
    assert_eq!(
        directives,
        [
            WorkerDirective::Plan,
            WorkerDirective::Implement,
            WorkerDirective::Review,
        ]
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn fix_command_applies_review_feedback() {
    let engine = engine();
    let task = park_in_pr_open(&engine, 42).await;
    engine.worker.enqueue(WorkerResult::success("nits addressed"));

    let disposition = engine
        .router
        .handle_event(command(42, "/fix"))
        .await
        .expect("fix handling should succeed");

    assert!(matches!(disposition, Disposition::Advanced(_)));
    let fixed = engine
        .router
        .lifecycle()
        .get_task(task.id())
        .await
        .expect("task should be live");
    assert_eq!(fixed.state(), TaskState::PrOpen);
    let last = engine
        .worker
        .invocations()
        .last()
        .map(|(_, directive)| directive.clone());
    assert_eq!(last, Some(WorkerDirective::ApplyReview));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn merged_resolution_completes_archives_and_frees_the_origin() {
    let engine = engine();
    let task = park_in_pr_open(&engine, 42).await;

    let disposition = engine
        .router
        .handle_event(EngineEvent::ChangeResolved {
            origin: origin(42),
            merged: true,
        })
        .await
        .expect("resolution handling should succeed");

    let Disposition::Finalized(snapshot) = disposition else {
        panic!("expected finalization, got {disposition:?}");
    };
    assert_eq!(snapshot.state(), TaskState::Completed);
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
    assert_eq!(archived.task().state(), TaskState::Completed);
    assert!(archived.task().locked_files().is_empty());
    let held = engine
        .locks
        .held_by(task.id())
        .await
        .expect("table access should succeed");
    assert!(held.is_empty());
    assert_eq!(engine.sink.delivered().len(), 1);

    engine.worker.enqueue(WorkerResult::success("fresh plan"));
    let reopened = engine
        .router
        .handle_event(EngineEvent::Trigger(qualifying_trigger(
            42,
            "Fix parser edge case, second attempt",
        )))
        .await
        .expect("trigger handling should succeed");
    assert!(
        matches!(reopened, Disposition::Created(_)),
        "freed origin should accept a new task, got {reopened:?}"
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn closed_resolution_archives_without_completion() {
    let engine = engine();
    let task = park_in_pr_open(&engine, 42).await;

    let disposition = engine
        .router
        .handle_event(EngineEvent::ChangeResolved {
            origin: origin(42),
            merged: false,
        })
        .await
        .expect("resolution handling should succeed");

    let Disposition::Finalized(snapshot) = disposition else {
        panic!("expected finalization, got {disposition:?}");
    };
    assert_eq!(snapshot.state(), TaskState::Archived);
    let archived = engine
        .router
        .lifecycle()
        .find_archived(task.id())
        .await
        .expect("archive lookup should succeed")
        .expect("archived record should exist");
    assert_eq!(archived.task().state(), TaskState::Archived);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn resolution_for_untracked_origin_is_discarded() {
    let engine = engine();

    let disposition = engine
        .router
        .handle_event(EngineEvent::ChangeResolved {
            origin: origin(99),
            merged: true,
        })
        .await
        .expect("resolution handling should succeed");

    let Disposition::Discarded { reason } = disposition else {
        panic!("expected discard, got {disposition:?}");
    };
    assert!(reason.contains("no live task"), "unexpected reason: {reason}");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn comment_without_command_is_discarded() {
    let engine = engine();
    park_in_plan_review(&engine, 42).await;

    let disposition = engine
        .router
        .handle_event(command(42, "looks reasonable to me"))
        .await
        .expect("command handling should succeed");

    let Disposition::Discarded { reason } = disposition else {
        panic!("expected discard, got {disposition:?}");
    };
    assert_eq!(reason, "no recognized command in comment");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn command_on_untracked_origin_is_discarded() {
    let engine = engine();

    let disposition = engine
        .router
        .handle_event(command(7, "/approve"))
        .await
        .expect("command handling should succeed");

    let Disposition::Discarded { reason } = disposition else {
        panic!("expected discard, got {disposition:?}");
    };
    assert!(reason.contains("no live task"), "unexpected reason: {reason}");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn approve_in_the_wrong_state_is_discarded_as_stale() {
    let engine = engine();
    park_in_pr_open(&engine, 42).await;

    let disposition = engine
        .router
        .handle_event(command(42, "/approve"))
        .await
        .expect("command handling should succeed");

    let Disposition::Discarded { reason } = disposition else {
        panic!("expected discard, got {disposition:?}");
    };
    assert!(
        reason.contains("invalid transition"),
        "unexpected reason: {reason}"
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn replayed_worker_result_is_discarded() {
    let engine = engine();
    let task = park_in_plan_review(&engine, 42).await;

    let disposition = engine
        .router
        .handle_event(EngineEvent::WorkerFinished {
            task_id: task.id(),
            result: WorkerResult::success("the same plan, delivered twice"),
        })
        .await
        .expect("result handling should succeed");

    let Disposition::Discarded { reason } = disposition else {
        panic!("expected discard, got {disposition:?}");
    };
    assert!(
        reason.contains("no worker invocation outstanding"),
        "unexpected reason: {reason}"
    );
    let unchanged = engine
        .router
        .lifecycle()
        .get_task(task.id())
        .await
        .expect("task should be live");
    assert_eq!(unchanged.version(), task.version());
}
