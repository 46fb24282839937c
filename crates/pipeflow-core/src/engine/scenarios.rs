//! End-to-end runs of the CSV ETL pipeline against scripted tasks.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::{replay, replay_report, ExecutorOptions, RunOutcome, StepOutcome, WorkflowExecutor};
use crate::definition::canonical::states::*;
use crate::definition::{parse_definition, StateSpec, WorkflowDefinition};
use crate::error::PipelineError;
use crate::invoker::{FailureSignal, ScriptedInvoker};

fn canonical() -> Arc<WorkflowDefinition> {
    Arc::new(WorkflowDefinition::canonical().unwrap())
}

fn happy_invoker() -> ScriptedInvoker {
    ScriptedInvoker::new()
        .succeed(EXTRACT, json!({"data": [{"name": "ana"}]}))
        .succeed(TRANSFORM, json!({"data": [{"name": "ANA"}]}))
        .succeed(LOAD, json!({"message": "written"}))
        .succeed(NOTIFY_SUCCESS, json!({"message": "Success notification sent"}))
        .succeed(NOTIFY_FAILURE, json!({"message": "Failure notification sent"}))
}

fn executor(invoker: ScriptedInvoker) -> (WorkflowExecutor, Arc<ScriptedInvoker>) {
    let invoker = Arc::new(invoker);
    (WorkflowExecutor::new(canonical(), invoker.clone()), invoker)
}

fn input() -> Value {
    json!({"bucket": "in", "key": "a.csv"})
}

#[tokio::test]
async fn test_happy_path_end_to_end() {
    let (executor, invoker) = executor(happy_invoker());

    let report = executor.run(input()).await.unwrap();

    assert_eq!(
        report.outcome,
        RunOutcome::Succeeded {
            payload: json!({"message": "Success notification sent"})
        }
    );
    assert_eq!(report.history.len(), 4);
    assert!(report.history.iter().all(|h| h.outcome == StepOutcome::Success));
    assert_eq!(
        report.visited_states(),
        vec![EXTRACT, TRANSFORM, LOAD, NOTIFY_SUCCESS]
    );
    assert_eq!(invoker.calls()[0].payload, input());
    assert_eq!(invoker.calls()[2].payload, json!({"data": [{"name": "ANA"}]}));
}

#[tokio::test]
async fn test_catch_all_routes_each_stage_to_failure_notification() {
    for failing in [EXTRACT, TRANSFORM, LOAD] {
        let (executor, invoker) = executor(
            happy_invoker().fail(failing, FailureSignal::new("storage_unreachable").with_cause("refused")),
        );

        let report = executor.run(input()).await.unwrap();

        assert_eq!(
            report.outcome,
            RunOutcome::Succeeded {
                payload: json!({"message": "Failure notification sent"})
            },
            "failing stage {failing}"
        );

        let last = report.history.last().unwrap();
        assert_eq!(last.state, NOTIFY_FAILURE);

        let failed = &report.history[report.history.len() - 2];
        assert_eq!(failed.state, failing);
        assert_eq!(failed.outcome, StepOutcome::Failure);
        assert_eq!(failed.error_class.as_deref(), Some("storage_unreachable"));
        assert!(!report.visited_states().contains(&NOTIFY_SUCCESS));

        let calls = invoker.calls();
        let notify_input = &calls.last().unwrap().payload;
        assert_eq!(notify_input["failed_state"], failing);
        assert_eq!(notify_input["error"], "storage_unreachable");
        assert_eq!(notify_input["cause"], "refused");
        assert_eq!(notify_input["pipeline"], "csv_etl");
    }
}

#[tokio::test]
async fn test_unhandled_failure_at_notification() {
    let (executor, _) = executor(
        happy_invoker()
            .fail(TRANSFORM, FailureSignal::new("malformed_record"))
            .fail(NOTIFY_FAILURE, FailureSignal::new("notification_failed").with_cause("topic gone")),
    );

    let report = executor.run(input()).await.unwrap();

    assert_eq!(
        report.outcome,
        RunOutcome::Failed {
            state: NOTIFY_FAILURE.to_string(),
            error_class: "notification_failed".to_string(),
            cause: Some("topic gone".to_string()),
        }
    );
    assert_eq!(report.outcome.exit_code(), 1);
    assert_eq!(
        report.visited_states(),
        vec![EXTRACT, TRANSFORM, NOTIFY_FAILURE]
    );
}

#[tokio::test]
async fn test_unmatched_catch_rule_fails_run() {
    let definition = WorkflowDefinition::new(
        "narrow",
        "work",
        vec![
            StateSpec::task("work", "work")
                .catch(crate::definition::ErrorMatch::from_patterns(["timeout"]), "recover"),
            StateSpec::task("recover", "recover"),
        ],
    )
    .unwrap();
    let invoker = Arc::new(ScriptedInvoker::new().fail("work", FailureSignal::new("malformed_record")));
    let executor = WorkflowExecutor::new(Arc::new(definition), invoker.clone());

    let report = executor.run(Value::Null).await.unwrap();

    assert!(!report.outcome.is_success());
    assert_eq!(invoker.invoked_tasks(), vec!["work"]);
}

#[tokio::test]
async fn test_no_retry_on_failure() {
    let (executor, invoker) = executor(happy_invoker().fail(LOAD, FailureSignal::unhandled("boom")));

    executor.run(input()).await.unwrap();

    let loads = invoker.invoked_tasks().iter().filter(|t| *t == LOAD).count();
    assert_eq!(loads, 1);
}

#[test]
fn test_validation_fails_closed() {
    let result = WorkflowDefinition::new(
        "broken",
        "extract",
        vec![
            StateSpec::task("extract", "extract")
                .next("transfrom")
                .catch_all("notify_failure"),
            StateSpec::task("notify_failure", "notify_failure"),
        ],
    );
    assert!(matches!(result, Err(PipelineError::Validation(_))));

    let result = WorkflowDefinition::new(
        "broken",
        "extract",
        vec![StateSpec::task("extract", "extract").catch_all("nowhere")],
    );
    assert!(matches!(result, Err(PipelineError::Validation(_))));

    let document = r#"
apiVersion: pipeflow.io/v1
kind: Pipeline
metadata:
  name: broken
startAt: extract
states:
  extract:
    task: extract
    next: transfrom
    catch:
      - errorEquals: ["States.ALL"]
        next: notify_failure
  notify_failure:
    task: notify_failure
    end: true
"#;
    match parse_definition(document) {
        Err(PipelineError::Validation(report)) => assert!(!report.issues().is_empty()),
        other => panic!("Expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_replay_reproduces_outcome() {
    let (executor, _) = executor(happy_invoker().fail(TRANSFORM, FailureSignal::new("malformed_record")));
    let original = executor.run(input()).await.unwrap();

    let replayed = replay_report(canonical(), &original).await.unwrap();
    assert_eq!(replayed.outcome, original.outcome);
    assert_eq!(replayed.visited_states(), original.visited_states());

    let again = replay(canonical(), original.input.clone(), &original.history)
        .await
        .unwrap();
    assert_eq!(again.outcome, original.outcome);
}

#[tokio::test]
async fn test_concurrent_runs_share_definition() {
    let invoker = Arc::new(happy_invoker().with_latency(EXTRACT, Duration::from_millis(5)));
    let executor = WorkflowExecutor::new(canonical(), invoker.clone());

    let mut handles = Vec::new();
    for i in 0..8 {
        let executor = executor.clone();
        handles.push(tokio::spawn(async move {
            executor.run(json!({"bucket": "in", "key": format!("{i}.csv")})).await
        }));
    }

    let mut ids = std::collections::HashSet::new();
    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        assert!(report.outcome.is_success());
        assert_eq!(report.history.len(), 4);
        ids.insert(report.execution_id);
    }

    assert_eq!(ids.len(), 8);
    assert_eq!(invoker.call_count(), 32);
}

#[tokio::test(start_paused = true)]
async fn test_step_timeout_routes_to_failure_branch() {
    let invoker = Arc::new(happy_invoker().with_latency(LOAD, Duration::from_secs(30)));
    let executor = WorkflowExecutor::new(canonical(), invoker)
        .with_options(ExecutorOptions::default().with_step_timeout(Duration::from_secs(5)));

    let report = executor.run(input()).await.unwrap();

    assert!(report.outcome.is_success());
    let failed = &report.history[2];
    assert_eq!(failed.state, LOAD);
    assert_eq!(failed.error_class.as_deref(), Some("timeout"));
    assert_eq!(report.history.last().unwrap().state, NOTIFY_FAILURE);
}

#[tokio::test(start_paused = true)]
async fn test_run_deadline_still_notifies() {
    let invoker = Arc::new(
        happy_invoker()
            .with_latency(TRANSFORM, Duration::from_secs(30))
            .with_latency(NOTIFY_FAILURE, Duration::from_secs(1)),
    );
    let executor = WorkflowExecutor::new(canonical(), invoker.clone())
        .with_options(ExecutorOptions::default().with_run_timeout(Duration::from_secs(10)));

    let report = executor.run(input()).await.unwrap();

    assert_eq!(
        report.outcome.payload(),
        Some(&json!({"message": "Failure notification sent"}))
    );
    assert_eq!(report.history[1].error_class.as_deref(), Some("timeout"));
    assert_eq!(invoker.invoked_tasks().last().map(String::as_str), Some(NOTIFY_FAILURE));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_step() {
    let invoker = Arc::new(happy_invoker().with_latency(EXTRACT, Duration::from_secs(60)));
    let executor = WorkflowExecutor::new(canonical(), invoker.clone());
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let report = executor.run_with_cancellation(input(), token).await.unwrap();

    assert_eq!(report.history[0].error_class.as_deref(), Some("cancelled"));
    assert_eq!(report.visited_states(), vec![EXTRACT, NOTIFY_FAILURE]);
    assert!(report.outcome.is_success());
}

#[tokio::test]
async fn test_cancelled_before_start_skips_first_task() {
    let (executor, invoker) = executor(happy_invoker());
    let token = CancellationToken::new();
    token.cancel();

    let report = executor.run_with_cancellation(input(), token).await.unwrap();

    assert_eq!(report.history[0].state, EXTRACT);
    assert_eq!(report.history[0].error_class.as_deref(), Some("cancelled"));
    assert_eq!(invoker.invoked_tasks(), vec![NOTIFY_FAILURE]);
}

#[tokio::test(start_paused = true)]
async fn test_catch_target_gets_live_token_after_cancellation() {
    let invoker = Arc::new(happy_invoker().with_latency(EXTRACT, Duration::from_secs(60)));
    let executor = WorkflowExecutor::new(canonical(), invoker.clone());
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let report = executor.run_with_cancellation(input(), token).await.unwrap();

    assert_eq!(
        report.outcome.payload(),
        Some(&json!({"message": "Failure notification sent"}))
    );
    let calls = invoker.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].state, NOTIFY_FAILURE);
    assert!(!calls[1].cancelled);
}

#[tokio::test]
async fn test_catch_target_gets_live_token_when_cancelled_before_start() {
    let (executor, invoker) = executor(happy_invoker());
    let token = CancellationToken::new();
    token.cancel();

    let report = executor.run_with_cancellation(input(), token).await.unwrap();

    assert!(report.outcome.is_success());
    let calls = invoker.calls();
    assert_eq!(calls.len(), 1);
    assert!(!calls[0].cancelled);
}
