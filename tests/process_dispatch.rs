//! Exercises the `process` execution back-end end to end by re-invoking this
//! very test binary as a worker (see `taskforge::exec::maybe_run_as_worker`).
//! Runs with `harness = false` (see Cargo.toml) so this file supplies its own
//! `main`, which registers process bodies and checks for the worker-mode
//! environment variable *before* anything else — exactly what a real `main`
//! using `process`-mode tasks must do.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use taskforge::task::{DispatchOutcome, TaskBuilder};
use taskforge::{Action, ExecutionMode, LogSink, MemoryLogSink, ParamValue, Parameters, TaskForgeError};

fn ok_body(_params: &HashMap<String, Value>) -> taskforge::BodyOutcome {
    taskforge::BodyOutcome::Success(Value::String("worker-done".into()))
}

fn main() {
    taskforge::exec::registry::register_process_task("process_dispatch::ok", ok_body);

    // If this invocation is the re-exec'd worker, this runs the registered
    // body, reports over the bridge, and exits — it never returns here.
    taskforge::exec::maybe_run_as_worker();

    let rt = tokio::runtime::Runtime::new().expect("failed to build test runtime");
    rt.block_on(async {
        process_dispatch_succeeds().await;
        process_dispatch_reports_crash_in_setup().await;
        process_dispatch_rejects_raw_lazy_param().await;
    });

    println!("process_dispatch: all checks passed");
}

async fn process_dispatch_succeeds() {
    let sink: Arc<dyn LogSink> = Arc::new(MemoryLogSink::new());
    let task = TaskBuilder::new("process-ok")
        .execution(ExecutionMode::Process)
        .body_process("process_dispatch::ok")
        .build(sink);

    let outcome = task.dispatch().await.expect("dispatch_process failed");
    assert!(
        matches!(outcome, DispatchOutcome::Started),
        "process dispatch should return Started once proof-of-start is observed"
    );

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if task.status_memory().await == Some(Action::Success) {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "worker never reported success over the bridge"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let history = task.get_history().expect("history query failed");
    let actions: Vec<Action> = history.iter().map(|r| r.action).collect();
    assert_eq!(actions, vec![Action::Run, Action::Success]);
}

async fn process_dispatch_reports_crash_in_setup() {
    let sink: Arc<dyn LogSink> = Arc::new(MemoryLogSink::new());
    let task = TaskBuilder::new("process-missing-body")
        .execution(ExecutionMode::Process)
        .body_process("process_dispatch::does_not_exist")
        .build(sink);

    let outcome = task.dispatch().await.expect("dispatch_process failed");
    assert!(
        matches!(outcome, DispatchOutcome::CrashedInSetup),
        "a worker with no registered body must report CrashedInSetup"
    );
    assert_eq!(task.status_memory().await, Some(Action::Fail));
}

async fn process_dispatch_rejects_raw_lazy_param() {
    let sink: Arc<dyn LogSink> = Arc::new(MemoryLogSink::new());
    let params = Parameters::new().with("x", ParamValue::Lazy(Arc::new(|| Value::Null)));
    let task = TaskBuilder::new("process-raw-lazy")
        .execution(ExecutionMode::Process)
        .body_process("process_dispatch::ok")
        .parameters(params)
        .build(sink);

    let err = task.dispatch().await.expect_err(
        "an in-process closure parameter cannot be carried across the process boundary",
    );
    assert!(matches!(err, TaskForgeError::LazyParamNotProcessSafe(_)));
}
