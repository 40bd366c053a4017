// src/exec/process.rs

//! The `process` execution back-end: re-invokes the current executable as a
//! worker, marked by the `TASKFORGE_WORKER_TASK` environment variable (the
//! task's display name, for logging) and `TASKFORGE_WORKER_BODY` (the name
//! its body was registered under, which is what the worker actually looks up
//! — the two are independent, a task's display name need not match its
//! registered body name). This replaces the original's
//! `multiprocessing.Process`, which ships the whole task object (including
//! its body closure) across the fork boundary by pickling it — Rust has no
//! equivalent, so the worker instead looks its body up by name in
//! [`crate::exec::registry`] (Design Notes §9).

use std::collections::HashMap;
use std::io::Read as _;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::adapter::TaskAdapter;
use crate::bridge::{self, BridgeLine, DrainUntilRun};
use crate::errors::{Result, TaskForgeError};
use crate::log::record::Action;
use crate::log::sink::LogSink;
use crate::task::outcome::WireOutcome;
use crate::task::state::{ProcessAttachment, WorkerAttachment};
use crate::task::{BodyOutcome, DispatchOutcome, Task, TaskBody};

const PROOF_OF_START_TIMEOUT: Duration = Duration::from_secs(10);
const DRAIN_READ_TIMEOUT: Duration = Duration::from_secs(5);
pub const WORKER_TASK_ENV: &str = "TASKFORGE_WORKER_TASK";
/// The name a `process`-mode body was registered under (distinct from the
/// task's own display name, which is free to differ — see `body_process`).
pub const WORKER_BODY_ENV: &str = "TASKFORGE_WORKER_BODY";

#[derive(Debug, Serialize, Deserialize)]
struct WorkerRequest {
    task_name: String,
    parameters: HashMap<String, Value>,
    named_lazy_params: Vec<(String, String)>,
}

pub async fn dispatch_process(task: &Arc<Task>) -> Result<DispatchOutcome> {
    let registered_body = match &task.body {
        TaskBody::Process(name) => *name,
        TaskBody::Fn(_) => {
            return Err(TaskForgeError::ProcessBodyNotRegistered(task.name()));
        }
    };

    if task.parameters.has_raw_lazy() {
        return Err(TaskForgeError::LazyParamNotProcessSafe(task.name()));
    }

    let exe = std::env::current_exe()?;

    let request = WorkerRequest {
        task_name: task.name().to_string(),
        parameters: task.parameters.materialize_local(),
        named_lazy_params: task
            .parameters
            .named_lazy_keys()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    };
    let payload = serde_json::to_string(&request)?;

    let mut child = Command::new(exe)
        .env(WORKER_TASK_ENV, task.name())
        .env(WORKER_BODY_ENV, registered_body)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::inherit())
        .kill_on_drop(true)
        .spawn()?;

    {
        let mut stdin = child.stdin.take().expect("stdin was piped");
        // A worker that fails before reading stdin (e.g. no body registered
        // under this name) closes its read end early; that race is reported
        // through the bridge drain below, not here, so a write failure is
        // not itself fatal to dispatch.
        if let Err(e) = stdin.write_all(payload.as_bytes()).await {
            tracing::debug!(task = %task.name(), error = %e, "failed writing worker request to stdin");
        }
        // dropping stdin sends EOF so the worker's read_to_string returns
    }

    let stdout = child.stdout.take().expect("stdout was piped");
    let mut lines = BufReader::new(stdout).lines();

    match bridge::drain_until_run(&mut lines, &mut child, task, PROOF_OF_START_TIMEOUT).await? {
        DrainUntilRun::TimedOut => {
            let reason = TaskForgeError::WorkerCrashedInSetup(format!(
                "no proof-of-start observed for '{registered_body}' within {PROOF_OF_START_TIMEOUT:?}"
            ));
            task.log_failure(reason.to_string()).await?;
            let _ = child.start_kill();
            return Ok(DispatchOutcome::CrashedInSetup);
        }
        DrainUntilRun::ObservedRun => {}
    }

    let (kill_tx, mut kill_rx) = tokio::sync::oneshot::channel::<()>();
    let task_for_drain = Arc::clone(task);
    let handle = tokio::spawn(async move {
        tokio::select! {
            _ = bridge::drain_all(lines, Arc::clone(&task_for_drain), DRAIN_READ_TIMEOUT) => {}
            _ = &mut kill_rx => {}
        }
        let _ = child.kill().await;
    });

    {
        let mut state = task.state.lock().await;
        state.worker = WorkerAttachment::Process(ProcessAttachment {
            handle,
            kill: Some(kill_tx),
        });
    }

    Ok(DispatchOutcome::Started)
}

/// True if this process was re-exec'd as a worker.
pub fn is_worker_invocation() -> bool {
    std::env::var(WORKER_TASK_ENV).is_ok()
}

/// Call this at the very top of `main`, after registering every process-mode
/// task body with [`crate::exec::registry::register_process_task`]. If this
/// process is a worker invocation, runs the registered body, reports its
/// result over the bridge, and exits — this function never returns in that
/// case.
///
/// Mirrors `_run_as_process`'s logger reconstruction: the worker never
/// inherits the parent's `TaskAdapter`, it builds a fresh one writing to
/// stdout.
pub fn maybe_run_as_worker() {
    let Ok(task_name) = std::env::var(WORKER_TASK_ENV) else {
        return;
    };
    let body_name = std::env::var(WORKER_BODY_ENV).unwrap_or_else(|_| task_name.clone());

    let body = match crate::exec::registry::lookup_process_task(&body_name) {
        Some(body) => body,
        None => {
            eprintln!("taskforge worker '{task_name}': no process body registered under '{body_name}'");
            std::process::exit(1);
        }
    };

    let mut input = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut input) {
        eprintln!("taskforge worker '{task_name}': failed to read parameters: {e}");
        std::process::exit(1);
    }

    let request: WorkerRequest = match serde_json::from_str(&input) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("taskforge worker '{task_name}': malformed parameters: {e}");
            std::process::exit(1);
        }
    };

    let sink: Arc<dyn LogSink> = Arc::new(StdoutBridgeSink);
    let adapter = TaskAdapter::new(sink, crate::types::shared_name(request.task_name.clone()));

    let run_record = match adapter.emit(Action::Run, None, "") {
        Ok(r) => r,
        Err(e) => {
            eprintln!("taskforge worker '{task_name}': crashed in setting up logger: {e}");
            std::process::exit(1);
        }
    };

    let mut params = request.parameters;
    for (key, factory_name) in request.named_lazy_params {
        if let Some(factory) = crate::exec::registry::lookup_lazy_param(&factory_name) {
            params.insert(key, factory());
        }
    }

    let outcome = body(&params);
    emit_terminal(&adapter, &outcome, run_record.start);

    let wire = BridgeLine::Outcome(WireOutcome::from(&outcome));
    if let Ok(line) = serde_json::to_string(&wire) {
        println!("{line}");
    }

    // The original's worker swallows the body's own failure and exits
    // normally; only a logger-setup failure (handled above) is non-zero
    // (Design Notes §9, "Worker process exit code on a failing body").
    std::process::exit(0);
}

fn emit_terminal(adapter: &TaskAdapter, outcome: &BodyOutcome, start: Option<std::time::SystemTime>) {
    let (action, message) = match outcome {
        BodyOutcome::Success(_) | BodyOutcome::RestartRequested => (Action::Success, String::new()),
        BodyOutcome::Inaction => (Action::Inaction, String::new()),
        BodyOutcome::Terminated => (Action::Terminate, "unknown reason".to_string()),
        BodyOutcome::Error(e) => (Action::Fail, e.to_string()),
    };
    let _ = adapter.emit(action, start, message);
}

/// A sink used only by a worker process: it never needs to answer queries
/// about its own history, only to write records out over the bridge.
#[derive(Debug)]
struct StdoutBridgeSink;

impl LogSink for StdoutBridgeSink {
    fn append(&self, record: crate::log::record::LogRecord) -> Result<()> {
        let line = BridgeLine::Record(record);
        println!("{}", serde_json::to_string(&line).map_err(TaskForgeError::from)?);
        Ok(())
    }

    fn latest(&self, _task: &str) -> Result<Option<crate::log::record::LogRecord>> {
        Ok(None)
    }

    fn history(&self, _task: &str) -> Result<Vec<crate::log::record::LogRecord>> {
        Ok(Vec::new())
    }

    fn latest_matching(
        &self,
        _task: &str,
        _action: Action,
    ) -> Result<Option<crate::log::record::LogRecord>> {
        Ok(None)
    }
}
