use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a task body returns, in place of the original's exception-based
/// control flow (Design Notes §9: "Outcomes as a tagged result, not
/// control-flow exceptions").
pub enum BodyOutcome {
    Success(Value),
    /// The body started but determined no work was needed. Not an error.
    Inaction,
    /// The body observed a terminate signal and stopped cooperatively.
    Terminated,
    /// Equivalent to the original's `SchedulerRestart`: logged as success,
    /// callbacks fire, then surfaced to the caller as a distinguished outcome.
    RestartRequested,
    Error(anyhow::Error),
}

/// The wire form of [`BodyOutcome`] used to carry a worker process's result
/// back over the bridge's final line. `anyhow::Error` isn't serializable, so
/// it is flattened to its `Display` string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WireOutcome {
    Success(Value),
    Inaction,
    Terminated,
    RestartRequested,
    Error(String),
}

impl From<&BodyOutcome> for WireOutcome {
    fn from(outcome: &BodyOutcome) -> Self {
        match outcome {
            BodyOutcome::Success(v) => WireOutcome::Success(v.clone()),
            BodyOutcome::Inaction => WireOutcome::Inaction,
            BodyOutcome::Terminated => WireOutcome::Terminated,
            BodyOutcome::RestartRequested => WireOutcome::RestartRequested,
            BodyOutcome::Error(e) => WireOutcome::Error(e.to_string()),
        }
    }
}

/// The status passed to `on_finish`, mirroring the original's terminal
/// status set minus `crash_release` (which never invokes callbacks).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishStatus {
    Succeeded,
    Failed,
    Inaction,
    Terminated,
}

/// The terminal result of a body that ran to completion in this address
/// space (always true for `main`; only reachable internally for `thread`,
/// whose dispatcher does not wait for it — see [`DispatchOutcome::Started`]).
#[derive(Debug, Clone)]
pub enum BodyResult {
    Success(Value),
    Inaction,
    Terminated,
}

/// What `Task::dispatch` hands back to the caller. Only `main` execution
/// runs synchronously to completion; `thread`/`process` dispatch returns as
/// soon as proof-of-start is observed, with the terminal outcome surfacing
/// later purely through the log and callbacks (§4.3).
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Completed(BodyResult),
    /// Equivalent to the original's `SchedulerRestart`: logged as success,
    /// callbacks fire, then surfaced here as its own variant rather than
    /// nested inside `Completed` — a restart is a distinct instruction to
    /// the caller, not just another terminal body result.
    RestartRequested,
    Started,
    /// Proof-of-start for a `process` task was not observed within the
    /// timeout; the worker is presumed to have crashed in setup.
    CrashedInSetup,
}
