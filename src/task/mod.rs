pub mod outcome;
pub mod signal;
pub mod state;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex as TokioMutex;
use tracing::debug;

use crate::adapter::TaskAdapter;
use crate::condition::Condition;
use crate::condition::ConditionHistory;
use crate::errors::Result;
use crate::log::record::Action;
use crate::log::sink::LogSink;
use crate::params::Parameters;
use crate::types::{shared_name, DaemonSetting, ExecutionMode, SharedName, TaskName};

pub use outcome::{BodyOutcome, BodyResult, DispatchOutcome, FinishStatus, WireOutcome};
pub use signal::TerminateSignal;
pub use state::{TaskRuntimeState, WorkerAttachment};

/// A task body usable from `main`/`thread` execution: an in-process closure
/// receiving materialised parameters and a terminate signal (polled only by
/// thread bodies; main bodies may ignore it).
pub type InlineBody = Arc<dyn Fn(&HashMap<String, Value>, &TerminateSignal) -> BodyOutcome + Send + Sync>;

/// A task body usable from `process` execution: a plain function pointer
/// registered ahead of time (Design Notes §9), since a closure cannot be
/// shipped across a process boundary the way Python pickles one.
pub type ProcessBody = fn(&HashMap<String, Value>) -> BodyOutcome;

pub enum TaskBody {
    Fn(InlineBody),
    Process(&'static str),
}

/// The static configuration governing when and how a task runs.
pub struct TaskPolicy {
    pub start_cond: Condition,
    pub run_cond: Condition,
    pub end_cond: Condition,
    pub timeout: Option<Duration>,
    pub priority: i64,
    pub execution: ExecutionMode,
    pub daemon: DaemonSetting,
    pub disabled: bool,
    pub on_startup: bool,
    pub on_shutdown: bool,
    pub dependent: Vec<TaskName>,
}

impl Default for TaskPolicy {
    fn default() -> Self {
        Self {
            start_cond: Condition::AlwaysFalse,
            run_cond: Condition::AlwaysTrue,
            end_cond: Condition::AlwaysFalse,
            timeout: None,
            priority: 0,
            execution: ExecutionMode::Main,
            daemon: DaemonSetting::Inherit,
            disabled: false,
            on_startup: false,
            on_shutdown: false,
            dependent: Vec::new(),
        }
    }
}

type SuccessCallback = Arc<dyn Fn(Option<&Value>) + Send + Sync>;
type FailureCallback = Arc<dyn Fn(&anyhow::Error) + Send + Sync>;
type FinishCallback = Arc<dyn Fn(FinishStatus) + Send + Sync>;

#[derive(Default, Clone)]
pub struct TaskCallbacks {
    pub on_success: Option<SuccessCallback>,
    pub on_failure: Option<FailureCallback>,
    pub on_finish: Option<FinishCallback>,
}

/// The unit of work. See SPEC_FULL.md §3/§4.2 for the full lifecycle contract.
pub struct Task {
    pub(crate) name: SharedName,
    pub(crate) policy: StdMutex<TaskPolicy>,
    pub(crate) callbacks: TaskCallbacks,
    pub(crate) parameters: Parameters,
    pub(crate) body: TaskBody,
    pub(crate) adapter: TaskAdapter,
    pub(crate) state: TokioMutex<TaskRuntimeState>,
    pub(crate) terminate_signal: TerminateSignal,
    pub(crate) force_run: AtomicBool,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("name", &self.name()).finish()
    }
}

impl Task {
    pub fn name(&self) -> String {
        self.name.read().unwrap().clone()
    }

    pub(crate) fn shared_name(&self) -> SharedName {
        Arc::clone(&self.name)
    }

    pub fn set_force_run(&self, value: bool) {
        self.force_run.store(value, Ordering::SeqCst);
    }

    /// ANDs a `DependSuccess` clause for each of `tasks` into `start_cond`.
    /// An empty slice is a no-op: the original never implemented clearing
    /// previously-installed dependency conditions (its own `TODO` says so),
    /// and this crate matches that rather than inventing clearing semantics
    /// (see the Open Questions section of SPEC_FULL.md).
    pub fn set_dependent(&self, tasks: &[TaskName]) {
        if tasks.is_empty() {
            return;
        }
        let mut policy = self.policy.lock().unwrap();
        policy.dependent = tasks.to_vec();
        let mut dep_cond = Condition::All(
            tasks
                .iter()
                .map(|t| Condition::depend_success(t.clone()))
                .collect(),
        );
        dep_cond.bind_defaults(&self.name());
        policy.start_cond = std::mem::replace(&mut policy.start_cond, Condition::AlwaysFalse).and(dep_cond);
    }

    pub fn should_run(&self, history: &dyn ConditionHistory) -> bool {
        if self.force_run.load(Ordering::SeqCst) {
            return true;
        }
        let policy = self.policy.lock().unwrap();
        if policy.disabled {
            return false;
        }
        policy.start_cond.evaluate(history)
    }

    pub fn should_keep_running(&self, history: &dyn ConditionHistory) -> bool {
        let policy = self.policy.lock().unwrap();
        if policy.end_cond.evaluate(history) {
            return false;
        }
        policy.run_cond.evaluate(history)
    }

    pub fn execution(&self) -> ExecutionMode {
        self.policy.lock().unwrap().execution
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.policy.lock().unwrap().timeout
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_running()
    }

    pub async fn is_alive(&self) -> bool {
        self.state.lock().await.worker.is_alive()
    }

    /// Requests cancellation. Cooperative for `thread` (the signal is
    /// polled by the body); for `process`, the supervising back-end kills
    /// the child; for `main`, there is nothing to cancel.
    pub async fn terminate(&self) {
        self.terminate_signal.set();
        let mut state = self.state.lock().await;
        if let WorkerAttachment::Process(attachment) = &mut state.worker {
            if let Some(kill) = attachment.kill.take() {
                let _ = kill.send(());
            }
        }
        state.worker.clear_if_stale();
    }

    pub fn get_history(&self) -> Result<Vec<crate::log::record::LogRecord>> {
        self.adapter.history()
    }

    /// Derived from conditions where statically knowable. This crate has no
    /// time-interval condition leaves (the interval parser is external, per
    /// §1 Non-goals), so this is always `None`; kept for API parity with the
    /// Task method list in SPEC_FULL.md §6.
    pub fn period(&self) -> Option<Duration> {
        None
    }

    pub async fn status_memory(&self) -> Option<Action> {
        self.state.lock().await.status
    }

    pub fn status_from_log(&self) -> Result<Option<Action>> {
        Ok(self.adapter.latest()?.map(|r| r.action))
    }

    pub async fn log_running(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let record = self.adapter.emit(Action::Run, None, "")?;
        state.status = Some(Action::Run);
        state.start_time = record.start;
        debug!(task = %self.name(), "run");
        Ok(())
    }

    pub async fn log_success(&self, message: impl Into<String>) -> Result<()> {
        let mut state = self.state.lock().await;
        let start = state.start_time;
        self.adapter.emit(Action::Success, start, message)?;
        state.status = Some(Action::Success);
        Ok(())
    }

    /// A 2-tuple in the original (`status = ("fail", message)`); resolved in
    /// SPEC_FULL.md's Open Questions as: the message survives into the
    /// record as its human-readable text, not discarded.
    pub async fn log_failure(&self, message: impl Into<String>) -> Result<()> {
        let mut state = self.state.lock().await;
        let start = state.start_time;
        self.adapter.emit(Action::Fail, start, message)?;
        state.status = Some(Action::Fail);
        Ok(())
    }

    pub async fn log_termination(&self, reason: Option<String>) -> Result<()> {
        let message = reason.unwrap_or_else(|| "unknown reason".to_string());
        let mut state = self.state.lock().await;
        let start = state.start_time;
        self.adapter.emit(Action::Terminate, start, message)?;
        state.status = Some(Action::Terminate);
        drop(state);
        self.terminate_signal.clear();
        Ok(())
    }

    pub async fn log_inaction(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let start = state.start_time;
        self.adapter.emit(Action::Inaction, start, "")?;
        state.status = Some(Action::Inaction);
        Ok(())
    }

    pub async fn log_crash_release(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let start = state.start_time;
        self.adapter.emit(Action::CrashRelease, start, "worker disappeared without a terminal record")?;
        state.status = Some(Action::CrashRelease);
        Ok(())
    }

    /// Replays a record produced out-of-band (by a worker process over the
    /// bridge) as if it had been emitted locally. The bridge record is
    /// authoritative: it overwrites in-memory status directly.
    pub async fn log_record(&self, record: crate::log::record::LogRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        let action = record.action;
        let start = record.start;
        self.adapter.relay(record)?;
        state.status = Some(action);
        if action == Action::Run {
            state.start_time = start;
        }
        Ok(())
    }

    pub(crate) async fn process_finish(&self, status: FinishStatus) {
        self.force_run.store(false, Ordering::SeqCst);
        if let Some(cb) = &self.callbacks.on_finish {
            cb(status);
        }
    }

    pub(crate) fn process_success(&self, output: Option<&Value>) {
        if let Some(cb) = &self.callbacks.on_success {
            cb(output);
        }
    }

    pub(crate) fn process_failure(&self, err: &anyhow::Error) {
        if let Some(cb) = &self.callbacks.on_failure {
            cb(err);
        }
    }

    /// Logs and fires callbacks for a body that ran to completion in this
    /// address space (`main`, and internally for `thread`). Only the
    /// `Error` branch is surfaced as an `Err` — matching SPEC_FULL.md §4.2,
    /// "only `BodyOutcome::Error` propagates ... as an `Err`".
    pub(crate) async fn apply_body_outcome(&self, outcome: BodyOutcome) -> Result<DispatchOutcome> {
        match outcome {
            BodyOutcome::Success(v) => {
                self.log_success(v.to_string()).await?;
                self.process_success(Some(&v));
                self.process_finish(FinishStatus::Succeeded).await;
                Ok(DispatchOutcome::Completed(BodyResult::Success(v)))
            }
            BodyOutcome::Inaction => {
                self.log_inaction().await?;
                self.process_finish(FinishStatus::Inaction).await;
                Ok(DispatchOutcome::Completed(BodyResult::Inaction))
            }
            BodyOutcome::Terminated => {
                self.log_termination(None).await?;
                self.process_finish(FinishStatus::Terminated).await;
                Ok(DispatchOutcome::Completed(BodyResult::Terminated))
            }
            BodyOutcome::RestartRequested => {
                self.log_success("restart requested").await?;
                self.process_success(None);
                self.process_finish(FinishStatus::Succeeded).await;
                Ok(DispatchOutcome::RestartRequested)
            }
            BodyOutcome::Error(e) => {
                self.log_failure(e.to_string()).await?;
                self.process_failure(&e);
                self.process_finish(FinishStatus::Failed).await;
                Err(e.into())
            }
        }
    }

    /// Fires callbacks for a terminal outcome that ran in a worker process.
    /// Logging has already happened by replaying the bridge's `LogRecord`s
    /// (§4.4); this only applies the side effects a closure-based callback
    /// requires, using the bridge's final [`WireOutcome`] line to recover
    /// the structured output value.
    pub(crate) async fn apply_process_outcome(&self, outcome: WireOutcome) {
        match outcome {
            WireOutcome::Success(v) => {
                self.process_success(Some(&v));
                self.process_finish(FinishStatus::Succeeded).await;
            }
            WireOutcome::Inaction => {
                self.process_finish(FinishStatus::Inaction).await;
            }
            WireOutcome::Terminated => {
                self.process_finish(FinishStatus::Terminated).await;
            }
            WireOutcome::RestartRequested => {
                self.process_success(None);
                self.process_finish(FinishStatus::Succeeded).await;
            }
            WireOutcome::Error(msg) => {
                self.process_failure(&anyhow::anyhow!(msg));
                self.process_finish(FinishStatus::Failed).await;
            }
        }
    }

    /// Dispatches the task body on its configured back-end. Returns only
    /// after proof-of-start has been observed (§4.3).
    pub async fn dispatch(self: &Arc<Self>) -> Result<DispatchOutcome> {
        {
            let mut state = self.state.lock().await;
            state.worker.clear_if_stale();
        }
        match self.execution() {
            ExecutionMode::Main => crate::exec::inline::dispatch_main(self).await,
            ExecutionMode::Thread => crate::exec::thread::dispatch_thread(self).await,
            ExecutionMode::Process => crate::exec::process::dispatch_process(self).await,
        }
    }
}

/// Explicit construction replacing the original's metaclass-based
/// auto-registration (Design Notes §9).
pub struct TaskBuilder {
    name: TaskName,
    policy: TaskPolicy,
    callbacks: TaskCallbacks,
    parameters: Parameters,
    body: Option<TaskBody>,
    force_run: bool,
}

impl TaskBuilder {
    pub fn new(name: impl Into<TaskName>) -> Self {
        Self {
            name: name.into(),
            policy: TaskPolicy::default(),
            callbacks: TaskCallbacks::default(),
            parameters: Parameters::default(),
            body: None,
            force_run: false,
        }
    }

    /// The name this builder will register under, before `build()` consumes it.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Overrides the builder's name, used by [`crate::session::Session`] to
    /// apply the `rename` collision policy before building.
    pub fn with_name(mut self, name: impl Into<TaskName>) -> Self {
        self.name = name.into();
        self
    }

    pub fn body_fn(
        mut self,
        body: impl Fn(&HashMap<String, Value>, &TerminateSignal) -> BodyOutcome + Send + Sync + 'static,
    ) -> Self {
        self.body = Some(TaskBody::Fn(Arc::new(body)));
        self
    }

    pub fn body_process(mut self, registered_name: &'static str) -> Self {
        self.body = Some(TaskBody::Process(registered_name));
        self
    }

    pub fn start_cond(mut self, cond: impl Into<Condition>) -> Self {
        self.policy.start_cond = cond.into();
        self
    }

    pub fn run_cond(mut self, cond: impl Into<Condition>) -> Self {
        self.policy.run_cond = cond.into();
        self
    }

    pub fn end_cond(mut self, cond: impl Into<Condition>) -> Self {
        self.policy.end_cond = cond.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.policy.timeout = Some(timeout);
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.policy.priority = priority;
        self
    }

    pub fn execution(mut self, execution: ExecutionMode) -> Self {
        self.policy.execution = execution;
        self
    }

    pub fn daemon(mut self, daemon: DaemonSetting) -> Self {
        self.policy.daemon = daemon;
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.policy.disabled = disabled;
        self
    }

    pub fn on_startup(mut self, value: bool) -> Self {
        self.policy.on_startup = value;
        self
    }

    pub fn on_shutdown(mut self, value: bool) -> Self {
        self.policy.on_shutdown = value;
        self
    }

    pub fn force_run(mut self, value: bool) -> Self {
        self.force_run = value;
        self
    }

    pub fn parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn on_success(mut self, cb: impl Fn(Option<&Value>) + Send + Sync + 'static) -> Self {
        self.callbacks.on_success = Some(Arc::new(cb));
        self
    }

    pub fn on_failure(mut self, cb: impl Fn(&anyhow::Error) + Send + Sync + 'static) -> Self {
        self.callbacks.on_failure = Some(Arc::new(cb));
        self
    }

    pub fn on_finish(mut self, cb: impl Fn(FinishStatus) + Send + Sync + 'static) -> Self {
        self.callbacks.on_finish = Some(Arc::new(cb));
        self
    }

    pub fn dependent(mut self, tasks: Vec<TaskName>) -> Self {
        self.policy.dependent = tasks;
        self
    }

    pub fn build(mut self, sink: Arc<dyn LogSink>) -> Arc<Task> {
        self.policy.start_cond.bind_defaults(&self.name);
        self.policy.end_cond.bind_defaults(&self.name);
        self.policy.run_cond.bind_defaults(&self.name);
        let dependent = std::mem::take(&mut self.policy.dependent);

        let name = shared_name(self.name);
        let adapter = TaskAdapter::new(sink, Arc::clone(&name));
        let task = Arc::new(Task {
            name,
            policy: StdMutex::new(self.policy),
            callbacks: self.callbacks,
            parameters: self.parameters,
            body: self.body.expect("a task must have a body"),
            adapter,
            state: TokioMutex::new(TaskRuntimeState::default()),
            terminate_signal: TerminateSignal::new(),
            force_run: AtomicBool::new(self.force_run),
        });

        if !dependent.is_empty() {
            task.set_dependent(&dependent);
        }
        task
    }
}
