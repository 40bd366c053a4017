// src/adapter.rs

//! Wraps a [`LogSink`] so the core emits records tagged with a task's
//! identity and timing metadata, and mirrors each emission into `tracing`.
//! This is the crate's substitute for the original's logger-reconstruction
//! machinery: a worker process builds a fresh `TaskAdapter` pointed at a
//! bridge-backed sink (see [`crate::bridge`]) instead of inheriting one.

use std::sync::Arc;
use std::time::SystemTime;

use tracing::{error, info};

use crate::errors::Result;
use crate::log::record::{Action, LogRecord};
use crate::log::sink::LogSink;
use crate::types::SharedName;

#[derive(Clone)]
pub struct TaskAdapter {
    sink: Arc<dyn LogSink>,
    task_name: SharedName,
}

impl std::fmt::Debug for TaskAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskAdapter").field("task_name", &self.task_name()).finish()
    }
}

impl TaskAdapter {
    pub fn new(sink: Arc<dyn LogSink>, task_name: SharedName) -> Self {
        Self { sink, task_name }
    }

    pub fn task_name(&self) -> String {
        self.task_name.read().unwrap().clone()
    }

    /// Emits a record for `action`, computing `runtime` from `start` when the
    /// action is terminal. `start` should be `None` when emitting `Run`
    /// itself (the record sets its own start to "now").
    pub fn emit(
        &self,
        action: Action,
        start: Option<SystemTime>,
        message: impl Into<String>,
    ) -> Result<LogRecord> {
        let message = message.into();
        let now = SystemTime::now();
        let task_name = self.task_name();

        let record = if action == Action::Run {
            LogRecord {
                task_name,
                action,
                start: Some(now),
                end: None,
                runtime: None,
                message,
            }
        } else {
            let runtime = start.and_then(|s| now.duration_since(s).ok());
            LogRecord {
                task_name,
                action,
                start,
                end: Some(now),
                runtime,
                message,
            }
        };

        self.trace_emit(&record);
        self.sink.append(record.clone())?;
        Ok(record)
    }

    /// Re-emits a record produced elsewhere (e.g. received over the bridge)
    /// without recomputing timing — the record is already authoritative.
    pub fn relay(&self, record: LogRecord) -> Result<()> {
        self.trace_emit(&record);
        self.sink.append(record)
    }

    fn trace_emit(&self, record: &LogRecord) {
        match record.action {
            Action::Fail | Action::CrashRelease => {
                error!(task = %record.task_name, action = ?record.action, message = %record.message, "task transition")
            }
            _ => {
                info!(task = %record.task_name, action = ?record.action, message = %record.message, "task transition")
            }
        }
    }

    pub fn latest(&self) -> Result<Option<LogRecord>> {
        self.sink.latest(&self.task_name())
    }

    pub fn history(&self) -> Result<Vec<LogRecord>> {
        self.sink.history(&self.task_name())
    }

    pub fn last_time_reaching(&self, action: Action) -> Result<Option<SystemTime>> {
        Ok(self
            .sink
            .latest_matching(&self.task_name(), action)?
            .and_then(|r| r.end.or(r.start)))
    }
}
