// src/session.rs

//! The process-wide task registry (Component G). Replaces the original's
//! metaclass-driven subclass directory with an explicit `HashMap` owned by
//! one `Session`, populated via [`crate::task::TaskBuilder`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::warn;

use crate::condition::ConditionHistory;
use crate::errors::{Result, TaskForgeError};
use crate::log::record::Action;
use crate::log::sink::{LogSink, MemoryLogSink};
use crate::task::{Task, TaskBuilder};
use crate::types::{OnTaskPreExists, TaskName};

/// Recognised Session configuration (SPEC_FULL.md §4.6).
pub struct SessionConfig {
    /// Prefix required for loggers attached to tasks. Carried for parity with
    /// the original; this crate does not enforce it against external
    /// `tracing` subscribers.
    pub task_logger_basename: Option<String>,
    /// If true, an empty builder name is resolved to a generated instance id
    /// rather than a fixed default literal.
    pub use_instance_naming: bool,
    pub on_task_pre_exists: OnTaskPreExists,
    pub force_status_from_logs: bool,
    /// No-op retained for config-table parity with the original's
    /// metaclass-driven subclass directory; this crate has no subclassing.
    pub session_store_task_cls: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            task_logger_basename: None,
            use_instance_naming: false,
            on_task_pre_exists: OnTaskPreExists::default(),
            force_status_from_logs: false,
            session_store_task_cls: false,
        }
    }
}

/// A process-wide directory mapping task name to `Task`, plus configuration.
pub struct Session {
    sink: Arc<dyn LogSink>,
    config: SessionConfig,
    tasks: HashMap<TaskName, Arc<Task>>,
    instance_counter: AtomicU64,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_sink(Arc::new(MemoryLogSink::new()), config)
    }

    pub fn with_sink(sink: Arc<dyn LogSink>, config: SessionConfig) -> Self {
        Self {
            sink,
            config,
            tasks: HashMap::new(),
            instance_counter: AtomicU64::new(0),
        }
    }

    pub fn sink(&self) -> Arc<dyn LogSink> {
        Arc::clone(&self.sink)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn get(&self, name: &str) -> Option<Arc<Task>> {
        self.tasks.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &TaskName> {
        self.tasks.keys()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Arc<Task>> {
        self.tasks.values()
    }

    /// Registers `builder`, applying the collision policy (§4.6) if a task
    /// under that name already exists.
    pub fn register(&mut self, mut builder: TaskBuilder) -> Result<Arc<Task>> {
        let mut name = builder.name().to_string();
        if name.is_empty() {
            name = self.default_name();
            builder = builder.with_name(name.clone());
        }

        if let Some(existing) = self.tasks.get(&name) {
            match self.config.on_task_pre_exists {
                OnTaskPreExists::Raise => return Err(TaskForgeError::TaskAlreadyExists(name)),
                OnTaskPreExists::Ignore => return Ok(Arc::clone(existing)),
                OnTaskPreExists::Replace => {
                    self.tasks.remove(&name);
                }
                OnTaskPreExists::Rename => {
                    let fresh = self.free_name(&name);
                    builder = builder.with_name(fresh.clone());
                    name = fresh;
                }
            }
        }

        let task = builder.build(self.sink());
        self.tasks.insert(name, Arc::clone(&task));
        Ok(task)
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<Task>> {
        self.tasks.remove(name)
    }

    /// Atomically re-keys the registry and updates the task's own shared
    /// name, so `adapter.task_name() == new` immediately for both the task
    /// and its adapter (the "rename atomicity" invariant). A no-op if
    /// `new == old`.
    pub fn rename(&mut self, old: &str, new: impl Into<TaskName>) -> Result<()> {
        let new = new.into();
        if old == new {
            return Ok(());
        }
        if self.tasks.contains_key(&new) {
            return Err(TaskForgeError::TaskAlreadyExists(new));
        }
        let task = self
            .tasks
            .remove(old)
            .ok_or_else(|| TaskForgeError::TaskNotFound(old.to_string()))?;
        *task.shared_name().write().unwrap() = new.clone();
        self.tasks.insert(new, task);
        Ok(())
    }

    /// Effective current status, selecting the query mode per
    /// `force_status_from_logs` (§4.5).
    pub async fn status_of(&self, name: &str) -> Result<Option<Action>> {
        let task = self
            .get(name)
            .ok_or_else(|| TaskForgeError::TaskNotFound(name.to_string()))?;

        if self.config.force_status_from_logs {
            match task.status_from_log() {
                Ok(status) => Ok(status),
                Err(e) => {
                    warn!(task = %name, error = %e, "log-authoritative status query failed");
                    Ok(None)
                }
            }
        } else {
            Ok(task.status_memory().await)
        }
    }

    fn default_name(&self) -> String {
        if self.config.use_instance_naming {
            let id = self.instance_counter.fetch_add(1, Ordering::SeqCst);
            format!("task-{id}")
        } else {
            "task".to_string()
        }
    }

    fn free_name(&self, base: &str) -> String {
        let mut n: u64 = 0;
        loop {
            let candidate = format!("{base}{n}");
            if !self.tasks.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

impl ConditionHistory for Session {
    fn last_action(&self, task: &str) -> Option<Action> {
        self.sink.latest(task).ok().flatten().map(|r| r.action)
    }

    fn last_run_start(&self, task: &str) -> Option<SystemTime> {
        self.sink
            .latest_matching(task, Action::Run)
            .ok()
            .flatten()
            .and_then(|r| r.start)
    }

    fn last_time_reaching(&self, task: &str, action: Action) -> Option<SystemTime> {
        self.sink
            .latest_matching(task, action)
            .ok()
            .flatten()
            .and_then(|r| r.end.or(r.start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::BodyOutcome;

    fn builder(name: &str) -> TaskBuilder {
        TaskBuilder::new(name).body_fn(|_, _| BodyOutcome::Inaction)
    }

    #[test]
    fn register_rejects_duplicate_by_default() {
        let mut session = Session::new(SessionConfig::default());
        session.register(builder("a")).unwrap();
        let err = session.register(builder("a")).unwrap_err();
        assert!(matches!(err, TaskForgeError::TaskAlreadyExists(_)));
    }

    #[test]
    fn register_renames_on_collision() {
        let mut session = Session::new(SessionConfig {
            on_task_pre_exists: OnTaskPreExists::Rename,
            ..SessionConfig::default()
        });
        session.register(builder("a")).unwrap();
        // Seed "a0" too, so the free-name search has to skip past it and
        // land on "a1" rather than trivially returning the first candidate.
        session.register(builder("a0")).unwrap();
        session.register(builder("a")).unwrap();
        assert!(session.contains("a"));
        assert!(session.contains("a0"));
        assert!(session.contains("a1"));
    }

    #[test]
    fn register_replaces_on_collision() {
        let mut session = Session::new(SessionConfig {
            on_task_pre_exists: OnTaskPreExists::Replace,
            ..SessionConfig::default()
        });
        let first = session.register(builder("a")).unwrap();
        let second = session.register(builder("a")).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(session.tasks.len(), 1);
    }

    #[test]
    fn rename_updates_both_directions() {
        let mut session = Session::new(SessionConfig::default());
        session.register(builder("a")).unwrap();
        session.rename("a", "b").unwrap();
        assert!(!session.contains("a"));
        let renamed = session.get("b").unwrap();
        assert_eq!(renamed.name(), "b");
    }

    #[test]
    fn rename_to_existing_name_errors() {
        let mut session = Session::new(SessionConfig::default());
        session.register(builder("a")).unwrap();
        session.register(builder("b")).unwrap();
        let err = session.rename("a", "b").unwrap_err();
        assert!(matches!(err, TaskForgeError::TaskAlreadyExists(_)));
    }
}
