use std::time::SystemTime;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::log::record::Action;

/// A running worker process's supervising task: drains the bridge in the
/// background and, on `kill`, tears the child down.
pub struct ProcessAttachment {
    pub handle: JoinHandle<()>,
    pub kill: Option<oneshot::Sender<()>>,
}

impl std::fmt::Debug for ProcessAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessAttachment").finish()
    }
}

/// At most one of these is attached to a task at any time (Invariant 3).
/// Being an enum rather than two separate `Option` fields makes "at most
/// one" a property the type enforces rather than one the code must remember.
pub enum WorkerAttachment {
    None,
    Thread(std::thread::JoinHandle<()>),
    Process(ProcessAttachment),
}

impl WorkerAttachment {
    pub fn is_alive(&self) -> bool {
        match self {
            WorkerAttachment::None => false,
            WorkerAttachment::Thread(handle) => !handle.is_finished(),
            WorkerAttachment::Process(attachment) => !attachment.handle.is_finished(),
        }
    }

    /// Replaces a finished attachment with `None`, matching the original's
    /// "stale attachments cleared before spawning" step in `__call__`.
    pub fn clear_if_stale(&mut self) {
        if !self.is_alive() {
            *self = WorkerAttachment::None;
        }
    }
}

impl std::fmt::Debug for WorkerAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerAttachment::None => f.write_str("None"),
            WorkerAttachment::Thread(_) => f.write_str("Thread(..)"),
            WorkerAttachment::Process(_) => f.write_str("Process(..)"),
        }
    }
}

/// The mutable part of a task's lifecycle (Invariant 1: serialised by the
/// transition mutex the task holds this state behind).
#[derive(Debug)]
pub struct TaskRuntimeState {
    pub status: Option<Action>,
    pub start_time: Option<SystemTime>,
    pub worker: WorkerAttachment,
}

impl Default for TaskRuntimeState {
    fn default() -> Self {
        Self {
            status: None,
            start_time: None,
            worker: WorkerAttachment::None,
        }
    }
}

impl TaskRuntimeState {
    pub fn is_running(&self) -> bool {
        self.status == Some(Action::Run)
    }
}
