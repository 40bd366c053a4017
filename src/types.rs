use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

pub type TaskName = String;

/// A task's name, shared between the `Task` and its `TaskAdapter` so a
/// [`crate::session::Session`] rename is visible to both without needing to
/// reconstruct either.
pub type SharedName = Arc<RwLock<TaskName>>;

pub fn shared_name(name: impl Into<TaskName>) -> SharedName {
    Arc::new(RwLock::new(name.into()))
}

/// Where a task's body runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Runs inline, on the caller's own async task.
    Main,
    /// Runs on a dedicated OS thread; cancellation is cooperative.
    Thread,
    /// Runs in a separate OS process; cancellation is forceful.
    Process,
}

/// Tri-state daemon setting: inherit the scheduler default, or force on/off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DaemonSetting {
    Inherit,
    Force(bool),
}

impl Default for DaemonSetting {
    fn default() -> Self {
        DaemonSetting::Inherit
    }
}

/// Collision policy when registering a task whose name is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnTaskPreExists {
    Raise,
    Replace,
    Ignore,
    Rename,
}

impl Default for OnTaskPreExists {
    fn default() -> Self {
        OnTaskPreExists::Raise
    }
}
