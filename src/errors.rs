// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskForgeError {
    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("task already exists: {0}")]
    TaskAlreadyExists(String),

    #[error("invalid action in log record: {0}")]
    InvalidRecord(String),

    #[error("task '{0}' has no process body registered")]
    ProcessBodyNotRegistered(String),

    #[error("task '{0}' has an in-process lazy parameter, which cannot cross a process boundary; use a named lazy parameter instead")]
    LazyParamNotProcessSafe(String),

    #[error("worker process crashed in setup: {0}")]
    WorkerCrashedInSetup(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskForgeError>;
