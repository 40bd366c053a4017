#![allow(dead_code)]

use std::sync::Arc;

use serde_json::Value;

use taskforge::task::TerminateSignal;
use taskforge::{BodyOutcome, LogSink, MemoryLogSink, Session, SessionConfig, TaskBuilder};

/// Builds a `Session` backed by a fresh in-memory sink, for tests that don't
/// care about a particular `SessionConfig`.
pub fn test_session() -> Session {
    Session::new(SessionConfig::default())
}

pub fn test_session_with_config(config: SessionConfig) -> Session {
    Session::new(config)
}

pub fn test_sink() -> Arc<dyn LogSink> {
    Arc::new(MemoryLogSink::new())
}

/// A `TaskBuilder` whose body always succeeds with `Value::Null`, for tests
/// only interested in scheduling/condition behaviour.
pub fn succeeding_task(name: &str) -> TaskBuilder {
    TaskBuilder::new(name).body_fn(|_, _| BodyOutcome::Success(Value::Null))
}

pub fn failing_task(name: &str, message: impl Into<String> + Clone + Send + Sync + 'static) -> TaskBuilder {
    TaskBuilder::new(name).body_fn(move |_, _: &TerminateSignal| {
        BodyOutcome::Error(anyhow::anyhow!(message.clone().into()))
    })
}

pub fn inactive_task(name: &str) -> TaskBuilder {
    TaskBuilder::new(name).body_fn(|_, _| BodyOutcome::Inaction)
}
