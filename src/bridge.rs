// src/bridge.rs

//! The cross-address-space log bridge (SPEC_FULL.md §4.4): a worker
//! process's stdout carries newline-delimited JSON [`BridgeLine`]s back to
//! the parent. This is the idiomatic-Rust analogue of the original's
//! `multiprocessing.Queue` — a pipe instead of a queue, JSON instead of
//! pickling — with the same single-producer, single-consumer, FIFO-within-
//! producer guarantee.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout};

use crate::errors::Result;
use crate::log::record::{Action, LogRecord};
use crate::task::{Task, WireOutcome};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BridgeLine {
    Record(LogRecord),
    Outcome(WireOutcome),
}

pub type BridgeReader = Lines<BufReader<ChildStdout>>;

pub enum DrainUntilRun {
    ObservedRun,
    TimedOut,
}

enum BridgeEvent {
    Record(Action),
    Outcome,
}

async fn process_bridge_line(task: &Arc<Task>, line: &str) -> Result<BridgeEvent> {
    let parsed: BridgeLine = serde_json::from_str(line)?;
    match parsed {
        BridgeLine::Record(record) => {
            let action = record.action;
            task.log_record(record).await?;
            Ok(BridgeEvent::Record(action))
        }
        BridgeLine::Outcome(outcome) => {
            task.apply_process_outcome(outcome).await;
            Ok(BridgeEvent::Outcome)
        }
    }
}

/// Drains the bridge until a `run` record is observed, or `timeout` elapses
/// with the worker confirmed dead. Mirrors `_lock_to_run_log`: on an
/// individual read timeout, it keeps looping as long as the worker is still
/// alive, rather than giving up after exactly one wait.
pub async fn drain_until_run(
    lines: &mut BridgeReader,
    child: &mut Child,
    task: &Arc<Task>,
    timeout: Duration,
) -> Result<DrainUntilRun> {
    loop {
        match tokio::time::timeout(timeout, lines.next_line()).await {
            Ok(Ok(Some(line))) => match process_bridge_line(task, &line).await? {
                BridgeEvent::Record(Action::Run) => return Ok(DrainUntilRun::ObservedRun),
                _ => continue,
            },
            Ok(Ok(None)) => return Ok(DrainUntilRun::TimedOut),
            Ok(Err(e)) => return Err(e.into()),
            Err(_elapsed) => {
                if matches!(child.try_wait(), Ok(Some(_))) {
                    return Ok(DrainUntilRun::TimedOut);
                }
                // still alive: keep looping rather than giving up after one wait
            }
        }
    }
}

/// Drains the bridge for the remainder of a worker process's life, replaying
/// every record and applying the final outcome's callbacks. Runs in the
/// background after proof-of-start has already been observed.
pub async fn drain_all(mut lines: BridgeReader, task: Arc<Task>, per_read_timeout: Duration) {
    loop {
        match tokio::time::timeout(per_read_timeout, lines.next_line()).await {
            Ok(Ok(Some(line))) => {
                if let Err(e) = process_bridge_line(&task, &line).await {
                    tracing::warn!(task = %task.name(), error = %e, "failed to process bridge line");
                }
            }
            Ok(Ok(None)) => break,
            Ok(Err(e)) => {
                tracing::warn!(task = %task.name(), error = %e, "bridge read error");
                break;
            }
            Err(_elapsed) => continue,
        }
    }
}
