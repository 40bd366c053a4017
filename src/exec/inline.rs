// src/exec/inline.rs

//! The `main` execution back-end: runs the body on the caller's own async
//! task. Also used internally by the `thread` back-end once it has logged
//! `run` and signalled proof-of-start.

use std::sync::Arc;

use crate::errors::Result;
use crate::task::{BodyOutcome, DispatchOutcome, Task, TaskBody, TerminateSignal};

pub async fn dispatch_main(task: &Arc<Task>) -> Result<DispatchOutcome> {
    task.log_running().await?;
    let outcome = run_body(task, &TerminateSignal::new())?;
    task.apply_body_outcome(outcome).await
}

/// Materialises parameters and invokes the body. Only `TaskBody::Fn` is
/// valid here; `TaskBody::Process` must go through `exec::process`.
pub(crate) fn run_body(task: &Task, terminate: &TerminateSignal) -> Result<BodyOutcome> {
    let params = task.parameters.materialize_full()?;
    match &task.body {
        TaskBody::Fn(body) => Ok(body(&params, terminate)),
        TaskBody::Process(_) => Ok(BodyOutcome::Error(anyhow::anyhow!(
            "task '{}' is execution=process but was dispatched inline",
            task.name()
        ))),
    }
}
