// src/exec/thread.rs

//! The `thread` execution back-end: spawns one OS worker thread bound to a
//! private terminate signal. The thread itself logs `run` and signals
//! proof-of-start before running the body — the dispatcher only waits for
//! that signal, mirroring `run_as_thread`/`_run_as_thread` in the original.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::errors::Result;
use crate::task::state::WorkerAttachment;
use crate::task::{BodyOutcome, DispatchOutcome, Task};

pub async fn dispatch_thread(task: &Arc<Task>) -> Result<DispatchOutcome> {
    let (start_tx, start_rx) = oneshot::channel::<()>();
    let task_clone = Arc::clone(task);
    let handle = tokio::runtime::Handle::current();

    let join = std::thread::spawn(move || {
        handle.block_on(async move {
            if let Err(e) = task_clone.log_running().await {
                tracing::error!(task = %task_clone.name(), error = %e, "failed to log run");
                let _ = start_tx.send(());
                return;
            }
            let _ = start_tx.send(());

            let terminate = task_clone.terminate_signal.clone();
            let outcome = crate::exec::inline::run_body(&task_clone, &terminate)
                .unwrap_or_else(|e| BodyOutcome::Error(e.into()));

            if let Err(e) = task_clone.apply_body_outcome(outcome).await {
                tracing::debug!(task = %task_clone.name(), error = %e, "thread task body failed");
            }
        });
    });

    {
        let mut state = task.state.lock().await;
        state.worker = WorkerAttachment::Thread(join);
    }

    start_rx.await.map_err(|_| {
        anyhow::anyhow!("thread task '{}' ended before signalling start", task.name())
    })?;

    Ok(DispatchOutcome::Started)
}
