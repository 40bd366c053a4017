//! A controllable task body for exercising cancellation and ordering without
//! real I/O: records which tasks actually started and lets a test release a
//! specific task's body on demand, mirroring the teacher crate's
//! `ControllableExecutor` pattern (started-tasks `Vec` + a completion signal
//! per task).
//!
//! A `thread`-mode body runs synchronously on its own OS thread, which
//! already drives a `block_on` of its own (see `exec::thread`) — so this body
//! blocks with plain `std::thread::sleep` polling rather than async, to
//! avoid nesting a second Tokio runtime call on the same thread.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use taskforge::task::TerminateSignal;
use taskforge::BodyOutcome;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Default)]
pub struct ControllableBodies {
    started: Arc<Mutex<Vec<String>>>,
    gates: Arc<Mutex<HashMap<String, Arc<AtomicBool>>>>,
}

impl ControllableBodies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    fn gate_for(&self, name: &str) -> Arc<AtomicBool> {
        Arc::clone(
            self.gates
                .lock()
                .unwrap()
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(AtomicBool::new(false))),
        )
    }

    /// Releases the body registered as `name`, letting it return `Success`.
    pub fn release(&self, name: &str) {
        self.gate_for(name).store(true, Ordering::SeqCst);
    }

    /// Builds a body: on invocation, records `name` as started, then blocks
    /// until either `release(name)` is called (`Success`) or the terminate
    /// signal is set (`Terminated`).
    pub fn body(
        &self,
        name: &str,
    ) -> impl Fn(&HashMap<String, Value>, &TerminateSignal) -> BodyOutcome + Send + Sync + 'static {
        let started = Arc::clone(&self.started);
        let gate = self.gate_for(name);
        let name = name.to_string();

        move |_params, terminate| {
            started.lock().unwrap().push(name.clone());
            loop {
                if gate.load(Ordering::SeqCst) {
                    return BodyOutcome::Success(Value::Null);
                }
                if terminate.is_set() {
                    return BodyOutcome::Terminated;
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

/// Polls `f` until it returns `true` or the timeout elapses, for waiting on
/// state a test doesn't otherwise get notified about (e.g. "has this task's
/// name shown up in `started()` yet").
pub async fn wait_for<F: Fn() -> bool>(f: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if f() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
