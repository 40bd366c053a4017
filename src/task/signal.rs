use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cooperative cancellation flag polled by a threaded task body. An
/// `AtomicBool` is the simplest primitive that works whether the body is
/// polling from a plain OS thread (`thread` execution) or from async code;
/// it replaces the original's `threading.Event`-based terminate flag without
/// pulling in a dependency neither the teacher crate nor the rest of the
/// example pack actually needs for this.
#[derive(Debug, Clone, Default)]
pub struct TerminateSignal(Arc<AtomicBool>);

impl TerminateSignal {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
