//! The three execution back-ends (SPEC_FULL.md §4.3): `main` (inline),
//! `thread` (cooperative cancellation), and `process` (forceful
//! cancellation, worker re-exec). `Task::dispatch` is the only public entry
//! point; these modules are its implementation.

pub mod inline;
pub mod process;
pub mod registry;
pub mod thread;

pub use process::{is_worker_invocation, maybe_run_as_worker};
