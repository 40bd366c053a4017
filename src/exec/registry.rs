// src/exec/registry.rs

//! Explicit, typed registries replacing the original's metaclass-driven
//! auto-registration (Design Notes §9). A `process`-mode task's body and any
//! named-lazy parameters must be registered here, by name, before the
//! process back-end can look them up after re-exec — a closure cannot be
//! shipped across a process boundary the way the original pickles one.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use serde_json::Value;

use crate::task::ProcessBody;

pub type LazyParamFactory = fn() -> Value;

fn process_tasks() -> &'static RwLock<HashMap<&'static str, ProcessBody>> {
    static REGISTRY: OnceLock<RwLock<HashMap<&'static str, ProcessBody>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

fn lazy_params() -> &'static RwLock<HashMap<&'static str, LazyParamFactory>> {
    static REGISTRY: OnceLock<RwLock<HashMap<&'static str, LazyParamFactory>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Registers a process-mode task body under `name`. Call this once at
/// process startup (e.g. at the top of `main`), before building any
/// `TaskBuilder::body_process(name)` task or calling
/// [`crate::exec::process::maybe_run_as_worker`].
pub fn register_process_task(name: &'static str, body: ProcessBody) {
    process_tasks().write().unwrap().insert(name, body);
}

pub fn lookup_process_task(name: &str) -> Option<ProcessBody> {
    process_tasks().read().unwrap().get(name).copied()
}

/// Registers a lazy parameter factory usable from `process`-mode tasks.
pub fn register_lazy_param(name: &'static str, factory: LazyParamFactory) {
    lazy_params().write().unwrap().insert(name, factory);
}

pub fn lookup_lazy_param(name: &str) -> Option<LazyParamFactory> {
    lazy_params().read().unwrap().get(name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::BodyOutcome;

    fn echo(_params: &HashMap<String, Value>) -> BodyOutcome {
        BodyOutcome::Success(Value::Null)
    }

    #[test]
    fn register_and_lookup() {
        register_process_task("registry_test::echo", echo);
        assert!(lookup_process_task("registry_test::echo").is_some());
        assert!(lookup_process_task("registry_test::missing").is_none());
    }
}
