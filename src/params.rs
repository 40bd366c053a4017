// src/params.rs

//! Task parameters. A parameter value is either already materialised JSON,
//! or a lazy factory evaluated inside the execution environment the body
//! actually runs in (never by the dispatcher) — see SPEC_FULL.md §3.1 and
//! §4.3 "Parameter materialisation".

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

/// A single parameter value.
#[derive(Clone)]
pub enum ParamValue {
    Value(Value),
    /// Evaluated in-process; only usable with `main`/`thread` execution,
    /// since the closure cannot cross a process boundary.
    Lazy(Arc<dyn Fn() -> Value + Send + Sync>),
    /// A factory registered by name in [`crate::exec::registry::ProcessTaskRegistry`],
    /// re-invoked inside a worker process after it starts.
    LazyNamed(String),
}

impl std::fmt::Debug for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Value(v) => f.debug_tuple("Value").field(v).finish(),
            ParamValue::Lazy(_) => f.write_str("Lazy(..)"),
            ParamValue::LazyNamed(name) => f.debug_tuple("LazyNamed").field(name).finish(),
        }
    }
}

impl From<Value> for ParamValue {
    fn from(value: Value) -> Self {
        ParamValue::Value(value)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Parameters(HashMap<String, ParamValue>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Materialises every value, evaluating `Lazy` factories now. `LazyNamed`
    /// entries are left unresolved — only the worker-process entry point
    /// knows how to look a named factory up in the registry.
    pub fn materialize_local(&self) -> HashMap<String, Value> {
        self.0
            .iter()
            .filter_map(|(name, value)| match value {
                ParamValue::Value(v) => Some((name.clone(), v.clone())),
                ParamValue::Lazy(factory) => Some((name.clone(), factory())),
                ParamValue::LazyNamed(_) => None,
            })
            .collect()
    }

    /// Materialises every value, resolving `LazyNamed` entries through the
    /// process-task registry. Used uniformly by all three back-ends so a
    /// body sees the same parameter shape regardless of where it runs.
    pub fn materialize_full(&self) -> crate::errors::Result<HashMap<String, Value>> {
        let mut out = self.materialize_local();
        for (name, value) in self.named_lazy_keys() {
            let factory = crate::exec::registry::lookup_lazy_param(value).ok_or_else(|| {
                crate::errors::TaskForgeError::ProcessBodyNotRegistered(value.to_string())
            })?;
            out.insert(name.to_string(), factory());
        }
        Ok(out)
    }

    /// True if any parameter requires process-side resolution by name.
    pub fn has_named_lazy(&self) -> bool {
        self.0.values().any(|v| matches!(v, ParamValue::LazyNamed(_)))
    }

    /// True if any parameter is an in-process closure, which a `process`-mode
    /// dispatch cannot carry: `materialize_local` would have to evaluate it
    /// in the dispatcher, not the worker, defeating the point of deferring
    /// it. Such a task must use `LazyNamed` instead.
    pub fn has_raw_lazy(&self) -> bool {
        self.0.values().any(|v| matches!(v, ParamValue::Lazy(_)))
    }

    pub fn named_lazy_keys(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().filter_map(|(k, v)| match v {
            ParamValue::LazyNamed(name) => Some((k.as_str(), name.as_str())),
            _ => None,
        })
    }

    pub fn plain_values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().filter_map(|(k, v)| match v {
            ParamValue::Value(value) => Some((k.as_str(), value)),
            _ => None,
        })
    }
}
