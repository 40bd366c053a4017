use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::types::TaskName;

/// The closed set of transitions a task can be logged as reaching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Run,
    Success,
    Fail,
    Terminate,
    Inaction,
    /// Emitted only by the scheduler when a worker disappears without
    /// producing a terminal record of its own.
    CrashRelease,
}

/// One state transition of one task, as recorded by a [`crate::adapter::TaskAdapter`].
///
/// Carries the same six fields across the worker-process bridge (§4.4 of the
/// design): `task_name`, `action`, `start`, `end`, `runtime`, `message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub task_name: TaskName,
    pub action: Action,
    #[serde(with = "opt_systemtime")]
    pub start: Option<SystemTime>,
    #[serde(with = "opt_systemtime")]
    pub end: Option<SystemTime>,
    pub runtime: Option<Duration>,
    pub message: String,
}

impl LogRecord {
    pub fn to_json_line(&self) -> crate::errors::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json_line(line: &str) -> crate::errors::Result<Self> {
        serde_json::from_str(line)
            .map_err(|e| crate::errors::TaskForgeError::InvalidRecord(e.to_string()))
    }
}

/// Serializes `Option<SystemTime>` as nanoseconds since the Unix epoch, so
/// records survive the JSON-lines bridge without pulling in a date/time crate.
mod opt_systemtime {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<SystemTime>, s: S) -> Result<S::Ok, S::Error> {
        let nanos = value.map(|t| {
            t.duration_since(UNIX_EPOCH)
                .unwrap_or(Duration::ZERO)
                .as_nanos()
        });
        nanos.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<SystemTime>, D::Error> {
        let nanos: Option<u128> = Option::deserialize(d)?;
        Ok(nanos.map(|n| UNIX_EPOCH + Duration::from_nanos(n as u64)))
    }
}
