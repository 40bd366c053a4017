use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Mutex;

use crate::errors::Result;
use crate::log::record::{Action, LogRecord};

/// Storage for task log records. The core ships one concrete implementation
/// ([`MemoryLogSink`]); file/SQL sinks are an external concern, mirroring how
/// the condition parser and concrete file-watch sinks are external to this
/// crate's other components.
///
/// Must be `Send + Sync`: workers (threads directly, processes via the
/// bridge) all append into the same sink concurrently.
pub trait LogSink: Send + Sync + Debug {
    fn append(&self, record: LogRecord) -> Result<()>;
    fn latest(&self, task: &str) -> Result<Option<LogRecord>>;
    fn history(&self, task: &str) -> Result<Vec<LogRecord>>;
    fn latest_matching(&self, task: &str, action: Action) -> Result<Option<LogRecord>>;
}

/// An in-memory, append-only sink keyed by task name. Mirrors the teacher
/// crate's `MockFileSystem`: an `Arc<Mutex<HashMap<..>>>` guarding plain
/// in-memory state, used both as the default sink and in tests.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    records: Mutex<HashMap<String, Vec<LogRecord>>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogSink for MemoryLogSink {
    fn append(&self, record: LogRecord) -> Result<()> {
        let mut guard = self.records.lock().unwrap();
        guard.entry(record.task_name.clone()).or_default().push(record);
        Ok(())
    }

    fn latest(&self, task: &str) -> Result<Option<LogRecord>> {
        let guard = self.records.lock().unwrap();
        Ok(guard.get(task).and_then(|records| records.last().cloned()))
    }

    fn history(&self, task: &str) -> Result<Vec<LogRecord>> {
        let guard = self.records.lock().unwrap();
        Ok(guard.get(task).cloned().unwrap_or_default())
    }

    fn latest_matching(&self, task: &str, action: Action) -> Result<Option<LogRecord>> {
        let guard = self.records.lock().unwrap();
        Ok(guard
            .get(task)
            .and_then(|records| records.iter().rev().find(|r| r.action == action).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn record(task: &str, action: Action) -> LogRecord {
        LogRecord {
            task_name: task.to_string(),
            action,
            start: Some(SystemTime::now()),
            end: None,
            runtime: None,
            message: String::new(),
        }
    }

    #[test]
    fn append_and_query() {
        let sink = MemoryLogSink::new();
        sink.append(record("a", Action::Run)).unwrap();
        sink.append(record("a", Action::Success)).unwrap();

        let latest = sink.latest("a").unwrap().unwrap();
        assert_eq!(latest.action, Action::Success);
        assert_eq!(sink.history("a").unwrap().len(), 2);
        assert!(sink.history("missing").unwrap().is_empty());
    }

    #[test]
    fn latest_matching_finds_most_recent() {
        let sink = MemoryLogSink::new();
        sink.append(record("a", Action::Run)).unwrap();
        sink.append(record("a", Action::Fail)).unwrap();
        sink.append(record("a", Action::Run)).unwrap();
        sink.append(record("a", Action::Success)).unwrap();

        let latest_fail = sink.latest_matching("a", Action::Fail).unwrap().unwrap();
        assert_eq!(latest_fail.action, Action::Fail);
    }
}
