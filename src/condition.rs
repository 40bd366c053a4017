// src/condition.rs

//! The boolean predicate tree that gates whether a task should run.
//!
//! A [`Condition`] is a plain, `Clone`-able value (never a trait object), so
//! assigning one to a task's policy is a deep copy for free: the caller's
//! tree and the task's tree share no state, which is what the "condition
//! copy isolation" invariant requires. Leaves that depend on "the task this
//! condition is attached to" carry an `Option<TaskName>` subject slot filled
//! in lazily by [`Condition::bind_defaults`] at assignment time.

use std::time::SystemTime;

use crate::types::TaskName;

/// The read-only view into task history a condition leaf needs to evaluate.
/// Kept narrow and trait-object friendly so the condition substrate has no
/// dependency on the concrete `Session`/`Task` types.
pub trait ConditionHistory {
    /// The most recent action recorded for `task`, or `None` if it has never run.
    fn last_action(&self, task: &str) -> Option<crate::log::record::Action>;
    /// The most recent `run` start time recorded for `task`.
    fn last_run_start(&self, task: &str) -> Option<SystemTime>;
    /// The most recent time `task` reached `action`, if ever.
    fn last_time_reaching(&self, task: &str, action: crate::log::record::Action) -> Option<SystemTime>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    AlwaysTrue,
    AlwaysFalse,
    /// True iff `depend_task` most recently succeeded more recently than
    /// `task` (the subject) most recently started. `task` defaults to the
    /// task the condition is attached to; see [`Condition::bind_defaults`].
    DependSuccess {
        depend_task: TaskName,
        task: Option<TaskName>,
    },
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Not(Box<Condition>),
}

impl From<bool> for Condition {
    fn from(value: bool) -> Self {
        if value {
            Condition::AlwaysTrue
        } else {
            Condition::AlwaysFalse
        }
    }
}

impl Default for Condition {
    fn default() -> Self {
        Condition::AlwaysTrue
    }
}

impl Condition {
    pub fn depend_success(depend_task: impl Into<TaskName>) -> Self {
        Condition::DependSuccess {
            depend_task: depend_task.into(),
            task: None,
        }
    }

    pub fn and(self, other: Condition) -> Condition {
        match self {
            Condition::All(mut clauses) => {
                clauses.push(other);
                Condition::All(clauses)
            }
            lhs => Condition::All(vec![lhs, other]),
        }
    }

    pub fn or(self, other: Condition) -> Condition {
        match self {
            Condition::Any(mut clauses) => {
                clauses.push(other);
                Condition::Any(clauses)
            }
            lhs => Condition::Any(vec![lhs, other]),
        }
    }

    pub fn not(self) -> Condition {
        Condition::Not(Box::new(self))
    }

    /// Binds any unbound `DependSuccess` subject slot in this tree to `task`.
    /// Mirrors `set_statement_defaults`; called once when a condition is
    /// assigned to a task.
    pub fn bind_defaults(&mut self, task: &TaskName) {
        match self {
            Condition::DependSuccess { task: subject, .. } => {
                if subject.is_none() {
                    *subject = Some(task.clone());
                }
            }
            Condition::All(clauses) | Condition::Any(clauses) => {
                for clause in clauses {
                    clause.bind_defaults(task);
                }
            }
            Condition::Not(inner) => inner.bind_defaults(task),
            Condition::AlwaysTrue | Condition::AlwaysFalse => {}
        }
    }

    /// Evaluates this condition against `history`. Short-circuits on `All`/`Any`.
    pub fn evaluate(&self, history: &dyn ConditionHistory) -> bool {
        match self {
            Condition::AlwaysTrue => true,
            Condition::AlwaysFalse => false,
            Condition::DependSuccess { depend_task, task } => {
                let subject = match task {
                    Some(t) => t,
                    None => return false,
                };
                let succeeded_at =
                    history.last_time_reaching(depend_task, crate::log::record::Action::Success);
                let started_at = history.last_run_start(subject);
                match (succeeded_at, started_at) {
                    (Some(succeeded), Some(started)) => succeeded > started,
                    (Some(_), None) => true,
                    _ => false,
                }
            }
            Condition::All(clauses) => clauses.iter().all(|c| c.evaluate(history)),
            Condition::Any(clauses) => clauses.iter().any(|c| c.evaluate(history)),
            Condition::Not(inner) => !inner.evaluate(history),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::record::Action;
    use std::collections::HashMap;

    struct FakeHistory {
        last_action: HashMap<String, Action>,
        last_start: HashMap<String, SystemTime>,
        last_success: HashMap<String, SystemTime>,
    }

    impl ConditionHistory for FakeHistory {
        fn last_action(&self, task: &str) -> Option<Action> {
            self.last_action.get(task).copied()
        }
        fn last_run_start(&self, task: &str) -> Option<SystemTime> {
            self.last_start.get(task).copied()
        }
        fn last_time_reaching(&self, task: &str, action: Action) -> Option<SystemTime> {
            if action == Action::Success {
                self.last_success.get(task).copied()
            } else {
                None
            }
        }
    }

    #[test]
    fn always_true_and_false() {
        let history = FakeHistory {
            last_action: HashMap::new(),
            last_start: HashMap::new(),
            last_success: HashMap::new(),
        };
        assert!(Condition::AlwaysTrue.evaluate(&history));
        assert!(!Condition::AlwaysFalse.evaluate(&history));
    }

    #[test]
    fn depend_success_gates_on_recency() {
        let now = SystemTime::now();
        let earlier = now - std::time::Duration::from_secs(10);

        let mut history = FakeHistory {
            last_action: HashMap::new(),
            last_start: HashMap::new(),
            last_success: HashMap::new(),
        };
        history.last_success.insert("a".to_string(), earlier);
        history.last_start.insert("b".to_string(), now);

        let mut cond = Condition::depend_success("a");
        cond.bind_defaults(&"b".to_string());
        assert!(!cond.evaluate(&history), "a succeeded before b's last start");

        history.last_success.insert("a".to_string(), now + std::time::Duration::from_secs(1));
        assert!(cond.evaluate(&history), "a succeeded after b's last start");
    }

    #[test]
    fn copy_isolation() {
        let mut original = Condition::depend_success("a");
        let copy = original.clone();
        original.bind_defaults(&"mutated".to_string());

        match copy {
            Condition::DependSuccess { task, .. } => assert!(task.is_none()),
            _ => panic!("expected DependSuccess"),
        }
    }

    #[test]
    fn all_short_circuits() {
        let history = FakeHistory {
            last_action: HashMap::new(),
            last_start: HashMap::new(),
            last_success: HashMap::new(),
        };
        let cond = Condition::AlwaysTrue.and(Condition::AlwaysFalse);
        assert!(!cond.evaluate(&history));
        let cond = Condition::AlwaysFalse.or(Condition::AlwaysTrue);
        assert!(cond.evaluate(&history));
        let cond = Condition::AlwaysTrue.not();
        assert!(!cond.evaluate(&history));
    }
}
