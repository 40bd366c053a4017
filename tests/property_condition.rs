use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use proptest::prelude::*;

use taskforge::log::record::Action;
use taskforge::{Condition, ConditionHistory};

/// A fixed, tiny history so the strategy below only has to generate
/// condition shapes, not task state.
struct FixedHistory {
    succeeded: HashMap<String, SystemTime>,
    started: HashMap<String, SystemTime>,
}

impl ConditionHistory for FixedHistory {
    fn last_action(&self, _task: &str) -> Option<Action> {
        None
    }
    fn last_run_start(&self, task: &str) -> Option<SystemTime> {
        self.started.get(task).copied()
    }
    fn last_time_reaching(&self, task: &str, action: Action) -> Option<SystemTime> {
        if action == Action::Success {
            self.succeeded.get(task).copied()
        } else {
            None
        }
    }
}

fn leaf_strategy() -> impl Strategy<Value = Condition> {
    prop_oneof![
        Just(Condition::AlwaysTrue),
        Just(Condition::AlwaysFalse),
        Just(Condition::depend_success("a")),
        Just(Condition::depend_success("b")),
    ]
}

fn condition_tree(depth: u32) -> impl Strategy<Value = Condition> {
    leaf_strategy().prop_recursive(depth, 16, 3, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 1..3).prop_map(Condition::All),
            proptest::collection::vec(inner.clone(), 1..3).prop_map(Condition::Any),
            inner.prop_map(|c| c.not()),
        ]
    })
}

/// A plain recursive evaluator mirroring `Condition::evaluate`, used only to
/// cross-check that `bind_defaults` + `evaluate` compose the way the tree
/// shape implies, independent of the `Condition` implementation itself.
fn reference_eval(cond: &Condition, history: &FixedHistory, subject: &str) -> bool {
    match cond {
        Condition::AlwaysTrue => true,
        Condition::AlwaysFalse => false,
        Condition::DependSuccess { depend_task, task } => {
            let subject = task.as_deref().unwrap_or(subject);
            match (
                history.succeeded.get(depend_task),
                history.started.get(subject),
            ) {
                (Some(succeeded), Some(started)) => succeeded > started,
                (Some(_), None) => true,
                _ => false,
            }
        }
        Condition::All(clauses) => clauses.iter().all(|c| reference_eval(c, history, subject)),
        Condition::Any(clauses) => clauses.iter().any(|c| reference_eval(c, history, subject)),
        Condition::Not(inner) => !reference_eval(inner, history, subject),
    }
}

proptest! {
    #[test]
    fn evaluate_matches_reference_tree_walk(mut cond in condition_tree(4)) {
        let now = SystemTime::now();
        let mut history = FixedHistory {
            succeeded: HashMap::new(),
            started: HashMap::new(),
        };
        history.succeeded.insert("a".to_string(), now - Duration::from_secs(5));
        history.started.insert("subject".to_string(), now - Duration::from_secs(10));

        cond.bind_defaults(&"subject".to_string());
        let expected = reference_eval(&cond, &history, "subject");
        prop_assert_eq!(cond.evaluate(&history), expected);
    }

    #[test]
    fn clone_after_bind_defaults_does_not_mutate_the_original(mut cond in condition_tree(3)) {
        let before = cond.clone();
        cond.bind_defaults(&"mutated".to_string());
        // Clauses that never reference an unbound DependSuccess leaf are
        // unaffected either way; this only asserts the clone taken *before*
        // binding never observes the later mutation.
        let snapshot = before.clone();
        cond.bind_defaults(&"mutated-again".to_string());
        prop_assert_eq!(before, snapshot);
    }
}
