use serde_json::Value;

use taskforge::{BodyOutcome, Condition};
use taskforge_test_utils::builders::test_session;

/// Task A with `start_cond = AlwaysTrue`; Task B with `start_cond = AlwaysTrue`
/// ANDed with `dependent = [A]` (set_dependent never implies a start
/// condition by itself — it only ANDs a `DependSuccess` clause onto whatever
/// start_cond already is, mirroring the original's plain `&=` composition).
#[tokio::test]
async fn dependency_gates_on_upstream_success() {
    let mut session = test_session();

    let a = session
        .register(
            taskforge::TaskBuilder::new("a")
                .body_fn(|_, _| BodyOutcome::Success(Value::Null))
                .start_cond(Condition::AlwaysTrue),
        )
        .unwrap();

    let b = session
        .register(
            taskforge::TaskBuilder::new("b")
                .body_fn(|_, _| BodyOutcome::Success(Value::Null))
                .start_cond(Condition::AlwaysTrue),
        )
        .unwrap();
    b.set_dependent(&["a".to_string()]);

    assert!(!b.should_run(&session), "b must not run before a has succeeded");

    a.dispatch().await.unwrap();
    assert!(b.should_run(&session), "b should run once a has succeeded");

    b.dispatch().await.unwrap();
    assert!(
        !b.should_run(&session),
        "b should not run again until a succeeds more recently than b's last run"
    );
}

#[tokio::test]
async fn status_of_reads_log_authoritative_mode() {
    let mut session = taskforge_test_utils::builders::test_session_with_config(
        taskforge::SessionConfig {
            force_status_from_logs: true,
            ..taskforge::SessionConfig::default()
        },
    );

    let task = session
        .register(
            taskforge::TaskBuilder::new("c")
                .body_fn(|_, _| BodyOutcome::Success(Value::Null)),
        )
        .unwrap();

    assert_eq!(session.status_of("c").await.unwrap(), None);
    task.dispatch().await.unwrap();
    assert_eq!(session.status_of("c").await.unwrap(), Some(taskforge::Action::Success));
}
