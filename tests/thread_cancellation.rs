use std::sync::Arc;
use std::time::Duration;

use taskforge::task::DispatchOutcome;
use taskforge::{Action, ExecutionMode, LogSink, MemoryLogSink, Task, TaskBuilder};
use taskforge_test_utils::controllable::ControllableBodies;
use taskforge_test_utils::init_tracing;

async fn wait_for_status(task: &Arc<Task>, want: Action, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if task.status_memory().await == Some(want) {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn thread_task_is_cooperatively_cancellable() {
    init_tracing();

    let sink: Arc<dyn LogSink> = Arc::new(MemoryLogSink::new());
    let bodies = ControllableBodies::new();

    let task = TaskBuilder::new("thread-cancel")
        .execution(ExecutionMode::Thread)
        .body_fn(bodies.body("thread-cancel"))
        .build(sink);

    let outcome = task.dispatch().await.unwrap();
    assert!(matches!(outcome, DispatchOutcome::Started));
    assert!(task.is_running().await);

    task.terminate().await;

    assert!(
        wait_for_status(&task, Action::Terminate, Duration::from_secs(2)).await,
        "task did not reach terminated status in time"
    );
    assert!(!task.is_alive().await);
}

#[tokio::test]
async fn thread_task_completes_normally_when_released() {
    let sink: Arc<dyn LogSink> = Arc::new(MemoryLogSink::new());
    let bodies = ControllableBodies::new();

    let task = TaskBuilder::new("thread-ok")
        .execution(ExecutionMode::Thread)
        .body_fn(bodies.body("thread-ok"))
        .build(sink);

    task.dispatch().await.unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !bodies.started().contains(&"thread-ok".to_string()) {
        assert!(tokio::time::Instant::now() < deadline, "body never started");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    bodies.release("thread-ok");

    assert!(
        wait_for_status(&task, Action::Success, Duration::from_secs(2)).await,
        "task did not reach success status in time"
    );
}
