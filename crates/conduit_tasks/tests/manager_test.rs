//! Integration tests for the task manager's lifecycle, cancellation, and
//! pagination behavior.

use std::time::Duration;

use conduit_tasks::{TaskManager, TaskStatus};
use serde_json::json;

#[tokio::test]
async fn create_starts_in_working_with_a_hex_id() {
    let manager = TaskManager::new();
    let task = manager.create(None).await;
    assert_eq!(task.status, TaskStatus::Working);
    assert!(task.task_id.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(task.task_id.len(), 32);
}

#[tokio::test]
async fn update_to_completed_sets_result_and_is_absorbing() {
    let manager = TaskManager::new();
    let task = manager.create(None).await;

    let updated = manager
        .update(&task.task_id, TaskStatus::Completed, Some(json!({"ok": true})), None)
        .await
        .expect("working -> completed is valid");
    assert_eq!(updated.status, TaskStatus::Completed);
    assert_eq!(updated.result, Some(json!({"ok": true})));

    let rejected = manager
        .update(&task.task_id, TaskStatus::Working, None, None)
        .await;
    assert!(rejected.is_err(), "terminal states must be absorbing");
}

#[tokio::test]
async fn result_and_error_are_mutually_exclusive() {
    let manager = TaskManager::new();
    let task = manager.create(None).await;

    let rejected = manager
        .update(
            &task.task_id,
            TaskStatus::Failed,
            Some(json!("partial")),
            Some("boom".to_string()),
        )
        .await;
    assert!(rejected.is_err());
}

#[tokio::test]
async fn input_required_round_trips_back_to_working() {
    let manager = TaskManager::new();
    let task = manager.create(None).await;

    manager
        .update(&task.task_id, TaskStatus::InputRequired, None, None)
        .await
        .expect("working -> input_required is valid");
    let resumed = manager
        .update(&task.task_id, TaskStatus::Working, None, None)
        .await
        .expect("input_required -> working is valid");
    assert_eq!(resumed.status, TaskStatus::Working);
}

#[tokio::test]
async fn await_result_unblocks_on_terminal_transition() {
    let manager = TaskManager::new();
    let task = manager.create(None).await;

    let waiter = {
        let manager = manager.clone();
        let task_id = task.task_id.clone();
        tokio::spawn(async move { manager.await_result(&task_id, Duration::from_secs(5)).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    manager
        .update(&task.task_id, TaskStatus::Completed, Some(json!(42)), None)
        .await
        .unwrap();

    let snapshot = waiter.await.unwrap().expect("await_result should succeed");
    assert_eq!(snapshot.status, TaskStatus::Completed);
}

#[tokio::test]
async fn await_result_returns_current_snapshot_on_deadline() {
    let manager = TaskManager::new();
    let task = manager.create(None).await;

    let snapshot = manager
        .await_result(&task.task_id, Duration::from_millis(10))
        .await
        .expect("deadline elapses without error");
    assert_eq!(snapshot.status, TaskStatus::Working);
}

#[tokio::test]
async fn cancel_flips_the_task_cancellation_token() {
    let manager = TaskManager::new();
    let task = manager.create(None).await;
    manager.cancel(&task.task_id).await.unwrap();

    let snapshot = manager.get(&task.task_id).await.unwrap();
    assert!(snapshot.cancellation.is_cancelled());
}

#[tokio::test]
async fn list_paginates_in_created_then_id_order() {
    let manager = TaskManager::new();
    for _ in 0..5 {
        manager.create(None).await;
    }

    let first_page = manager.list(None, 2).await;
    assert_eq!(first_page.tasks.len(), 2);
    let cursor = first_page.next_cursor.expect("more pages remain");

    let second_page = manager.list(Some(&cursor), 2).await;
    assert_eq!(second_page.tasks.len(), 2);
    assert_ne!(first_page.tasks[0].task_id, second_page.tasks[0].task_id);

    let third_page = manager.list(Some(&second_page.next_cursor.unwrap()), 2).await;
    assert_eq!(third_page.tasks.len(), 1);
    assert!(third_page.next_cursor.is_none());
}

#[tokio::test]
async fn sweep_expired_reclaims_only_terminal_records_past_ttl() {
    let manager = TaskManager::new();
    let short_lived = manager.create(Some(0)).await;
    let still_working = manager.create(None).await;

    manager
        .update(&short_lived.task_id, TaskStatus::Completed, Some(json!(1)), None)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1100)).await;
    manager.sweep_expired().await;

    assert!(manager.get(&short_lived.task_id).await.is_err());
    assert!(manager.get(&still_working.task_id).await.is_ok());
}
