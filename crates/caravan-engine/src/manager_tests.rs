use super::*;
use caravan_store::MemoryStateStore;
use serde_json::json;

fn steps() -> Vec<StepDefinition> {
    vec!["extract".into(), "transform".into(), "load".into()]
}

async fn created(manager: &WorkflowStateManager) -> String {
    manager
        .create_workflow("MIGRATION", json!({"projectKey": "QA"}), steps())
        .await
}

async fn running(manager: &WorkflowStateManager) -> String {
    let id = created(manager).await;
    manager.start_workflow(&id).await.unwrap();
    id
}

#[tokio::test]
async fn test_create_workflow_initial_snapshot() {
    let manager = WorkflowStateManager::in_memory();
    let id = created(&manager).await;

    let wf = manager.get_workflow(&id).await.unwrap();
    assert_eq!(wf.state, WorkflowState::Created);
    assert!(wf.current_step_index.is_idle());
    assert_eq!(wf.progress(), 0.0);
    assert!(wf.steps.iter().all(|s| s.status == StepStatus::Pending));
}

#[tokio::test]
async fn test_create_persists_to_store() {
    let store = Arc::new(MemoryStateStore::new());
    let manager = WorkflowStateManager::new(Some(store.clone()));
    let id = created(&manager).await;

    assert!(store.get_workflow(&id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_unknown_workflow_is_not_found() {
    let manager = WorkflowStateManager::in_memory();
    assert!(matches!(
        manager.start_workflow("missing").await,
        Err(EngineError::WorkflowNotFound(_))
    ));
    assert!(matches!(
        manager.pause_workflow("missing").await,
        Err(EngineError::WorkflowNotFound(_))
    ));
    assert!(matches!(
        manager.get_step("missing", "extract").await,
        Err(EngineError::WorkflowNotFound(_))
    ));
}

#[tokio::test]
async fn test_get_step_not_found() {
    let manager = WorkflowStateManager::in_memory();
    let id = created(&manager).await;

    let step = manager.get_step(&id, "transform").await.unwrap();
    assert_eq!(step.order, 2);
    assert!(matches!(
        manager.get_step(&id, "verify").await,
        Err(EngineError::StepNotFound { .. })
    ));
    assert_eq!(manager.step_index(&id, "load").await.unwrap(), 2);
}

#[tokio::test]
async fn test_start_sets_started_at_once() {
    let manager = WorkflowStateManager::in_memory();
    let id = created(&manager).await;

    let first = manager.start_workflow(&id).await.unwrap();
    assert_eq!(first.state, WorkflowState::Running);
    let started_at = first.started_at.unwrap();

    manager.pause_workflow(&id).await.unwrap();
    let resumed = manager.start_workflow(&id).await.unwrap();
    assert_eq!(resumed.started_at, Some(started_at));
    assert_eq!(resumed.metadata.retry_count, 0);

    // RUNNING -> RUNNING is idempotent.
    let again = manager.start_workflow(&id).await.unwrap();
    assert_eq!(again.state, WorkflowState::Running);
}

#[tokio::test]
async fn test_start_failed_workflow_counts_retry() {
    let manager = WorkflowStateManager::in_memory();
    let id = running(&manager).await;
    manager.fail_workflow(&id, "boom", None).await.unwrap();

    let restarted = manager.start_workflow(&id).await.unwrap();
    assert_eq!(restarted.state, WorkflowState::Running);
    assert_eq!(restarted.metadata.retry_count, 1);
    assert!(restarted.error.is_none());
}

#[tokio::test]
async fn test_start_completed_workflow_is_rejected() {
    let manager = WorkflowStateManager::in_memory();
    let id = running(&manager).await;
    for i in 0..3 {
        manager.start_step(&id, i).await.unwrap();
        manager.complete_step(&id, i, json!({"ok": true})).await.unwrap();
    }
    manager.complete_workflow(&id, json!({})).await.unwrap();

    let err = manager.start_workflow(&id).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState { .. }));
    assert_eq!(
        manager.get_workflow(&id).await.unwrap().state,
        WorkflowState::Completed
    );
}

#[tokio::test]
async fn test_pause_only_from_running() {
    let manager = WorkflowStateManager::in_memory();
    let id = created(&manager).await;

    let before = manager.get_workflow(&id).await.unwrap();
    let err = manager.pause_workflow(&id).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState { .. }));
    let after = manager.get_workflow(&id).await.unwrap();
    assert_eq!(after, before);

    manager.start_workflow(&id).await.unwrap();
    let paused = manager.pause_workflow(&id).await.unwrap();
    assert_eq!(paused.state, WorkflowState::Paused);
    assert_eq!(paused.metadata.pause_count, 1);

    assert!(manager.pause_workflow(&id).await.is_err());
}

#[tokio::test]
async fn test_pause_resets_running_step() {
    let manager = WorkflowStateManager::in_memory();
    let id = running(&manager).await;
    manager.start_step(&id, 0).await.unwrap();

    let paused = manager.pause_workflow(&id).await.unwrap();
    assert_eq!(paused.steps[0].status, StepStatus::Pending);
    assert!(paused.steps[0].start_time.is_none());
    assert!(paused.current_step_index.is_idle());
}

#[tokio::test]
async fn test_start_step_requires_running_workflow() {
    let manager = WorkflowStateManager::in_memory();
    let id = created(&manager).await;

    assert!(matches!(
        manager.start_step(&id, 0).await,
        Err(EngineError::InvalidState { .. })
    ));

    manager.start_workflow(&id).await.unwrap();
    assert!(matches!(
        manager.start_step(&id, 3).await,
        Err(EngineError::IndexOutOfRange { index: 3, len: 3 })
    ));

    let (wf, step) = manager.start_step(&id, 1).await.unwrap();
    assert_eq!(step.status, StepStatus::Running);
    assert!(step.start_time.is_some());
    assert_eq!(wf.current_step_index, ActiveStep::Running(1));
}

#[tokio::test]
async fn test_only_one_step_runs_at_a_time() {
    let manager = WorkflowStateManager::in_memory();
    let id = running(&manager).await;
    manager.start_step(&id, 0).await.unwrap();

    let err = manager.start_step(&id, 1).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState { .. }));
    let wf = manager.get_workflow(&id).await.unwrap();
    assert_eq!(wf.steps[1].status, StepStatus::Pending);
    assert_eq!(wf.current_step_index, ActiveStep::Running(0));
}

#[tokio::test]
async fn test_complete_step_only_when_running() {
    let manager = WorkflowStateManager::in_memory();
    let id = running(&manager).await;

    // PENDING
    let before = manager.get_workflow(&id).await.unwrap();
    assert!(matches!(
        manager.complete_step(&id, 0, json!({})).await,
        Err(EngineError::InvalidState { .. })
    ));
    assert_eq!(manager.get_workflow(&id).await.unwrap(), before);

    manager.start_step(&id, 0).await.unwrap();
    let (wf, step) = manager.complete_step(&id, 0, json!({"rows": 10})).await.unwrap();
    assert_eq!(step.status, StepStatus::Completed);
    assert_eq!(step.result, Some(json!({"rows": 10})));
    assert!(step.metadata.execution_time.is_some());
    assert!(wf.current_step_index.is_idle());

    // COMPLETED
    assert!(manager.complete_step(&id, 0, json!({})).await.is_err());

    // FAILED
    manager.start_step(&id, 1).await.unwrap();
    manager.fail_step(&id, 1, "bad", None).await.unwrap();
    assert!(manager.complete_step(&id, 1, json!({})).await.is_err());
}

#[tokio::test]
async fn test_fail_step_keeps_workflow_running() {
    let manager = WorkflowStateManager::in_memory();
    let id = running(&manager).await;
    manager.start_step(&id, 0).await.unwrap();

    let (wf, step) = manager
        .fail_step(&id, 0, "source unreachable", Some(json!({"code": 503})))
        .await
        .unwrap();
    assert_eq!(wf.state, WorkflowState::Running);
    assert!(wf.current_step_index.is_idle());
    assert_eq!(step.status, StepStatus::Failed);
    assert!(step.end_time.is_some());
    assert!(step.metadata.execution_time.is_some());
    let error = step.error.unwrap();
    assert_eq!(error.message, "source unreachable");
    assert_eq!(error.details, Some(json!({"code": 503})));
}

#[tokio::test]
async fn test_retry_step_only_on_failed() {
    let manager = WorkflowStateManager::in_memory();
    let id = running(&manager).await;

    assert!(matches!(
        manager.retry_step(&id, 0).await,
        Err(EngineError::InvalidState { .. })
    ));

    for expected in 1..=2 {
        manager.start_step(&id, 0).await.unwrap();
        manager.fail_step(&id, 0, "flaky", None).await.unwrap();
        let (_, step) = manager.retry_step(&id, 0).await.unwrap();
        assert_eq!(step.status, StepStatus::Pending);
        assert_eq!(step.metadata.retry_count, expected);
        assert!(step.error.is_none());
        assert!(step.start_time.is_none());
        assert!(step.end_time.is_none());
    }
}

#[tokio::test]
async fn test_retry_step_resurrects_failed_workflow() {
    let manager = WorkflowStateManager::in_memory();
    let id = running(&manager).await;
    manager.start_step(&id, 0).await.unwrap();
    let failed = manager.fail_workflow(&id, "gave up", None).await.unwrap();
    assert_eq!(failed.steps[0].status, StepStatus::Failed);
    assert_eq!(failed.steps[0].error.as_ref().unwrap().message, "gave up");
    assert!(failed.current_step_index.is_idle());

    let (wf, _) = manager.retry_step(&id, 0).await.unwrap();
    assert_eq!(wf.state, WorkflowState::Running);
    assert!(wf.error.is_none());
    // A step-level retry is not a workflow restart.
    assert_eq!(wf.metadata.retry_count, 0);
}

#[tokio::test]
async fn test_skip_step() {
    let manager = WorkflowStateManager::in_memory();
    let id = running(&manager).await;

    let (_, skipped) = manager.skip_step(&id, 2).await.unwrap();
    assert_eq!(skipped.status, StepStatus::Skipped);
    assert!(skipped.end_time.is_some());

    manager.start_step(&id, 0).await.unwrap();
    assert!(manager.skip_step(&id, 0).await.is_err());
    manager.fail_step(&id, 0, "bad", None).await.unwrap();
    assert!(manager.skip_step(&id, 0).await.is_ok());

    // SKIPPED is final for the step.
    assert!(manager.skip_step(&id, 2).await.is_err());
}

#[tokio::test]
async fn test_complete_workflow_requires_done_steps() {
    let manager = WorkflowStateManager::in_memory();
    let id = running(&manager).await;
    manager.start_step(&id, 0).await.unwrap();
    manager.complete_step(&id, 0, json!({})).await.unwrap();
    manager.skip_step(&id, 1).await.unwrap();

    assert!(matches!(
        manager.complete_workflow(&id, json!({})).await,
        Err(EngineError::InvalidState { .. })
    ));

    manager.skip_step(&id, 2).await.unwrap();
    let done = manager
        .complete_workflow(&id, json!({"ok": true}))
        .await
        .unwrap();
    assert_eq!(done.state, WorkflowState::Completed);
    assert_eq!(done.progress(), 100.0);
    assert!(done.completed_at.is_some());
    assert!(done.metadata.total_execution_time.is_some());
    assert!(done.error.is_none());
    assert_eq!(done.result, Some(json!({"ok": true})));
}

#[tokio::test]
async fn test_fail_workflow_requires_running() {
    let manager = WorkflowStateManager::in_memory();
    let id = created(&manager).await;
    assert!(manager.fail_workflow(&id, "nope", None).await.is_err());
}

#[tokio::test]
async fn test_updated_at_advances() {
    let manager = WorkflowStateManager::in_memory();
    let id = created(&manager).await;
    let before = manager.get_workflow(&id).await.unwrap().updated_at;

    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    let after = manager.start_workflow(&id).await.unwrap().updated_at;
    assert!(after > before);
}

#[tokio::test]
async fn test_stale_store_does_not_hide_local_write() {
    let store = Arc::new(MemoryStateStore::new());
    let manager = WorkflowStateManager::new(Some(store.clone()));
    let id = created(&manager).await;
    let stale = store.get_workflow(&id).await.unwrap().unwrap();

    manager.start_workflow(&id).await.unwrap();
    // Roll the store back to the older snapshot.
    store.save_workflow(&id, &stale).await.unwrap();

    let wf = manager.get_workflow(&id).await.unwrap();
    assert_eq!(wf.state, WorkflowState::Running);
}

#[tokio::test]
async fn test_store_only_workflow_hydrates_cache() {
    let store = Arc::new(MemoryStateStore::new());
    let id = {
        let writer = WorkflowStateManager::new(Some(store.clone()));
        created(&writer).await
    };

    let reader = WorkflowStateManager::new(Some(store.clone()));
    assert!(!reader.cache().contains(&id));
    let wf = reader.get_workflow(&id).await.unwrap();
    assert_eq!(wf.id, id);
    assert!(reader.cache().contains(&id));
}

#[tokio::test]
async fn test_list_without_store_uses_insertion_order() {
    let manager = WorkflowStateManager::in_memory();
    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(created(&manager).await);
    }
    manager.start_workflow(&ids[1]).await.unwrap();

    let first: Vec<_> = manager
        .list_workflows(None, 2, 0)
        .await
        .into_iter()
        .map(|s| s.id)
        .collect();
    let second: Vec<_> = manager
        .list_workflows(None, 2, 2)
        .await
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(first, ids[0..2].to_vec());
    assert_eq!(second, ids[2..4].to_vec());

    let running = manager
        .list_workflows(Some(WorkflowState::Running), 10, 0)
        .await;
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].id, ids[1]);
}
