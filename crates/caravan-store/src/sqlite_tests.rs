use super::*;
use caravan_protocols::{ActiveStep, StepDefinition, StepStatus};
use serde_json::json;
use tempfile::TempDir;

fn workflow() -> Workflow {
    Workflow::new(
        "MIGRATION",
        json!({"migrationId": "m-1"}),
        [StepDefinition::new("extract"), StepDefinition::new("load")],
    )
}

#[tokio::test]
async fn test_sqlite_save_and_get() {
    let store = SqliteStateStore::in_memory().await.unwrap();
    let wf = workflow();

    store.save_workflow(&wf.id, &wf).await.unwrap();

    let loaded = store.get_workflow(&wf.id).await.unwrap().unwrap();
    assert_eq!(loaded, wf);
}

#[tokio::test]
async fn test_sqlite_get_missing() {
    let store = SqliteStateStore::in_memory().await.unwrap();
    assert!(store.get_workflow("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_sqlite_upsert_last_write_wins() {
    let store = SqliteStateStore::in_memory().await.unwrap();
    let mut wf = workflow();
    store.save_workflow(&wf.id, &wf).await.unwrap();

    wf.state = WorkflowState::Running;
    wf.steps[0].status = StepStatus::Running;
    wf.current_step_index = ActiveStep::Running(0);
    store.save_workflow(&wf.id, &wf).await.unwrap();

    let loaded = store.get_workflow(&wf.id).await.unwrap().unwrap();
    assert_eq!(loaded.state, WorkflowState::Running);
    assert_eq!(loaded.current_step_index, ActiveStep::Running(0));

    let all = store.list_workflows(None, 10, 0).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn test_sqlite_list_filter_and_pagination() {
    let store = SqliteStateStore::in_memory().await.unwrap();
    let base = chrono::Utc::now();
    let mut ids = Vec::new();
    for i in 0..5 {
        let mut wf = workflow();
        wf.created_at = base + chrono::Duration::milliseconds(i * 10);
        if i >= 3 {
            wf.state = WorkflowState::Paused;
        }
        store.save_workflow(&wf.id, &wf).await.unwrap();
        ids.push(wf.id);
    }

    let page0: Vec<_> = store
        .list_workflows(None, 2, 0)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    let page1: Vec<_> = store
        .list_workflows(None, 2, 2)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(page0, ids[0..2].to_vec());
    assert_eq!(page1, ids[2..4].to_vec());

    let paused = store
        .list_workflows(Some(WorkflowState::Paused), 10, 0)
        .await
        .unwrap();
    assert_eq!(paused.len(), 2);
    assert!(paused.iter().all(|s| s.state == WorkflowState::Paused));
}

#[tokio::test]
async fn test_sqlite_persists_across_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("state.db");
    let wf = workflow();

    {
        let store = SqliteStateStore::open(&path).await.unwrap();
        store.save_workflow(&wf.id, &wf).await.unwrap();
    }

    let store = SqliteStateStore::open(&path).await.unwrap();
    let loaded = store.get_workflow(&wf.id).await.unwrap().unwrap();
    assert_eq!(loaded.id, wf.id);
    assert_eq!(loaded.data["migrationId"], "m-1");
}
