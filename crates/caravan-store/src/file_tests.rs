use super::*;
use caravan_protocols::StepDefinition;
use serde_json::json;
use tempfile::TempDir;

fn workflow() -> Workflow {
    Workflow::new(
        "MIGRATION",
        json!({"projectKey": "QA"}),
        [StepDefinition::new("extract"), StepDefinition::new("load")],
    )
}

#[tokio::test]
async fn test_file_store_save_and_get() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStateStore::new(temp_dir.path()).await.unwrap();
    let wf = workflow();

    store.save_workflow(&wf.id, &wf).await.unwrap();

    let loaded = store.get_workflow(&wf.id).await.unwrap().unwrap();
    assert_eq!(loaded, wf);
}

#[tokio::test]
async fn test_file_store_writes_wire_format() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStateStore::new(temp_dir.path()).await.unwrap();
    let wf = workflow();
    store.save_workflow(&wf.id, &wf).await.unwrap();

    let path = temp_dir
        .path()
        .join("workflows")
        .join(format!("{}.json", wf.id));
    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();

    assert_eq!(raw["type"], "MIGRATION");
    assert_eq!(raw["state"], "CREATED");
    assert!(raw["currentStepIndex"].is_null());
    assert_eq!(raw["steps"][1]["status"], "PENDING");
}

#[tokio::test]
async fn test_file_store_overwrite_leaves_no_temp_file() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStateStore::new(temp_dir.path()).await.unwrap();
    let mut wf = workflow();
    store.save_workflow(&wf.id, &wf).await.unwrap();

    wf.state = WorkflowState::Running;
    store.save_workflow(&wf.id, &wf).await.unwrap();

    let loaded = store.get_workflow(&wf.id).await.unwrap().unwrap();
    assert_eq!(loaded.state, WorkflowState::Running);

    let files: Vec<_> = std::fs::read_dir(temp_dir.path().join("workflows"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with(".json"));
}

#[tokio::test]
async fn test_file_store_get_nonexistent() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStateStore::new(temp_dir.path()).await.unwrap();
    assert!(store.get_workflow("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_file_store_corrupt_file_is_an_error_on_get() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStateStore::new(temp_dir.path()).await.unwrap();
    std::fs::write(temp_dir.path().join("workflows").join("bad.json"), "{oops").unwrap();

    let result = store.get_workflow("bad").await;
    assert!(matches!(result, Err(StoreError::Serialization(_))));

    // Listing skips it.
    let list = store.list_workflows(None, 10, 0).await.unwrap();
    assert!(list.is_empty());
}

#[tokio::test]
async fn test_file_store_list_is_ordered_and_paged() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStateStore::new(temp_dir.path()).await.unwrap();

    let mut ids = Vec::new();
    let base = chrono::Utc::now();
    for i in 0..5 {
        let mut wf = workflow();
        wf.created_at = base + chrono::Duration::seconds(i);
        store.save_workflow(&wf.id, &wf).await.unwrap();
        ids.push(wf.id);
    }

    let first = store.list_workflows(None, 2, 0).await.unwrap();
    let third = store.list_workflows(None, 2, 2).await.unwrap();
    let listed: Vec<_> = first.iter().chain(third.iter()).map(|s| s.id.clone()).collect();
    assert_eq!(listed, ids[..4].to_vec());
}

#[test]
fn test_sanitize_id() {
    assert_eq!(FileStateStore::sanitize_id("wf-123_a"), "wf-123_a");
    assert_eq!(FileStateStore::sanitize_id("../etc/passwd"), "___etc_passwd");
}
