//! File system state store.
//!
//! Each workflow is one pretty-printed JSON document:
//! ```text
//! {storage_path}/
//! └── workflows/
//!     ├── {workflow_id}.json
//!     └── ...
//! ```
//! Writes go to a temporary sibling first and are renamed into place, so a
//! reader never observes a half-written snapshot.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use caravan_protocols::{StateStore, StoreError, Workflow, WorkflowState, WorkflowSummary};

use crate::paginate;

/// JSON-file backed store.
pub struct FileStateStore {
    storage_path: PathBuf,
}

impl FileStateStore {
    /// Open (and create if needed) a store rooted at `storage_path`.
    pub async fn new(storage_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let storage_path = storage_path.into();
        fs::create_dir_all(storage_path.join("workflows")).await?;
        debug!("FileStateStore initialized at {:?}", storage_path);
        Ok(Self { storage_path })
    }

    /// Root directory of the store.
    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    fn workflows_dir(&self) -> PathBuf {
        self.storage_path.join("workflows")
    }

    fn workflow_path(&self, id: &str) -> PathBuf {
        self.workflows_dir()
            .join(format!("{}.json", Self::sanitize_id(id)))
    }

    /// Make an id safe to use as a file name.
    fn sanitize_id(id: &str) -> String {
        id.chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    async fn read_workflow(path: &Path) -> Result<Workflow, StoreError> {
        let content = fs::read_to_string(path).await?;
        serde_json::from_str(&content).map_err(|e| {
            StoreError::Serialization(format!("Failed to deserialize {:?}: {}", path, e))
        })
    }

    /// Read every readable snapshot; unreadable files are logged and skipped.
    async fn read_all(&self) -> Result<Vec<Workflow>, StoreError> {
        let dir = self.workflows_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut workflows = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match Self::read_workflow(&path).await {
                Ok(workflow) => workflows.push(workflow),
                Err(e) => warn!("Skipping unreadable workflow file {:?}: {}", path, e),
            }
        }
        Ok(workflows)
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    fn id(&self) -> &str {
        "file"
    }

    async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>, StoreError> {
        let path = self.workflow_path(id);
        if !path.exists() {
            return Ok(None);
        }
        Self::read_workflow(&path).await.map(Some)
    }

    async fn save_workflow(&self, id: &str, workflow: &Workflow) -> Result<(), StoreError> {
        let path = self.workflow_path(id);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(workflow)?;

        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;

        debug!(
            workflow_id = %id,
            state = %workflow.state,
            "Saved workflow snapshot to {:?}",
            path
        );
        Ok(())
    }

    async fn list_workflows(
        &self,
        state: Option<WorkflowState>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<WorkflowSummary>, StoreError> {
        let mut workflows = self.read_all().await?;
        workflows.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(paginate(
            workflows.iter().map(Workflow::summary),
            state,
            limit,
            offset,
        ))
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
