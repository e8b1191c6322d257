//! In-memory state store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use caravan_protocols::{StateStore, StoreError, Workflow, WorkflowState, WorkflowSummary};

use crate::paginate;

#[derive(Default)]
struct Inner {
    order: Vec<String>,
    workflows: HashMap<String, Workflow>,
}

/// Process-local store, mainly for tests and embedding.
///
/// Listing follows first-insertion order; overwriting a workflow keeps its
/// position.
pub struct MemoryStateStore {
    inner: RwLock<Inner>,
}

impl MemoryStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Number of stored workflows.
    pub async fn len(&self) -> usize {
        self.inner.read().await.workflows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    fn id(&self) -> &str {
        "memory"
    }

    async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.workflows.get(id).cloned())
    }

    async fn save_workflow(&self, id: &str, workflow: &Workflow) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner
            .workflows
            .insert(id.to_string(), workflow.clone())
            .is_none()
        {
            inner.order.push(id.to_string());
        }
        Ok(())
    }

    async fn list_workflows(
        &self,
        state: Option<WorkflowState>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<WorkflowSummary>, StoreError> {
        let inner = self.inner.read().await;
        let summaries = inner
            .order
            .iter()
            .filter_map(|id| inner.workflows.get(id))
            .map(Workflow::summary);
        Ok(paginate(summaries, state, limit, offset))
    }
}
