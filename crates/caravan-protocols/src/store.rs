//! State store protocol definitions.
//!
//! A state store persists the last known snapshot of each workflow. The
//! engine treats it as best-effort: failures are logged and absorbed because
//! the in-process cache stays authoritative.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{Workflow, WorkflowState, WorkflowSummary};

/// Durable key-value persistence for workflow snapshots.
///
/// Implementations must honor last-write-wins per workflow id. No ordering
/// is promised across ids.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Returns the store ID.
    fn id(&self) -> &str;

    /// Load a snapshot. `Ok(None)` when the id is unknown.
    async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>, StoreError>;

    /// Replace the snapshot stored under `id`.
    async fn save_workflow(&self, id: &str, workflow: &Workflow) -> Result<(), StoreError>;

    /// List summaries, optionally filtered by state.
    ///
    /// The store owns the ordering; it must be stable across calls so that
    /// `offset` pages are disjoint.
    async fn list_workflows(
        &self,
        state: Option<WorkflowState>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<WorkflowSummary>, StoreError>;
}
