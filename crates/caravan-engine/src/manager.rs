//! Workflow state manager.
//!
//! Every mutation follows the same sequence under the workflow's lock:
//! load the freshest snapshot, apply the transition to that copy, refresh
//! `updatedAt`, write the cache, then write the store. A rejected transition
//! therefore changes nothing. Store failures are logged and absorbed because
//! the cache stays authoritative for the lifetime of the process.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use caravan_protocols::{
    ActiveStep, EngineError, ErrorInfo, StateStore, Step, StepDefinition, StepStatus, Workflow,
    WorkflowState, WorkflowSummary,
};

use crate::cache::WorkflowCache;

#[path = "manager_steps.rs"]
mod steps;

/// Sole authority for workflow and step transitions.
pub struct WorkflowStateManager {
    store: Option<Arc<dyn StateStore>>,
    cache: Arc<WorkflowCache>,
}

impl WorkflowStateManager {
    /// Manager over an optional external store with a private cache.
    pub fn new(store: Option<Arc<dyn StateStore>>) -> Self {
        Self::with_cache(store, Arc::new(WorkflowCache::new()))
    }

    /// Manager with no external store.
    pub fn in_memory() -> Self {
        Self::new(None)
    }

    /// Manager sharing an existing cache.
    pub fn with_cache(store: Option<Arc<dyn StateStore>>, cache: Arc<WorkflowCache>) -> Self {
        Self { store, cache }
    }

    pub fn cache(&self) -> &Arc<WorkflowCache> {
        &self.cache
    }

    pub fn store(&self) -> Option<&Arc<dyn StateStore>> {
        self.store.as_ref()
    }

    /// Create a workflow in CREATED state and return its id.
    pub async fn create_workflow(
        &self,
        workflow_type: impl Into<String>,
        data: Value,
        steps: impl IntoIterator<Item = StepDefinition>,
    ) -> String {
        let workflow = Workflow::new(workflow_type, data, steps);
        let id = workflow.id.clone();

        let _guard = self.cache.lock(&id).await;
        self.persist(&workflow).await;

        info!(
            workflow_id = %id,
            workflow_type = %workflow.workflow_type,
            steps = workflow.steps.len(),
            "Workflow created"
        );
        id
    }

    /// Move the workflow to RUNNING.
    ///
    /// Restarting a FAILED workflow counts a workflow-level retry and clears
    /// its error. `startedAt` is only set on the first start.
    pub async fn start_workflow(&self, id: &str) -> Result<Workflow, EngineError> {
        let (workflow, ()) = self
            .mutate(id, |wf| {
                if !wf.state.can_transition_to(WorkflowState::Running) {
                    return Err(EngineError::invalid_state("start workflow", wf.state));
                }
                if wf.state == WorkflowState::Failed {
                    wf.metadata.retry_count += 1;
                    wf.error = None;
                }
                if wf.started_at.is_none() {
                    wf.started_at = Some(Utc::now());
                }
                wf.state = WorkflowState::Running;
                Ok(())
            })
            .await?;

        info!(
            workflow_id = %id,
            retry_count = workflow.metadata.retry_count,
            "Workflow started"
        );
        Ok(workflow)
    }

    /// Pause a RUNNING workflow. A RUNNING step goes back to PENDING.
    pub async fn pause_workflow(&self, id: &str) -> Result<Workflow, EngineError> {
        let (workflow, interrupted) = self
            .mutate(id, |wf| {
                if wf.state != WorkflowState::Running {
                    return Err(EngineError::invalid_state("pause workflow", wf.state));
                }
                wf.state = WorkflowState::Paused;
                wf.metadata.pause_count += 1;

                let mut interrupted = None;
                for step in wf.steps.iter_mut() {
                    if step.status == StepStatus::Running {
                        step.status = StepStatus::Pending;
                        step.start_time = None;
                        interrupted = Some(step.id.clone());
                    }
                }
                wf.current_step_index = ActiveStep::Idle;
                Ok(interrupted)
            })
            .await?;

        info!(
            workflow_id = %id,
            interrupted_step = ?interrupted,
            pause_count = workflow.metadata.pause_count,
            "Workflow paused"
        );
        Ok(workflow)
    }

    /// Finish a RUNNING workflow whose steps are all COMPLETED or SKIPPED.
    pub async fn complete_workflow(&self, id: &str, result: Value) -> Result<Workflow, EngineError> {
        let (workflow, ()) = self
            .mutate(id, |wf| {
                if wf.state != WorkflowState::Running {
                    return Err(EngineError::invalid_state("complete workflow", wf.state));
                }
                if !wf.all_steps_done() {
                    return Err(EngineError::invalid_state(
                        format!(
                            "complete workflow with {} of {} steps done",
                            wf.done_step_count(),
                            wf.steps.len()
                        ),
                        wf.state,
                    ));
                }
                wf.state = WorkflowState::Completed;
                wf.completed_at = Some(Utc::now());
                wf.result = Some(result);
                wf.error = None;
                wf.current_step_index = ActiveStep::Idle;
                wf.metadata.total_execution_time = wf.elapsed_secs();
                Ok(())
            })
            .await?;

        info!(
            workflow_id = %id,
            total_execution_time = ?workflow.metadata.total_execution_time,
            "Workflow completed"
        );
        Ok(workflow)
    }

    /// Fail a RUNNING workflow. A RUNNING step fails with the same error.
    pub async fn fail_workflow(
        &self,
        id: &str,
        message: impl Into<String>,
        details: Option<Value>,
    ) -> Result<Workflow, EngineError> {
        let error = ErrorInfo::new(message, details);
        let (workflow, ()) = self
            .mutate(id, |wf| {
                if wf.state != WorkflowState::Running {
                    return Err(EngineError::invalid_state("fail workflow", wf.state));
                }
                if let Some(index) = wf.current_step_index.index() {
                    if let Some(step) = wf.steps.get_mut(index) {
                        if step.status == StepStatus::Running {
                            let now = Utc::now();
                            step.status = StepStatus::Failed;
                            step.error = Some(error.clone());
                            step.end_time = Some(now);
                            step.metadata.execution_time = step.elapsed_secs();
                        }
                    }
                }
                wf.current_step_index = ActiveStep::Idle;
                wf.state = WorkflowState::Failed;
                wf.result = None;
                wf.error = Some(error);
                Ok(())
            })
            .await?;

        warn!(
            workflow_id = %id,
            error = workflow.error.as_ref().map(|e| e.message.as_str()).unwrap_or_default(),
            "Workflow failed"
        );
        Ok(workflow)
    }

    /// Freshest known snapshot of a workflow.
    pub async fn get_workflow(&self, id: &str) -> Result<Workflow, EngineError> {
        self.load(id).await
    }

    /// One step of a workflow, by step id.
    pub async fn get_step(&self, id: &str, step_id: &str) -> Result<Step, EngineError> {
        let workflow = self.load(id).await?;
        workflow
            .steps
            .into_iter()
            .find(|s| s.id == step_id)
            .ok_or_else(|| EngineError::StepNotFound {
                workflow_id: id.to_string(),
                step_id: step_id.to_string(),
            })
    }

    /// Position of a step, by step id.
    pub async fn step_index(&self, id: &str, step_id: &str) -> Result<usize, EngineError> {
        let workflow = self.load(id).await?;
        workflow
            .step_index(step_id)
            .ok_or_else(|| EngineError::StepNotFound {
                workflow_id: id.to_string(),
                step_id: step_id.to_string(),
            })
    }

    /// List workflow summaries.
    ///
    /// The external store owns ordering when present; otherwise the cache is
    /// listed in insertion order. A failing store falls back to the cache.
    pub async fn list_workflows(
        &self,
        state: Option<WorkflowState>,
        limit: usize,
        offset: usize,
    ) -> Vec<WorkflowSummary> {
        if let Some(store) = &self.store {
            match store.list_workflows(state, limit, offset).await {
                Ok(list) => return list,
                Err(e) => warn!(store = store.id(), error = %e, "Store listing failed, using cache"),
            }
        }
        self.cache.list(state, limit, offset)
    }

    /// Load the freshest snapshot from store and cache.
    ///
    /// The snapshot with the newer `updatedAt` wins, ties go to the cache. A
    /// snapshot newer than the cache copy is written back into the cache.
    async fn load(&self, id: &str) -> Result<Workflow, EngineError> {
        let stored = match &self.store {
            Some(store) => match store.get_workflow(id).await {
                Ok(found) => found,
                Err(e) => {
                    warn!(workflow_id = %id, store = store.id(), error = %e, "Store read failed, using cache");
                    None
                }
            },
            None => None,
        };

        match (stored, self.cache.get(id)) {
            (Some(stored), Some(cached)) => {
                if stored.updated_at > cached.updated_at {
                    debug!(workflow_id = %id, "Store snapshot is newer than cache");
                    self.cache.insert(stored.clone());
                    Ok(stored)
                } else {
                    Ok(cached)
                }
            }
            (Some(stored), None) => {
                self.cache.insert(stored.clone());
                Ok(stored)
            }
            (None, Some(cached)) => Ok(cached),
            (None, None) => Err(EngineError::WorkflowNotFound(id.to_string())),
        }
    }

    /// Write the cache, then best-effort write the store.
    async fn persist(&self, workflow: &Workflow) {
        self.cache.insert(workflow.clone());
        if let Some(store) = &self.store {
            if let Err(e) = store.save_workflow(&workflow.id, workflow).await {
                warn!(
                    workflow_id = %workflow.id,
                    store = store.id(),
                    error = %e,
                    "Failed to persist workflow, cache remains authoritative"
                );
            }
        }
    }

    /// Apply `apply` to a copy of the freshest snapshot under the workflow's
    /// lock and persist the copy when it succeeds.
    async fn mutate<R>(
        &self,
        id: &str,
        apply: impl FnOnce(&mut Workflow) -> Result<R, EngineError>,
    ) -> Result<(Workflow, R), EngineError> {
        let _guard = self.cache.lock(id).await;
        let mut workflow = self.load(id).await?;
        let output = apply(&mut workflow)?;
        workflow.updated_at = Utc::now();
        self.persist(&workflow).await;
        Ok((workflow, output))
    }
}

/// Bounds-check a step index.
fn check_index(workflow: &Workflow, index: usize) -> Result<(), EngineError> {
    if index < workflow.steps.len() {
        Ok(())
    } else {
        Err(EngineError::IndexOutOfRange {
            index,
            len: workflow.steps.len(),
        })
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
