//! Recovery of workflows interrupted by a restart.
//!
//! A workflow persisted as RUNNING by a process that is gone has nobody
//! driving it. Recovery pauses it, which puts a half-run step back to
//! PENDING, and optionally drives it again.

use std::sync::Arc;

use tracing::{info, warn};

use caravan_protocols::{WorkflowState, WorkflowSummary};

use crate::executor::ResilientExecutor;

const PAGE_SIZE: usize = 100;

/// Outcome of one recovery pass.
#[derive(Debug, Clone, Default)]
pub struct RecoveryReport {
    /// Workflows that were found RUNNING and paused.
    pub paused: Vec<String>,
    /// Final state of each workflow driven again.
    pub resumed: Vec<(String, WorkflowState)>,
    /// Workflows that could not be recovered, with the reason.
    pub failed: Vec<(String, String)>,
}

impl RecoveryReport {
    pub fn is_empty(&self) -> bool {
        self.paused.is_empty() && self.failed.is_empty()
    }
}

/// Finds and recovers interrupted workflows.
pub struct RecoveryManager {
    executor: Arc<ResilientExecutor>,
    resume: bool,
}

impl RecoveryManager {
    /// `resume` drives recovered workflows again after pausing them.
    pub fn new(executor: Arc<ResilientExecutor>, resume: bool) -> Self {
        Self { executor, resume }
    }

    /// Workflows currently listed as RUNNING.
    pub async fn list_interrupted(&self) -> Vec<WorkflowSummary> {
        let mut interrupted = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .executor
                .list_workflows(Some(WorkflowState::Running), PAGE_SIZE, offset)
                .await;
            let len = page.len();
            interrupted.extend(page);
            if len < PAGE_SIZE {
                break;
            }
            offset += len;
        }
        interrupted
    }

    /// Pause every RUNNING workflow, then resume them when enabled.
    ///
    /// Must run before this process starts executing workflows of its own.
    pub async fn recover(&self) -> RecoveryReport {
        let mut report = RecoveryReport::default();

        for summary in self.list_interrupted().await {
            match self.executor.pause_workflow(&summary.id).await {
                Ok(_) => report.paused.push(summary.id),
                Err(e) => {
                    warn!(workflow_id = %summary.id, error = %e, "Failed to pause interrupted workflow");
                    report.failed.push((summary.id, e.to_string()));
                }
            }
        }

        if self.resume {
            for id in &report.paused {
                match self.executor.execute_workflow(id).await {
                    Ok(workflow) => report.resumed.push((id.clone(), workflow.state)),
                    Err(e) => {
                        warn!(workflow_id = %id, error = %e, "Failed to resume recovered workflow");
                        report.failed.push((id.clone(), e.to_string()));
                    }
                }
            }
        }

        info!(
            paused = report.paused.len(),
            resumed = report.resumed.len(),
            failed = report.failed.len(),
            "Recovery pass finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::WorkflowStateManager;
    use caravan_protocols::{HandlerError, StepContext, StepDefinition, StepStatus, handler_fn};
    use serde_json::json;

    async fn interrupted_workflow(manager: &WorkflowStateManager) -> String {
        let id = manager
            .create_workflow("MIGRATION", json!({}), [StepDefinition::new("a"), StepDefinition::new("b")])
            .await;
        manager.start_workflow(&id).await.unwrap();
        manager.start_step(&id, 0).await.unwrap();
        id
    }

    fn executor(manager: Arc<WorkflowStateManager>) -> Arc<ResilientExecutor> {
        let executor = ResilientExecutor::new(manager);
        for step in ["a", "b"] {
            executor.register_step_handler(
                step,
                Arc::new(handler_fn(|_ctx: StepContext| async move {
                    Ok::<_, HandlerError>(json!(true))
                })),
            );
        }
        Arc::new(executor)
    }

    #[tokio::test]
    async fn test_recovery_nothing_to_do() {
        let manager = Arc::new(WorkflowStateManager::in_memory());
        let recovery = RecoveryManager::new(executor(manager), true);

        let report = recovery.recover().await;
        assert!(report.is_empty());
        assert!(report.resumed.is_empty());
    }

    #[tokio::test]
    async fn test_recovery_pauses_without_resume() {
        let manager = Arc::new(WorkflowStateManager::in_memory());
        let id = interrupted_workflow(&manager).await;
        let untouched = manager
            .create_workflow("MIGRATION", json!({}), [StepDefinition::new("a")])
            .await;

        let recovery = RecoveryManager::new(executor(manager.clone()), false);
        let report = recovery.recover().await;

        assert_eq!(report.paused, vec![id.clone()]);
        assert!(report.resumed.is_empty());

        let wf = manager.get_workflow(&id).await.unwrap();
        assert_eq!(wf.state, WorkflowState::Paused);
        assert_eq!(wf.steps[0].status, StepStatus::Pending);
        assert!(wf.current_step_index.is_idle());
        assert_eq!(
            manager.get_workflow(&untouched).await.unwrap().state,
            WorkflowState::Created
        );
    }

    #[tokio::test]
    async fn test_recovery_with_resume_completes() {
        let manager = Arc::new(WorkflowStateManager::in_memory());
        let id = interrupted_workflow(&manager).await;

        let recovery = RecoveryManager::new(executor(manager.clone()), true);
        let report = recovery.recover().await;

        assert_eq!(report.resumed, vec![(id.clone(), WorkflowState::Completed)]);
        let wf = manager.get_workflow(&id).await.unwrap();
        assert_eq!(wf.metadata.pause_count, 1);
        assert!(wf.steps.iter().all(|s| s.status == StepStatus::Completed));
    }
}
