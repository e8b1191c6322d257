//! Resilient executor.
//!
//! Drives a workflow through its steps in declared order. Handler failures
//! and orchestration faults are recorded on the workflow instead of being
//! returned; only the preconditions of starting a run are raised.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::FutureExt;
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use caravan_config::EngineConfig;
use caravan_protocols::{
    EngineError, HandlerError, StepContext, StepHandler, StepStatus, Workflow, WorkflowState, WorkflowStatus,
    WorkflowSummary,
};

use crate::manager::WorkflowStateManager;
use crate::registry::StepHandlerRegistry;
use crate::retry::RetryPolicy;

/// Message recorded when the executor itself, not a handler, fails.
pub const ORCHESTRATION_ERROR: &str = "Workflow orchestration error";

const DEFAULT_ECHO_FIELDS: [&str; 4] = ["migrationId", "projectKey", "source", "target"];

/// Runs registered step handlers against the state machine.
pub struct ResilientExecutor {
    manager: Arc<WorkflowStateManager>,
    registry: StepHandlerRegistry,
    policy: RetryPolicy,
    echo_fields: Vec<String>,
    /// Retry-wait cancellation, per running workflow.
    waits: DashMap<String, CancellationToken>,
}

impl ResilientExecutor {
    pub fn new(manager: Arc<WorkflowStateManager>) -> Self {
        Self {
            manager,
            registry: StepHandlerRegistry::new(),
            policy: RetryPolicy::default(),
            echo_fields: DEFAULT_ECHO_FIELDS.iter().map(|f| f.to_string()).collect(),
            waits: DashMap::new(),
        }
    }

    /// Executor configured from the `[engine]` section.
    pub fn from_config(manager: Arc<WorkflowStateManager>, config: &EngineConfig) -> Self {
        Self::new(manager)
            .with_policy(RetryPolicy::from(config))
            .with_echo_fields(config.result_echo_fields.clone())
    }

    /// Default policy for [`execute_workflow`](Self::execute_workflow).
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Input fields copied into the final workflow result.
    pub fn with_echo_fields(mut self, fields: Vec<String>) -> Self {
        self.echo_fields = fields;
        self
    }

    pub fn manager(&self) -> &Arc<WorkflowStateManager> {
        &self.manager
    }

    pub fn registry(&self) -> &StepHandlerRegistry {
        &self.registry
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Bind a handler to a step id, replacing any earlier one.
    pub fn register_step_handler(&self, step_id: impl Into<String>, handler: Arc<dyn StepHandler>) {
        self.registry.register(step_id, handler);
    }

    /// Run a workflow with the executor's default policy.
    pub async fn execute_workflow(&self, id: &str) -> Result<Workflow, EngineError> {
        let policy = self.policy.clone();
        self.execute_workflow_with(id, &policy).await
    }

    /// Run a workflow until it completes, fails, or leaves RUNNING.
    ///
    /// Errors from starting the workflow are returned. Everything after that
    /// is recorded on the workflow and the resulting snapshot is returned.
    pub async fn execute_workflow_with(
        &self,
        id: &str,
        policy: &RetryPolicy,
    ) -> Result<Workflow, EngineError> {
        let workflow = self.manager.get_workflow(id).await?;
        if workflow.steps.is_empty() {
            return Err(EngineError::NoSteps(id.to_string()));
        }
        self.manager.start_workflow(id).await?;

        info!(
            workflow_id = %id,
            auto_retry = policy.auto_retry,
            max_retries = policy.max_retries,
            "Executing workflow"
        );

        let outcome = self.drive(id, policy).await;
        self.waits.remove(id);

        match outcome {
            Ok(workflow) => Ok(workflow),
            Err(e) => {
                error!(workflow_id = %id, error = %e, "Workflow orchestration failed");
                let details = json!({ "error": e.to_string() });
                match self.manager.fail_workflow(id, ORCHESTRATION_ERROR, Some(details)).await {
                    Ok(workflow) => Ok(workflow),
                    Err(fail_err) => {
                        warn!(workflow_id = %id, error = %fail_err, "Could not record orchestration failure");
                        self.manager.get_workflow(id).await
                    }
                }
            }
        }
    }

    /// Step loop. Any `Err` here is an orchestration fault.
    async fn drive(&self, id: &str, policy: &RetryPolicy) -> Result<Workflow, EngineError> {
        let mut token = self.arm_wait(id);
        let mut index = 0;

        loop {
            let workflow = self.manager.get_workflow(id).await?;
            if workflow.state != WorkflowState::Running {
                info!(workflow_id = %id, state = %workflow.state, "Workflow left RUNNING, stopping");
                return Ok(workflow);
            }
            let Some(step) = workflow.steps.get(index) else {
                break;
            };
            let step_id = step.id.clone();

            match step.status {
                StepStatus::Completed | StepStatus::Skipped => {
                    index += 1;
                    continue;
                }
                StepStatus::Failed => {
                    debug!(workflow_id = %id, step_id = %step_id, "Resetting step failed in an earlier run");
                    self.manager.retry_step(id, index).await?;
                    continue;
                }
                StepStatus::Running => {
                    return Err(EngineError::invalid_state(
                        format!("execute step '{}'", step_id),
                        step.status,
                    ));
                }
                StepStatus::Pending => {}
            }

            let Some(handler) = self.registry.get(&step_id) else {
                return self.fail_missing_handler(id, index, &step_id).await;
            };

            let (workflow, step) = self.manager.start_step(id, index).await?;
            let ctx = StepContext::new(id, workflow.workflow_type.clone(), step_id.clone(), workflow.data.clone())
                .with_attempt(step.metadata.retry_count + 1)
                .with_previous_results(workflow.completed_results());

            debug!(workflow_id = %id, step_id = %step_id, attempt = ctx.attempt, "Invoking step handler");

            // A panicking handler fails its step like any other handler error.
            let outcome = AssertUnwindSafe(handler.execute(&ctx))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(panic_error(payload)));

            match outcome {
                Ok(result) => match self.manager.complete_step(id, index, result).await {
                    Ok(_) => index += 1,
                    // The step was reset underneath us (pause); the loop head decides.
                    Err(EngineError::InvalidState { .. }) => continue,
                    Err(e) => return Err(e),
                },
                Err(handler_err) => {
                    let message = handler_err.to_string();
                    let details = handler_err.details().cloned();
                    let failed = match self.manager.fail_step(id, index, message.clone(), details.clone()).await {
                        Ok((_, failed)) => failed,
                        Err(EngineError::InvalidState { .. }) => continue,
                        Err(e) => return Err(e),
                    };

                    let retries = failed.metadata.retry_count;
                    if policy.should_retry(retries) {
                        let delay = policy.delay_for(retries);
                        self.manager.retry_step(id, index).await?;
                        info!(
                            workflow_id = %id,
                            step_id = %step_id,
                            retry = retries + 1,
                            max_retries = policy.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            "Retrying step"
                        );
                        if !Self::wait_for_retry(&token, delay).await {
                            debug!(workflow_id = %id, "Retry wait cancelled");
                            token = self.arm_wait(id);
                        }
                        continue;
                    }

                    let summary = json!({
                        "stepId": step_id,
                        "message": message,
                        "details": details,
                        "attempts": retries + 1,
                    });
                    return self
                        .manager
                        .fail_workflow(id, format!("Step '{}' failed: {}", step_id, message), Some(summary))
                        .await;
                }
            }
        }

        let workflow = self.manager.get_workflow(id).await?;
        let result = self.final_result(&workflow);
        self.manager.complete_workflow(id, result).await
    }

    async fn fail_missing_handler(&self, id: &str, index: usize, step_id: &str) -> Result<Workflow, EngineError> {
        warn!(workflow_id = %id, step_id = %step_id, "No handler registered for step");
        self.manager.start_step(id, index).await?;
        let err = EngineError::MissingHandler(step_id.to_string());
        self.manager
            .fail_workflow(
                id,
                err.to_string(),
                Some(json!({ "stepId": step_id, "kind": "MissingHandler" })),
            )
            .await
    }

    /// Sleep for `delay` unless the token fires first. `false` when cancelled.
    async fn wait_for_retry(token: &CancellationToken, delay: Duration) -> bool {
        tokio::select! {
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Install a fresh cancellation token for `id`.
    fn arm_wait(&self, id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        self.waits.insert(id.to_string(), token.clone());
        token
    }

    /// Aggregate of completed step results plus echoed input fields.
    fn final_result(&self, workflow: &Workflow) -> Value {
        let completed = workflow
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count();
        let skipped = workflow
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Skipped)
            .count();

        let mut result = Map::new();
        result.insert("workflowId".into(), json!(workflow.id));
        result.insert("workflowType".into(), json!(workflow.workflow_type));
        result.insert("stepResults".into(), Value::Object(workflow.completed_results()));
        result.insert("completedSteps".into(), json!(completed));
        result.insert("skippedSteps".into(), json!(skipped));
        for field in &self.echo_fields {
            if let Some(value) = workflow.data.get(field) {
                result.insert(field.clone(), value.clone());
            }
        }
        Value::Object(result)
    }

    /// Pause a running workflow and cut short any retry wait.
    ///
    /// The running handler is not interrupted; its outcome is discarded.
    pub async fn pause_workflow(&self, id: &str) -> Result<Workflow, EngineError> {
        let workflow = self.manager.pause_workflow(id).await?;
        if let Some(token) = self.waits.get(id) {
            token.cancel();
        }
        Ok(workflow)
    }

    /// Move a paused or failed workflow back to RUNNING.
    ///
    /// Steps only run again on the next [`execute_workflow`](Self::execute_workflow).
    pub async fn resume_workflow(&self, id: &str) -> Result<Workflow, EngineError> {
        self.manager.start_workflow(id).await
    }

    pub async fn get_workflow_status(&self, id: &str) -> Result<WorkflowStatus, EngineError> {
        Ok(self.manager.get_workflow(id).await?.status())
    }

    pub async fn list_workflows(
        &self,
        state: Option<WorkflowState>,
        limit: usize,
        offset: usize,
    ) -> Vec<WorkflowSummary> {
        self.manager.list_workflows(state, limit, offset).await
    }
}

fn panic_error(payload: Box<dyn Any + Send>) -> HandlerError {
    let reason = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    HandlerError::failed(format!("Step handler panicked: {}", reason))
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
