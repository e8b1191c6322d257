//! Step-level transitions.

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use caravan_protocols::{ActiveStep, EngineError, ErrorInfo, Step, StepStatus, Workflow, WorkflowState};

use super::{WorkflowStateManager, check_index};

impl WorkflowStateManager {
    /// Mark a PENDING step RUNNING in a RUNNING workflow.
    pub async fn start_step(&self, id: &str, index: usize) -> Result<(Workflow, Step), EngineError> {
        let (workflow, step) = self
            .mutate(id, |wf| {
                if wf.state != WorkflowState::Running {
                    return Err(EngineError::invalid_state("start step", wf.state));
                }
                check_index(wf, index)?;
                if let Some(running) = wf.running_step() {
                    if running.id != wf.steps[index].id {
                        return Err(EngineError::invalid_state(
                            format!("start step '{}' while '{}' runs", wf.steps[index].id, running.id),
                            running.status,
                        ));
                    }
                }

                let step = &mut wf.steps[index];
                if !step.status.can_transition_to(StepStatus::Running) {
                    return Err(EngineError::invalid_state(
                        format!("start step '{}'", step.id),
                        step.status,
                    ));
                }
                step.status = StepStatus::Running;
                step.start_time = Some(Utc::now());
                step.end_time = None;
                step.error = None;
                step.result = None;
                step.metadata.execution_time = None;
                let step = step.clone();

                wf.current_step_index = ActiveStep::Running(index);
                Ok(step)
            })
            .await?;

        debug!(workflow_id = %id, step_id = %step.id, index, "Step started");
        Ok((workflow, step))
    }

    /// Record a successful step.
    pub async fn complete_step(
        &self,
        id: &str,
        index: usize,
        result: Value,
    ) -> Result<(Workflow, Step), EngineError> {
        let (workflow, step) = self
            .mutate(id, |wf| {
                check_index(wf, index)?;
                let step = &mut wf.steps[index];
                if step.status != StepStatus::Running {
                    return Err(EngineError::invalid_state(
                        format!("complete step '{}'", step.id),
                        step.status,
                    ));
                }
                step.status = StepStatus::Completed;
                step.result = Some(result);
                step.error = None;
                step.end_time = Some(Utc::now());
                step.metadata.execution_time = step.elapsed_secs();
                let step = step.clone();

                release_active(wf, index);
                Ok(step)
            })
            .await?;

        info!(
            workflow_id = %id,
            step_id = %step.id,
            execution_time = ?step.metadata.execution_time,
            "Step completed"
        );
        Ok((workflow, step))
    }

    /// Record a failed step. The workflow state is left alone.
    pub async fn fail_step(
        &self,
        id: &str,
        index: usize,
        message: impl Into<String>,
        details: Option<Value>,
    ) -> Result<(Workflow, Step), EngineError> {
        let error = ErrorInfo::new(message, details);
        let (workflow, step) = self
            .mutate(id, |wf| {
                check_index(wf, index)?;
                let step = &mut wf.steps[index];
                if step.status != StepStatus::Running {
                    return Err(EngineError::invalid_state(
                        format!("fail step '{}'", step.id),
                        step.status,
                    ));
                }
                step.status = StepStatus::Failed;
                step.error = Some(error);
                step.end_time = Some(Utc::now());
                step.metadata.execution_time = step.elapsed_secs();
                let step = step.clone();

                release_active(wf, index);
                Ok(step)
            })
            .await?;

        warn!(
            workflow_id = %id,
            step_id = %step.id,
            retry_count = step.metadata.retry_count,
            error = step.error.as_ref().map(|e| e.message.as_str()).unwrap_or_default(),
            "Step failed"
        );
        Ok((workflow, step))
    }

    /// Reset a FAILED step to PENDING.
    ///
    /// A FAILED workflow is brought back to RUNNING with its error cleared.
    pub async fn retry_step(&self, id: &str, index: usize) -> Result<(Workflow, Step), EngineError> {
        let (workflow, step) = self
            .mutate(id, |wf| {
                check_index(wf, index)?;
                let step = &mut wf.steps[index];
                if step.status != StepStatus::Failed {
                    return Err(EngineError::invalid_state(
                        format!("retry step '{}'", step.id),
                        step.status,
                    ));
                }
                step.status = StepStatus::Pending;
                step.start_time = None;
                step.end_time = None;
                step.error = None;
                step.metadata.execution_time = None;
                step.metadata.retry_count += 1;
                let step = step.clone();

                if wf.state == WorkflowState::Failed {
                    wf.state = WorkflowState::Running;
                    wf.error = None;
                }
                Ok(step)
            })
            .await?;

        info!(
            workflow_id = %id,
            step_id = %step.id,
            retry_count = step.metadata.retry_count,
            "Step reset for retry"
        );
        Ok((workflow, step))
    }

    /// Skip a PENDING or FAILED step.
    pub async fn skip_step(&self, id: &str, index: usize) -> Result<(Workflow, Step), EngineError> {
        let (workflow, step) = self
            .mutate(id, |wf| {
                check_index(wf, index)?;
                let step = &mut wf.steps[index];
                if !step.status.can_transition_to(StepStatus::Skipped) {
                    return Err(EngineError::invalid_state(
                        format!("skip step '{}'", step.id),
                        step.status,
                    ));
                }
                step.status = StepStatus::Skipped;
                step.end_time = Some(Utc::now());
                Ok(step.clone())
            })
            .await?;

        info!(workflow_id = %id, step_id = %step.id, "Step skipped");
        Ok((workflow, step))
    }
}

/// Clear the active step if it points at `index`.
fn release_active(wf: &mut Workflow, index: usize) {
    if wf.current_step_index == ActiveStep::Running(index) {
        wf.current_step_index = ActiveStep::Idle;
    }
}
