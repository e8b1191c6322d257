//! Workflow snapshot.
//!
//! The serialized form of [`Workflow`] is the persistence compatibility
//! surface: field names are camelCase and enumerations are upper-case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::{StepStatus, WorkflowState};
use super::step::{Step, StepDefinition, seconds_between};
use super::summary::{StepSummary, WorkflowStatus, WorkflowSummary};

/// Structured error recorded on a workflow or step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    /// Record an error now.
    pub fn new(message: impl Into<String>, details: Option<serde_json::Value>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
            details,
        }
    }
}

/// The single active step of a workflow.
///
/// Persisted as `currentStepIndex: number | null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<usize>", into = "Option<usize>")]
pub enum ActiveStep {
    /// No step is running.
    #[default]
    Idle,
    /// The step at this index is RUNNING.
    Running(usize),
}

impl ActiveStep {
    /// Index of the running step, if any.
    pub fn index(&self) -> Option<usize> {
        match self {
            ActiveStep::Idle => None,
            ActiveStep::Running(index) => Some(*index),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, ActiveStep::Idle)
    }
}

impl From<Option<usize>> for ActiveStep {
    fn from(index: Option<usize>) -> Self {
        index.map_or(ActiveStep::Idle, ActiveStep::Running)
    }
}

impl From<ActiveStep> for Option<usize> {
    fn from(active: ActiveStep) -> Self {
        active.index()
    }
}

/// Workflow-level counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMetadata {
    /// Restarts after a FAILED state.
    #[serde(default)]
    pub retry_count: u32,
    /// Times the workflow was paused.
    #[serde(default)]
    pub pause_count: u32,
    /// Seconds between first start and completion.
    #[serde(default)]
    pub total_execution_time: Option<f64>,
}

/// One migration job: ordered steps plus an overall lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    #[serde(rename = "type")]
    pub workflow_type: String,
    pub state: WorkflowState,
    /// Caller-supplied input; never modified after creation.
    pub data: serde_json::Value,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub current_step_index: ActiveStep,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<ErrorInfo>,
    #[serde(default)]
    pub metadata: WorkflowMetadata,
}

impl Workflow {
    /// Build the initial snapshot: CREATED, all steps PENDING.
    pub fn new(
        workflow_type: impl Into<String>,
        data: serde_json::Value,
        steps: impl IntoIterator<Item = StepDefinition>,
    ) -> Self {
        let now = Utc::now();
        let steps = steps
            .into_iter()
            .enumerate()
            .map(|(i, definition)| Step::new(definition, i as u32 + 1))
            .collect();

        Self {
            id: Uuid::new_v4().to_string(),
            workflow_type: workflow_type.into(),
            state: WorkflowState::Created,
            data,
            steps,
            current_step_index: ActiveStep::Idle,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
            metadata: WorkflowMetadata::default(),
        }
    }

    /// Position of the step with the given id.
    pub fn step_index(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == step_id)
    }

    /// The RUNNING step, if any.
    pub fn running_step(&self) -> Option<&Step> {
        self.current_step_index.index().and_then(|i| self.steps.get(i))
    }

    /// Number of COMPLETED or SKIPPED steps.
    pub fn done_step_count(&self) -> usize {
        self.steps.iter().filter(|s| s.status.is_done()).count()
    }

    /// Whether every step is COMPLETED or SKIPPED.
    pub fn all_steps_done(&self) -> bool {
        self.steps.iter().all(|s| s.status.is_done())
    }

    /// Progress percentage.
    ///
    /// 0 while CREATED, 100 once COMPLETED, otherwise the share of steps that
    /// are COMPLETED or SKIPPED.
    pub fn progress(&self) -> f64 {
        match self.state {
            WorkflowState::Created => 0.0,
            WorkflowState::Completed => 100.0,
            _ if self.steps.is_empty() => 0.0,
            _ => self.done_step_count() as f64 / self.steps.len() as f64 * 100.0,
        }
    }

    /// Seconds between `startedAt` and `completedAt`.
    pub fn elapsed_secs(&self) -> Option<f64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(seconds_between(start, end)),
            _ => None,
        }
    }

    /// Listing row for this workflow.
    pub fn summary(&self) -> WorkflowSummary {
        WorkflowSummary {
            id: self.id.clone(),
            workflow_type: self.workflow_type.clone(),
            state: self.state,
            progress: self.progress(),
            step_count: self.steps.len(),
            current_step: self.running_step().map(|s| s.id.clone()),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Read-only status projection.
    pub fn status(&self) -> WorkflowStatus {
        let steps: Vec<StepSummary> = self.steps.iter().map(StepSummary::from).collect();
        let current_step = self
            .current_step_index
            .index()
            .and_then(|i| steps.get(i).cloned());

        WorkflowStatus {
            id: self.id.clone(),
            workflow_type: self.workflow_type.clone(),
            state: self.state,
            created_at: self.created_at,
            updated_at: self.updated_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            current_step,
            steps,
            progress: self.progress(),
            error: self.error.clone(),
            result: self.result.clone(),
            retry_count: self.metadata.retry_count,
            pause_count: self.metadata.pause_count,
        }
    }

    /// Results of COMPLETED steps, keyed by step id.
    pub fn completed_results(&self) -> serde_json::Map<String, serde_json::Value> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .map(|s| {
                (
                    s.id.clone(),
                    s.result.clone().unwrap_or(serde_json::Value::Null),
                )
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
