//! Read-only projections of a workflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{StepStatus, WorkflowState};
use super::step::Step;
use super::workflow::ErrorInfo;

/// Listing row returned by `list_workflows`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub workflow_type: String,
    pub state: WorkflowState,
    pub progress: f64,
    pub step_count: usize,
    #[serde(default)]
    pub current_step: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-step line of a [`WorkflowStatus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSummary {
    pub id: String,
    pub name: String,
    pub order: u32,
    pub status: StepStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub execution_time: Option<f64>,
    pub error: Option<String>,
}

impl From<&Step> for StepSummary {
    fn from(step: &Step) -> Self {
        Self {
            id: step.id.clone(),
            name: step.name.clone(),
            order: step.order,
            status: step.status,
            start_time: step.start_time,
            end_time: step.end_time,
            retry_count: step.metadata.retry_count,
            execution_time: step.metadata.execution_time,
            error: step.error.as_ref().map(|e| e.message.clone()),
        }
    }
}

/// Full status of one workflow, as exposed to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    pub id: String,
    #[serde(rename = "type")]
    pub workflow_type: String,
    pub state: WorkflowState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// The step that is RUNNING right now.
    pub current_step: Option<StepSummary>,
    pub steps: Vec<StepSummary>,
    pub progress: f64,
    pub error: Option<ErrorInfo>,
    pub result: Option<serde_json::Value>,
    pub retry_count: u32,
    pub pause_count: u32,
}
