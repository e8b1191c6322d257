//! Workflow and step lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    /// Created, never started.
    Created,
    /// Being driven by an executor.
    Running,
    /// Stopped cooperatively; resumable.
    Paused,
    /// Every step completed or skipped. Never restarted.
    Completed,
    /// Stopped on an error; may be restarted.
    Failed,
}

impl WorkflowState {
    /// All states, in lifecycle order.
    pub const ALL: [WorkflowState; 5] = [
        WorkflowState::Created,
        WorkflowState::Running,
        WorkflowState::Paused,
        WorkflowState::Completed,
        WorkflowState::Failed,
    ];

    /// Wire name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Created => "CREATED",
            WorkflowState::Running => "RUNNING",
            WorkflowState::Paused => "PAUSED",
            WorkflowState::Completed => "COMPLETED",
            WorkflowState::Failed => "FAILED",
        }
    }

    /// Whether the workflow state machine allows moving to `next`.
    ///
    /// `Running -> Running` is accepted so that starting an already running
    /// workflow is idempotent.
    pub fn can_transition_to(&self, next: WorkflowState) -> bool {
        use WorkflowState::*;
        matches!(
            (self, next),
            (Created, Running)
                | (Running, Running)
                | (Running, Paused)
                | (Running, Completed)
                | (Running, Failed)
                | (Paused, Running)
                | (Failed, Running)
        )
    }

    /// COMPLETED and FAILED stop execution; only FAILED can be restarted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Completed | WorkflowState::Failed)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkflowState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown workflow state: {}", s))
    }
}

/// Lifecycle status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    /// Waiting to run.
    #[default]
    Pending,
    /// Handler currently executing.
    Running,
    /// Handler returned a result.
    Completed,
    /// Handler failed; may be retried or skipped.
    Failed,
    /// Deliberately not executed.
    Skipped,
}

impl StepStatus {
    /// All statuses.
    pub const ALL: [StepStatus; 5] = [
        StepStatus::Pending,
        StepStatus::Running,
        StepStatus::Completed,
        StepStatus::Failed,
        StepStatus::Skipped,
    ];

    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "PENDING",
            StepStatus::Running => "RUNNING",
            StepStatus::Completed => "COMPLETED",
            StepStatus::Failed => "FAILED",
            StepStatus::Skipped => "SKIPPED",
        }
    }

    /// Whether a step may move from this status to `next`.
    ///
    /// `Running -> Pending` is not listed: it only happens when a workflow is
    /// paused, which the state manager performs explicitly.
    pub fn can_transition_to(&self, next: StepStatus) -> bool {
        use StepStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Failed, Pending)
                | (Pending, Skipped)
                | (Failed, Skipped)
        )
    }

    /// COMPLETED or SKIPPED: the executor never runs this step again.
    pub fn is_done(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Skipped)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown step status: {}", s))
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
