//! Step records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::StepStatus;
use super::workflow::ErrorInfo;

/// Declaration of a step when a workflow is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Step identifier; also the handler registry key.
    pub id: String,
    /// Human-readable name. Defaults to the id.
    pub name: String,
}

impl StepDefinition {
    /// Declare a step whose name equals its id.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
        }
    }

    /// Set a display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl From<&str> for StepDefinition {
    fn from(id: &str) -> Self {
        StepDefinition::new(id)
    }
}

/// Per-step bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepMetadata {
    /// Explicit retries of this step.
    #[serde(default)]
    pub retry_count: u32,
    /// Wall-clock seconds of the last attempt.
    #[serde(default)]
    pub execution_time: Option<f64>,
}

/// One unit of work within a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub name: String,
    /// 1-based position, fixed at creation.
    pub order: u32,
    pub status: StepStatus,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<ErrorInfo>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: StepMetadata,
}

impl Step {
    /// Build a pending step from its definition and 1-based order.
    pub fn new(definition: StepDefinition, order: u32) -> Self {
        Self {
            id: definition.id,
            name: definition.name,
            order,
            status: StepStatus::Pending,
            start_time: None,
            end_time: None,
            error: None,
            result: None,
            metadata: StepMetadata::default(),
        }
    }

    /// Seconds between start and end, when both are known.
    pub fn elapsed_secs(&self) -> Option<f64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(seconds_between(start, end)),
            _ => None,
        }
    }
}

pub(crate) fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds().max(0) as f64 / 1000.0
}
