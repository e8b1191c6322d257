//! Workflow data model.

mod state;
mod step;
mod summary;
mod workflow;

pub use state::{StepStatus, WorkflowState};
pub use step::{Step, StepDefinition, StepMetadata};
pub use summary::{StepSummary, WorkflowStatus, WorkflowSummary};
pub use workflow::{ActiveStep, ErrorInfo, Workflow, WorkflowMetadata};
