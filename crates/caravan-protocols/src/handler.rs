//! Step handler protocol definitions.
//!
//! A handler performs the actual work of one step. It receives the immutable
//! workflow input plus the results of earlier completed steps and returns a
//! result payload. Handlers never touch the workflow record directly.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::HandlerError;

/// Everything a handler may read while executing one attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepContext {
    pub workflow_id: String,
    pub workflow_type: String,
    pub step_id: String,
    /// 1 on the first attempt, incremented on each retry.
    pub attempt: u32,
    /// The workflow's immutable input payload.
    pub data: Value,
    /// Results of earlier COMPLETED steps, keyed by step id.
    #[serde(default)]
    pub previous_results: Map<String, Value>,
}

impl StepContext {
    pub fn new(
        workflow_id: impl Into<String>,
        workflow_type: impl Into<String>,
        step_id: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            workflow_type: workflow_type.into(),
            step_id: step_id.into(),
            attempt: 1,
            data,
            previous_results: Map::new(),
        }
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn with_previous_results(mut self, results: Map<String, Value>) -> Self {
        self.previous_results = results;
        self
    }

    /// Result of an earlier completed step.
    pub fn previous(&self, step_id: &str) -> Option<&Value> {
        self.previous_results.get(step_id)
    }

    /// A top-level field of the input payload.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// A required string field of the input payload.
    pub fn require_str(&self, key: &str) -> Result<&str, HandlerError> {
        self.data
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::InvalidInput(format!("missing field '{}'", key)))
    }
}

/// Core trait for step handlers.
///
/// Handlers must be safe to re-invoke from scratch: pausing mid-step resets
/// the step to PENDING and a later run calls the handler again.
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn execute(&self, ctx: &StepContext) -> Result<Value, HandlerError>;
}

/// Adapter turning an async closure into a [`StepHandler`].
pub struct FnHandler<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnHandler<F, Fut>
where
    F: Fn(StepContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, HandlerError>> + Send,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut> StepHandler for FnHandler<F, Fut>
where
    F: Fn(StepContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, HandlerError>> + Send,
{
    async fn execute(&self, ctx: &StepContext) -> Result<Value, HandlerError> {
        (self.f)(ctx.clone()).await
    }
}

/// Build a handler from an async closure.
///
/// ```ignore
/// let h = handler_fn(|ctx| async move { Ok(json!({"seen": ctx.step_id})) });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F, Fut>
where
    F: Fn(StepContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, HandlerError>> + Send,
{
    FnHandler::new(f)
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
