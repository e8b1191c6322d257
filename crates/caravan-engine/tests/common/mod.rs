#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use caravan_engine::{ResilientExecutor, WorkflowStateManager};
use caravan_protocols::{HandlerError, StepContext, StepDefinition, StepHandler, handler_fn};
use serde_json::{Value, json};

/// Handler that counts calls and fails the first `failures` of them.
pub struct Scripted {
    pub calls: Arc<AtomicU32>,
    pub handler: Arc<dyn StepHandler>,
}

pub fn scripted(failures: u32, result: Value) -> Scripted {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let handler: Arc<dyn StepHandler> = Arc::new(handler_fn(move |ctx: StepContext| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        let result = result.clone();
        async move {
            if n < failures {
                Err(HandlerError::Unavailable(format!(
                    "{} attempt {} failed",
                    ctx.step_id,
                    n + 1
                )))
            } else {
                Ok(result)
            }
        }
    }));
    Scripted { calls, handler }
}

pub fn ok() -> Scripted {
    scripted(0, json!({"ok": true}))
}

pub fn always_fails() -> Scripted {
    scripted(u32::MAX, Value::Null)
}

pub fn executor() -> ResilientExecutor {
    ResilientExecutor::new(Arc::new(WorkflowStateManager::in_memory()))
}

pub async fn create(executor: &ResilientExecutor, steps: &[&str]) -> String {
    executor
        .manager()
        .create_workflow(
            "MIGRATION",
            json!({"migrationId": "m-1", "projectKey": "QA"}),
            steps.iter().map(|s| StepDefinition::new(*s)),
        )
        .await
}

pub fn calls(s: &Scripted) -> u32 {
    s.calls.load(Ordering::SeqCst)
}
