//! # Caravan Engine
//!
//! Drives multi-step migration workflows to completion.
//!
//! - [`WorkflowStateManager`] - the only writer of workflow and step state
//! - [`ResilientExecutor`] - runs step handlers with retry, pause and resume
//! - [`RecoveryManager`] - picks up workflows interrupted by a restart
//!
//! Every mutation lands in the in-process [`WorkflowCache`] first and is then
//! written to the configured [`StateStore`](caravan_protocols::StateStore) on
//! a best-effort basis.

pub mod cache;
pub mod executor;
pub mod manager;
pub mod recovery;
pub mod registry;
pub mod retry;

pub use cache::WorkflowCache;
pub use executor::ResilientExecutor;
pub use manager::WorkflowStateManager;
pub use recovery::{RecoveryManager, RecoveryReport};
pub use registry::StepHandlerRegistry;
pub use retry::RetryPolicy;
