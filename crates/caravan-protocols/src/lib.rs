//! # Caravan Protocols
//!
//! Core protocol definitions for the Caravan workflow engine.
//! Contains the persisted data model, error taxonomy and collaborator traits -
//! no implementations.
//!
//! ## Core Traits
//!
//! - [`StateStore`] - Durable persistence for workflow snapshots
//! - [`StepHandler`] - Caller-supplied work bound to one step id

pub mod error;
pub mod handler;
pub mod store;
pub mod types;

pub use error::{EngineError, HandlerError, StoreError};
pub use handler::{FnHandler, StepContext, StepHandler, handler_fn};
pub use store::StateStore;
pub use types::*;
