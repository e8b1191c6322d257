//! Reference migration steps for Caravan.
//!
//! Moves test assets from one test-management system to another through
//! six steps: validate, connect, extract, transform, load and verify.
//! Systems are reached through [`AssetConnector`] implementations; an
//! [`InMemoryConnector`] ships for local runs and tests.

mod asset;
mod connector;
mod error;
mod steps;

pub use asset::{MigrationRequest, TestAsset};
pub use connector::{AssetConnector, ConnectorRegistry, InMemoryConnector};
pub use error::ConnectorError;
pub use steps::{
    CONNECT, EXTRACT, LOAD, MIGRATION_WORKFLOW_TYPE, TRANSFORM, VALIDATE, VERIFY, migration_steps,
    register_migration_handlers,
};
