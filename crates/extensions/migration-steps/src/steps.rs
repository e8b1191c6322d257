//! Migration step handlers.
//!
//! Each step reads the [`MigrationRequest`] from workflow data and the
//! outputs of earlier steps from the context. Handlers are idempotent:
//! writes overwrite by asset key, so a re-run load step converges.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::info;

use caravan_engine::ResilientExecutor;
use caravan_protocols::{HandlerError, StepContext, StepDefinition, StepHandler};

use crate::asset::{MigrationRequest, TestAsset};
use crate::connector::{AssetConnector, ConnectorRegistry};

pub const MIGRATION_WORKFLOW_TYPE: &str = "MIGRATION";

pub const VALIDATE: &str = "validate";
pub const CONNECT: &str = "connect";
pub const EXTRACT: &str = "extract";
pub const TRANSFORM: &str = "transform";
pub const LOAD: &str = "load";
pub const VERIFY: &str = "verify";

/// Step declarations of a migration workflow, in execution order.
pub fn migration_steps() -> Vec<StepDefinition> {
    [
        (VALIDATE, "Validate request"),
        (CONNECT, "Connect to systems"),
        (EXTRACT, "Extract assets"),
        (TRANSFORM, "Transform assets"),
        (LOAD, "Load assets"),
        (VERIFY, "Verify migration"),
    ]
    .into_iter()
    .map(|(id, name)| StepDefinition::new(id).with_name(name))
    .collect()
}

/// Register all migration handlers on the executor.
pub fn register_migration_handlers(executor: &ResilientExecutor, connectors: Arc<ConnectorRegistry>) {
    executor.register_step_handler(VALIDATE, Arc::new(ValidateStep(connectors.clone())));
    executor.register_step_handler(CONNECT, Arc::new(ConnectStep(connectors.clone())));
    executor.register_step_handler(EXTRACT, Arc::new(ExtractStep(connectors.clone())));
    executor.register_step_handler(TRANSFORM, Arc::new(TransformStep));
    executor.register_step_handler(LOAD, Arc::new(LoadStep(connectors.clone())));
    executor.register_step_handler(VERIFY, Arc::new(VerifyStep(connectors)));
}

fn connector(
    connectors: &ConnectorRegistry,
    system: &str,
) -> Result<Arc<dyn AssetConnector>, HandlerError> {
    connectors
        .get(system)
        .ok_or_else(|| HandlerError::InvalidInput(format!("no connector for system '{}'", system)))
}

/// A field of an earlier step's result.
fn previous<T: DeserializeOwned>(ctx: &StepContext, step: &str, field: &str) -> Result<T, HandlerError> {
    let value = ctx
        .previous(step)
        .and_then(|r| r.get(field))
        .ok_or_else(|| {
            HandlerError::InvalidInput(format!(
                "step '{}' needs '{}' from step '{}'",
                ctx.step_id, field, step
            ))
        })?;
    serde_json::from_value(value.clone()).map_err(|e| {
        HandlerError::InvalidInput(format!("unreadable '{}' from step '{}': {}", field, step, e))
    })
}

struct ValidateStep(Arc<ConnectorRegistry>);

#[async_trait]
impl StepHandler for ValidateStep {
    async fn execute(&self, ctx: &StepContext) -> Result<Value, HandlerError> {
        let request = MigrationRequest::from_data(&ctx.data)?;
        request.validate()?;
        connector(&self.0, &request.source)?;
        connector(&self.0, &request.target)?;

        info!(
            workflow_id = %ctx.workflow_id,
            migration_id = %request.migration_id,
            source = %request.source,
            target = %request.target,
            "Migration request validated"
        );
        Ok(json!({
            "migrationId": request.migration_id,
            "source": request.source,
            "target": request.target,
            "targetProjectKey": request.target_project(),
            "assetTypes": request.asset_types,
            "dryRun": request.dry_run,
        }))
    }
}

struct ConnectStep(Arc<ConnectorRegistry>);

#[async_trait]
impl StepHandler for ConnectStep {
    async fn execute(&self, ctx: &StepContext) -> Result<Value, HandlerError> {
        let request = MigrationRequest::from_data(&ctx.data)?;
        let mut systems = Map::new();
        for system in [&request.source, &request.target] {
            connector(&self.0, system)?.check_connection().await?;
            systems.insert(system.clone(), json!({ "connected": true }));
        }
        Ok(json!({ "systems": systems }))
    }
}

struct ExtractStep(Arc<ConnectorRegistry>);

#[async_trait]
impl StepHandler for ExtractStep {
    async fn execute(&self, ctx: &StepContext) -> Result<Value, HandlerError> {
        let request = MigrationRequest::from_data(&ctx.data)?;
        let source = connector(&self.0, &request.source)?;

        let mut assets = Vec::new();
        let mut by_type = Map::new();
        for asset_type in &request.asset_types {
            let batch = source.fetch_assets(&request.project_key, asset_type).await?;
            by_type.insert(asset_type.clone(), json!(batch.len()));
            assets.extend(batch);
        }

        info!(
            workflow_id = %ctx.workflow_id,
            project_key = %request.project_key,
            count = assets.len(),
            "Assets extracted"
        );
        Ok(json!({
            "count": assets.len(),
            "byType": by_type,
            "assets": assets,
        }))
    }
}

struct TransformStep;

impl TransformStep {
    fn transform(request: &MigrationRequest, asset: TestAsset) -> TestAsset {
        let prefix = format!("{}-", request.project_key);
        let key = match asset.key.strip_prefix(&prefix) {
            Some(number) => format!("{}-{}", request.target_project(), number),
            None => asset.key.clone(),
        };
        TestAsset {
            id: key.clone(),
            key,
            ..asset.clone()
        }
        .with_field("sourceKey", json!(asset.key))
        .with_field("sourceSystem", json!(request.source))
        .with_field("migrationId", json!(request.migration_id))
    }
}

#[async_trait]
impl StepHandler for TransformStep {
    async fn execute(&self, ctx: &StepContext) -> Result<Value, HandlerError> {
        let request = MigrationRequest::from_data(&ctx.data)?;
        let extracted: Vec<TestAsset> = previous(ctx, EXTRACT, "assets")?;
        let assets: Vec<TestAsset> = extracted
            .into_iter()
            .map(|asset| Self::transform(&request, asset))
            .collect();
        Ok(json!({ "count": assets.len(), "assets": assets }))
    }
}

struct LoadStep(Arc<ConnectorRegistry>);

#[async_trait]
impl StepHandler for LoadStep {
    async fn execute(&self, ctx: &StepContext) -> Result<Value, HandlerError> {
        let request = MigrationRequest::from_data(&ctx.data)?;
        // The validate step may have been skipped.
        request.validate()?;
        let assets: Vec<TestAsset> = previous(ctx, TRANSFORM, "assets")?;

        if request.dry_run {
            info!(workflow_id = %ctx.workflow_id, count = assets.len(), "Dry run, nothing written");
            return Ok(json!({ "written": 0, "batches": 0, "dryRun": true }));
        }

        let target = connector(&self.0, &request.target)?;
        let mut written = 0;
        let mut batches = 0;
        for batch in assets.chunks(request.batch_size) {
            written += target.write_assets(request.target_project(), batch).await?;
            batches += 1;
        }

        info!(
            workflow_id = %ctx.workflow_id,
            target = %request.target,
            written,
            batches,
            "Assets loaded"
        );
        Ok(json!({ "written": written, "batches": batches, "dryRun": false }))
    }
}

struct VerifyStep(Arc<ConnectorRegistry>);

#[async_trait]
impl StepHandler for VerifyStep {
    async fn execute(&self, ctx: &StepContext) -> Result<Value, HandlerError> {
        let request = MigrationRequest::from_data(&ctx.data)?;
        if request.dry_run {
            return Ok(json!({ "verified": false, "skipped": true }));
        }

        let expected: Map<String, Value> = previous(ctx, EXTRACT, "byType")?;
        let target = connector(&self.0, &request.target)?;

        let mut counts = Map::new();
        let mut short = Vec::new();
        for (asset_type, want) in &expected {
            let want = want.as_u64().unwrap_or(0) as usize;
            let have = target.count_assets(request.target_project(), asset_type).await?;
            if have < want {
                short.push(asset_type.clone());
            }
            counts.insert(asset_type.clone(), json!({ "expected": want, "actual": have }));
        }

        if !short.is_empty() {
            return Err(HandlerError::with_details(
                format!("Target is missing assets of type {}", short.join(", ")),
                json!({ "counts": counts }),
            ));
        }
        Ok(json!({ "verified": true, "counts": counts }))
    }
}

#[cfg(test)]
#[path = "steps_tests.rs"]
mod tests;
