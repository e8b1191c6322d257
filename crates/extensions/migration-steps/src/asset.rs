//! Migration input and the assets being moved.

use caravan_protocols::HandlerError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single test asset (case, suite, plan, ...) as exchanged with connectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestAsset {
    /// Identifier within the owning system.
    pub id: String,
    /// Project-scoped key, e.g. `QA-12`.
    pub key: String,
    pub asset_type: String,
    pub title: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl TestAsset {
    pub fn new(
        id: impl Into<String>,
        key: impl Into<String>,
        asset_type: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            asset_type: asset_type.into(),
            title: title.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }
}

/// Workflow input of a migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRequest {
    pub migration_id: String,
    /// Project key in the source system.
    pub project_key: String,
    /// Project key in the target system. Defaults to `project_key`.
    #[serde(default)]
    pub target_project_key: Option<String>,
    /// Source system name, used to look up its connector.
    pub source: String,
    /// Target system name.
    pub target: String,
    #[serde(default = "default_asset_types")]
    pub asset_types: Vec<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Run every step but write nothing to the target.
    #[serde(default)]
    pub dry_run: bool,
}

fn default_asset_types() -> Vec<String> {
    vec!["testCase".to_string()]
}

fn default_batch_size() -> usize {
    100
}

impl MigrationRequest {
    /// Parse the request out of workflow data.
    pub fn from_data(data: &Value) -> Result<Self, HandlerError> {
        serde_json::from_value(data.clone())
            .map_err(|e| HandlerError::InvalidInput(format!("malformed migration request: {}", e)))
    }

    pub fn target_project(&self) -> &str {
        self.target_project_key.as_deref().unwrap_or(&self.project_key)
    }

    /// Reject requests no step could act on.
    pub fn validate(&self) -> Result<(), HandlerError> {
        let required = [
            ("migrationId", &self.migration_id),
            ("projectKey", &self.project_key),
            ("source", &self.source),
            ("target", &self.target),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(HandlerError::InvalidInput(format!("'{}' must not be empty", name)));
            }
        }
        if self.source == self.target && self.target_project() == self.project_key {
            return Err(HandlerError::InvalidInput(
                "source and target refer to the same project".to_string(),
            ));
        }
        if self.asset_types.is_empty() {
            return Err(HandlerError::InvalidInput("'assetTypes' must not be empty".to_string()));
        }
        if self.batch_size == 0 {
            return Err(HandlerError::InvalidInput("'batchSize' must be positive".to_string()));
        }
        Ok(())
    }
}
