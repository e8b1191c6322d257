//! Asset connectors.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::asset::TestAsset;
use crate::error::ConnectorError;

/// Access to one test-management system.
#[async_trait]
pub trait AssetConnector: Send + Sync {
    /// System name this connector serves; the registry key.
    fn system(&self) -> &str;

    async fn check_connection(&self) -> Result<(), ConnectorError>;

    /// All assets of one type in a project.
    async fn fetch_assets(
        &self,
        project_key: &str,
        asset_type: &str,
    ) -> Result<Vec<TestAsset>, ConnectorError>;

    /// Create or overwrite assets, keyed by `key`. Returns the number written.
    async fn write_assets(
        &self,
        project_key: &str,
        assets: &[TestAsset],
    ) -> Result<usize, ConnectorError>;

    async fn count_assets(&self, project_key: &str, asset_type: &str)
    -> Result<usize, ConnectorError>;
}

/// Connectors keyed by system name.
#[derive(Default)]
pub struct ConnectorRegistry {
    connectors: DashMap<String, Arc<dyn AssetConnector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, connector: Arc<dyn AssetConnector>) {
        let system = connector.system().to_string();
        debug!(system = %system, "Asset connector registered");
        self.connectors.insert(system, connector);
    }

    pub fn get(&self, system: &str) -> Option<Arc<dyn AssetConnector>> {
        self.connectors.get(system).map(|c| c.clone())
    }

    /// Registered system names, sorted.
    pub fn systems(&self) -> Vec<String> {
        let mut systems: Vec<String> = self.connectors.iter().map(|c| c.key().clone()).collect();
        systems.sort();
        systems
    }
}

/// Process-local connector. Projects exist once seeded or written to.
pub struct InMemoryConnector {
    system: String,
    reachable: AtomicBool,
    // project key -> asset key -> asset
    projects: RwLock<HashMap<String, HashMap<String, TestAsset>>>,
}

impl InMemoryConnector {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            reachable: AtomicBool::new(true),
            projects: RwLock::new(HashMap::new()),
        }
    }

    /// Seed a project with assets.
    pub async fn seed(&self, project_key: &str, assets: impl IntoIterator<Item = TestAsset>) {
        let mut projects = self.projects.write().await;
        let project = projects.entry(project_key.to_string()).or_default();
        for asset in assets {
            project.insert(asset.key.clone(), asset);
        }
    }

    /// Simulate an outage.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Snapshot of a project's assets sorted by key.
    pub async fn assets(&self, project_key: &str) -> Vec<TestAsset> {
        let projects = self.projects.read().await;
        let mut assets: Vec<TestAsset> = projects
            .get(project_key)
            .map(|p| p.values().cloned().collect())
            .unwrap_or_default();
        assets.sort_by(|a, b| a.key.cmp(&b.key));
        assets
    }

    fn ensure_reachable(&self) -> Result<(), ConnectorError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ConnectorError::Unreachable(self.system.clone()))
        }
    }
}

#[async_trait]
impl AssetConnector for InMemoryConnector {
    fn system(&self) -> &str {
        &self.system
    }

    async fn check_connection(&self) -> Result<(), ConnectorError> {
        self.ensure_reachable()
    }

    async fn fetch_assets(
        &self,
        project_key: &str,
        asset_type: &str,
    ) -> Result<Vec<TestAsset>, ConnectorError> {
        self.ensure_reachable()?;
        let projects = self.projects.read().await;
        let project = projects
            .get(project_key)
            .ok_or_else(|| ConnectorError::ProjectNotFound(project_key.to_string()))?;
        let mut assets: Vec<TestAsset> = project
            .values()
            .filter(|a| a.asset_type == asset_type)
            .cloned()
            .collect();
        assets.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(assets)
    }

    async fn write_assets(
        &self,
        project_key: &str,
        assets: &[TestAsset],
    ) -> Result<usize, ConnectorError> {
        self.ensure_reachable()?;
        let mut projects = self.projects.write().await;
        let project = projects.entry(project_key.to_string()).or_default();
        for asset in assets {
            project.insert(asset.key.clone(), asset.clone());
        }
        Ok(assets.len())
    }

    async fn count_assets(
        &self,
        project_key: &str,
        asset_type: &str,
    ) -> Result<usize, ConnectorError> {
        self.ensure_reachable()?;
        let projects = self.projects.read().await;
        Ok(projects
            .get(project_key)
            .map(|p| p.values().filter(|a| a.asset_type == asset_type).count())
            .unwrap_or(0))
    }
}
