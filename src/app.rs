//! Process setup: tracing and engine wiring.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use caravan_config::{Config, ConfigLoader, LoggingConfig};
use caravan_engine::{RecoveryManager, RecoveryReport, ResilientExecutor, WorkflowStateManager};
use caravan_migration_steps::{ConnectorRegistry, InMemoryConnector, TestAsset, register_migration_handlers};
use caravan_store::open_store;

/// Initialize tracing with console and optional file output.
///
/// `RUST_LOG` wins over `logging.level`. Console output goes to stderr so
/// command output on stdout stays machine readable.
pub(crate) fn init_tracing(config: &LoggingConfig) -> Result<(), Box<dyn Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let file_layer = match &config.log_dir {
        Some(dir) => {
            let dir = PathBuf::from(ConfigLoader::expand_path(&dir.to_string_lossy()));
            std::fs::create_dir_all(&dir)?;

            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("caravan")
                .filename_suffix("log")
                .max_log_files(30)
                .build(&dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // Dropping the guard stops the writer thread.
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            let layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
            Some(if config.json { layer.json().boxed() } else { layer.boxed() })
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(file_layer)
        .init();

    Ok(())
}

/// The engine as assembled for one CLI invocation.
pub(crate) struct App {
    pub executor: Arc<ResilientExecutor>,
    pub connectors: Arc<ConnectorRegistry>,
    auto_recover: bool,
}

impl App {
    pub async fn build(config: &Config) -> Result<Self, Box<dyn Error>> {
        let store = open_store(&config.store).await?;
        match &store {
            Some(store) => info!(backend = %config.store.backend, store = store.id(), "State store opened"),
            None => warn!("No durable store configured; workflows live for this process only"),
        }

        let manager = Arc::new(WorkflowStateManager::new(store));
        let executor = Arc::new(ResilientExecutor::from_config(manager, &config.engine));
        let connectors = Arc::new(ConnectorRegistry::new());
        register_migration_handlers(&executor, connectors.clone());

        Ok(Self {
            executor,
            connectors,
            auto_recover: config.engine.auto_recover,
        })
    }

    /// Register in-memory connectors for the systems named in `data`.
    ///
    /// An optional `fixtures` object (`system -> project -> [asset]`) seeds
    /// them. Systems that already have a connector are left alone.
    pub async fn prepare_connectors(&self, data: &Value) -> Result<(), Box<dyn Error>> {
        for field in ["source", "target"] {
            let Some(system) = data.get(field).and_then(Value::as_str) else {
                continue;
            };
            if self.connectors.get(system).is_some() {
                continue;
            }

            let connector = InMemoryConnector::new(system);
            if let Some(projects) = data.pointer(&format!("/fixtures/{}", system)).and_then(Value::as_object) {
                for (project, assets) in projects {
                    let assets: Vec<TestAsset> = serde_json::from_value(assets.clone())?;
                    debug!(system, project = %project, count = assets.len(), "Seeding connector");
                    connector.seed(project, assets).await;
                }
            }
            self.connectors.register(Arc::new(connector));
        }
        Ok(())
    }

    /// Pause workflows an earlier process left RUNNING, when configured to.
    pub async fn auto_recover(&self) -> Option<RecoveryReport> {
        if !self.auto_recover {
            return None;
        }
        let report = RecoveryManager::new(self.executor.clone(), false).recover().await;
        Some(report)
    }

    pub async fn recover(&self, resume: bool) -> Result<RecoveryReport, Box<dyn Error>> {
        if resume {
            for summary in RecoveryManager::new(self.executor.clone(), false).list_interrupted().await {
                let workflow = self.executor.manager().get_workflow(&summary.id).await?;
                self.prepare_connectors(&workflow.data).await?;
            }
        }
        Ok(RecoveryManager::new(self.executor.clone(), resume).recover().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caravan_config::StoreBackend;
    use caravan_migration_steps::AssetConnector;
    use serde_json::json;

    fn memory_config() -> Config {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Memory;
        config
    }

    #[tokio::test]
    async fn test_build_registers_migration_handlers() {
        let app = App::build(&memory_config()).await.unwrap();
        assert_eq!(app.executor.registry().len(), 6);
        assert!(app.executor.registry().contains("verify"));
    }

    #[tokio::test]
    async fn test_prepare_connectors_seeds_fixtures() {
        let app = App::build(&memory_config()).await.unwrap();
        let data = json!({
            "source": "zephyr",
            "target": "xray",
            "fixtures": {
                "zephyr": {
                    "QA": [{"id": "1", "key": "QA-1", "assetType": "testCase", "title": "Login"}]
                }
            }
        });

        app.prepare_connectors(&data).await.unwrap();

        assert_eq!(app.connectors.systems(), vec!["xray", "zephyr"]);
        let source = app.connectors.get("zephyr").unwrap();
        assert_eq!(source.count_assets("QA", "testCase").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_auto_recover_disabled() {
        let mut config = memory_config();
        config.engine.auto_recover = false;
        let app = App::build(&config).await.unwrap();
        assert!(app.auto_recover().await.is_none());
    }
}
