//! Store construction from configuration.

use std::sync::Arc;

use caravan_config::{StoreBackend, StoreConfig};
use caravan_protocols::{StateStore, StoreError};
use tracing::info;

use crate::file::FileStateStore;
use crate::sqlite::SqliteStateStore;

/// Open the store named by `config`.
///
/// Returns `None` for the memory backend: the engine's in-process cache is
/// then the only copy of every workflow.
pub async fn open_store(config: &StoreConfig) -> Result<Option<Arc<dyn StateStore>>, StoreError> {
    let path = config.resolved_path();
    let store: Arc<dyn StateStore> = match config.backend {
        StoreBackend::Memory => {
            info!("Using in-process state only");
            return Ok(None);
        }
        StoreBackend::File => Arc::new(FileStateStore::new(&path).await?),
        StoreBackend::Sqlite => Arc::new(SqliteStateStore::open(&path).await?),
    };
    info!(backend = %config.backend, path = ?path, "State store opened");
    Ok(Some(store))
}
