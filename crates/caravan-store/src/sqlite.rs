//! SQLite state store.
//!
//! One row per workflow. Identifying columns are denormalized next to the
//! JSON snapshot so filtering and pagination happen in SQL.

use std::path::Path;

use async_trait::async_trait;
use chrono::SecondsFormat;
use rusqlite::{OptionalExtension, params};
use tokio_rusqlite::Connection;
use tracing::debug;

use caravan_protocols::{StateStore, StoreError, Workflow, WorkflowState, WorkflowSummary};

#[path = "sqlite_schema.rs"]
mod schema;
use schema::init_schema;

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;

/// SQLite-backed store.
pub struct SqliteStateStore {
    conn: Connection,
}

impl SqliteStateStore {
    /// Create a new in-memory database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await.map_err(db_error)?;
        Self::with_connection(conn).await
    }

    /// Open (and create if needed) a database file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        debug!("Opening SQLite state store at {:?}", path);
        let conn = Connection::open(path).await.map_err(db_error)?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|conn| Ok(init_schema(conn)?))
            .await
            .map_err(db_error)?;
        Ok(Self { conn })
    }
}

fn db_error(e: tokio_rusqlite::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

/// Timestamps are stored with fixed precision so text order equals time order.
fn sortable_time(time: &chrono::DateTime<chrono::Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl StateStore for SqliteStateStore {
    fn id(&self) -> &str {
        "sqlite"
    }

    async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>, StoreError> {
        let id = id.to_string();
        let snapshot: Option<String> = self
            .conn
            .call(move |conn| {
                let snapshot = conn
                    .query_row(
                        "SELECT snapshot FROM workflows WHERE id = ?1",
                        [&id],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(snapshot)
            })
            .await
            .map_err(db_error)?;

        match snapshot {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn save_workflow(&self, id: &str, workflow: &Workflow) -> Result<(), StoreError> {
        let id = id.to_string();
        let workflow_type = workflow.workflow_type.clone();
        let state = workflow.state.as_str();
        let created_at = sortable_time(&workflow.created_at);
        let updated_at = sortable_time(&workflow.updated_at);
        let snapshot = serde_json::to_string(workflow)?;

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO workflows (id, workflow_type, state, created_at, updated_at, snapshot)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(id) DO UPDATE SET
                        workflow_type = excluded.workflow_type,
                        state = excluded.state,
                        updated_at = excluded.updated_at,
                        snapshot = excluded.snapshot",
                    params![id, workflow_type, state, created_at, updated_at, snapshot],
                )?;
                Ok(())
            })
            .await
            .map_err(db_error)
    }

    async fn list_workflows(
        &self,
        state: Option<WorkflowState>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<WorkflowSummary>, StoreError> {
        let state = state.map(|s| s.as_str());
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);

        let rows: Vec<String> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT snapshot FROM workflows
                     WHERE ?1 IS NULL OR state = ?1
                     ORDER BY created_at, id
                     LIMIT ?2 OFFSET ?3",
                )?;
                let rows = stmt
                    .query_map(params![state, limit, offset], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(db_error)?;

        rows.iter()
            .map(|raw| {
                serde_json::from_str::<Workflow>(raw)
                    .map(|wf| wf.summary())
                    .map_err(StoreError::from)
            })
            .collect()
    }
}
