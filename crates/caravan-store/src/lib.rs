//! # Caravan Store
//!
//! [`StateStore`](caravan_protocols::StateStore) backends.
//!
//! - [`MemoryStateStore`] - process-local, insertion ordered
//! - [`FileStateStore`] - one JSON document per workflow
//! - [`SqliteStateStore`] - a single SQLite database

mod factory;
mod file;
mod memory;
mod sqlite;

pub use factory::open_store;
pub use file::FileStateStore;
pub use memory::MemoryStateStore;
pub use sqlite::SqliteStateStore;

use caravan_protocols::{WorkflowState, WorkflowSummary};

/// Apply `offset`/`limit` to an already ordered summary list.
pub(crate) fn paginate(
    summaries: impl Iterator<Item = WorkflowSummary>,
    state: Option<WorkflowState>,
    limit: usize,
    offset: usize,
) -> Vec<WorkflowSummary> {
    summaries
        .filter(|s| state.is_none_or(|wanted| s.state == wanted))
        .skip(offset)
        .take(limit)
        .collect()
}
