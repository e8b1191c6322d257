//! In-process workflow cache.
//!
//! The cache is the authoritative copy of every workflow this process has
//! touched. It also hands out the per-workflow locks that serialize
//! mutations.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{Mutex, OwnedMutexGuard};

use caravan_protocols::{Workflow, WorkflowState, WorkflowSummary};

struct CacheEntry {
    /// First-insertion sequence; listing order.
    seq: u64,
    workflow: Workflow,
}

/// Concurrent map of workflow snapshots plus per-id mutation locks.
pub struct WorkflowCache {
    entries: DashMap<String, CacheEntry>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    next_seq: AtomicU64,
}

impl WorkflowCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            locks: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Snapshot of a workflow.
    pub fn get(&self, id: &str) -> Option<Workflow> {
        self.entries.get(id).map(|entry| entry.workflow.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Insert or replace a snapshot. Replacing keeps the listing position.
    pub fn insert(&self, workflow: Workflow) {
        match self.entries.entry(workflow.id.clone()) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().workflow = workflow;
            }
            Entry::Vacant(vacant) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                vacant.insert(CacheEntry { seq, workflow });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Summaries in insertion order.
    ///
    /// The state filter is applied to each snapshot as it is read, so a
    /// listed workflow always matched the filter at read time.
    pub fn list(
        &self,
        state: Option<WorkflowState>,
        limit: usize,
        offset: usize,
    ) -> Vec<WorkflowSummary> {
        let mut rows: Vec<(u64, WorkflowSummary)> = self
            .entries
            .iter()
            .filter(|entry| state.is_none_or(|wanted| entry.workflow.state == wanted))
            .map(|entry| (entry.seq, entry.workflow.summary()))
            .collect();
        rows.sort_by_key(|(seq, _)| *seq);
        rows.into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, summary)| summary)
            .collect()
    }

    /// Acquire the mutation lock for one workflow id.
    ///
    /// Calls for different ids never contend.
    pub async fn lock(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

impl Default for WorkflowCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
