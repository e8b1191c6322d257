//! Step handler registry.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use caravan_protocols::StepHandler;

/// Maps step ids to handlers.
///
/// Registering an id twice replaces the earlier handler (last write wins),
/// which lets tests swap in doubles.
pub struct StepHandlerRegistry {
    handlers: DashMap<String, Arc<dyn StepHandler>>,
}

impl StepHandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// Register a handler, returning the one it replaced.
    pub fn register(
        &self,
        step_id: impl Into<String>,
        handler: Arc<dyn StepHandler>,
    ) -> Option<Arc<dyn StepHandler>> {
        let step_id = step_id.into();
        let replaced = self.handlers.insert(step_id.clone(), handler);
        debug!(step_id = %step_id, replaced = replaced.is_some(), "Step handler registered");
        replaced
    }

    pub fn unregister(&self, step_id: &str) -> Option<Arc<dyn StepHandler>> {
        self.handlers.remove(step_id).map(|(_, handler)| handler)
    }

    pub fn get(&self, step_id: &str) -> Option<Arc<dyn StepHandler>> {
        self.handlers.get(step_id).map(|h| h.clone())
    }

    pub fn contains(&self, step_id: &str) -> bool {
        self.handlers.contains_key(step_id)
    }

    /// Registered step ids, sorted.
    pub fn step_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.handlers.iter().map(|h| h.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for StepHandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
