//! Name-keyed model registry.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tracing::debug;

use super::runtime::Model;

/// A concurrent map from model name to finalised model.
///
/// Registering a name that is already present replaces the previous model.
/// Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: Arc<DashMap<String, Arc<Model>>>,
}

static GLOBAL: OnceLock<ModelRegistry> = OnceLock::new();

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by [`ModelBuilder::finalise`].
    ///
    /// [`ModelBuilder::finalise`]: super::ModelBuilder::finalise
    pub fn global() -> &'static ModelRegistry {
        GLOBAL.get_or_init(ModelRegistry::new)
    }

    /// Store a model under its name, returning the model it replaced.
    pub fn register(&self, model: Arc<Model>) -> Option<Arc<Model>> {
        let name = model.name().to_string();
        let previous = self.models.insert(name.clone(), model);
        debug!(model = %name, replaced = previous.is_some(), "registered model");
        previous
    }

    /// Get a model by name.
    pub fn get(&self, name: &str) -> Option<Arc<Model>> {
        self.models.get(name).map(|entry| entry.value().clone())
    }

    /// Check if a name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of registered models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Check if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Remove a model by name.
    pub fn remove(&self, name: &str) -> Option<Arc<Model>> {
        self.models.remove(name).map(|(_, model)| model)
    }

    /// Remove every model.
    pub fn clear(&self) {
        self.models.clear();
    }
}
