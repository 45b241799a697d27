//! Category registry: one binding of collaborators per category
//!
//! Adding a category means adding one entry here, never another
//! orchestration path.

use super::traits::{DocumentSource, GraphIndex};
use super::types::Category;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The routines used to sync one category
#[derive(Clone)]
pub struct CategoryBinding {
    pub source: Arc<dyn DocumentSource>,
    pub index: Arc<dyn GraphIndex>,
}

impl CategoryBinding {
    pub fn new(source: Arc<dyn DocumentSource>, index: Arc<dyn GraphIndex>) -> Self {
        Self { source, index }
    }
}

impl std::fmt::Debug for CategoryBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryBinding").finish_non_exhaustive()
    }
}

/// Maps each category to its binding
#[derive(Debug, Clone, Default)]
pub struct CategoryRegistry {
    bindings: BTreeMap<Category, CategoryBinding>,
}

impl CategoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind every category in `categories` to the same source and index
    pub fn uniform(
        categories: impl IntoIterator<Item = Category>,
        source: Arc<dyn DocumentSource>,
        index: Arc<dyn GraphIndex>,
    ) -> Self {
        let mut registry = Self::new();
        for category in categories {
            registry.register(category, CategoryBinding::new(source.clone(), index.clone()));
        }
        registry
    }

    /// Register (or replace) a category's binding
    pub fn register(&mut self, category: Category, binding: CategoryBinding) {
        self.bindings.insert(category, binding);
    }

    pub fn with(mut self, category: Category, binding: CategoryBinding) -> Self {
        self.register(category, binding);
        self
    }

    pub fn get(&self, category: Category) -> Option<&CategoryBinding> {
        self.bindings.get(&category)
    }

    pub fn contains(&self, category: Category) -> bool {
        self.bindings.contains_key(&category)
    }

    /// Registered categories in run order
    pub fn categories(&self) -> Vec<Category> {
        self.bindings.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
