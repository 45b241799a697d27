//! In-memory document store and graph index

use crate::graph::{to_mutation, Edge, EdgeId, Node, NodeId};
use crate::sync::{Category, Document, DocumentId, DocumentSource, GraphIndex, IndexError, SourceError};
use async_trait::async_trait;
use dashmap::DashMap;

/// Documents held in memory, keyed by category and id
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: DashMap<(Category, DocumentId), Document>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a document
    pub fn insert(&self, document: Document) {
        self.documents
            .insert((document.category, document.id.clone()), document);
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl DocumentSource for MemoryDocumentStore {
    async fn list_ids(&self, category: Category) -> Result<Vec<DocumentId>, SourceError> {
        let mut ids: Vec<DocumentId> = self
            .documents
            .iter()
            .filter(|entry| entry.key().0 == category)
            .map(|entry| entry.key().1.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn fetch(&self, category: Category, id: &DocumentId) -> Result<Document, SourceError> {
        self.documents
            .get(&(category, id.clone()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SourceError::NotFound {
                category,
                id: id.clone(),
            })
    }
}

/// Graph index held in memory
///
/// Applies the same document-to-graph rules as the persistent index, so it
/// behaves identically for idempotence and insertion failures.
#[derive(Debug, Default)]
pub struct MemoryGraphIndex {
    synced: DashMap<(Category, DocumentId), NodeId>,
    nodes: DashMap<NodeId, Node>,
    edges: DashMap<EdgeId, Edge>,
}

impl MemoryGraphIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn synced_count(&self, category: Category) -> usize {
        self.synced
            .iter()
            .filter(|entry| entry.key().0 == category)
            .count()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

#[async_trait]
impl GraphIndex for MemoryGraphIndex {
    async fn exists(&self, category: Category, id: &DocumentId) -> Result<bool, IndexError> {
        Ok(self.synced.contains_key(&(category, id.clone())))
    }

    async fn insert(&self, category: Category, document: &Document) -> Result<(), IndexError> {
        let mutation = to_mutation(document).map_err(|e| IndexError::insertion(e.to_string()))?;

        for node in mutation.nodes() {
            self.nodes
                .entry(node.id)
                .and_modify(|existing| existing.properties.extend(node.properties.clone()))
                .or_insert_with(|| node.clone());
        }
        for edge in mutation.edges() {
            self.edges.insert(edge.id, edge.clone());
        }

        let run = crate::graph::transform::run_node_id(category, document.id.as_str());
        self.synced.insert((category, document.id.clone()), run);
        Ok(())
    }
}
