use crate::config::InspectionTargets;
use crate::storage::{index_error, FsMirrorStore};
use crate::sync::{Category, Document, DocumentId, GraphIndex, IndexError};
use async_trait::async_trait;
use std::sync::Arc;

/// Fans inspection documents out to the graph and the raw mirror
///
/// A document is already synced only when every enabled destination has it.
/// Inserts write the mirror first so a graph entry always has its raw copy.
pub struct InspectionIndex {
    graph: Arc<dyn GraphIndex>,
    mirror: Arc<FsMirrorStore>,
    targets: InspectionTargets,
}

impl InspectionIndex {
    pub fn new(graph: Arc<dyn GraphIndex>, mirror: Arc<FsMirrorStore>, targets: InspectionTargets) -> Self {
        Self {
            graph,
            mirror,
            targets,
        }
    }
}

impl std::fmt::Debug for InspectionIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InspectionIndex")
            .field("mirror", &self.mirror.root())
            .field("targets", &self.targets)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl GraphIndex for InspectionIndex {
    async fn exists(&self, category: Category, id: &DocumentId) -> Result<bool, IndexError> {
        if self.targets.mirror && !self.mirror.contains(category, id).await.map_err(index_error)? {
            return Ok(false);
        }
        if self.targets.graph && !self.graph.exists(category, id).await? {
            return Ok(false);
        }
        Ok(true)
    }

    async fn insert(&self, category: Category, document: &Document) -> Result<(), IndexError> {
        if self.targets.mirror {
            self.mirror.store(document).await.map_err(index_error)?;
        }
        if self.targets.graph {
            self.graph.insert(category, document).await?;
        }
        Ok(())
    }
}
