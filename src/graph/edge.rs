//! Directed, typed relationships between nodes

use super::node::{derive_uuid, NodeId, Properties};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an edge, derived from its endpoints and relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(Uuid);

impl EdgeId {
    pub fn between(source: &NodeId, relationship: &str, target: &NodeId) -> Self {
        Self(derive_uuid(&[
            &source.to_string(),
            relationship,
            &target.to_string(),
        ]))
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A directed edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    /// Type of relationship (e.g. "depends_on", "solved", "installed")
    pub relationship: String,
    pub properties: Properties,
}

impl Edge {
    pub fn new(source: NodeId, target: NodeId, relationship: impl Into<String>) -> Self {
        let relationship = relationship.into();
        Self {
            id: EdgeId::between(&source, &relationship, &target),
            source,
            target,
            relationship,
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}
