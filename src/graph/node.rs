//! Node representation in the dependency graph

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for deterministic node and edge ids
const GRAPH_NAMESPACE: Uuid = Uuid::from_u128(0x6b0f_3c2e_9a41_4d8e_b7c5_2f1e_8d3a_90c4);

/// Unique identifier for a node
///
/// Derived from the node type and its natural key, so the same entity always
/// maps to the same id and re-inserting a document is an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn from_key(node_type: &str, key: &str) -> Self {
        Self(derive_uuid(&[node_type, key]))
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) fn derive_uuid(parts: &[&str]) -> Uuid {
    Uuid::new_v5(&GRAPH_NAMESPACE, parts.join("\u{1f}").as_bytes())
}

/// Properties collection
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// A node in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Entity type (e.g. "python_package_version", "solver_run")
    pub node_type: String,
    /// Natural key the id is derived from
    pub key: String,
    pub properties: Properties,
}

impl Node {
    pub fn new(node_type: impl Into<String>, key: impl Into<String>) -> Self {
        let node_type = node_type.into();
        let key = key.into();
        Self {
            id: NodeId::from_key(&node_type, &key),
            node_type,
            key,
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Set the property only when a value is present
    pub fn with_optional(self, key: impl Into<String>, value: Option<impl Into<serde_json::Value>>) -> Self {
        match value {
            Some(value) => self.with_property(key, value),
            None => self,
        }
    }

    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }
}
