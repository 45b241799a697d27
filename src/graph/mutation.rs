//! A batch of nodes and edges produced from one document

use super::edge::{Edge, EdgeId};
use super::node::{Node, NodeId};
use std::collections::HashSet;

/// Nodes and edges to upsert, deduplicated by id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphMutation {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    node_ids: HashSet<NodeId>,
    edge_ids: HashSet<EdgeId>,
}

impl GraphMutation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, returning its id; a repeated id keeps the first node
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id;
        if self.node_ids.insert(id) {
            self.nodes.push(node);
        }
        id
    }

    /// Connect two nodes already added to this mutation
    pub fn connect(&mut self, source: NodeId, target: NodeId, relationship: &str) {
        self.add_edge(Edge::new(source, target, relationship));
    }

    pub fn add_edge(&mut self, edge: Edge) {
        if self.edge_ids.insert(edge.id) {
            self.edges.push(edge);
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges whose endpoints are not part of this mutation
    pub fn dangling_edges(&self) -> Vec<&Edge> {
        self.edges
            .iter()
            .filter(|e| !self.node_ids.contains(&e.source) || !self.node_ids.contains(&e.target))
            .collect()
    }
}
