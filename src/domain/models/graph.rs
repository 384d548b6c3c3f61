//! Operation graph domain model.
//!
//! The graph is an append-only arena of operation nodes. Each node lists its
//! predecessor ids; by default a node depends on the node appended just
//! before it, and explicit extra edges may only point back at nodes that
//! already exist. Append order is therefore always a topological order and
//! no general sort is ever needed.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::operation::Operation;
use crate::domain::errors::GraphError;

/// Index of a node in its [`OperationGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A node: an operation plus the nodes whose output it consumes.
#[derive(Debug, Clone)]
pub struct OperationNode {
    pub id: NodeId,
    pub operation: Operation,
    /// Always sorted ascending, so earlier-produced states come first.
    predecessors: Vec<NodeId>,
}

impl OperationNode {
    pub fn predecessors(&self) -> &[NodeId] {
        &self.predecessors
    }

    /// Root nodes consume the seed state.
    pub fn is_root(&self) -> bool {
        self.predecessors.is_empty()
    }
}

/// Append-only DAG of operations.
#[derive(Debug, Clone, Default)]
pub struct OperationGraph {
    nodes: Vec<OperationNode>,
}

impl OperationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `operation`, depending on the previously appended node.
    pub fn append(&mut self, operation: Operation) -> NodeId {
        let id = NodeId(self.nodes.len());
        let predecessors = self.nodes.last().map(|last| vec![last.id]).unwrap_or_default();
        self.nodes.push(OperationNode {
            id,
            operation,
            predecessors,
        });
        id
    }

    /// Add an explicit edge making `node` also consume `predecessor`'s output.
    ///
    /// Used to reconnect a pruning step to an earlier pruning step so that
    /// repeated refine-and-prune rounds converge on one best-of lineage.
    pub fn add_predecessor(&mut self, node: NodeId, predecessor: NodeId) -> Result<(), GraphError> {
        if node.0 >= self.nodes.len() {
            return Err(GraphError::UnknownNode(node));
        }
        if predecessor.0 >= self.nodes.len() {
            return Err(GraphError::UnknownNode(predecessor));
        }
        if node == predecessor {
            return Err(GraphError::SelfReference(node));
        }
        if predecessor > node {
            return Err(GraphError::ForwardReference { node, predecessor });
        }

        let predecessors = &mut self.nodes[node.0].predecessors;
        if let Err(pos) = predecessors.binary_search(&predecessor) {
            predecessors.insert(pos, predecessor);
        }
        Ok(())
    }

    pub fn nodes(&self) -> &[OperationNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&OperationNode> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Re-check that every edge points strictly backwards.
    pub fn validate(&self) -> Result<(), GraphError> {
        for node in &self.nodes {
            for &pred in &node.predecessors {
                if pred == node.id {
                    return Err(GraphError::SelfReference(node.id));
                }
                if pred > node.id {
                    return Err(GraphError::ForwardReference {
                        node: node.id,
                        predecessor: pred,
                    });
                }
            }
        }
        Ok(())
    }
}
