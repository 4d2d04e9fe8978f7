//! Typed, id-unique collections of graph nodes.
//!
//! A repository only stores `NodeId`s; the nodes themselves live in the
//! `ComponentGraph` the repository was built against.

use crate::errors::{DashboardError, Result};
use crate::graph::{ComponentGraph, NodeId};

pub mod coordinator;
pub mod leaf;
pub mod leaf_loader;
pub mod node;
pub mod registry;

pub use coordinator::{ComponentViews, RepositoryCoordinator, ViewEntry};
pub use leaf::LeafComponentRepository;
pub use node::NodeComponentRepository;
pub use registry::RepositoryRegistry;

/// Id of the repository holding every content leaf.
pub const LEAF_REPOSITORY_ID: &str = "leaves";

#[derive(Clone, Debug, Default)]
pub struct Repository {
    id: String,
    nodes: Vec<NodeId>,
}

impl Repository {
    pub fn new(id: impl Into<String>) -> Self {
        Repository {
            id: id.into(),
            nodes: vec![],
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Add `node` unless a node with the same id is already stored.  Returns
    /// whether the node was added.
    pub fn add<P>(&mut self, graph: &ComponentGraph<P>, node: NodeId) -> bool {
        if self.nodes.contains(&node) || self.has(graph, &graph[node].id) {
            return false;
        }
        self.nodes.push(node);
        true
    }

    pub fn find<P>(&self, graph: &ComponentGraph<P>, id: &str) -> Option<NodeId> {
        self.nodes.iter().copied().find(|&n| graph[n].id == id)
    }

    pub fn get<P>(&self, graph: &ComponentGraph<P>, id: &str) -> Result<NodeId> {
        self.find(graph, id).ok_or_else(|| {
            DashboardError::lookup(format!("Item with id {} not found in repository {}", id, self.id))
        })
    }

    pub fn has<P>(&self, graph: &ComponentGraph<P>, id: &str) -> bool {
        self.find(graph, id).is_some()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    /// `< id : [a, b] >`, for debug output.
    pub fn describe<P>(&self, graph: &ComponentGraph<P>) -> String {
        format!("< {} : [{}] >", self.id, graph.ids_of(&self.nodes).join(", "))
    }
}
