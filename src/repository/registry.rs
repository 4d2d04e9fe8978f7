use super::{LeafComponentRepository, NodeComponentRepository, Repository};
use crate::errors::{DashboardError, Result};
use crate::graph::{ComponentGraph, NodeId};

/// Lookup over the node repositories, in declaration order, and the single
/// leaf repository.
#[derive(Debug, Default)]
pub struct RepositoryRegistry {
    pub node_repositories: Vec<NodeComponentRepository>,
    leaf_repository: Option<LeafComponentRepository>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node_repository(&mut self, repository: NodeComponentRepository) {
        self.node_repositories.push(repository);
    }

    pub fn set_leaf_repository(&mut self, repository: LeafComponentRepository) {
        self.leaf_repository = Some(repository);
    }

    pub fn leaf_repository(&self) -> Option<&LeafComponentRepository> {
        self.leaf_repository.as_ref()
    }

    /// Leaf node ids, empty when no leaf repository was set.
    pub fn leaves(&self) -> &[NodeId] {
        self.leaf_repository.as_ref().map(|r| r.nodes()).unwrap_or(&[])
    }

    /// First node with `id`, searching node repositories before leaves.
    pub fn get_component<P>(&self, graph: &ComponentGraph<P>, id: &str) -> Result<NodeId> {
        self.node_repositories
            .iter()
            .find_map(|repo| repo.find(graph, id))
            .or_else(|| self.leaf_repository.as_ref().and_then(|repo| repo.find(graph, id)))
            .ok_or_else(|| DashboardError::lookup(format!("Component {} not found", id)))
    }

    /// The node with `id` inside the repository named `repository_id`.
    pub fn get_component_in<P>(
        &self,
        graph: &ComponentGraph<P>,
        repository_id: &str,
        id: &str,
    ) -> Result<NodeId> {
        self.get_repository(repository_id)?.get(graph, id)
    }

    pub fn get_repository(&self, id: &str) -> Result<&Repository> {
        if let Some(repo) = self.node_repositories.iter().find(|r| r.id() == id) {
            return Ok(&**repo);
        }
        match &self.leaf_repository {
            Some(repo) if repo.id() == id => Ok(&**repo),
            _ => Err(DashboardError::lookup(format!("Repository {} not found", id))),
        }
    }

    pub fn get_node_repository(&self, id: &str) -> Result<&NodeComponentRepository> {
        self.node_repositories
            .iter()
            .find(|r| r.id() == id)
            .ok_or_else(|| DashboardError::lookup(format!("Repository {} not found", id)))
    }

    /// One line per repository.
    pub fn describe<P>(&self, graph: &ComponentGraph<P>) -> String {
        let mut lines: Vec<String> = self.node_repositories.iter().map(|r| r.describe(graph)).collect();
        if let Some(leaves) = &self.leaf_repository {
            lines.push(leaves.describe(graph));
        }
        lines.join("\n")
    }
}
