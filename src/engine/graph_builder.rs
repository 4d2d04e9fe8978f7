use std::collections::HashMap;
use std::fs;
use std::path::Path;

use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use serde_json::{Map, Value};

use super::{DashboardLayout, ROOT_ID};
use crate::errors::{DashboardError, Result};
use crate::file_format::dashboard_config::DashboardConfig;
use crate::graph::{Aggregator, ComponentGraph, NodeId, Payload, AGGREGATED_KEY};
use crate::repository::{
    ComponentViews, LeafComponentRepository, NodeComponentRepository, RepositoryCoordinator,
    RepositoryRegistry, ViewEntry, LEAF_REPOSITORY_ID,
};
use crate::views::{View, ViewFactory, ViewKind};

/// Dashboard laid out as one flat repository per component type, each
/// component carrying its own view groupings.  Output goes to
/// `<base>/pages`.
#[derive(Debug)]
pub struct ComponentGraphBuilder {
    graph: ComponentGraph<View>,
    home: View,
    registry: RepositoryRegistry,
    coordinator: RepositoryCoordinator,
}

impl ComponentGraphBuilder {
    pub fn new(config: &DashboardConfig, factory: &ViewFactory) -> Result<Self> {
        let home = factory.create(ViewKind::Home, &config.dashboard_metadata, None, None)?;
        let mut graph = ComponentGraph::new();
        let mut registry = RepositoryRegistry::new();

        for (repository_id, template_info) in config.repositories.iter() {
            let components = config.components.get(repository_id).ok_or_else(|| {
                DashboardError::config(format!("Repository {} not defined in components", repository_id))
            })?;
            let view = factory.create(ViewKind::Node, template_info, None, Some(repository_id))?;
            registry.add_node_repository(NodeComponentRepository::new(
                &mut graph,
                repository_id,
                components,
                view,
                factory,
            )?);
        }
        registry.set_leaf_repository(LeafComponentRepository::new(
            &mut graph,
            LEAF_REPOSITORY_ID,
            &config.component_map.mapping,
            &config.template_defaults.leaves,
            factory,
        )?);

        let mut coordinator = RepositoryCoordinator::new();
        coordinator.init_repository_views(&graph, &registry, config)?;
        coordinator.set_leaves_parents(&mut graph, &registry, &config.component_map.component_order);

        Ok(ComponentGraphBuilder {
            graph,
            home,
            registry,
            coordinator,
        })
    }

    pub fn graph(&self) -> &ComponentGraph<View> {
        &self.graph
    }

    pub fn registry(&self) -> &RepositoryRegistry {
        &self.registry
    }

    pub fn coordinator(&self) -> &RepositoryCoordinator {
        &self.coordinator
    }

    /// Views of the component `id` as JSON.
    pub fn component_views(&self, id: &str) -> Result<Value> {
        let component = self.registry.get_component(&self.graph, id)?;
        Ok(self.coordinator.views_value(&self.graph, component))
    }
}

impl DashboardLayout for ComponentGraphBuilder {
    fn render(&mut self, base_dir: &Path) -> Result<()> {
        let pages_dir = base_dir.join("pages");
        fs::create_dir_all(&pages_dir)?;
        self.home.render(&pages_dir, None)?;

        for repository in self.registry.node_repositories.iter_mut() {
            repository.render_index(&pages_dir)?;
            let repository_id = repository.id().to_string();
            let repository_dir = pages_dir.join(&repository_id);
            for component in repository.nodes().to_vec() {
                self.coordinator
                    .render_component(&mut self.graph, component, &repository_dir, &repository_id)?;
            }
        }

        if let Some(leaves) = self.registry.leaf_repository() {
            leaves.render(&mut self.graph, &pages_dir)?;
        }
        info!("Rendered dashboard into {}", pages_dir.display());
        Ok(())
    }

    fn dump(&self) -> String {
        self.coordinator.print_views(&self.graph, &self.registry)
    }

    fn to_dot(&self) -> String {
        let mut dot = DotBuilder::default();
        let root = dot.named(ROOT_ID);
        for repository in &self.registry.node_repositories {
            let repository_index = dot.named(repository.id());
            dot.edge(root, repository_index);
            for component in repository.iter() {
                let index = dot.node(&self.graph, component);
                dot.edge(repository_index, index);
                if let Some(views) = self.coordinator.views(component) {
                    dot.add_views(&self.graph, index, views);
                }
            }
        }
        format!("{}", Dot::with_config(&dot.graph, &[Config::EdgeNoLabel]))
    }

    /// Each component folds over its own views, each repository over its
    /// components, and the home page over every leaf once.
    fn aggregate(&mut self, aggregator: &mut Aggregator<'_>) -> Value {
        let mut leaf_results = HashMap::new();
        for repository in self.registry.node_repositories.iter_mut() {
            let mut results = vec![];
            for component in repository.nodes().to_vec() {
                results.push(self.coordinator.upstream_view_data(
                    &mut self.graph,
                    component,
                    aggregator,
                    &mut leaf_results,
                ));
            }
            let result = aggregator(repository.id(), None, repository.view.template_data(), &results);
            store_aggregated(&mut repository.view, result);
        }

        let mut results = vec![];
        for &leaf in self.registry.leaves() {
            results.push(self.coordinator.leaf_view_data(&mut self.graph, leaf, aggregator, &mut leaf_results));
        }
        let result = aggregator(ROOT_ID, None, self.home.template_data(), &results);
        store_aggregated(&mut self.home, result.clone());
        result
    }

    fn patch_template_info(
        &mut self,
        patches: &[Value],
        targets: &[Vec<String>],
        prefix: &str,
        save: bool,
    ) -> Result<()> {
        self.coordinator
            .patch_template_info(&mut self.graph, &self.registry, patches, targets, prefix, save)
    }
}

fn store_aggregated(view: &mut View, result: Value) {
    let mut stored = Map::new();
    stored.insert(AGGREGATED_KEY.to_string(), result);
    view.update_template_data(stored);
}

/// Petgraph mirror of the repositories and view groupings.  Components and
/// leaves appear once however many groupings reach them.
#[derive(Default)]
struct DotBuilder {
    graph: DiGraph<String, &'static str>,
    named: HashMap<String, NodeIndex>,
    nodes: HashMap<NodeId, NodeIndex>,
}

impl DotBuilder {
    fn named(&mut self, name: &str) -> NodeIndex {
        if let Some(&index) = self.named.get(name) {
            return index;
        }
        let index = self.graph.add_node(name.to_string());
        self.named.insert(name.to_string(), index);
        index
    }

    fn node(&mut self, graph: &ComponentGraph<View>, node: NodeId) -> NodeIndex {
        if let Some(&index) = self.nodes.get(&node) {
            return index;
        }
        let index = self.graph.add_node(graph[node].id.clone());
        self.nodes.insert(node, index);
        index
    }

    fn edge(&mut self, from: NodeIndex, to: NodeIndex) {
        self.graph.update_edge(from, to, "");
    }

    fn add_views(&mut self, graph: &ComponentGraph<View>, from: NodeIndex, views: &ComponentViews) {
        for components in views.values() {
            for (&component, entry) in components {
                let index = self.node(graph, component);
                self.edge(from, index);
                match entry {
                    ViewEntry::Nested(nested) => self.add_views(graph, index, nested),
                    ViewEntry::Leaves(leaves) => {
                        for &leaf in leaves {
                            let leaf_index = self.node(graph, leaf);
                            self.edge(index, leaf_index);
                        }
                    }
                }
            }
        }
    }
}
