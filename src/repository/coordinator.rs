//! Cross-repository view structures.
//!
//! Each component gets, for every view order headed by its repository, a
//! nested grouping `{next_repo: {component: {next_repo: {...}}}}` derived
//! from the permuted component map.  The deepest groupings hold the leaves
//! reachable through that chain of components.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use std::path::Path;

use serde_json::{json, Map, Value};

use super::{RepositoryRegistry, LEAF_REPOSITORY_ID};
use crate::errors::{DashboardError, Result};
use crate::file_format::dashboard_config::DashboardConfig;
use crate::graph::tree_utils::{permute_tree_levels, IdTree};
use crate::graph::{Aggregator, ComponentGraph, NodeId, Payload, AGGREGATED_KEY};
use crate::views::View;

/// Repository name to the components grouped under it.
pub type ComponentViews = BTreeMap<String, BTreeMap<NodeId, ViewEntry>>;

#[derive(Clone, Debug, PartialEq)]
pub enum ViewEntry {
    /// Further groupings below this component.  Empty until leaves are
    /// attached.
    Nested(ComponentViews),
    /// The deepest grouping level, with the leaves found there.
    Leaves(Vec<NodeId>),
}

#[derive(Debug, Default)]
pub struct RepositoryCoordinator {
    views: BTreeMap<NodeId, ComponentViews>,
}

impl RepositoryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn views(&self, component: NodeId) -> Option<&ComponentViews> {
        self.views.get(&component)
    }

    /// Build the views of every component of every repository that heads at
    /// least one view order.
    pub fn init_repository_views(
        &mut self,
        graph: &ComponentGraph<View>,
        registry: &RepositoryRegistry,
        config: &DashboardConfig,
    ) -> Result<()> {
        let order = &config.component_map.component_order;
        for repository in &registry.node_repositories {
            for view_order in config.view_orders_for(repository.id()) {
                if view_order.len() < 2 {
                    continue;
                }
                let perm = view_order
                    .iter()
                    .map(|name| {
                        order
                            .iter()
                            .position(|o| o == name)
                            .ok_or_else(|| DashboardError::config(format!("Repository {} not defined", name)))
                    })
                    .collect::<Result<Vec<usize>>>()?;
                let permuted = permute_tree_levels(&config.component_map.mapping, &perm);
                debug!("View {} permuted to {}", view_order.join("/"), permuted.to_value());

                for component in repository.iter() {
                    let grouped = match permuted.get(&graph[component].id) {
                        Some(subtree) => process_view_tree(graph, registry, &view_order, subtree, 1)?,
                        None => BTreeMap::new(),
                    };
                    let mut incoming = ComponentViews::new();
                    incoming.insert(view_order[1].clone(), grouped);

                    let views = self.views.entry(component).or_default();
                    merge_views(views, incoming);
                    add_leaves_to_node_views(graph, registry, component, views);
                }
            }
        }
        Ok(())
    }

    /// Link every leaf under the components named by its parent ids.  Each
    /// id is looked up in the repository of its level; ids that resolve
    /// nowhere are skipped with a warning.
    pub fn set_leaves_parents(
        &self,
        graph: &mut ComponentGraph<View>,
        registry: &RepositoryRegistry,
        component_order: &[String],
    ) {
        for &leaf in registry.leaves() {
            let parent_ids = match &graph[leaf].leaf {
                Some(info) => info.parent_ids.clone(),
                None => continue,
            };
            for (level, parent_id) in parent_ids.iter().enumerate() {
                let parent = match component_order.get(level) {
                    Some(repository_id) => registry.get_component_in(graph, repository_id, parent_id),
                    None => registry.get_component(graph, parent_id),
                };
                match parent {
                    Ok(parent) => graph.add_parent(leaf, parent),
                    Err(e) => warn!("Could not attach leaf {}: {}", graph[leaf].id, e.message()),
                }
            }
        }
    }

    /// Patch the leaves of `registry`, see `patch_leaves`.
    pub fn patch_template_info(
        &self,
        graph: &mut ComponentGraph<View>,
        registry: &RepositoryRegistry,
        patches: &[Value],
        targets: &[Vec<String>],
        prefix: &str,
        save: bool,
    ) -> Result<()> {
        patch_leaves(graph, registry.leaves(), patches, targets, prefix, save)
    }

    /// Render `component` into `base_dir/<id>` and then every component of
    /// its views below it.  Leaves are rendered by their own repository.
    pub fn render_component(
        &self,
        graph: &mut ComponentGraph<View>,
        component: NodeId,
        base_dir: &Path,
        parent_id: &str,
    ) -> Result<()> {
        render_views(graph, component, self.views.get(&component), base_dir, parent_id)
    }

    /// Bottom-up fold over `component`'s views, with the attached leaves as
    /// the bottom level.  A component without views folds over the leaves
    /// linked under it.
    ///
    /// Only `component` itself and the leaves store their result under
    /// `"aggregated"`: components met deeper in a view are shared with
    /// other positions, so their per-position results are not kept.  Leaf
    /// results are computed once per pass and cached in `leaf_results`.
    pub fn upstream_view_data(
        &self,
        graph: &mut ComponentGraph<View>,
        component: NodeId,
        aggregator: &mut Aggregator<'_>,
        leaf_results: &mut HashMap<NodeId, Value>,
    ) -> Value {
        let views = self.views.get(&component);
        let leaves: Vec<NodeId> = match views {
            Some(_) => vec![],
            None => graph[component]
                .children()
                .iter()
                .copied()
                .filter(|&c| graph[c].is_leaf_component())
                .collect(),
        };
        let result = upstream_at(graph, component, views, &leaves, aggregator, leaf_results);
        store_aggregated(graph, component, result.clone());
        result
    }

    /// Result of a single leaf, from `leaf_results` when already computed.
    pub fn leaf_view_data(
        &self,
        graph: &mut ComponentGraph<View>,
        leaf: NodeId,
        aggregator: &mut Aggregator<'_>,
        leaf_results: &mut HashMap<NodeId, Value>,
    ) -> Value {
        upstream_at(graph, leaf, None, &[], aggregator, leaf_results)
    }

    /// JSON form of a component's views, with ids in place of nodes.
    pub fn views_value(&self, graph: &ComponentGraph<View>, component: NodeId) -> Value {
        match self.views.get(&component) {
            Some(views) => views_to_value(graph, views),
            None => Value::Object(Map::new()),
        }
    }

    /// Tab-indented outline of the views of every component, grouped by
    /// repository.
    pub fn print_views(&self, graph: &ComponentGraph<View>, registry: &RepositoryRegistry) -> String {
        let mut out = String::new();
        for repository in &registry.node_repositories {
            let _ = writeln!(out, "{}", repository.id());
            for component in repository.iter() {
                let _ = writeln!(out, "\t{}", graph[component].id);
                if let Some(views) = self.views.get(&component) {
                    print_views_at(graph, views, 2, &mut out);
                }
            }
        }
        out
    }
}

/// Group `subtree` under `view_order[level]`, resolving ids in that
/// repository, and recurse with the next level.
fn process_view_tree(
    graph: &ComponentGraph<View>,
    registry: &RepositoryRegistry,
    view_order: &[String],
    subtree: &IdTree,
    level: usize,
) -> Result<BTreeMap<NodeId, ViewEntry>> {
    let mut grouped = BTreeMap::new();
    if level >= view_order.len() || subtree.is_empty() {
        return Ok(grouped);
    }
    let repository = registry.get_repository(&view_order[level])?;
    for (component_id, below) in subtree.children() {
        let component = repository.get(graph, component_id)?;
        let mut nested = ComponentViews::new();
        let next = level + 1;
        if next < view_order.len() && !below.is_empty() {
            nested.insert(
                view_order[next].clone(),
                process_view_tree(graph, registry, view_order, below, next)?,
            );
        }
        grouped.insert(component, ViewEntry::Nested(nested));
    }
    Ok(grouped)
}

/// Recursive merge: nested groupings present on both sides are merged,
/// anything else in `incoming` wins.
fn merge_views(target: &mut ComponentViews, incoming: ComponentViews) {
    for (repository_id, components) in incoming {
        let existing = target.entry(repository_id).or_default();
        for (component, entry) in components {
            match (existing.get_mut(&component), entry) {
                (Some(ViewEntry::Nested(old)), ViewEntry::Nested(new)) => merge_views(old, new),
                (_, entry) => {
                    existing.insert(component, entry);
                }
            }
        }
    }
}

/// Replace every empty terminal grouping with the leaves whose parent ids
/// contain `node` and every component on the path leading to it.
fn add_leaves_to_node_views(
    graph: &ComponentGraph<View>,
    registry: &RepositoryRegistry,
    node: NodeId,
    views: &mut ComponentViews,
) {
    let matching = |path: &[NodeId]| -> Vec<NodeId> {
        registry
            .leaves()
            .iter()
            .copied()
            .filter(|&leaf| match &graph[leaf].leaf {
                Some(info) => std::iter::once(node)
                    .chain(path.iter().copied())
                    .all(|c| info.parent_ids.contains(&graph[c].id)),
                None => false,
            })
            .collect()
    };
    attach_leaves(views, &mut vec![], &matching);
}

fn attach_leaves(views: &mut ComponentViews, path: &mut Vec<NodeId>, matching: &dyn Fn(&[NodeId]) -> Vec<NodeId>) {
    for components in views.values_mut() {
        for (&component, entry) in components.iter_mut() {
            path.push(component);
            let terminal = matches!(entry, ViewEntry::Nested(children) if children.is_empty());
            if terminal {
                *entry = ViewEntry::Leaves(matching(path));
            } else if let ViewEntry::Nested(children) = entry {
                attach_leaves(children, path, matching);
            }
            path.pop();
        }
    }
}

fn render_views(
    graph: &mut ComponentGraph<View>,
    component: NodeId,
    views: Option<&ComponentViews>,
    base_dir: &Path,
    parent_id: &str,
) -> Result<()> {
    let id = graph[component].id.clone();
    let component_dir = base_dir.join(&id);
    let self_id = format!("{}-{}", parent_id, id);
    let repository = graph[component].repository.clone();

    if let Some(view) = graph[component].view.as_mut() {
        let mut meta = Map::new();
        meta.insert("parent_ids".to_string(), json!(parent_id));
        meta.insert("self_id".to_string(), json!(self_id));
        meta.insert("self_repo_type".to_string(), json!(repository));
        view.update_template_data(meta);
        view.render(&component_dir, None)?;
    }

    if let Some(views) = views {
        for components in views.values() {
            for (&child, entry) in components {
                let nested = match entry {
                    ViewEntry::Nested(nested) => Some(nested),
                    ViewEntry::Leaves(_) => None,
                };
                render_views(graph, child, nested, &component_dir, &self_id)?;
            }
        }
    }
    Ok(())
}

fn upstream_at(
    graph: &mut ComponentGraph<View>,
    node: NodeId,
    views: Option<&ComponentViews>,
    leaves: &[NodeId],
    aggregator: &mut Aggregator<'_>,
    leaf_results: &mut HashMap<NodeId, Value>,
) -> Value {
    let is_leaf = graph[node].is_leaf_component();
    if is_leaf {
        if let Some(done) = leaf_results.get(&node) {
            return done.clone();
        }
    }

    let mut child_results = vec![];
    if let Some(views) = views {
        for components in views.values() {
            for (&child, entry) in components {
                let result = match entry {
                    ViewEntry::Nested(nested) => {
                        upstream_at(graph, child, Some(nested), &[], aggregator, leaf_results)
                    }
                    ViewEntry::Leaves(below) => upstream_at(graph, child, None, below, aggregator, leaf_results),
                };
                child_results.push(result);
            }
        }
    }
    for &leaf in leaves {
        child_results.push(upstream_at(graph, leaf, None, &[], aggregator, leaf_results));
    }

    let empty = Map::new();
    let target = &graph[node];
    let own_data = target.view.as_ref().map(|v| v.template_data()).unwrap_or(&empty);
    let result = aggregator(&target.id, target.repository.as_deref(), own_data, &child_results);

    if is_leaf {
        store_aggregated(graph, node, result.clone());
        leaf_results.insert(node, result.clone());
    }
    result
}

fn store_aggregated(graph: &mut ComponentGraph<View>, node: NodeId, result: Value) {
    if let Some(view) = graph[node].view.as_mut() {
        let mut stored = Map::new();
        stored.insert(AGGREGATED_KEY.to_string(), result);
        view.update_template_data(stored);
    }
}

fn views_to_value(graph: &ComponentGraph<View>, views: &ComponentViews) -> Value {
    let mut out = Map::new();
    for (repository_id, components) in views {
        let mut grouped = Map::new();
        for (&component, entry) in components {
            let value = match entry {
                ViewEntry::Nested(nested) => views_to_value(graph, nested),
                ViewEntry::Leaves(leaves) => json!(graph.ids_of(leaves)),
            };
            grouped.insert(graph[component].id.clone(), value);
        }
        out.insert(repository_id.clone(), Value::Object(grouped));
    }
    Value::Object(out)
}

fn print_views_at(graph: &ComponentGraph<View>, views: &ComponentViews, tab: usize, out: &mut String) {
    for components in views.values() {
        for (&component, entry) in components {
            let indent = "\t".repeat(tab);
            match entry {
                ViewEntry::Nested(nested) => {
                    let _ = writeln!(out, "{}{}", indent, graph[component].id);
                    print_views_at(graph, nested, tab + 1, out);
                }
                ViewEntry::Leaves(leaves) => {
                    let _ = writeln!(out, "{}{} -> {}", indent, graph[component].id, leaves.len());
                }
            }
        }
    }
}

/// Merge patches into the template data of the targeted leaves.
///
/// Without targets the single patch goes to the latest leaf.  Otherwise
/// each target is a list of segments compared position by position with
/// the leaf's parent ids followed by its item name; `all` matches any
/// leaf and `latest` keeps the one with the greatest item name.
pub fn patch_leaves<P: Payload>(
    graph: &mut ComponentGraph<P>,
    leaves: &[NodeId],
    patches: &[Value],
    targets: &[Vec<String>],
    prefix: &str,
    save: bool,
) -> Result<()> {
    if targets.is_empty() {
        if patches.len() != 1 {
            return Err(DashboardError::bad_input(
                "When no patch reports are provided, plot configuration should be of length one",
            ));
        }
        let latest = latest_leaf(graph, leaves)
            .ok_or_else(|| DashboardError::lookup("Component latest not found"))?;
        info!("Latest target: {}", graph[latest].id);
        return graph.patch_template_info(latest, patches[0].clone(), prefix, save);
    }

    if patches.len() != 1 && patches.len() != targets.len() {
        return Err(DashboardError::bad_input(
            "Patches not must either be of length 1 or the same length as targets",
        ));
    }

    for (i, target) in targets.iter().enumerate() {
        let mut selected = leaves.to_vec();
        for (depth, segment) in target.iter().enumerate() {
            selected = match segment.as_str() {
                "all" => selected,
                "latest" => latest_leaf(graph, &selected).into_iter().collect(),
                _ => selected
                    .into_iter()
                    .filter(|&leaf| {
                        graph[leaf]
                            .leaf
                            .as_ref()
                            .and_then(|info| info.segments().nth(depth))
                            == Some(segment.as_str())
                    })
                    .collect(),
            };
            if selected.is_empty() {
                return Err(DashboardError::lookup(format!("Component {} not found", segment)));
            }
        }

        let patch = if patches.len() == targets.len() { &patches[i] } else { &patches[0] };
        for leaf in selected {
            debug!("Patching {} under '{}'", graph[leaf].id, prefix);
            graph.patch_template_info(leaf, patch.clone(), prefix, save)?;
        }
    }
    Ok(())
}

/// The leaf with the greatest item name; the first one wins ties.
fn latest_leaf<P>(graph: &ComponentGraph<P>, leaves: &[NodeId]) -> Option<NodeId> {
    let item_name = |leaf: NodeId| graph[leaf].leaf.as_ref().map(|info| info.item_name.as_str());
    leaves.iter().copied().fold(None, |best, leaf| match best {
        Some(current) if item_name(current) >= item_name(leaf) => Some(current),
        _ => Some(leaf),
    })
}

/// Counts the leaves below each node.  A childless node counts as one
/// when it belongs to the leaf repository.
pub fn leaf_count_aggregator(
    _id: &str,
    repository: Option<&str>,
    _data: &Map<String, Value>,
    children: &[Value],
) -> Value {
    let count = if children.is_empty() {
        u64::from(repository == Some(LEAF_REPOSITORY_ID))
    } else {
        children
            .iter()
            .filter_map(|c| c.get("leaf_count").and_then(Value::as_u64))
            .sum()
    };
    json!({ "leaf_count": count })
}
