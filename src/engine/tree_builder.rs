use std::path::Path;

use serde_json::Value;

use super::{DashboardLayout, ROOT_ID};
use crate::errors::{DashboardError, Result};
use crate::file_format::dashboard_config::{ConfigNode, DashboardConfig};
use crate::graph::tree_utils::{permute_path, IdTree};
use crate::graph::{Aggregator, ComponentGraph, NodeId};
use crate::repository::coordinator::patch_leaves;
use crate::repository::{LeafComponentRepository, LEAF_REPOSITORY_ID};
use crate::views::{View, ViewFactory, ViewKind};

/// A branch of the canonical tree: component ids by level, and the leaf
/// hanging from its last component if any.
#[derive(Clone, Debug)]
struct Branch {
    ids: Vec<String>,
    leaf: Option<NodeId>,
}

impl Branch {
    fn levels(&self) -> Vec<(usize, String)> {
        self.ids.iter().cloned().enumerate().collect()
    }
}

/// Dashboard laid out as a single tree: the home page, then one node per
/// repository heading a view, then the components in view order.  Leaves
/// are shared by every branch that reaches them.
#[derive(Debug)]
pub struct ComponentTree {
    graph: ComponentGraph<View>,
    root: NodeId,
    repositories: Vec<NodeId>,
    leaf_repository: LeafComponentRepository,
}

impl ComponentTree {
    pub fn new(config: &DashboardConfig, factory: &ViewFactory) -> Result<Self> {
        let mut graph = ComponentGraph::new();
        let home = factory.create(ViewKind::Home, &config.dashboard_metadata, None, None)?;
        let root = graph.add_tree_node(ROOT_ID, Some(home), None);

        let mut repositories = vec![];
        for (repository_id, template_info) in config.repositories.iter() {
            let view = factory.create(ViewKind::Node, template_info, None, Some(repository_id))?;
            repositories.push(graph.add_tree_node(repository_id.clone(), Some(view), None));
        }

        let leaf_repository = LeafComponentRepository::new(
            &mut graph,
            LEAF_REPOSITORY_ID,
            &config.component_map.mapping,
            &config.template_defaults.leaves,
            factory,
        )?;

        let mut tree = ComponentTree {
            graph,
            root,
            repositories,
            leaf_repository,
        };
        tree.build(config, factory)?;
        Ok(tree)
    }

    pub fn graph(&self) -> &ComponentGraph<View> {
        &self.graph
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn leaf_repository(&self) -> &LeafComponentRepository {
        &self.leaf_repository
    }

    fn repository_node(&self, id: &str) -> Option<NodeId> {
        self.repositories.iter().copied().find(|&n| self.graph[n].id == id)
    }

    fn build(&mut self, config: &DashboardConfig, factory: &ViewFactory) -> Result<()> {
        let levels = &config.component_map.component_order;
        let mut canonical = IdTree::default();
        collect_canonical(config, &config.component_map.mapping, 0, &mut vec![], &mut canonical);

        let mut branches = vec![];
        let mut leaf_parents: Vec<Vec<String>> = vec![];
        for &leaf in self.leaf_repository.nodes() {
            let parent_ids = match &self.graph[leaf].leaf {
                Some(info) => info.parent_ids.clone(),
                None => continue,
            };
            if !has_path(&canonical, &parent_ids) {
                warn!("Could not find parent for leaf {}", self.graph[leaf].id);
                continue;
            }
            if !leaf_parents.contains(&parent_ids) {
                leaf_parents.push(parent_ids.clone());
            }
            branches.push(Branch {
                ids: parent_ids,
                leaf: Some(leaf),
            });
        }
        // Components without any leaf below still show up in every view.
        for ids in terminal_paths(&canonical) {
            if !leaf_parents.contains(&ids) {
                branches.push(Branch { ids, leaf: None });
            }
        }

        for view_order in config.view_orders() {
            let perm = view_order
                .iter()
                .map(|name| {
                    levels
                        .iter()
                        .position(|l| l == name)
                        .ok_or_else(|| DashboardError::config(format!("Repository {} not defined", name)))
                })
                .collect::<Result<Vec<usize>>>()?;
            let heading = self
                .repository_node(&view_order[0])
                .ok_or_else(|| DashboardError::config(format!("Repository {} not defined", view_order[0])))?;
            self.graph.set_parent(heading, self.root);

            for branch in &branches {
                let mut cursor = heading;
                for (level, id) in permute_path(&branch.levels(), &perm) {
                    cursor = self.find_or_create(config, factory, cursor, level, &id)?;
                }
                if let Some(leaf) = branch.leaf {
                    let leaf_id = self.graph[leaf].id.clone();
                    if self.graph.get_child(cursor, &leaf_id).is_none() {
                        self.graph.add_parent(leaf, cursor);
                    }
                }
            }
            debug!("Built view {}", view_order.join("/"));
        }
        Ok(())
    }

    fn find_or_create(
        &mut self,
        config: &DashboardConfig,
        factory: &ViewFactory,
        parent: NodeId,
        level: usize,
        id: &str,
    ) -> Result<NodeId> {
        if let Some(existing) = self.graph.get_child(parent, id) {
            return Ok(existing);
        }
        let repository_id = &config.component_map.component_order[level];
        let template_info = config
            .components
            .get(repository_id)
            .and_then(|components| components.get(id))
            .ok_or_else(|| {
                DashboardError::lookup(format!("Item with id {} not found in repository {}", id, repository_id))
            })?;
        let view = factory.create(ViewKind::Node, template_info, None, Some(id))?;
        let node = self.graph.add_tree_node(id, Some(view), Some(parent));
        self.graph.set_repository(node, Some(repository_id.clone()));
        Ok(node)
    }
}

/// Canonical id paths of the mapping, keeping only ids declared in the
/// repository of their level.
fn collect_canonical(
    config: &DashboardConfig,
    node: &ConfigNode,
    depth: usize,
    path: &mut Vec<String>,
    tree: &mut IdTree,
) {
    let levels = &config.component_map.component_order;
    let components = match levels.get(depth).and_then(|repo| config.components.get(repo)) {
        Some(components) => components,
        None => return,
    };
    for (id, child) in node.children() {
        if !components.contains_key(id) {
            continue;
        }
        path.push(id.clone());
        tree.insert_path(path.as_slice());
        if depth + 1 < levels.len() {
            collect_canonical(config, child, depth + 1, path, tree);
        }
        path.pop();
    }
}

fn has_path(tree: &IdTree, path: &[String]) -> bool {
    let mut cursor = tree;
    for id in path {
        cursor = match cursor.get(id) {
            Some(next) => next,
            None => return false,
        };
    }
    !path.is_empty()
}

fn terminal_paths(tree: &IdTree) -> Vec<Vec<String>> {
    fn walk(tree: &IdTree, prefix: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
        for (id, child) in tree.children() {
            prefix.push(id.clone());
            if child.is_empty() {
                out.push(prefix.clone());
            } else {
                walk(child, prefix, out);
            }
            prefix.pop();
        }
    }
    let mut out = vec![];
    walk(tree, &mut vec![], &mut out);
    out
}

impl DashboardLayout for ComponentTree {
    fn render(&mut self, base_dir: &Path) -> Result<()> {
        self.graph.render(self.root, base_dir, None, false)?;
        self.leaf_repository.render(&mut self.graph, base_dir)?;
        info!("Rendered dashboard into {}", base_dir.display());
        Ok(())
    }

    fn dump(&self) -> String {
        self.graph.dump(self.root)
    }

    fn to_dot(&self) -> String {
        self.graph.to_dot(self.root)
    }

    fn aggregate(&mut self, aggregator: &mut Aggregator<'_>) -> Value {
        self.graph.upstream_view_data(self.root, aggregator)
    }

    fn patch_template_info(
        &mut self,
        patches: &[Value],
        targets: &[Vec<String>],
        prefix: &str,
        save: bool,
    ) -> Result<()> {
        let leaves = self.leaf_repository.nodes().to_vec();
        patch_leaves(&mut self.graph, &leaves, patches, targets, prefix, save)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::{add_undeclared_machine, runs_config, views_config};
    use crate::graph::{Payload, AGGREGATED_KEY};
    use crate::repository::coordinator::leaf_count_aggregator;
    use serde_json::json;
    use std::fs;

    #[test]
    fn test_tree_follows_view_orders() {
        let (_dir, config) = runs_config("dashboard-tree-build");
        let tree = ComponentTree::new(&config, &ViewFactory::default()).unwrap();

        insta::assert_snapshot!(tree.dump(), @r###"
dashboard_index
  applications
    toolbox
      gaya
        gaya-toolbox-r1 *
        gaya-toolbox-r2 *
      discoverer
        discoverer-toolbox-r1 *
"###);

        let graph = tree.graph();
        let leaf = tree.leaf_repository().get(graph, "gaya-toolbox-r1").unwrap();
        assert_eq!(graph.perm_parent_ids_str(leaf), "dashboard_index-applications-toolbox-gaya");
    }

    #[test]
    fn test_views_merge_under_heading_repository() {
        let tree = ComponentTree::new(&views_config(), &ViewFactory::default()).unwrap();

        insta::assert_snapshot!(tree.dump(), @r###"
dashboard_index
  a
    a1
      d1
        b1
          c1
          c2
        b2
          c2
        c1
          b1
        c2
          b1
          b2
    a3
      d1
        b4
          c1
        b1
          c2
        c1
          b4
        c2
          b1
  d
    d1
      a1
        b1
          c1
          c2
        b2
          c2
      a3
        b4
          c1
        b1
          c2
  b
    b1
      c1
        a1
          d1
      c2
        a1
          d1
        a3
          d1
    b2
      c2
        a1
          d1
    b4
      c1
        a3
          d1
"###);
    }

    #[test]
    fn test_leaf_with_unresolved_parent_is_skipped() {
        let (dir, mut config) = runs_config("dashboard-tree-unresolved");
        add_undeclared_machine(&dir, &mut config);
        let tree = ComponentTree::new(&config, &ViewFactory::default()).unwrap();

        let graph = tree.graph();
        let leaf = tree.leaf_repository().get(graph, "karolina-toolbox-r1").unwrap();
        assert_eq!(tree.leaf_repository().len(), 4);
        assert!(graph[leaf].parents().is_empty());
        assert!(!graph.get_leaves(tree.root()).contains(&leaf));
        assert!(!tree.dump().contains("karolina"));
    }

    #[test]
    fn test_unknown_heading_repository() {
        let (_dir, mut config) = runs_config("dashboard-tree-unknown");
        config.repositories = config
            .repositories
            .iter()
            .filter(|(k, _)| k.as_str() != "applications")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let err = ComponentTree::new(&config, &ViewFactory::default()).unwrap_err();
        assert_eq!(err.message(), "Repository applications not defined");
    }

    #[test]
    fn test_render_and_aggregate() {
        let (dir, config) = runs_config("dashboard-tree-render");
        let mut tree = ComponentTree::new(&config, &ViewFactory::default()).unwrap();

        assert_eq!(tree.aggregate(&mut leaf_count_aggregator), json!({"leaf_count": 3}));
        let root = tree.root();
        assert_eq!(
            tree.graph()[root].view.as_ref().unwrap().template_data()[AGGREGATED_KEY],
            json!({"leaf_count": 3})
        );

        let out = dir.join("out");
        tree.render(&out).unwrap();
        let home = fs::read_to_string(out.join("index.adoc")).unwrap();
        assert!(home.contains(":page-leaf-count: 3"));

        let gaya = fs::read_to_string(out.join("applications/toolbox/gaya/index.adoc")).unwrap();
        assert!(gaya.contains(":page-self-id: dashboard_index-applications-toolbox-gaya"));
        assert!(gaya.contains(":page-repository: machines"));
        assert!(gaya.contains(":page-leaf-count: 2"));
        assert!(!out.join("applications/toolbox/gaya/gaya-toolbox-r1").exists());

        let leaf = fs::read_to_string(out.join("leaves/gaya-toolbox-r2/leaf.adoc")).unwrap();
        assert!(leaf.contains(":page-self-relpath: leaves/gaya-toolbox-r2"));
    }
}
